use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String, // globally unique per marketplace item
    pub name: String,
    /// Source-defined units; only meaningful for ordering.
    pub created: i64,
}

impl Listing {
    pub fn new(id: impl Into<String>, name: impl Into<String>, created: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created,
        }
    }

    /// Regular items carry an `m` prefix; everything else is a shop product.
    pub fn is_shop_item(&self) -> bool {
        !self.id.starts_with('m')
    }

    pub fn url(&self, links: &ItemLinks) -> String {
        let base = if self.is_shop_item() {
            &links.shop_item_base
        } else {
            &links.item_base
        };
        format!("{}/{}", base.trim_end_matches('/'), self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemLinks {
    pub item_base: String,
    pub shop_item_base: String,
}

impl Default for ItemLinks {
    fn default() -> Self {
        Self {
            item_base: "https://jp.mercari.com/en/item".to_string(),
            shop_item_base: "https://jp.mercari.com/en/shops/product".to_string(),
        }
    }
}

/// A listing paired with the keyword whose search produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Match {
    pub listing: Listing,
    pub keyword: String,
}
