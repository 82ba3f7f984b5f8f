use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watch {
    pub email: String, // watcher key
    pub keywords: Vec<String>,
    pub subscription: Option<PushSubscription>,
}

/// Browser push handle as handed out by the push service. Opaque to the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<i64>,
    pub keys: PushKeys,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

impl Watch {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            keywords: Vec::new(),
            subscription: None,
        }
    }

    pub fn with_keywords<I, S>(email: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut w = Self::new(email);
        w.set_keywords(keywords.into_iter().map(Into::into).collect());
        w
    }

    pub fn tracks(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k == keyword)
    }

    /// Returns false when the keyword was already present.
    pub fn add_keyword(&mut self, keyword: &str) -> bool {
        if self.tracks(keyword) {
            return false;
        }
        self.keywords.push(keyword.to_string());
        true
    }

    pub fn remove_keyword(&mut self, keyword: &str) -> bool {
        let before = self.keywords.len();
        self.keywords.retain(|k| k != keyword);
        before != self.keywords.len()
    }

    /// Replaces the keyword list, dropping repeats but keeping first-seen order.
    pub fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords.clear();
        for k in keywords {
            self.add_keyword(&k);
        }
    }
}
