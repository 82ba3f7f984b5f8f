use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};

use crate::application::{AppError, AppResult, ListingsSource};
use crate::domain::Listing;

#[derive(Clone, Debug)]
pub struct HttpSourceSettings {
    pub search_url: String,
    pub pages: u32,
    pub page_size: u32,
    pub request_delay: Duration,
    pub dpop_token: Option<String>,
}

/// Searches a marketplace JSON endpoint, newest listings first.
pub struct HttpListingsSource {
    client: reqwest::Client,
    settings: HttpSourceSettings,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl HttpListingsSource {
    pub fn new(settings: HttpSourceSettings) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("search client: {e}")))?;
        Ok(Self { client, settings })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchReq<'a> {
    page_size: u32,
    page_token: &'a str,
    search_session_id: &'a str,
    search_condition: SearchCondition<'a>,
    default_datasets: [&'a str; 2],
}

#[derive(Debug, Serialize)]
struct SearchCondition<'a> {
    keyword: &'a str,
    sort: &'a str,
    order: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    items: Vec<ItemResp>,
    #[serde(default)]
    meta: Option<MetaResp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaResp {
    #[serde(default)]
    next_page_token: String,
}

#[derive(Debug, Deserialize)]
struct ItemResp {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    created: Option<serde_json::Value>,
}

const SEARCH_SESSION_ID: &str = "54cd7926b7ab66b67bf34086d6707671";

impl HttpListingsSource {
    async fn fetch_page(&self, keyword: &str, page_token: &str) -> AppResult<SearchResp> {
        let body = SearchReq {
            page_size: self.settings.page_size,
            page_token,
            search_session_id: SEARCH_SESSION_ID,
            search_condition: SearchCondition {
                keyword,
                sort: "SORT_CREATED_TIME",
                order: "ORDER_DESC",
            },
            default_datasets: ["DATASET_TYPE_MERCARI", "DATASET_TYPE_BEYOND"],
        };

        let mut req = self
            .client
            .post(&self.settings.search_url)
            .header(USER_AGENT, "listingpulse")
            .header("x-platform", "web")
            .json(&body);

        if let Some(token) = &self.settings.dpop_token {
            req = req.header("dpop", token.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::Source(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Source(e.to_string()))?;

        resp.json()
            .await
            .map_err(|e| AppError::Source(e.to_string()))
    }
}

#[async_trait]
impl ListingsSource for HttpListingsSource {
    async fn fetch(&self, keyword: &str) -> AppResult<Vec<Listing>> {
        let mut items: Vec<ItemResp> = Vec::new();
        let mut page_token = String::new();

        for page in 0..self.settings.pages.max(1) {
            if page > 0 && !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }

            let resp = self.fetch_page(keyword, &page_token).await?;
            items.extend(resp.items);

            match resp.meta {
                Some(meta) if !meta.next_page_token.is_empty() => {
                    page_token = meta.next_page_token
                }
                _ => break,
            }
        }

        tracing::debug!(keyword, items = items.len(), "search completed");
        Ok(into_listings(items))
    }
}

/// Dedups by id (first occurrence wins) and orders newest first.
fn into_listings(items: Vec<ItemResp>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut out: Vec<Listing> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .map(|item| Listing {
            created: parse_created(item.created.as_ref()),
            id: item.id,
            name: item.name,
        })
        .collect();
    out.sort_by(|a, b| b.created.cmp(&a.created));
    out
}

fn parse_created(v: Option<&serde_json::Value>) -> i64 {
    match v {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
