use std::num::NonZeroU64;
use std::time::Duration;

use serde::Deserialize;

use crate::application::{AppError, EngineConfig};
use crate::domain::{ItemLinks, Watch};
use crate::infrastructure::http_listings_source::HttpSourceSettings;

/// Polling faster than this gets the client rate-limited upstream.
pub const MIN_POLL_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub clear_cycles_limit: Option<u64>,
    #[serde(default = "default_max_matches")]
    pub max_matches_per_notification: usize,
    pub database_url: Option<String>,
    pub source: SourceCfg,
    #[serde(default)]
    pub notifications: NotificationsCfg,
    #[serde(default)]
    pub api: ApiCfg,
    #[serde(default)]
    pub watches: Vec<WatchCfg>,
}

#[derive(Debug, Deserialize)]
pub struct SourceCfg {
    pub search_url: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub request_delay_ms: u64,
    pub dpop_token: Option<String>,
    pub item_url_base: Option<String>,
    pub shop_item_url_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsCfg {
    pub webhook_url: Option<String>,
    pub email_from: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCfg {
    #[serde(default = "default_bind")]
    pub bind: String,
    pub token: Option<String>,
}

impl Default for ApiCfg {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WatchCfg {
    pub email: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

fn default_max_matches() -> usize {
    10
}

fn default_pages() -> u32 {
    1
}

fn default_page_size() -> u32 {
    120
}

fn default_bind() -> String {
    "0.0.0.0:3080".to_string()
}

impl Config {
    pub fn load_from_file(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let raw = expand_env(raw);
        let cfg: Config = serde_yaml::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(AppError::Config(format!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}, got {}",
                self.poll_interval_ms
            )));
        }
        if self.clear_cycles_limit == Some(0) {
            return Err(AppError::Config(
                "clear_cycles_limit must be positive (omit it to disable)".into(),
            ));
        }
        if self.max_matches_per_notification == 0 {
            return Err(AppError::Config(
                "max_matches_per_notification must be at least 1".into(),
            ));
        }
        if self.source.search_url.trim().is_empty() {
            return Err(AppError::Config("source.search_url is empty".into()));
        }
        if let Some(w) = self.watches.iter().find(|w| !w.email.contains('@')) {
            return Err(AppError::Config(format!(
                "watches: invalid email {:?}",
                w.email
            )));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            clear_cycles_limit: self.clear_cycles_limit.and_then(NonZeroU64::new),
            max_matches_per_notification: self.max_matches_per_notification,
        }
    }

    pub fn source_settings(&self) -> HttpSourceSettings {
        HttpSourceSettings {
            search_url: self.source.search_url.clone(),
            pages: self.source.pages,
            page_size: self.source.page_size,
            request_delay: Duration::from_millis(self.source.request_delay_ms),
            dpop_token: self.source.dpop_token.clone(),
        }
    }

    pub fn item_links(&self) -> ItemLinks {
        let defaults = ItemLinks::default();
        ItemLinks {
            item_base: self
                .source
                .item_url_base
                .clone()
                .unwrap_or(defaults.item_base),
            shop_item_base: self
                .source
                .shop_item_url_base
                .clone()
                .unwrap_or(defaults.shop_item_base),
        }
    }

    pub fn seed_watches(&self) -> Vec<Watch> {
        self.watches
            .iter()
            .map(|w| Watch::with_keywords(w.email.trim(), w.keywords.iter().map(|k| k.trim())))
            .collect()
    }
}

/// very small ${VAR} expansion to keep config simple
fn expand_env(s: &str) -> String {
    let mut out = s.to_string();
    for (k, v) in std::env::vars() {
        out = out.replace(&format!("${{{}}}", k), &v);
    }
    out
}
