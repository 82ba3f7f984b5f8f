use crate::domain::{Listing, PushSubscription, Watch};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("listings source error: {0}")]
    Source(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("notifier error: {0}")]
    Notifier(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("watch not found: {0}")]
    NotFound(String),
    #[error("watch already exists: {0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Rendered message for one watcher, produced by the dispatcher.
#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub recipient: String,
    pub sender: Option<String>,
    pub subscription: Option<PushSubscription>,
    pub subject: String,
    pub body: String,
    pub listings: Vec<Listing>,
    /// Matches before the per-notification cap was applied.
    pub total_matches: usize,
}

/// Current listings for a keyword, newest-created first.
/// "No results" is `Ok(vec![])`; transport failures are errors.
#[async_trait]
pub trait ListingsSource: Send + Sync {
    async fn fetch(&self, keyword: &str) -> AppResult<Vec<Listing>>;
}

/// Watch configuration, read fresh by every poll cycle.
#[async_trait]
pub trait WatchRepository: Send + Sync {
    async fn list_watches(&self) -> AppResult<Vec<Watch>>;
    async fn get_watch(&self, email: &str) -> AppResult<Watch>;
    async fn create_watch(&self, email: &str) -> AppResult<Watch>;
    async fn remove_watch(&self, email: &str) -> AppResult<()>;
    async fn add_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch>;
    async fn remove_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch>;
    async fn set_keywords(&self, email: &str, keywords: Vec<String>) -> AppResult<Watch>;
    async fn set_subscription(
        &self,
        email: &str,
        subscription: Option<PushSubscription>,
    ) -> AppResult<Watch>;
    async fn reset_watches(&self) -> AppResult<()>;
}

/// Deliver notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> AppResult<()>;
}
