use crate::application::{AppError, AppResult, WatchRepository};
use crate::domain::{PushSubscription, Watch};

/// Validating front for watch edits. The engine picks changes up on its next cycle.
pub struct ManageWatchesUseCase<'a> {
    pub watches: &'a dyn WatchRepository,
}

impl<'a> ManageWatchesUseCase<'a> {
    pub async fn list(&self) -> AppResult<Vec<Watch>> {
        self.watches.list_watches().await
    }

    pub async fn create(&self, email: &str) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        self.watches.create_watch(&email).await
    }

    pub async fn remove(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email)?;
        self.watches.remove_watch(&email).await
    }

    pub async fn add_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        let keyword = normalize_keyword(keyword)?;
        self.watches.add_keyword(&email, &keyword).await
    }

    pub async fn remove_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        let keyword = normalize_keyword(keyword)?;
        self.watches.remove_keyword(&email, &keyword).await
    }

    pub async fn set_keywords(&self, email: &str, keywords: &[String]) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        let keywords = keywords
            .iter()
            .map(|k| normalize_keyword(k))
            .collect::<AppResult<Vec<_>>>()?;
        self.watches.set_keywords(&email, keywords).await
    }

    pub async fn subscribe(&self, email: &str, subscription: PushSubscription) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        if subscription.endpoint.trim().is_empty() {
            return Err(AppError::InvalidInput("subscription endpoint is empty".into()));
        }
        self.watches.set_subscription(&email, Some(subscription)).await
    }

    pub async fn unsubscribe(&self, email: &str) -> AppResult<Watch> {
        let email = normalize_email(email)?;
        self.watches.set_subscription(&email, None).await
    }

    pub async fn reset(&self) -> AppResult<()> {
        self.watches.reset_watches().await
    }
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::InvalidInput(format!("invalid email: {email:?}")));
    }
    Ok(email.to_string())
}

fn normalize_keyword(keyword: &str) -> AppResult<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(AppError::InvalidInput("keyword is empty".into()));
    }
    Ok(keyword.to_string())
}
