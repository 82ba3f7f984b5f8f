use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::application::{AppError, AppResult, WatchRepository};
use crate::domain::{PushSubscription, Watch};

#[derive(Clone, Default)]
pub struct InMemoryWatchRepository {
    inner: Arc<Mutex<Vec<Watch>>>,
}

impl InMemoryWatchRepository {
    pub fn new(watches: Vec<Watch>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(watches)),
        }
    }

    /// Swaps the whole watch list, as an external edit would.
    pub fn replace(&self, watches: Vec<Watch>) -> AppResult<()> {
        *self.lock()? = watches;
        Ok(())
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Vec<Watch>>> {
        self.inner
            .lock()
            .map_err(|_| AppError::Storage("lock poisoned".into()))
    }

    fn update<F>(&self, email: &str, f: F) -> AppResult<Watch>
    where
        F: FnOnce(&mut Watch),
    {
        let mut watches = self.lock()?;
        let watch = watches
            .iter_mut()
            .find(|w| w.email == email)
            .ok_or_else(|| AppError::NotFound(email.to_string()))?;
        f(watch);
        Ok(watch.clone())
    }
}

#[async_trait]
impl WatchRepository for InMemoryWatchRepository {
    async fn list_watches(&self) -> AppResult<Vec<Watch>> {
        Ok(self.lock()?.clone())
    }

    async fn get_watch(&self, email: &str) -> AppResult<Watch> {
        self.lock()?
            .iter()
            .find(|w| w.email == email)
            .cloned()
            .ok_or_else(|| AppError::NotFound(email.to_string()))
    }

    async fn create_watch(&self, email: &str) -> AppResult<Watch> {
        let mut watches = self.lock()?;
        if watches.iter().any(|w| w.email == email) {
            return Err(AppError::Conflict(email.to_string()));
        }
        let watch = Watch::new(email);
        watches.push(watch.clone());
        Ok(watch)
    }

    async fn remove_watch(&self, email: &str) -> AppResult<()> {
        let mut watches = self.lock()?;
        let before = watches.len();
        watches.retain(|w| w.email != email);
        if watches.len() == before {
            return Err(AppError::NotFound(email.to_string()));
        }
        Ok(())
    }

    async fn add_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.update(email, |w| {
            w.add_keyword(keyword);
        })
    }

    async fn remove_keyword(&self, email: &str, keyword: &str) -> AppResult<Watch> {
        self.update(email, |w| {
            w.remove_keyword(keyword);
        })
    }

    async fn set_keywords(&self, email: &str, keywords: Vec<String>) -> AppResult<Watch> {
        self.update(email, |w| w.set_keywords(keywords))
    }

    async fn set_subscription(
        &self,
        email: &str,
        subscription: Option<PushSubscription>,
    ) -> AppResult<Watch> {
        self.update(email, |w| w.subscription = subscription)
    }

    async fn reset_watches(&self) -> AppResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}
