use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::application::{AppError, AppResult, ListingsSource};
use crate::domain::Listing;

#[derive(Clone, Debug)]
enum Reply {
    Listings(Vec<Listing>),
    Fail(String),
}

#[derive(Clone, Debug)]
struct Step {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, VecDeque<Step>>,
    last: HashMap<String, Step>,
    calls: Vec<String>,
}

/// Replays canned responses per keyword, in order. Once a keyword's queue is
/// drained the last response repeats; unknown keywords return no listings.
#[derive(Clone, Default)]
pub struct ScriptedListingsSource {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedListingsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, keyword: &str, listings: Vec<Listing>) -> &Self {
        self.enqueue(keyword, Reply::Listings(listings), None)
    }

    pub fn push_delayed(&self, keyword: &str, listings: Vec<Listing>, delay: Duration) -> &Self {
        self.enqueue(keyword, Reply::Listings(listings), Some(delay))
    }

    pub fn push_error(&self, keyword: &str, message: &str) -> &Self {
        self.enqueue(keyword, Reply::Fail(message.to_string()), None)
    }

    fn enqueue(&self, keyword: &str, reply: Reply, delay: Option<Duration>) -> &Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .queues
                .entry(keyword.to_string())
                .or_default()
                .push_back(Step { reply, delay });
        }
        self
    }

    /// Total fetch calls so far.
    pub fn calls(&self) -> usize {
        self.inner.lock().map(|i| i.calls.len()).unwrap_or(0)
    }

    pub fn calls_for(&self, keyword: &str) -> usize {
        self.inner
            .lock()
            .map(|i| i.calls.iter().filter(|k| *k == keyword).count())
            .unwrap_or(0)
    }

    fn next_step(&self, keyword: &str) -> AppResult<Option<Step>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| AppError::Source("lock poisoned".into()))?;
        inner.calls.push(keyword.to_string());

        let popped = inner.queues.get_mut(keyword).and_then(VecDeque::pop_front);
        match popped {
            Some(step) => {
                inner.last.insert(keyword.to_string(), step.clone());
                Ok(Some(step))
            }
            None => Ok(inner.last.get(keyword).cloned()),
        }
    }
}

#[async_trait]
impl ListingsSource for ScriptedListingsSource {
    async fn fetch(&self, keyword: &str) -> AppResult<Vec<Listing>> {
        let Some(step) = self.next_step(keyword)? else {
            return Ok(Vec::new());
        };

        if let Some(delay) = step.delay {
            tokio::time::sleep(delay).await;
        }

        match step.reply {
            Reply::Listings(listings) => Ok(listings),
            Reply::Fail(msg) => Err(AppError::Source(msg)),
        }
    }
}
