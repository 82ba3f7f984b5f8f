use std::sync::Arc;

use crate::application::{Notification, Notifier};
use crate::domain::{ItemLinks, Match, Watch};

pub const NOTIFICATION_SUBJECT: &str = "Listing watch: new items are available!";

/// Renders a watcher's matches and hands them to the notifier.
/// Delivery is best-effort: failures are logged and never surface to the caller.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    max_matches: usize,
    links: ItemLinks,
    sender: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, max_matches: usize) -> Self {
        Self {
            notifier,
            max_matches: max_matches.max(1),
            links: ItemLinks::default(),
            sender: None,
        }
    }

    pub fn with_links(mut self, links: ItemLinks) -> Self {
        self.links = links;
        self
    }

    pub fn with_sender(mut self, sender: Option<String>) -> Self {
        self.sender = sender;
        self
    }

    pub fn render(&self, watch: &Watch, matches: &[Match]) -> Notification {
        let capped = &matches[..matches.len().min(self.max_matches)];

        let mut body = String::from("One or more items were found that matched your keywords!\n");
        for m in capped {
            body.push_str(&format!(
                "\nItem Name: {}\nItem Link: {}\n",
                m.listing.name,
                m.listing.url(&self.links)
            ));
        }

        Notification {
            recipient: watch.email.clone(),
            sender: self.sender.clone(),
            subscription: watch.subscription.clone(),
            subject: NOTIFICATION_SUBJECT.to_string(),
            body,
            listings: capped.iter().map(|m| m.listing.clone()).collect(),
            total_matches: matches.len(),
        }
    }

    /// Returns whether the notifier accepted the delivery.
    pub async fn deliver(&self, watch: &Watch, matches: &[Match]) -> bool {
        if matches.is_empty() {
            return false;
        }

        let notification = self.render(watch, matches);
        if notification.total_matches > notification.listings.len() {
            tracing::debug!(
                email = %watch.email,
                dropped = notification.total_matches - notification.listings.len(),
                "match cap reached, dropping overflow"
            );
        }

        match self.notifier.notify(&notification).await {
            Ok(()) => {
                tracing::info!(
                    email = %watch.email,
                    items = notification.listings.len(),
                    "notification sent"
                );
                true
            }
            Err(e) => {
                tracing::warn!(email = %watch.email, "notification failed: {e}");
                false
            }
        }
    }
}
