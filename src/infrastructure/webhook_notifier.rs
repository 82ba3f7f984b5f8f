use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::application::{AppError, AppResult, Notification, Notifier};
use crate::domain::{Listing, PushSubscription};

/// Posts each notification to a relay that turns it into email and browser push.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook: String,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

impl WebhookNotifier {
    pub fn new(webhook: String) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("webhook client: {e}")))?;
        Ok(Self { client, webhook })
    }
}

#[derive(Debug, Serialize)]
struct WebhookMsg<'a> {
    email: EmailPart<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    push: Option<PushPart<'a>>,
    listings: &'a [Listing],
}

#[derive(Debug, Serialize)]
struct EmailPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct PushPart<'a> {
    subscription: &'a PushSubscription,
    payload: PushPayload,
}

#[derive(Debug, Serialize)]
struct PushPayload {
    title: &'static str,
    body: String,
}

fn build_payload(notification: &Notification) -> WebhookMsg<'_> {
    WebhookMsg {
        email: EmailPart {
            from: notification.sender.as_deref(),
            to: &notification.recipient,
            subject: &notification.subject,
            text: &notification.body,
        },
        push: notification.subscription.as_ref().map(|subscription| PushPart {
            subscription,
            payload: PushPayload {
                title: "Listing watch",
                body: format!("{} new items!", notification.total_matches),
            },
        }),
        listings: &notification.listings,
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> AppResult<()> {
        let payload = build_payload(notification);

        self.client
            .post(&self.webhook)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Notifier(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Notifier(e.to_string()))?;

        Ok(())
    }
}
