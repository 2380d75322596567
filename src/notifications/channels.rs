// Delivery channels

use crate::core::errors::QhseError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub user_id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub priority: String,
}

/// A transport able to hand a message to a set of recipients
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, recipients: &[Recipient], message: &OutgoingMessage) -> Result<(), QhseError>;
}

/// Logs the delivery instead of contacting an external provider
pub struct TracingChannel {
    name: String,
}

impl TracingChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl NotificationChannel for TracingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, recipients: &[Recipient], message: &OutgoingMessage) -> Result<(), QhseError> {
        let emails: Vec<&str> = recipients.iter().map(|r| r.email.as_str()).collect();
        info!(
            channel = %self.name,
            notification_type = %message.notification_type,
            priority = %message.priority,
            title = %message.title,
            recipients = ?emails,
            "Notification delivered"
        );
        Ok(())
    }
}
