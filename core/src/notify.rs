// core/src/notify.rs

//! Outbound notifications. Delivery belongs to another system; the
//! settlement core only emits them after its transaction has committed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
  Order,
  Payment,
  Refund,
  Payout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub user_id: Uuid,
  pub title: String,
  pub message: String,
  pub category: NotificationCategory,
  pub related_entity_id: Option<Uuid>,
}

impl Notification {
  pub fn new(
    user_id: Uuid,
    title: impl Into<String>,
    message: impl Into<String>,
    category: NotificationCategory,
    related_entity_id: Uuid,
  ) -> Self {
    Self {
      user_id,
      title: title.into(),
      message: message.into(),
      category,
      related_entity_id: Some(related_entity_id),
    }
  }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
  async fn notify(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Writes each notification to the log. The default sink when nothing
/// else is wired in.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
  async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
    event!(
      Level::INFO,
      user_id = %notification.user_id,
      category = ?notification.category,
      related_entity_id = ?notification.related_entity_id,
      title = %notification.title,
      "{}",
      notification.message
    );
    Ok(())
  }
}

/// Sends every notification, logging and discarding failures.
pub async fn dispatch(sink: &Arc<dyn NotificationSink>, notifications: Vec<Notification>) -> usize {
  let mut delivered = 0;
  for notification in notifications {
    let user_id = notification.user_id;
    match sink.notify(notification).await {
      Ok(()) => delivered += 1,
      Err(e) => event!(Level::WARN, %user_id, error = %e, "Notification delivery failed; ignoring."),
    }
  }
  delivered
}
