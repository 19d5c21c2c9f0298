//! Side-channel collaborators injected into services: a key/value cache and a mailer.
//!
//! Services hold these as `Arc<dyn Trait + Send + Sync>` handed in at construction; nothing in
//! the core reaches for a global instance.

use chrono::{DateTime, Utc};
use lis_uuid::EntityId;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// CACHE
// ============================================================================

/// Key/value cache of serialised documents.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: Value);
    fn invalidate(&self, key: &str);
}

/// Process-local cache backed by a map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: Value) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn invalidate(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

/// Cache that never stores anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCache;

impl CacheStore for NoopCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn put(&self, _key: &str, _value: Value) {}

    fn invalidate(&self, _key: &str) {}
}

// ============================================================================
// MAILER
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum NotificationKind {
    CriticalResult,
    ReportDelivered,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Document the notification is about.
    pub subject: EntityId,
    pub recipient: Option<String>,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Outbound notification channel.
///
/// Delivery is fire-and-forget: a failed send must not undo the lifecycle change that
/// triggered it, so implementations log their own failures.
pub trait Mailer: Send + Sync {
    fn send(&self, notification: Notification);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMailer;

impl Mailer for NoopMailer {
    fn send(&self, _notification: Notification) {}
}

/// Writes each notification to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, notification: Notification) {
        tracing::info!(
            kind = ?notification.kind,
            subject = %notification.subject,
            recipient = notification.recipient.as_deref().unwrap_or("-"),
            "{}",
            notification.message
        );
    }
}

/// Keeps every notification in memory. Useful for asserting on side effects.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: RwLock<Vec<Notification>>,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, notification: Notification) {
        self.sent.write().push(notification);
    }
}
