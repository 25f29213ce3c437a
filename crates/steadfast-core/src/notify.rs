//! User-facing notifications for retry and connectivity transitions.
//!
//! Delivery surfaces are tried in rank order. The last link of every chain
//! is an in-memory buffer that cannot fail, so a notification is never lost.

use crate::error::NotifyError;
use crate::sync::lock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub created_at: SystemTime,
}

impl Notification {
    pub fn new(severity: Severity, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            body: body.into(),
            created_at: SystemTime::now(),
        }
    }

    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, body)
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Success, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, body)
    }
}

/// One delivery surface.
pub trait Notifier: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Deliver `notification`, or report why this surface could not.
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Bounded in-memory notification buffer. Always succeeds; the oldest entry
/// is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryNotifier {
    capacity: usize,
    entries: Mutex<VecDeque<Notification>>,
}

impl MemoryNotifier {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Buffered notifications, oldest first.
    pub fn entries(&self) -> Vec<Notification> {
        lock(&self.entries).iter().cloned().collect()
    }

    /// Remove and return every buffered notification.
    pub fn drain(&self) -> Vec<Notification> {
        lock(&self.entries).drain(..).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryNotifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut entries = lock(&self.entries);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(notification.clone());
        Ok(())
    }
}

/// Ranked notifiers with a guaranteed in-memory fallback.
#[derive(Clone)]
pub struct NotifierChain {
    ranked: Vec<Arc<dyn Notifier>>,
    fallback: Arc<MemoryNotifier>,
}

impl NotifierChain {
    /// A chain that only buffers in memory.
    pub fn new() -> Self {
        Self::with_fallback(Arc::new(MemoryNotifier::default()))
    }

    pub fn with_fallback(fallback: Arc<MemoryNotifier>) -> Self {
        Self {
            ranked: Vec::new(),
            fallback,
        }
    }

    /// Append a surface. Earlier surfaces are tried first.
    pub fn push(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.ranked.push(notifier);
        self
    }

    pub fn fallback(&self) -> &Arc<MemoryNotifier> {
        &self.fallback
    }

    /// Deliver through the first surface that accepts the notification.
    /// Returns the name of the surface that delivered it.
    pub fn notify(&self, notification: Notification) -> String {
        for notifier in &self.ranked {
            match notifier.notify(&notification) {
                Ok(()) => return notifier.name().to_string(),
                Err(e) => tracing::debug!("{e}; trying next notifier"),
            }
        }
        // MemoryNotifier::notify is infallible
        let _ = self.fallback.notify(&notification);
        self.fallback.name().to_string()
    }
}

impl Default for NotifierChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotifierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.ranked.iter().map(|n| n.name()).collect();
        f.debug_struct("NotifierChain")
            .field("ranked", &names)
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
