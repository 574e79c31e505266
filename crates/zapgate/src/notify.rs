//! User-facing notifications for session and dispatch events.
//!
//! Operations report outcomes here in addition to their return value, so
//! every failure leaves at least one observable signal.

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Delivery target for notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Delivers notices as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
    }
}

/// Keeps notices in memory, in delivery order.
#[derive(Debug, Default, Clone)]
pub struct MemoryNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered notices.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|n| n.level == level).count()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_notifier_records_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify(Notice::new(NoticeLevel::Warning, "probe failed"));
        notifier.notify(Notice::new(NoticeLevel::Success, "connected"));

        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].message, "probe failed");
        assert_eq!(notifier.count(NoticeLevel::Success), 1);
        assert_eq!(notifier.count(NoticeLevel::Error), 0);
    }

    #[test]
    fn clones_share_storage() {
        let notifier = MemoryNotifier::new();
        let clone = notifier.clone();
        clone.notify(Notice::new(NoticeLevel::Info, "hello"));
        assert_eq!(notifier.notices().len(), 1);
    }
}
