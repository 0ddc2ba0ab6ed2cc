//! User-visible notices.
//!
//! Every failure and every completed command ends up here as a short,
//! dismissable message. Where the message goes depends on the front end: the
//! TUI drains a channel into its status bar, one-shot commands print them.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        f.write_str(label)
    }
}

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

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Destination for notices.
pub trait NoticeSink: Send + Sync {
    fn deliver(&self, notice: Notice);
}

/// Sink that only records notices in the log.
struct LogSink;

impl NoticeSink for LogSink {
    fn deliver(&self, _notice: Notice) {}
}

/// Sink that forwards notices to a receiver owned by the front end.
struct ChannelSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl NoticeSink for ChannelSink {
    fn deliver(&self, notice: Notice) {
        // Receiver gone means the front end is shutting down.
        let _ = self.tx.send(notice);
    }
}

/// Cheap, cloneable handle used by the reconciler and controllers.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NoticeSink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NoticeSink>) -> Self {
        Self { sink }
    }

    pub fn log_only() -> Self {
        Self::new(Arc::new(LogSink))
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(Arc::new(ChannelSink { tx })), rx)
    }

    pub fn emit(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(notice = %notice.message, "Error notice"),
            NoticeLevel::Warning => tracing::info!(notice = %notice.message, "Warning notice"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::debug!(notice = %notice.message, level = %notice.level, "Notice")
            }
        }
        self.sink.deliver(notice);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Info, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Success, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Notice::new(NoticeLevel::Error, message));
    }
}
