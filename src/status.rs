//! Write-only progress narration channel.
//!
//! The pipeline reports human-readable progress through a [`StatusSink`].
//! Sends never block and never fail: a slow or dropped consumer cannot stall
//! a guide run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// One progress line for a live status log.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget sender of [`StatusUpdate`]s.
#[derive(Debug, Clone, Default)]
pub struct StatusSink {
    tx: Option<mpsc::UnboundedSender<StatusUpdate>>,
}

impl StatusSink {
    /// Create a sink and the receiver the caller drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything (still mirrored to tracing).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a progress message. Empty messages are dropped.
    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        tracing::info!(status = %message, "guide status");
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is watching; that is fine.
            let _ = tx.send(StatusUpdate {
                message,
                at: Utc::now(),
            });
        }
    }
}
