//! Completion notifications.
//!
//! The relay tells both parties when a transfer is over, on the presence
//! channel and independently of either HTTP request. `complete` and `done`
//! both show "Transfer complete!" and schedule a reset of the status line
//! back to the idle identity; only the delay differs.
//!
//! Every notification schedules its own reset. Overlapping notifications
//! are not merged, so a late reset may clear a status set by a newer event.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::CompletionConfig;
use crate::display::{Status, StatusDisplay};
use crate::session::SessionContext;

/// Which completion notification arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// `complete`, typically seen by the sender
    Complete,
    /// `done`, typically seen by the receiver
    Done,
}

/// A reset whose delay has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReset {
    /// Notification that scheduled it
    pub kind: CompletionKind,
}

/// Shows completion and schedules status resets.
#[derive(Debug, Clone)]
pub struct CompletionReconciler {
    complete_delay: Duration,
    done_delay: Duration,
    resets: mpsc::UnboundedSender<StatusReset>,
}

impl CompletionReconciler {
    /// Create a reconciler delivering elapsed resets into `resets`.
    pub fn new(config: &CompletionConfig, resets: mpsc::UnboundedSender<StatusReset>) -> Self {
        Self {
            complete_delay: config.sender_reset_delay,
            done_delay: config.receiver_reset_delay,
            resets,
        }
    }

    /// Delay before the reset scheduled by `kind`.
    pub fn delay(&self, kind: CompletionKind) -> Duration {
        match kind {
            CompletionKind::Complete => self.complete_delay,
            CompletionKind::Done => self.done_delay,
        }
    }

    /// Handle a completion notification.
    ///
    /// Also ends a Receiving inbound lane; the outbound lane is driven by
    /// the upload's own outcome.
    pub fn on_completion(
        &self,
        session: &mut SessionContext,
        display: &mut dyn StatusDisplay,
        kind: CompletionKind,
    ) {
        if let Some(from) = session.finish_receiving() {
            tracing::info!(from = %from, "Incoming transfer complete");
        }

        display.status(&Status::Complete);

        let delay = self.delay(kind);
        let resets = self.resets.clone();
        tracing::debug!(?kind, delay_ms = delay.as_millis(), "Scheduling status reset");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = resets.send(StatusReset { kind });
        });
    }

    /// Apply an elapsed reset: back to the idle identity, progress hidden.
    pub fn on_reset(
        &self,
        session: &SessionContext,
        display: &mut dyn StatusDisplay,
        reset: StatusReset,
    ) {
        tracing::trace!(kind = ?reset.kind, "Resetting status");
        display.status(&Status::ready(session.my_id()));
        display.hide_progress();
    }
}
