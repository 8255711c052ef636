// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification fan-out. All callbacks are best-effort: the dispatcher
//! logs and swallows failures.

use async_trait::async_trait;
use thiserror::Error;
use whs_core::{ActiveWork, PendingQuestion};

/// Errors from notify operations
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Progress, question, completion, error, and rate-limit events.
#[async_trait]
pub trait Notifier: Clone + Send + Sync + 'static {
    async fn notify_progress(&self, work: &ActiveWork, message: &str)
        -> Result<(), NotifyError>;

    async fn notify_question(&self, question: &PendingQuestion) -> Result<(), NotifyError>;

    /// `outcome` is `done` or `blocked`.
    async fn notify_complete(&self, work: &ActiveWork, outcome: &str)
        -> Result<(), NotifyError>;

    async fn notify_error(&self, work: &ActiveWork, error: &str) -> Result<(), NotifyError>;

    async fn notify_rate_limit(&self, message: &str) -> Result<(), NotifyError>;
}

/// Default transport: structured log lines only.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_progress(
        &self,
        work: &ActiveWork,
        message: &str,
    ) -> Result<(), NotifyError> {
        tracing::info!(work = %work.work_item_id, agent = %work.agent, %message, "progress");
        Ok(())
    }

    async fn notify_question(&self, question: &PendingQuestion) -> Result<(), NotifyError> {
        tracing::info!(
            work = %question.work_item_id,
            question = %question.question_id,
            "agent asked a question"
        );
        Ok(())
    }

    async fn notify_complete(&self, work: &ActiveWork, outcome: &str) -> Result<(), NotifyError> {
        tracing::info!(work = %work.work_item_id, %outcome, cost_usd = work.cost_usd, "workflow complete");
        Ok(())
    }

    async fn notify_error(&self, work: &ActiveWork, error: &str) -> Result<(), NotifyError> {
        tracing::warn!(work = %work.work_item_id, %error, "workflow error");
        Ok(())
    }

    async fn notify_rate_limit(&self, message: &str) -> Result<(), NotifyError> {
        tracing::warn!(%message, "rate limited; dispatcher paused");
        Ok(())
    }
}

/// Desktop notification transport using notify-rust.
///
/// On macOS, `notify-rust` uses `mac-notification-sys` (Cocoa bindings) to
/// send notifications via the Notification Center. The first notification
/// triggers `ensure_application_set()` which runs an AppleScript to look up
/// a bundle identifier. In a daemon context without Automation permissions,
/// that AppleScript blocks forever. We pre-set the bundle identifier at
/// construction time to bypass the lookup entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }

    fn send(title: String, message: String) {
        // notify_rust::Notification::show() is synchronous on macOS.
        // Fire-and-forget on tokio's bounded blocking thread pool to avoid
        // blocking the async runtime while capping OS thread count.
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new().summary(&title).body(&message).show() {
                Ok(_) => {
                    tracing::debug!(%title, "desktop notification sent");
                }
                Err(e) => {
                    tracing::warn!(%title, error = %e, "desktop notification failed");
                }
            }
        });
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify_progress(
        &self,
        work: &ActiveWork,
        message: &str,
    ) -> Result<(), NotifyError> {
        Self::send(format!("whs: {}", work.work_item_id), message.to_string());
        Ok(())
    }

    async fn notify_question(&self, question: &PendingQuestion) -> Result<(), NotifyError> {
        let prompt = question
            .questions
            .first()
            .map(|q| q.prompt.clone())
            .unwrap_or_else(|| "agent needs input".to_string());
        Self::send(format!("whs question: {}", question.work_item_id), prompt);
        Ok(())
    }

    async fn notify_complete(&self, work: &ActiveWork, outcome: &str) -> Result<(), NotifyError> {
        Self::send(
            format!("whs: {} {}", work.work_item_id, outcome),
            format!("{} (${:.2})", work.work_item_title, work.cost_usd),
        );
        Ok(())
    }

    async fn notify_error(&self, work: &ActiveWork, error: &str) -> Result<(), NotifyError> {
        Self::send(format!("whs error: {}", work.work_item_id), error.to_string());
        Ok(())
    }

    async fn notify_rate_limit(&self, message: &str) -> Result<(), NotifyError> {
        Self::send("whs paused: rate limited".to_string(), message.to_string());
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{NotifyError, Notifier};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use whs_core::{ActiveWork, PendingQuestion};

    /// Recorded notification
    #[derive(Debug, Clone, PartialEq)]
    pub enum NotifyCall {
        Progress { work_item: String, message: String },
        Question { question_id: String },
        Complete { work_item: String, outcome: String },
        Error { work_item: String, error: String },
        RateLimit { message: String },
    }

    struct FakeNotifyState {
        calls: Vec<NotifyCall>,
        fail: bool,
    }

    /// Fake notifier for testing
    #[derive(Clone)]
    pub struct FakeNotifier {
        inner: Arc<Mutex<FakeNotifyState>>,
    }

    impl Default for FakeNotifier {
        fn default() -> Self {
            Self { inner: Arc::new(Mutex::new(FakeNotifyState { calls: Vec::new(), fail: false })) }
        }
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Get all recorded notifications
        pub fn calls(&self) -> Vec<NotifyCall> {
            self.inner.lock().calls.clone()
        }

        /// Make every callback fail, to verify best-effort handling.
        pub fn fail_all(&self) {
            self.inner.lock().fail = true;
        }

        fn record(&self, call: NotifyCall) -> Result<(), NotifyError> {
            let mut state = self.inner.lock();
            state.calls.push(call);
            if state.fail {
                Err(NotifyError::SendFailed("fake failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify_progress(
            &self,
            work: &ActiveWork,
            message: &str,
        ) -> Result<(), NotifyError> {
            self.record(NotifyCall::Progress {
                work_item: work.work_item_id.to_string(),
                message: message.to_string(),
            })
        }

        async fn notify_question(&self, question: &PendingQuestion) -> Result<(), NotifyError> {
            self.record(NotifyCall::Question { question_id: question.question_id.to_string() })
        }

        async fn notify_complete(
            &self,
            work: &ActiveWork,
            outcome: &str,
        ) -> Result<(), NotifyError> {
            self.record(NotifyCall::Complete {
                work_item: work.work_item_id.to_string(),
                outcome: outcome.to_string(),
            })
        }

        async fn notify_error(&self, work: &ActiveWork, error: &str) -> Result<(), NotifyError> {
            self.record(NotifyCall::Error {
                work_item: work.work_item_id.to_string(),
                error: error.to_string(),
            })
        }

        async fn notify_rate_limit(&self, message: &str) -> Result<(), NotifyError> {
            self.record(NotifyCall::RateLimit { message: message.to_string() })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNotifier, NotifyCall};

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
