use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// How often to re-check the third-party runtime while it loads.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Opaque single-use proof string issued by the anti-automation widget.
/// Scoped to a declared action; never cached across submission attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("execute capability is unavailable")]
    Unavailable,
    #[error("{0}")]
    Failed(String),
}

/// The third-party challenge widget. It loads asynchronously after the page
/// itself, so callers must wait for readiness before executing.
#[async_trait]
pub trait ChallengeWidget: Send + Sync {
    /// Whether the widget runtime has loaded.
    fn is_ready(&self) -> bool;

    /// Request a proof token for `action`.
    async fn execute(&self, site_key: &str, action: &str) -> Result<String, WidgetError>;
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("site key is not configured")]
    MissingSiteKey,
    #[error("challenge widget failed to load")]
    WidgetUnavailable,
    #[error("challenge widget returned an empty token")]
    EmptyToken,
    #[error("challenge execution failed: {0}")]
    Execute(String),
    #[error("acquisition cancelled")]
    Cancelled,
}

impl AcquireError {
    /// Message shown inline next to the widget. Each failure mode gets its
    /// own wording; only the missing-site-key case is unrecoverable.
    pub fn user_message(&self) -> &'static str {
        match self {
            AcquireError::MissingSiteKey => {
                "Bot verification is not configured, so the form cannot be submitted."
            }
            AcquireError::WidgetUnavailable | AcquireError::Execute(_) => {
                "Bot verification failed to load. Please wait a moment and try again."
            }
            AcquireError::EmptyToken => {
                "Please confirm you are not a robot, then submit again."
            }
            AcquireError::Cancelled => "Submission was cancelled.",
        }
    }
}

/// Poll `widget` until it reports ready. There is no timeout: the loop is
/// abandoned only when `cancel` flips to true (the owner was torn down) or
/// its sender is dropped.
pub async fn await_ready<W: ChallengeWidget + ?Sized>(
    widget: &W,
    poll_interval: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), AcquireError> {
    if *cancel.borrow_and_update() {
        return Err(AcquireError::Cancelled);
    }
    let mut interval = tokio::time::interval(poll_interval);
    loop {
        if widget.is_ready() {
            return Ok(());
        }
        tokio::select! {
            _ = interval.tick() => {}
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow() => return Err(AcquireError::Cancelled),
                Ok(()) => {}
                Err(_) => return Err(AcquireError::Cancelled),
            },
        }
    }
}

/// Obtain one fresh proof token scoped to `action`. Fails fast when no site
/// key is configured; otherwise waits for widget readiness, executes, and
/// rejects empty tokens.
pub async fn acquire_token<W: ChallengeWidget + ?Sized>(
    widget: &W,
    site_key: &str,
    action: &str,
    poll_interval: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> Result<ChallengeToken, AcquireError> {
    if site_key.trim().is_empty() {
        return Err(AcquireError::MissingSiteKey);
    }
    await_ready(widget, poll_interval, cancel).await?;
    let raw = widget
        .execute(site_key, action)
        .await
        .map_err(|e| match e {
            WidgetError::Unavailable => AcquireError::WidgetUnavailable,
            WidgetError::Failed(message) => AcquireError::Execute(message),
        })?;
    if raw.trim().is_empty() {
        return Err(AcquireError::EmptyToken);
    }
    Ok(ChallengeToken::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubWidget {
        ready_after_polls: usize,
        polls: AtomicUsize,
        token: Result<String, ()>,
    }

    impl StubWidget {
        fn ready(token: &str) -> Self {
            Self {
                ready_after_polls: 0,
                polls: AtomicUsize::new(0),
                token: Ok(token.to_string()),
            }
        }
    }

    #[async_trait]
    impl ChallengeWidget for StubWidget {
        fn is_ready(&self) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst) >= self.ready_after_polls
        }

        async fn execute(&self, _site_key: &str, _action: &str) -> Result<String, WidgetError> {
            self.token
                .clone()
                .map_err(|_| WidgetError::Unavailable)
        }
    }

    fn cancel_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn ready_widget_yields_a_token() {
        let widget = StubWidget::ready("tok-1");
        let (_tx, mut rx) = cancel_channel();
        let token = acquire_token(&widget, "site-key", "contact_submit", Duration::from_millis(1), &mut rx)
            .await
            .unwrap();
        assert_eq!(token.as_str(), "tok-1");
    }

    #[tokio::test]
    async fn readiness_is_polled_until_the_widget_loads() {
        let widget = StubWidget {
            ready_after_polls: 3,
            polls: AtomicUsize::new(0),
            token: Ok("tok-2".to_string()),
        };
        let (_tx, mut rx) = cancel_channel();
        let token = acquire_token(&widget, "site-key", "contact_submit", Duration::from_millis(1), &mut rx)
            .await
            .unwrap();
        assert_eq!(token.as_str(), "tok-2");
        assert!(widget.polls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn missing_site_key_fails_before_touching_the_widget() {
        let widget = StubWidget::ready("tok-3");
        let (_tx, mut rx) = cancel_channel();
        let err = acquire_token(&widget, "  ", "contact_submit", Duration::from_millis(1), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::MissingSiteKey));
        assert_eq!(widget.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let widget = StubWidget::ready("   ");
        let (_tx, mut rx) = cancel_channel();
        let err = acquire_token(&widget, "site-key", "contact_submit", Duration::from_millis(1), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::EmptyToken));
    }

    #[tokio::test]
    async fn missing_execute_capability_is_a_transient_failure() {
        let widget = StubWidget {
            ready_after_polls: 0,
            polls: AtomicUsize::new(0),
            token: Err(()),
        };
        let (_tx, mut rx) = cancel_channel();
        let err = acquire_token(&widget, "site-key", "contact_submit", Duration::from_millis(1), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::WidgetUnavailable));
    }

    #[tokio::test]
    async fn cancellation_abandons_the_readiness_poll() {
        // ready_after_polls high enough that only cancellation can end the wait
        let widget = StubWidget {
            ready_after_polls: usize::MAX,
            polls: AtomicUsize::new(0),
            token: Ok("tok-4".to_string()),
        };
        let (tx, mut rx) = cancel_channel();
        let wait = tokio::spawn(async move {
            await_ready(&widget, Duration::from_millis(1), &mut rx).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("poll should end promptly after cancellation")
            .unwrap();
        assert!(matches!(result, Err(AcquireError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_receiver_short_circuits() {
        let widget = StubWidget::ready("tok-5");
        let (tx, mut rx) = cancel_channel();
        tx.send(true).unwrap();
        let err = await_ready(&widget, Duration::from_millis(1), &mut rx)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquireError::Cancelled));
    }
}
