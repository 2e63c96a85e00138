//! Cooperative cancellation for blocking execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::ExecError;

/// Cancellation flag with an optional deadline.
///
/// Clones share the flag: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Token without deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Token sharing this token's flag whose deadline is the earlier of the
    /// current one and `timeout` from now.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// `Err` once cancelled or past the deadline.
    pub fn check(&self) -> Result<(), ExecError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(ExecError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(ExecError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_is_live() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        assert!(token.remaining().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(matches!(token.check(), Err(ExecError::Cancelled)));
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(token.check(), Err(ExecError::DeadlineExceeded)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_keeps_earlier_deadline_and_shares_flag() {
        let parent = CancelToken::with_timeout(Duration::from_secs(1));
        let child = parent.child_with_timeout(Duration::from_secs(3600));
        assert!(child.remaining().unwrap() <= Duration::from_secs(1));

        parent.cancel();
        assert!(matches!(child.check(), Err(ExecError::Cancelled)));
    }
}
