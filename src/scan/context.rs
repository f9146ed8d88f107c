use std::{fmt, future::Future, time::Duration};
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::{CancellationToken, DropGuard};

// Upper bound for absurd timeouts so the deadline never overflows `Instant`
const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Why a bounded operation stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded,
    Cancelled,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

/// Deadline and cancellation scope for one probe attempt.
///
/// Created from the scan-wide token. Its own child token is cancelled when the
/// context is dropped, so every attempt releases its scope on every exit path.
/// Cancelling the parent cancels every live child; a child never affects its
/// siblings or its parent.
#[derive(Debug)]
pub struct ProbeContext {
    deadline: Instant,
    token: CancellationToken,
    _guard: DropGuard,
}

impl ProbeContext {
    /// Derive a child scope of `parent` that expires after `timeout`
    #[must_use]
    pub fn child_of(parent: &CancellationToken, timeout: Duration) -> Self {
        let token = parent.child_token();
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout.min(MAX_TIMEOUT))
            .unwrap_or(now);

        Self {
            deadline,
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Drive `fut` until it completes, the deadline passes or the scope is cancelled
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] when the future did not complete in time
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled),
            result = timeout_at(self.deadline, fut) => {
                result.map_err(|_| Interrupted::DeadlineExceeded)
            }
        }
    }
}
