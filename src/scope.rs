use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Reason a [`Scope`] stopped admitting work.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Interrupted {
    /// The scope's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
    /// The scope's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation and deadline region governing a call.
///
/// Scopes nest: [`Scope::with_timeout`] derives a child that ends no later
/// than its parent, and cancelling a parent cancels every child.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Creates an unbounded scope with a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unbounded scope driven by an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a child scope that also ends `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        self.with_deadline_opt(deadline)
    }

    /// Derives a child scope that also ends at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.with_deadline_opt(Some(deadline))
    }

    fn with_deadline_opt(&self, deadline: Option<Instant>) -> Self {
        let deadline = match (self.deadline, deadline) {
            (Some(parent), Some(child)) => Some(parent.min(child)),
            (parent, child) => parent.or(child),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancels this scope and all scopes derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason the scope has ended, if it has.
    ///
    /// Cancellation is reported ahead of an expired deadline.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drives `future` until it completes or the scope ends.
    ///
    /// A scope that has already ended never polls `future`.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, Interrupted> {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = deadline_reached(self.deadline) => Err(Interrupted::DeadlineExceeded),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `duration` unless the scope ends first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        if duration.is_zero() {
            return Ok(());
        }
        self.run(tokio::time::sleep(duration)).await
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
