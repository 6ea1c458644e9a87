//! Foreground cancellation.
//!
//! Each job gets a `CancelToken`. Only the foreground cancel path ever
//! triggers it; dismissing a job to the background leaves it untouched.

use tokio_util::sync::CancellationToken;

/// A cancellation token that can be checked or awaited by the job loop.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}
