//! Cancellation plumbing.
//!
//! Every suspension point in the pipeline calls [`checkpoint`]; on
//! cancellation the error propagates out, partial results are discarded, and
//! no cache is updated.

use thiserror::Error;

pub use tokio_util::sync::CancellationToken;

/// The computation was cancelled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Returns `Err(Cancelled)` once the token has been cancelled.
///
/// # Errors
///
/// [`Cancelled`] when the token is cancelled.
pub fn checkpoint(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_trips_after_cancel() {
        let token = CancellationToken::new();
        assert!(checkpoint(&token).is_ok());
        token.cancel();
        assert_eq!(checkpoint(&token), Err(Cancelled));
    }
}
