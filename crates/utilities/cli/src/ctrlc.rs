//! Ctrl+C signal handling.
//!
//! Shutdown is signalled through a [`CancellationToken`] handed to the long running
//! components, so an interrupted migration can save its progress before the process exits.

use tokio_util::sync::CancellationToken;

/// Returns a token that is cancelled on the first Ctrl+C.
///
/// Spawns a background task, so it must be called from inside a tokio runtime. A second
/// Ctrl+C is left to the default handler once the first has been observed.
///
/// # Examples
///
/// ```no_run
/// use shuttle_cli::shutdown_token;
///
/// #[tokio::main]
/// async fn main() {
///     let shutdown = shutdown_token();
///     tokio::select! {
///         _ = shutdown.cancelled() => println!("interrupted"),
///         _ = async { /* main work */ } => {}
///     }
/// }
/// ```
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
                    return;
                }
                tracing::warn!("Received Ctrl+C, stopping after the current step");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_starts_live() {
        let token = shutdown_token();
        assert!(!token.is_cancelled());
        // Cancelling from the caller side also ends the listener task.
        token.cancel();
        assert!(token.is_cancelled());
    }
}
