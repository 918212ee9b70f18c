//! Cooperative cancellation for the capture loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::error::StreamError;

/// Shared stop flag.
///
/// Setting it never blocks or allocates; the capture loop reads it once per
/// iteration.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Cancels `token` on the first Ctrl+C.
///
/// The signal is awaited on a dedicated thread running a current-thread tokio
/// runtime, so the calling thread stays free for blocking capture reads.
pub fn install_interrupt_handler(token: CancellationToken) -> Result<(), StreamError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| StreamError::io("Failed to start signal runtime", e))?;

    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received SIGINT, stopping capture...");
                        token.cancel();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            });
        })
        .map_err(|e| StreamError::io("Failed to spawn signal thread", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn cancel_is_visible_across_threads() {
        let token = CancellationToken::new();
        let remote = token.clone();
        thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
