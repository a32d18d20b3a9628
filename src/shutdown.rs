//! Cooperative shutdown
//!
//! A watch channel carries a single "stop requested" flag. Long-running loops
//! check it between units of work and race their sleeps against it, so a stop
//! request never lands in the middle of a metadata or ledger write.

use std::time::Duration;
use tokio::sync::watch;

/// Sending half; flipping it asks every [`Shutdown`] to stop
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half, cheap to clone
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Creates a connected trigger/receiver pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    /// A receiver that is never triggered
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop has been requested
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Trigger dropped without firing
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleeps for `duration` unless interrupted; returns false if interrupted
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_requested() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.requested() => false,
        }
    }
}

/// Wires Ctrl+C to a fresh shutdown channel
///
/// The first Ctrl+C requests a cooperative stop; a second one exits at once.
pub fn install_ctrl_c_handler() -> Shutdown {
    let (trigger, shutdown) = channel();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, finishing the current page; press again to force quit");
            trigger.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Force quit requested");
                std::process::exit(130);
            }
        }
    });

    shutdown
}
