//! Cooperative shutdown of a running orchestration
//!
//! Poll loops wait on [`Shutdown`] alongside their sleep so an interrupted
//! run ends between polls and still records its outcome.

use std::time::Duration;

use tokio::sync::watch;

use crate::errors::FleetError;

/// Sending half, held by the signal handler
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Ask every [`Shutdown`] listener to stop
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, checked between polls
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger and listener
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    /// A listener that is never triggered
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested; never resolves if the trigger is
    /// dropped without firing
    pub async fn requested(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Fail with `Cancelled` if shutdown was requested before `step`
    pub fn check(&self, step: &str) -> Result<(), FleetError> {
        if self.is_requested() {
            return Err(FleetError::Cancelled(step.to_string()));
        }
        Ok(())
    }

    /// Sleep for `duration`, failing with `Cancelled` as soon as shutdown is
    /// requested
    pub async fn sleep(&self, duration: Duration, step: &str) -> Result<(), FleetError> {
        tokio::select! {
            _ = self.requested() => Err(FleetError::Cancelled(step.to_string())),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
