//! Cooperative shutdown signal
//!
//! Long-running tasks hold a [`Shutdown`] and race it against their work.
//! Once triggered every holder observes it, including ones created later.

use tokio::sync::watch;

/// Sending half, owned by whoever decides the run is over
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every task
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl ShutdownTrigger {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    /// Signal every [`Shutdown`] handle
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered
    ///
    /// A dropped trigger counts as a shutdown: nobody is left to stop the
    /// run otherwise.
    pub async fn wait(&mut self) {
        // wait_for fails only when the sender is gone
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
