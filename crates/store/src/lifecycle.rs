//! Created → Running → Stopped, plus the task pumping a subscription into a handler.

use std::sync::{Arc, Mutex, PoisonError};

use necker_core::{CanonicalType, EventKind, Notification, ObjectRevisionMeta, WatchError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    Stopped,
}

#[async_trait::async_trait]
pub(crate) trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, kind: EventKind, obj: &ObjectRevisionMeta);
}

pub(crate) struct Lifecycle {
    target: CanonicalType,
    phase: Mutex<Phase>,
    cancel: CancellationToken,
    pump: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    pub(crate) fn new(target: CanonicalType) -> Self {
        Self { target, phase: Mutex::new(Phase::Created), cancel: CancellationToken::new(), pump: tokio::sync::Mutex::new(None) }
    }

    pub(crate) fn phase(&self) -> Phase { *self.phase.lock().unwrap_or_else(PoisonError::into_inner) }

    pub(crate) fn is_running(&self) -> bool { self.phase() == Phase::Running }

    /// Created → Running. Any other starting phase is an error.
    pub(crate) fn begin(&self) -> Result<(), WatchError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Created => {
                *phase = Phase::Running;
                Ok(())
            }
            Phase::Running => Err(WatchError::AlreadyStarted(self.target.clone())),
            Phase::Stopped => Err(WatchError::Stopped(self.target.clone())),
        }
    }

    pub(crate) fn halt(&self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = Phase::Stopped;
    }

    /// Spawn the single consumer of `rx`. Handlers run to completion; the
    /// stop signal is only observed between notifications.
    pub(crate) async fn attach<H: EventHandler>(&self, handler: Arc<H>, mut rx: mpsc::Receiver<Notification>) {
        let cancel = self.cancel.clone();
        let target = self.target.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(gvk = %target, "pump cancelled");
                        break;
                    }
                    next = rx.recv() => match next {
                        Some(n) => handler.handle(n.kind, &n.object).await,
                        None => {
                            debug!(gvk = %target, "notification stream closed");
                            break;
                        }
                    }
                }
            }
        });
        *self.pump.lock().await = Some(task);
        info!(gvk = %self.target, "watcher running");
    }

    /// Stop accepting events and wait for the in-flight one to finish.
    pub(crate) async fn stop(&self) {
        self.halt();
        self.cancel.cancel();
        if let Some(task) = self.pump.lock().await.take() {
            let _ = task.await;
        }
        info!(gvk = %self.target, "watcher stopped");
    }
}
