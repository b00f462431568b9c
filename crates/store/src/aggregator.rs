use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use necker_core::{
    CanonicalType, EventKind, NamespaceLabels, NotificationSource, ObjectRevisionMeta, SelectorPair, Statistics,
    WatchError,
};
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

use crate::export::EVENTS_DROPPED;
use crate::lifecycle::{EventHandler, Lifecycle, Phase};
use crate::Outcome;

/// Counts add/update/delete per namespace and object for one type.
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    target: CanonicalType,
    selectors: SelectorPair,
    namespaces: Arc<dyn NamespaceLabels>,
    lifecycle: Lifecycle,
    started_at: OnceLock<DateTime<Utc>>,
    // tokio's RwLock queues fairly, so a stream of snapshot readers cannot starve writers
    stats: RwLock<Statistics>,
}

impl Aggregator {
    pub fn new(target: CanonicalType, selectors: SelectorPair, namespaces: Arc<dyn NamespaceLabels>) -> Self {
        let inner = Inner {
            lifecycle: Lifecycle::new(target.clone()),
            stats: RwLock::new(Statistics::new(target.clone())),
            started_at: OnceLock::new(),
            target,
            selectors,
            namespaces,
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn target(&self) -> &CanonicalType { &self.inner.target }

    pub fn phase(&self) -> Phase { self.inner.lifecycle.phase() }

    pub fn started_at(&self) -> Option<DateTime<Utc>> { self.inner.started_at.get().copied() }

    /// Record the start time, then subscribe. A failed subscription stops this aggregator only.
    ///
    /// The start time keeps sub-second precision, so an object created earlier
    /// in the same second (creation timestamps are truncated) is backfill.
    pub async fn start(&self, source: &dyn NotificationSource) -> Result<(), WatchError> {
        self.inner.lifecycle.begin()?;
        let _ = self.inner.started_at.set(Utc::now());
        let rx = match source.subscribe(&self.inner.target).await {
            Ok(rx) => rx,
            Err(e) => {
                self.inner.lifecycle.halt();
                return Err(e);
            }
        };
        self.inner.lifecycle.attach(Arc::clone(&self.inner), rx).await;
        Ok(())
    }

    pub async fn on_event(&self, kind: EventKind, obj: &ObjectRevisionMeta) -> Outcome {
        self.inner.process(kind, obj).await
    }

    /// Deep copy of the counters, isolated from later events.
    pub async fn statistics(&self) -> Statistics { self.inner.stats.read().await.clone() }

    pub async fn stop(&self) { self.inner.lifecycle.stop().await }
}

impl Inner {
    async fn process(&self, kind: EventKind, obj: &ObjectRevisionMeta) -> Outcome {
        if !self.lifecycle.is_running() {
            return Outcome::Inactive;
        }
        if kind == EventKind::Add {
            if let (Some(started), Some(created)) = (self.started_at.get(), obj.creation_timestamp) {
                if created < *started {
                    trace!(gvk = %self.target, obj = %obj.identity, "backfill add suppressed");
                    metrics::counter!(EVENTS_DROPPED, 1u64, "reason" => "backfill");
                    return Outcome::Backfill;
                }
            }
        }
        match self.selectors.matches(obj, self.namespaces.as_ref()).await {
            Ok(true) => {}
            Ok(false) => {
                trace!(gvk = %self.target, obj = %obj.identity, "rejected by selector");
                metrics::counter!(EVENTS_DROPPED, 1u64, "reason" => "selector");
                return Outcome::Filtered;
            }
            Err(e) => {
                warn!(gvk = %self.target, obj = %obj.identity, error = %e, "namespace lookup failed; event dropped");
                metrics::counter!(EVENTS_DROPPED, 1u64, "reason" => "namespace_lookup");
                return Outcome::LookupFailed;
            }
        }
        self.stats.write().await.record(kind, obj.namespace(), obj.name());
        debug!(gvk = %self.target, obj = %obj.identity, event = kind.as_str(), "counted");
        Outcome::Counted
    }
}

#[async_trait::async_trait]
impl EventHandler for Inner {
    async fn handle(&self, kind: EventKind, obj: &ObjectRevisionMeta) {
        self.process(kind, obj).await;
    }
}
