use std::sync::Arc;

use chrono::{DateTime, Utc};
use necker_core::{
    BlameStatistics, CanonicalType, EventKind, NotificationSource, ObjectIdentity, ObjectRevisionMeta, WatchError,
};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::lifecycle::{EventHandler, Lifecycle, Phase};
use crate::Outcome;

/// Attributes updates of one object to field managers, using the
/// managedFields timestamps and a shared high-water mark.
pub struct BlameAttributor {
    inner: Arc<Inner>,
}

struct Inner {
    target: CanonicalType,
    object: ObjectIdentity,
    lifecycle: Lifecycle,
    stats: RwLock<BlameStatistics>,
}

impl BlameAttributor {
    /// Claims older than construction time are not attributed.
    pub fn new(target: CanonicalType, object: ObjectIdentity) -> Self {
        Self::with_high_water_mark(target, object, Utc::now())
    }

    pub fn with_high_water_mark(target: CanonicalType, object: ObjectIdentity, mark: DateTime<Utc>) -> Self {
        let inner = Inner { lifecycle: Lifecycle::new(target.clone()), stats: RwLock::new(BlameStatistics::new(mark)), target, object };
        Self { inner: Arc::new(inner) }
    }

    pub fn target(&self) -> &CanonicalType { &self.inner.target }
    pub fn object(&self) -> &ObjectIdentity { &self.inner.object }
    pub fn phase(&self) -> Phase { self.inner.lifecycle.phase() }

    pub async fn start(&self, source: &dyn NotificationSource) -> Result<(), WatchError> {
        self.inner.lifecycle.begin()?;
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

    pub async fn statistics(&self) -> BlameStatistics { self.inner.stats.read().await.clone() }

    pub async fn stop(&self) { self.inner.lifecycle.stop().await }
}

impl Inner {
    async fn process(&self, kind: EventKind, obj: &ObjectRevisionMeta) -> Outcome {
        if !self.lifecycle.is_running() {
            return Outcome::Inactive;
        }
        // a deleted object's ownership history stays as it was
        if kind == EventKind::Delete {
            return Outcome::Ignored;
        }
        if obj.identity != self.object {
            trace!(obj = %obj.identity, "not the blamed object");
            return Outcome::Ignored;
        }
        let mut stats = self.stats.write().await;
        let mark = stats.high_water_mark;
        let mut latest: Option<DateTime<Utc>> = None;
        for claim in &obj.managed_fields {
            let Some(ts) = claim.timestamp else { continue };
            if ts > mark {
                stats.managers.entry(claim.manager.clone()).or_default().updated += 1;
                latest = Some(latest.map_or(ts, |l| l.max(ts)));
            }
        }
        match latest {
            Some(ts) => {
                stats.high_water_mark = ts;
                debug!(obj = %obj.identity, mark = %ts, "attributed update");
                Outcome::Counted
            }
            None => Outcome::Stale,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for Inner {
    async fn handle(&self, kind: EventKind, obj: &ObjectRevisionMeta) {
        self.process(kind, obj).await;
    }
}
