use futures::StreamExt;
use kube::api::Api;
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::{self, verbs, Scope};
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Client;
use necker_core::{CanonicalType, Notification, NotificationSource, WatchError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::Classifier;

pub const DEFAULT_QUEUE_CAP: usize = 2048;

/// One kube list+watch per subscription, running on its own task until the
/// receiver is dropped.
#[derive(Clone)]
pub struct KubeSource {
    client: Client,
    namespace: Option<String>,
    capacity: usize,
}

impl KubeSource {
    pub fn new(client: Client) -> Self { Self { client, namespace: None, capacity: DEFAULT_QUEUE_CAP } }

    /// Restrict namespaced types to one namespace. Cluster-scoped types are unaffected.
    pub fn namespace(mut self, ns: Option<String>) -> Self {
        self.namespace = ns;
        self
    }

    pub fn capacity(mut self, cap: usize) -> Self {
        self.capacity = cap.max(1);
        self
    }
}

#[async_trait::async_trait]
impl NotificationSource for KubeSource {
    async fn subscribe(&self, target: &CanonicalType) -> Result<mpsc::Receiver<Notification>, WatchError> {
        let fail = |reason: String| WatchError::Subscribe { target: target.clone(), reason };
        let gvk = GroupVersionKind::gvk(&target.group, &target.version, &target.kind);
        let (ar, caps) = discovery::pinned_kind(&self.client, &gvk).await.map_err(|e| fail(e.to_string()))?;
        if !caps.supports_operation(verbs::WATCH) {
            return Err(fail("resource does not support watch".into()));
        }
        let api: Api<DynamicObject> = match (&caps.scope, &self.namespace) {
            (Scope::Namespaced, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &ar),
            _ => Api::all_with(self.client.clone(), &ar),
        };
        let (tx, rx) = mpsc::channel(self.capacity);
        info!(gvk = %target, ns = ?self.namespace, "watch subscribed");
        tokio::spawn(pump(target.clone(), api, tx));
        Ok(rx)
    }
}

async fn pump(target: CanonicalType, api: Api<DynamicObject>, tx: mpsc::Sender<Notification>) {
    let stream = watcher::watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let mut classifier = Classifier::default();
    loop {
        let ev = tokio::select! {
            _ = tx.closed() => break,
            ev = stream.next() => ev,
        };
        let out = match ev {
            Some(Ok(Event::Applied(o))) => classifier.applied(&o.metadata).into_iter().collect(),
            Some(Ok(Event::Deleted(o))) => vec![classifier.deleted(&o.metadata)],
            Some(Ok(Event::Restarted(list))) => {
                debug!(gvk = %target, count = list.len(), "watch restart");
                classifier.restarted(list.iter().map(|o| &o.metadata))
            }
            Some(Err(e)) => {
                // the watcher retries with backoff on the next poll
                warn!(gvk = %target, error = %e, "watch error");
                metrics::counter!("necker_watch_errors_total", 1u64, "kind" => target.kind.clone());
                continue;
            }
            None => {
                warn!(gvk = %target, "watcher stream ended");
                break;
            }
        };
        for n in out {
            if tx.send(n).await.is_err() {
                break;
            }
        }
    }
    debug!(gvk = %target, tracked = classifier.len(), "watch pump exited");
}
