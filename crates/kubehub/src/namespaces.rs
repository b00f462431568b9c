use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::Api;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::Client;
use necker_core::{Labels, LookupError, NamespaceLabels};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Namespace labels served from a reflector over all namespaces.
pub struct KubeNamespaces {
    api: Api<Namespace>,
    cache: Store<Namespace>,
    task: JoinHandle<()>,
}

impl KubeNamespaces {
    pub fn start(client: Client) -> Self {
        let api: Api<Namespace> = Api::all(client);
        let (cache, writer) = reflector::store();
        let stream =
            reflector::reflector(writer, watcher::watcher(api.clone(), watcher::Config::default()).default_backoff());
        let task = tokio::spawn(async move {
            futures::pin_mut!(stream);
            while let Some(ev) = stream.next().await {
                if let Err(e) = ev {
                    warn!(error = %e, "namespace reflector error");
                }
            }
            debug!("namespace reflector ended");
        });
        Self { api, cache, task }
    }
}

impl Drop for KubeNamespaces {
    fn drop(&mut self) { self.task.abort(); }
}

#[async_trait::async_trait]
impl NamespaceLabels for KubeNamespaces {
    async fn namespace_labels(&self, namespace: &str) -> Result<Labels, LookupError> {
        if let Some(ns) = self.cache.get(&ObjectRef::new(namespace)) {
            return Ok(ns.metadata.labels.clone().unwrap_or_default());
        }
        debug!(ns = %namespace, "namespace not cached; reading from api");
        match self.api.get_opt(namespace).await {
            Ok(Some(ns)) => Ok(ns.metadata.labels.unwrap_or_default()),
            Ok(None) => Err(LookupError::new(namespace, "namespace not found")),
            Err(e) => Err(LookupError::new(namespace, e)),
        }
    }
}
