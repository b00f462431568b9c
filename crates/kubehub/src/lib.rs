//! Necker kubehub: the cluster-facing collaborators backed by kube-rs.
//!
//! - [`KubeCatalog`]: discovery snapshot exposed as a `TypeCatalog`.
//! - [`KubeSource`]: one kube watcher per subscribed type, classified into
//!   add/update/delete notifications.
//! - [`KubeNamespaces`]: namespace labels from a reflector cache, with a
//!   direct GET when the cache has not seen the namespace yet.

#![forbid(unsafe_code)]

mod catalog;
mod classify;
mod namespaces;
mod project;
mod source;

use anyhow::{Context, Result};
use kube::Client;

pub use catalog::KubeCatalog;
pub use namespaces::KubeNamespaces;
pub use project::project;
pub use source::{KubeSource, DEFAULT_QUEUE_CAP};

/// Client from the ambient kubeconfig or in-cluster environment.
pub async fn client() -> Result<Client> {
    Client::try_default().await.context("building kube client from kubeconfig / in-cluster config")
}
