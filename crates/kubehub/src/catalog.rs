use kube::discovery::{verbs, Discovery, Scope};
use kube::Client;
use necker_core::{ApiEntry, CanonicalType, CatalogError, StaticCatalog, TypeCatalog, TypeQuery};
use tracing::{debug, info};

/// Point-in-time copy of the server's discovery data.
pub struct KubeCatalog {
    inner: StaticCatalog,
}

impl KubeCatalog {
    pub async fn discover(client: Client) -> Result<Self, CatalogError> {
        let discovery = Discovery::new(client).run().await.map_err(|e| CatalogError::Discovery(e.to_string()))?;
        let mut entries = Vec::new();
        // core group first, the rest alphabetically
        for group in discovery.groups_alphabetical() {
            let preferred = group.preferred_version_or_latest().to_string();
            for version in group.versions() {
                for (ar, caps) in group.versioned_resources(version) {
                    let mut entry = ApiEntry::new(&ar.api_version, &ar.kind, &ar.plural);
                    if !matches!(caps.scope, Scope::Namespaced) {
                        entry = entry.cluster_scoped();
                    }
                    if version != preferred {
                        entry = entry.not_preferred();
                    }
                    if !caps.supports_operation(verbs::WATCH) {
                        entry = entry.unwatchable();
                    }
                    entries.push(entry);
                }
            }
            debug!(group = %group.name(), preferred = %preferred, "discovered group");
        }
        info!(resources = entries.len(), "discovery complete");
        Ok(Self { inner: StaticCatalog::new(entries) })
    }

    pub fn entries(&self) -> &[ApiEntry] { self.inner.entries() }
}

impl TypeCatalog for KubeCatalog {
    fn lookup(&self, query: &TypeQuery) -> Result<CanonicalType, CatalogError> { self.inner.lookup(query) }

    fn preferred_types(&self) -> Vec<ApiEntry> { self.inner.preferred_types() }

    fn resource_names(&self) -> Vec<String> { self.inner.resource_names() }
}
