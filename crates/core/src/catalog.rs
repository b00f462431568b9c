//! Type catalog: maps resource/kind specifiers to canonical types and lists
//! preferred versions. `StaticCatalog` keeps discovery results in memory.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::types::CanonicalType;

/// A catalog query. `group: None` searches every group; `Some("")` is the
/// built-in (core) group only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeQuery {
    Resource { resource: String, group: Option<String>, version: Option<String> },
    Kind { kind: String, group: Option<String>, version: Option<String> },
}

impl TypeQuery {
    pub fn resource(resource: &str, group: Option<&str>, version: Option<&str>) -> Self {
        Self::Resource {
            resource: resource.to_string(),
            group: group.map(str::to_string),
            version: version.map(str::to_string),
        }
    }

    pub fn kind(kind: &str, group: Option<&str>, version: Option<&str>) -> Self {
        Self::Kind { kind: kind.to_string(), group: group.map(str::to_string), version: version.map(str::to_string) }
    }

    /// Exact query for an already canonical type. An empty group pins the core group.
    pub fn exact(t: &CanonicalType) -> Self { Self::kind(&t.kind, Some(&t.group), Some(&t.version)) }
}

/// One served resource as reported by discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiEntry {
    /// `v1` or `group/version`, as served.
    pub api_version: String,
    pub kind: String,
    /// Lowercase plural resource name, e.g. `pods`.
    pub plural: String,
    pub namespaced: bool,
    /// Whether `api_version` is the preferred version of its group.
    pub preferred: bool,
    /// Whether the resource supports the `watch` verb.
    pub watchable: bool,
}

impl ApiEntry {
    pub fn new(api_version: &str, kind: &str, plural: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced: true,
            preferred: true,
            watchable: true,
        }
    }

    pub fn cluster_scoped(mut self) -> Self { self.namespaced = false; self }
    pub fn not_preferred(mut self) -> Self { self.preferred = false; self }
    pub fn unwatchable(mut self) -> Self { self.watchable = false; self }

    pub fn canonical(&self) -> Result<CanonicalType, CatalogError> {
        CanonicalType::from_api_version(&self.api_version, &self.kind)
    }

    fn matches_resource(&self, resource: &str) -> bool {
        let r = resource.to_ascii_lowercase();
        self.plural == r || self.kind.to_ascii_lowercase() == r
    }

    fn matches_kind(&self, kind: &str) -> bool {
        self.kind == kind || self.kind.eq_ignore_ascii_case(kind)
    }
}

pub trait TypeCatalog: Send + Sync {
    /// Resolve a query; preferred versions win, then catalog order.
    fn lookup(&self, query: &TypeQuery) -> Result<CanonicalType, CatalogError>;

    /// Every preferred-version entry, in catalog order.
    fn preferred_types(&self) -> Vec<ApiEntry>;

    /// Resource names for suggestions on failed lookups.
    fn resource_names(&self) -> Vec<String> { Vec::new() }
}

/// In-memory catalog. Entry order is the priority order for ambiguous lookups.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<ApiEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<ApiEntry>) -> Self { Self { entries } }

    pub fn entries(&self) -> &[ApiEntry] { &self.entries }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl TypeCatalog for StaticCatalog {
    fn lookup(&self, query: &TypeQuery) -> Result<CanonicalType, CatalogError> {
        let (group, version) = match query {
            TypeQuery::Resource { group, version, .. } | TypeQuery::Kind { group, version, .. } => (group, version),
        };
        let mut candidates: Vec<(bool, CanonicalType)> = Vec::new();
        for entry in &self.entries {
            let hit = match query {
                TypeQuery::Resource { resource, .. } => entry.matches_resource(resource),
                TypeQuery::Kind { kind, .. } => entry.matches_kind(kind),
            };
            if !hit {
                continue;
            }
            // entries with a broken apiVersion can never be looked up
            let Ok(t) = entry.canonical() else { continue };
            if let Some(g) = group {
                if t.group != *g {
                    continue;
                }
            }
            if let Some(v) = version {
                if t.version != *v {
                    continue;
                }
            }
            candidates.push((entry.preferred, t));
        }
        // stable: keeps catalog order within the preferred/non-preferred halves
        candidates.sort_by_key(|(preferred, _)| !*preferred);
        candidates
            .into_iter()
            .next()
            .map(|(_, t)| t)
            .ok_or_else(|| CatalogError::NotFound(format!("{:?}", query)))
    }

    fn preferred_types(&self) -> Vec<ApiEntry> {
        self.entries.iter().filter(|e| e.preferred).cloned().collect()
    }

    fn resource_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.plural.clone()).collect();
        names.sort();
        names.dedup();
        names
    }
}
