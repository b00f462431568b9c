//! Target set selection: an explicit validated list, or every preferred
//! catalog type minus a noise exclusion list.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{TypeCatalog, TypeQuery};
use crate::error::ConfigError;
use crate::types::CanonicalType;

/// Types never watched in discover-all mode, matched on (group, kind) for any version.
const NOISY_KINDS: &[(&str, &str)] = &[
    ("", "Binding"),
    ("", "ComponentStatus"),
    ("", "Endpoints"),
    ("", "Event"),
    ("", "Node"),
    ("events.k8s.io", "Event"),
    ("coordination.k8s.io", "Lease"),
    ("discovery.k8s.io", "EndpointSlice"),
    ("authentication.k8s.io", "TokenReview"),
    ("authentication.k8s.io", "SelfSubjectReview"),
    ("authorization.k8s.io", "LocalSubjectAccessReview"),
    ("authorization.k8s.io", "SelfSubjectAccessReview"),
    ("authorization.k8s.io", "SelfSubjectRulesReview"),
    ("authorization.k8s.io", "SubjectAccessReview"),
    ("metrics.k8s.io", "PodMetrics"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionList {
    kinds: Vec<(String, String)>,
}

impl Default for ExclusionList {
    fn default() -> Self {
        Self { kinds: NOISY_KINDS.iter().map(|(g, k)| (g.to_string(), k.to_string())).collect() }
    }
}

impl ExclusionList {
    pub fn empty() -> Self { Self { kinds: Vec::new() } }

    pub fn with(mut self, group: &str, kind: &str) -> Self {
        self.kinds.push((group.to_string(), kind.to_string()));
        self
    }

    pub fn excludes(&self, t: &CanonicalType) -> bool {
        self.kinds.iter().any(|(g, k)| *g == t.group && *k == t.kind)
    }
}

/// How the target set is chosen. The two modes are exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    Explicit(Vec<CanonicalType>),
    DiscoverAll { include_cluster_scoped: bool },
}

impl TargetSelection {
    /// Build from the raw settings, rejecting both-or-neither.
    pub fn from_parts(
        explicit: Vec<CanonicalType>,
        all_resources: bool,
        include_cluster_scoped: bool,
    ) -> Result<Self, ConfigError> {
        match (explicit.is_empty(), all_resources) {
            (false, true) => Err(ConfigError::ConflictingTargets),
            (true, false) => Err(ConfigError::NoTargets),
            (true, true) => Ok(TargetSelection::DiscoverAll { include_cluster_scoped }),
            (false, false) => Ok(TargetSelection::Explicit(explicit)),
        }
    }
}

/// Ordered, deduplicated set of types to observe. Not mutated after build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetSet(Vec<CanonicalType>);

impl TargetSet {
    /// First occurrence wins; order is otherwise preserved.
    pub fn new(items: impl IntoIterator<Item = CanonicalType>) -> Self {
        let mut seen = HashSet::new();
        Self(items.into_iter().filter(|t| seen.insert(t.clone())).collect())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CanonicalType> { self.0.iter() }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn contains(&self, t: &CanonicalType) -> bool { self.0.contains(t) }
    pub fn as_slice(&self) -> &[CanonicalType] { &self.0 }
}

impl<'a> IntoIterator for &'a TargetSet {
    type Item = &'a CanonicalType;
    type IntoIter = std::slice::Iter<'a, CanonicalType>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

pub struct TargetSetBuilder<'a> {
    catalog: &'a dyn TypeCatalog,
    exclusions: ExclusionList,
}

impl<'a> TargetSetBuilder<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self { Self { catalog, exclusions: ExclusionList::default() } }

    pub fn with_exclusions(mut self, exclusions: ExclusionList) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn build(&self, selection: &TargetSelection) -> Result<TargetSet, ConfigError> {
        let set = match selection {
            TargetSelection::Explicit(types) => self.explicit(types)?,
            TargetSelection::DiscoverAll { include_cluster_scoped } => self.discover_all(*include_cluster_scoped),
        };
        info!(count = set.len(), "target set built");
        Ok(set)
    }

    // Fail-fast: one unknown type aborts the whole build.
    fn explicit(&self, types: &[CanonicalType]) -> Result<TargetSet, ConfigError> {
        for t in types {
            match self.catalog.lookup(&TypeQuery::exact(t)) {
                Ok(found) if found == *t => {}
                _ => return Err(ConfigError::UnknownType(t.clone())),
            }
        }
        Ok(TargetSet::new(types.iter().cloned()))
    }

    fn discover_all(&self, include_cluster_scoped: bool) -> TargetSet {
        let mut out = Vec::new();
        for entry in self.catalog.preferred_types() {
            let t = match entry.canonical() {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "skipping type with unparseable metadata");
                    continue;
                }
            };
            if self.exclusions.excludes(&t) {
                debug!(gvk = %t, "excluded");
                continue;
            }
            if !entry.namespaced && !include_cluster_scoped {
                debug!(gvk = %t, "cluster-scoped; skipped");
                continue;
            }
            if !entry.watchable {
                debug!(gvk = %t, "does not support watch; skipped");
                continue;
            }
            out.push(t);
        }
        TargetSet::new(out)
    }
}
