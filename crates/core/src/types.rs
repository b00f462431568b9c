//! Object projection types delivered by the watch boundary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CatalogError;

pub type Labels = BTreeMap<String, String>;

/// Fully qualified group/version/kind of an observed type. Empty group is the core API group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalType {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl CanonicalType {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Build from an `apiVersion` string (`v1` or `group/version`) and a kind.
    pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self, CatalogError> {
        let bad = || CatalogError::InvalidApiVersion { api_version: api_version.to_string(), kind: kind.to_string() };
        if kind.is_empty() {
            return Err(bad());
        }
        let parts: Vec<&str> = api_version.split('/').collect();
        match parts.as_slice() {
            [version] if !version.is_empty() => Ok(Self::new("", *version, kind)),
            [group, version] if !group.is_empty() && !version.is_empty() => Ok(Self::new(*group, *version, kind)),
            _ => Err(bad()),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Namespace (empty for cluster-scoped objects) and name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentity {
    pub namespace: String,
    pub name: String,
}

impl ObjectIdentity {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.unwrap_or_default().to_string(), name: name.into() }
    }

    pub fn is_cluster_scoped(&self) -> bool { self.namespace.is_empty() }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() { f.write_str(&self.name) } else { write!(f, "{}/{}", self.namespace, self.name) }
    }
}

/// One manager's latest claim over some subset of an object's fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldOwnership {
    pub manager: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl FieldOwnership {
    pub fn new(manager: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { manager: manager.into(), timestamp }
    }
}

/// Metadata read from every notification. Object bodies are never decoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRevisionMeta {
    pub identity: ObjectIdentity,
    pub creation_timestamp: Option<DateTime<Utc>>,
    pub labels: Labels,
    pub managed_fields: SmallVec<[FieldOwnership; 4]>,
}

impl ObjectRevisionMeta {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self { identity: ObjectIdentity::new(namespace, name), ..Default::default() }
    }

    pub fn namespace(&self) -> &str { &self.identity.namespace }
    pub fn name(&self) -> &str { &self.identity.name }

    pub fn created_at(mut self, ts: DateTime<Utc>) -> Self {
        self.creation_timestamp = Some(ts);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_manager(mut self, manager: impl Into<String>, ts: Option<DateTime<Utc>>) -> Self {
        self.managed_fields.push(FieldOwnership::new(manager, ts));
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Add,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

/// A single add/update/delete about one object of a subscribed type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub kind: EventKind,
    pub object: ObjectRevisionMeta,
}

impl Notification {
    pub fn new(kind: EventKind, object: ObjectRevisionMeta) -> Self { Self { kind, object } }
}
