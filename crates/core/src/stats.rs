//! Counter tables. Snapshots are plain owned clones and serialize as-is.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalType, EventKind};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectStatistics {
    #[serde(rename = "update")]
    pub updated: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamespaceStatistics {
    #[serde(rename = "add")]
    pub added: u64,
    #[serde(rename = "update")]
    pub updated: u64,
    #[serde(rename = "delete")]
    pub deleted: u64,
    pub resources: BTreeMap<String, ObjectStatistics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statistics {
    pub gvk: CanonicalType,
    pub namespaces: BTreeMap<String, NamespaceStatistics>,
}

impl Statistics {
    pub fn new(gvk: CanonicalType) -> Self { Self { gvk, namespaces: BTreeMap::new() } }

    /// Count one accepted event. Object entries are kept after deletion.
    pub fn record(&mut self, kind: EventKind, namespace: &str, name: &str) {
        let ns = self.namespaces.entry(namespace.to_string()).or_default();
        let obj = ns.resources.entry(name.to_string()).or_default();
        match kind {
            EventKind::Add => ns.added += 1,
            EventKind::Update => {
                ns.updated += 1;
                obj.updated += 1;
            }
            EventKind::Delete => ns.deleted += 1,
        }
    }

    pub fn namespace(&self, ns: &str) -> Option<&NamespaceStatistics> { self.namespaces.get(ns) }

    pub fn total(&self, kind: EventKind) -> u64 {
        self.namespaces
            .values()
            .map(|ns| match kind {
                EventKind::Add => ns.added,
                EventKind::Update => ns.updated,
                EventKind::Delete => ns.deleted,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerStatistics {
    #[serde(rename = "update")]
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlameStatistics {
    pub managers: BTreeMap<String, ManagerStatistics>,
    #[serde(rename = "lastUpdate")]
    pub high_water_mark: DateTime<Utc>,
}

impl BlameStatistics {
    pub fn new(high_water_mark: DateTime<Utc>) -> Self { Self { managers: BTreeMap::new(), high_water_mark } }

    pub fn count(&self, manager: &str) -> u64 { self.managers.get(manager).map_or(0, |m| m.updated) }

    pub fn total(&self) -> u64 { self.managers.values().map(|m| m.updated).sum() }
}
