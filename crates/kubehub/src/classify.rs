//! Watcher events → add/update/delete, keyed by namespace/name.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use necker_core::{EventKind, Notification, ObjectIdentity, ObjectRevisionMeta};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::project::project;

struct Seen {
    resource_version: Option<String>,
    last: ObjectRevisionMeta,
}

/// Remembers the last resourceVersion per object. The first list after a
/// (re)start yields `Add` for every object the classifier has not seen.
#[derive(Default)]
pub(crate) struct Classifier {
    seen: FxHashMap<ObjectIdentity, Seen>,
}

impl Classifier {
    /// `None` for a redelivery of a revision already reported.
    pub(crate) fn applied(&mut self, meta: &ObjectMeta) -> Option<Notification> {
        let obj = project(meta);
        let rv = meta.resource_version.clone();
        match self.seen.get_mut(&obj.identity) {
            None => {
                self.seen.insert(obj.identity.clone(), Seen { resource_version: rv, last: obj.clone() });
                Some(Notification::new(EventKind::Add, obj))
            }
            Some(prev) if rv.is_some() && prev.resource_version == rv => None,
            Some(prev) => {
                prev.resource_version = rv;
                prev.last = obj.clone();
                Some(Notification::new(EventKind::Update, obj))
            }
        }
    }

    pub(crate) fn deleted(&mut self, meta: &ObjectMeta) -> Notification {
        let obj = project(meta);
        self.seen.remove(&obj.identity);
        Notification::new(EventKind::Delete, obj)
    }

    /// A full relist: changes are reported as for `applied`, and objects that
    /// vanished while the watch was down are reported deleted.
    pub(crate) fn restarted<'a>(&mut self, list: impl IntoIterator<Item = &'a ObjectMeta>) -> Vec<Notification> {
        let mut out = Vec::new();
        let mut present = FxHashSet::default();
        for meta in list {
            present.insert(ObjectIdentity::new(meta.namespace.as_deref(), meta.name.clone().unwrap_or_default()));
            out.extend(self.applied(meta));
        }
        let gone: Vec<ObjectIdentity> = self.seen.keys().filter(|k| !present.contains(*k)).cloned().collect();
        for key in gone {
            if let Some(seen) = self.seen.remove(&key) {
                out.push(Notification::new(EventKind::Delete, seen.last));
            }
        }
        out
    }

    pub(crate) fn len(&self) -> usize { self.seen.len() }
}
