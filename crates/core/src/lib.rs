//! Necker core: canonical types, catalog lookups, target selection, label
//! selectors and the statistics model shared by the aggregators.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod resolve;
pub mod selector;
pub mod source;
pub mod stats;
pub mod targets;
pub mod types;

pub use catalog::{ApiEntry, StaticCatalog, TypeCatalog, TypeQuery};
pub use config::{Config, TargetResource};
pub use error::{CatalogError, ConfigError, LookupError, ResolveError, WatchError};
pub use resolve::TypeResolver;
pub use selector::{LabelFilter, NamespaceLabels, SelectorPair, SelectorPolicy};
pub use source::NotificationSource;
pub use stats::{BlameStatistics, ManagerStatistics, NamespaceStatistics, ObjectStatistics, Statistics};
pub use targets::{ExclusionList, TargetSelection, TargetSet, TargetSetBuilder};
pub use types::{CanonicalType, EventKind, FieldOwnership, Labels, Notification, ObjectIdentity, ObjectRevisionMeta};

pub mod prelude {
    pub use super::{
        CanonicalType, EventKind, FieldOwnership, Labels, Notification, ObjectIdentity, ObjectRevisionMeta,
        NamespaceLabels, NotificationSource, SelectorPair, TypeCatalog,
    };
}
