use thiserror::Error;

use crate::types::CanonicalType;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid apiVersion {api_version:?} for kind {kind:?}")]
    InvalidApiVersion { api_version: String, kind: String },
    #[error("no type matches {0}")]
    NotFound(String),
    #[error("discovery: {0}")]
    Discovery(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve resource type {specifier:?}{}", render_suggestions(.suggestions))]
    NotFound { specifier: String, suggestions: Vec<String> },
}

fn render_suggestions(s: &[String]) -> String {
    if s.is_empty() { String::new() } else { format!(" (did you mean: {})", s.join(", ")) }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("explicit resource types and the all-resources flag cannot be used together")]
    ConflictingTargets,
    #[error("no resource types given; name at least one type or enable all-resources")]
    NoTargets,
    #[error("unknown resource type {0}")]
    UnknownType(CanonicalType),
    #[error("invalid label selector: {0}")]
    InvalidSelector(String),
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Namespace label read failure. Drops the triggering event only.
#[derive(Debug, Error)]
#[error("reading labels of namespace {namespace:?}: {reason}")]
pub struct LookupError {
    pub namespace: String,
    pub reason: String,
}

impl LookupError {
    pub fn new(namespace: &str, reason: impl ToString) -> Self {
        Self { namespace: namespace.to_string(), reason: reason.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher for {0} already started")]
    AlreadyStarted(CanonicalType),
    #[error("watcher for {0} is stopped")]
    Stopped(CanonicalType),
    #[error("subscribing to {target}: {reason}")]
    Subscribe { target: CanonicalType, reason: String },
}
