//! Free-form type specifiers (`pods`, `deployments.apps`,
//! `horizontalpodautoscalers.v1.autoscaling`, `Deployment`) to canonical types.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use tracing::debug;

use crate::catalog::{TypeCatalog, TypeQuery};
use crate::error::ResolveError;
use crate::types::CanonicalType;

const MAX_SUGGESTIONS: usize = 3;

pub struct TypeResolver<'a> {
    catalog: &'a dyn TypeCatalog,
}

impl<'a> TypeResolver<'a> {
    pub fn new(catalog: &'a dyn TypeCatalog) -> Self { Self { catalog } }

    /// Tries `resource[.group]`, then `resource.version.group`, then `kind[.group]`.
    pub fn resolve(&self, specifier: &str) -> Result<CanonicalType, ResolveError> {
        let spec = specifier.trim();
        if !spec.is_empty() {
            for query in candidate_queries(spec) {
                match self.catalog.lookup(&query) {
                    Ok(t) => {
                        debug!(specifier = %spec, gvk = %t, "resolved type");
                        return Ok(t);
                    }
                    Err(e) => debug!(specifier = %spec, query = ?query, error = %e, "lookup miss"),
                }
            }
        }
        Err(ResolveError::NotFound { specifier: specifier.to_string(), suggestions: self.suggest(spec) })
    }

    pub fn resolve_all<S: AsRef<str>>(&self, specifiers: &[S]) -> Result<Vec<CanonicalType>, ResolveError> {
        specifiers.iter().map(|s| self.resolve(s.as_ref())).collect()
    }

    fn suggest(&self, spec: &str) -> Vec<String> {
        let needle = spec.split('.').next().unwrap_or_default().to_ascii_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, String)> = self
            .catalog
            .resource_names()
            .into_iter()
            .filter_map(|name| matcher.fuzzy_match(&name, &needle).map(|score| (score, name)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        scored.into_iter().take(MAX_SUGGESTIONS).map(|(_, n)| n).collect()
    }
}

// No dot means no group was given: search them all.
fn split_first_dot(s: &str) -> (&str, Option<&str>) {
    match s.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (s, None),
    }
}

fn candidate_queries(spec: &str) -> Vec<TypeQuery> {
    let mut out = Vec::with_capacity(3);
    let (resource, group) = split_first_dot(spec);
    out.push(TypeQuery::resource(resource, group, None));
    let parts: Vec<&str> = spec.splitn(3, '.').collect();
    if let [res, version, grp] = parts.as_slice() {
        out.push(TypeQuery::resource(res, Some(*grp), Some(*version)));
    }
    let (kind, group) = split_first_dot(spec);
    out.push(TypeQuery::kind(kind, group, None));
    out
}
