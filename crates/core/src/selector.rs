//! Label filters and the two-stage (object, then namespace) selector evaluation.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, LookupError};
use crate::types::{CanonicalType, Labels, ObjectRevisionMeta};

static LABEL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$")
        .expect("static regex")
});
static LABEL_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$").expect("static regex"));
static SET_TERM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(in|notin)\s*\(([^()]*)\)$").expect("static regex"));

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, vs) => labels.get(k).map_or(false, |v| vs.contains(v)),
            Requirement::NotIn(k, vs) => labels.get(k).map_or(true, |v| !vs.contains(v)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |vs: &BTreeSet<String>| vs.iter().cloned().collect::<Vec<_>>().join(",");
        match self {
            Requirement::Equals(k, v) => write!(f, "{}={}", k, v),
            Requirement::NotEquals(k, v) => write!(f, "{}!={}", k, v),
            Requirement::In(k, vs) => write!(f, "{} in ({})", k, join(vs)),
            Requirement::NotIn(k, vs) => write!(f, "{} notin ({})", k, join(vs)),
            Requirement::Exists(k) => write!(f, "{}", k),
            Requirement::DoesNotExist(k) => write!(f, "!{}", k),
        }
    }
}

/// Conjunction of label requirements. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    requirements: Vec<Requirement>,
}

impl LabelFilter {
    pub fn everything() -> Self { Self::default() }

    pub fn is_everything(&self) -> bool { self.requirements.is_empty() }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }

    /// Equality filter from `key=value` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { requirements: pairs.into_iter().map(|(k, v)| Requirement::Equals(k.into(), v.into())).collect() }
    }

    /// Parse selector syntax: `k=v`, `k==v`, `k!=v`, `k in (a,b)`, `k notin (a,b)`, `k`, `!k`.
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut requirements = Vec::new();
        for term in split_terms(input)? {
            requirements.push(parse_term(term)?);
        }
        Ok(Self { requirements })
    }

    pub fn from_label_selector(sel: &LabelSelector) -> Result<Self, ConfigError> {
        let mut requirements = Vec::new();
        if let Some(ml) = &sel.match_labels {
            for (k, v) in ml {
                validate_key(k)?;
                validate_value(v)?;
                requirements.push(Requirement::Equals(k.clone(), v.clone()));
            }
        }
        for expr in sel.match_expressions.iter().flatten() {
            validate_key(&expr.key)?;
            let values: BTreeSet<String> = expr.values.iter().flatten().cloned().collect();
            for v in &values {
                validate_value(v)?;
            }
            let req = match expr.operator.as_str() {
                "In" | "NotIn" if values.is_empty() => {
                    return Err(invalid(format!("operator {} on {:?} needs values", expr.operator, expr.key)))
                }
                "Exists" | "DoesNotExist" if !values.is_empty() => {
                    return Err(invalid(format!("operator {} on {:?} takes no values", expr.operator, expr.key)))
                }
                "In" => Requirement::In(expr.key.clone(), values),
                "NotIn" => Requirement::NotIn(expr.key.clone(), values),
                "Exists" => Requirement::Exists(expr.key.clone()),
                "DoesNotExist" => Requirement::DoesNotExist(expr.key.clone()),
                other => return Err(invalid(format!("unknown operator {:?}", other))),
            };
            requirements.push(req);
        }
        Ok(Self { requirements })
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.requirements.is_empty() {
            return f.write_str("<everything>");
        }
        let terms: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        f.write_str(&terms.join(","))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError { ConfigError::InvalidSelector(msg.into()) }

fn validate_key(key: &str) -> Result<(), ConfigError> {
    let (prefix, name) = key.rsplit_once('/').unwrap_or(("", key));
    if name.len() > MAX_NAME_LEN || prefix.len() > MAX_PREFIX_LEN || !LABEL_KEY.is_match(key) {
        return Err(invalid(format!("invalid label key {:?}", key)));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), ConfigError> {
    if value.len() > MAX_NAME_LEN || !LABEL_VALUE.is_match(value) {
        return Err(invalid(format!("invalid label value {:?}", value)));
    }
    Ok(())
}

// Commas inside `( )` belong to set terms.
fn split_terms(input: &str) -> Result<Vec<&str>, ConfigError> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(invalid(format!("unbalanced parentheses in {:?}", input)));
                }
            }
            ',' if depth == 0 => {
                out.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid(format!("unbalanced parentheses in {:?}", input)));
    }
    let last = input[start..].trim();
    if !last.is_empty() || !out.is_empty() {
        out.push(last);
    }
    if out.iter().any(|t| t.is_empty()) {
        return Err(invalid(format!("empty term in {:?}", input)));
    }
    Ok(out)
}

fn parse_term(term: &str) -> Result<Requirement, ConfigError> {
    if let Some(caps) = SET_TERM.captures(term) {
        let key = caps[1].to_string();
        validate_key(&key)?;
        let values: BTreeSet<String> =
            caps[3].split(',').map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect();
        if values.is_empty() {
            return Err(invalid(format!("empty value set in {:?}", term)));
        }
        for v in &values {
            validate_value(v)?;
        }
        return Ok(if &caps[2] == "in" { Requirement::In(key, values) } else { Requirement::NotIn(key, values) });
    }
    if let Some(key) = term.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement::DoesNotExist(key.to_string()));
    }
    let (key, value, negated) = if let Some((k, v)) = term.split_once("!=") {
        (k, v, true)
    } else if let Some((k, v)) = term.split_once("==") {
        (k, v, false)
    } else if let Some((k, v)) = term.split_once('=') {
        (k, v, false)
    } else {
        validate_key(term)?;
        return Ok(Requirement::Exists(term.to_string()));
    };
    let (key, value) = (key.trim(), value.trim());
    validate_key(key)?;
    validate_value(value)?;
    Ok(if negated {
        Requirement::NotEquals(key.to_string(), value.to_string())
    } else {
        Requirement::Equals(key.to_string(), value.to_string())
    })
}

/// Label lookup for the namespace-scope filter.
#[async_trait::async_trait]
pub trait NamespaceLabels: Send + Sync {
    async fn namespace_labels(&self, namespace: &str) -> Result<Labels, LookupError>;
}

/// Namespace-scope and object-scope filters applied to one type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorPair {
    pub namespace: LabelFilter,
    pub object: LabelFilter,
}

impl SelectorPair {
    pub fn new(namespace: LabelFilter, object: LabelFilter) -> Self { Self { namespace, object } }

    pub fn everything() -> Self { Self::default() }

    /// Object labels first; the namespace lookup only runs for namespaced
    /// objects when the namespace filter is restrictive.
    pub async fn matches(&self, obj: &ObjectRevisionMeta, namespaces: &dyn NamespaceLabels) -> Result<bool, LookupError> {
        if !self.object.matches(&obj.labels) {
            return Ok(false);
        }
        if obj.namespace().is_empty() || self.namespace.is_everything() {
            return Ok(true);
        }
        let ns_labels = namespaces.namespace_labels(obj.namespace()).await?;
        Ok(self.namespace.matches(&ns_labels))
    }
}

/// Global default pair plus per-type replacements.
#[derive(Debug, Clone, Default)]
pub struct SelectorPolicy {
    default: SelectorPair,
    overrides: HashMap<CanonicalType, SelectorPair>,
}

impl SelectorPolicy {
    pub fn new(default: SelectorPair) -> Self { Self { default, overrides: HashMap::new() } }

    /// An override replaces the default pair entirely for `target`.
    pub fn with_override(mut self, target: CanonicalType, pair: SelectorPair) -> Self {
        self.overrides.insert(target, pair);
        self
    }

    pub fn pair_for(&self, target: &CanonicalType) -> SelectorPair {
        self.overrides.get(target).cloned().unwrap_or_else(|| self.default.clone())
    }
}
