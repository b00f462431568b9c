//! YAML configuration for long-running metrics mode.
//!
//! ```yaml
//! TargetResources:
//!   - group: ""
//!     version: v1
//!     kind: ConfigMap
//!     resourceSelector:
//!       matchLabels: { app: web }
//! NamespaceSelector:
//!   matchLabels: { team: core }
//! EnableClusterResources: false
//! ```

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::selector::{LabelFilter, SelectorPair, SelectorPolicy};
use crate::targets::TargetSelection;
use crate::types::CanonicalType;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub target_resources: Vec<TargetResource>,
    #[serde(default)]
    pub all_resources: bool,
    #[serde(default)]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default)]
    pub resource_selector: Option<LabelSelector>,
    #[serde(default)]
    pub enable_cluster_resources: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
    #[serde(default)]
    pub namespace_selector: Option<LabelSelector>,
    #[serde(default)]
    pub resource_selector: Option<LabelSelector>,
}

impl TargetResource {
    pub fn canonical(&self) -> CanonicalType { CanonicalType::new(&self.group, &self.version, &self.kind) }

    fn has_selectors(&self) -> bool { self.namespace_selector.is_some() || self.resource_selector.is_some() }
}

fn filter(sel: &Option<LabelSelector>) -> Result<LabelFilter, ConfigError> {
    match sel {
        Some(s) => LabelFilter::from_label_selector(s),
        None => Ok(LabelFilter::everything()),
    }
}

impl Config {
    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn selection(&self) -> Result<TargetSelection, ConfigError> {
        let explicit = self.target_resources.iter().map(TargetResource::canonical).collect();
        TargetSelection::from_parts(explicit, self.all_resources, self.enable_cluster_resources)
    }

    /// Global pair from the top-level selectors; targets carrying their own
    /// selectors replace it for that type.
    pub fn selector_policy(&self) -> Result<SelectorPolicy, ConfigError> {
        let default = SelectorPair::new(filter(&self.namespace_selector)?, filter(&self.resource_selector)?);
        let mut policy = SelectorPolicy::new(default);
        for target in self.target_resources.iter().filter(|t| t.has_selectors()) {
            let pair = SelectorPair::new(filter(&target.namespace_selector)?, filter(&target.resource_selector)?);
            policy = policy.with_override(target.canonical(), pair);
        }
        Ok(policy)
    }

    /// Everything that can be checked without a cluster.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.selection()?;
        self.selector_policy()?;
        Ok(())
    }
}
