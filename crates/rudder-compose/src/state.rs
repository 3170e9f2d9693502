//! Global resolution state
//!
//! A [`ResolutionContext`] accumulates what every document of one config input
//! contributes: the global value tree, the simulated cluster capabilities and
//! the release identity. It is created fresh per input, only grows while
//! documents load, and is read-only once rendering starts.

use rudder_core::{Capabilities, ReleaseIdentity, Values};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::refs::resolve_local_refs;

/// Capabilities declared by a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CapabilitiesOverride {
    #[serde(default)]
    pub api_versions: Vec<String>,

    #[serde(default)]
    pub kube_version: Option<KubeVersionOverride>,
}

/// Kubernetes version declared by a document; empty fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct KubeVersionOverride {
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub major: String,

    #[serde(default, deserialize_with = "string_or_number")]
    pub minor: String,
}

/// Release identity declared by a document; empty fields are ignored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ReleaseOverride {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,
}

/// Accepts `minor: 30` as well as `minor: "30"`
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        String(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::String(s)) => s,
        Some(Scalar::Integer(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

/// Global state for one config input
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    /// Merged values of every loaded document
    pub values: Values,

    /// Effective capabilities
    pub capabilities: Capabilities,

    /// Effective release identity
    pub release: ReleaseIdentity,
}

impl Default for ResolutionContext {
    fn default() -> Self {
        Self {
            values: Values::new(),
            capabilities: Capabilities::default(),
            release: ReleaseIdentity::default(),
        }
    }
}

impl ResolutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-merge document values into the global tree, incoming keys winning
    pub fn merge_values(&mut self, values: &Values) {
        self.values.merge(values);
    }

    /// Apply a capabilities override, field by field; empty fields keep the current value
    pub fn merge_capabilities(&mut self, incoming: &CapabilitiesOverride) {
        if !incoming.api_versions.is_empty() {
            self.capabilities.api_versions = incoming.api_versions.clone();
        }

        if let Some(kube) = &incoming.kube_version {
            let current = &mut self.capabilities.kube_version;
            overwrite_non_empty(&mut current.version, &kube.version);
            overwrite_non_empty(&mut current.major, &kube.major);
            overwrite_non_empty(&mut current.minor, &kube.minor);
        }

        debug!(
            "Capabilities now kube {} with {} extra API versions",
            self.capabilities.kube_version.version,
            self.capabilities.api_versions.len()
        );
    }

    /// Apply a release override, field by field; empty fields keep the current value
    pub fn merge_release(&mut self, incoming: &ReleaseOverride) {
        overwrite_non_empty(&mut self.release.name, &incoming.name);
        overwrite_non_empty(&mut self.release.namespace, &incoming.namespace);
    }

    /// Resolve `#/pointer` references inside the global tree, looking them up
    /// in a snapshot of the tree taken before resolution
    pub fn resolve_global_refs(&mut self) -> Result<()> {
        let scope = self.values.inner().clone();
        resolve_local_refs(self.values.inner_mut(), &scope)
    }

    /// Values a chart renders with: the global tree overlaid with the chart's own values
    pub fn effective_values(&self, chart_values: &Values) -> Values {
        self.values.merged_with(chart_values)
    }
}

fn overwrite_non_empty(current: &mut String, incoming: &str) {
    if !incoming.is_empty() {
        *current = incoming.to_string();
    }
}
