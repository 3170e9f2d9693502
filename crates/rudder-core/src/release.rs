//! Release identity types

use serde::{Deserialize, Serialize};

/// Default release name presented to templates when no document sets one
pub const DEFAULT_RELEASE_NAME: &str = "release-name";

/// Default namespace presented to templates when no document sets one
pub const DEFAULT_RELEASE_NAMESPACE: &str = "release-namespace";

/// Identity (name, namespace) under which charts are rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseIdentity {
    pub name: String,
    pub namespace: String,
}

impl Default for ReleaseIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_RELEASE_NAME.to_string(),
            namespace: DEFAULT_RELEASE_NAMESPACE.to_string(),
        }
    }
}

impl ReleaseIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Template-facing release information for a client-side install
    pub fn to_info(&self) -> ReleaseInfo {
        ReleaseInfo::for_install(&self.name, &self.namespace)
    }
}

/// Release information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Service (always "Rudder")
    pub service: String,
}

impl ReleaseInfo {
    /// Create release info for a new install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: "Rudder".to_string(),
        }
    }
}
