//! HelmApp Custom Resource Definition
//!
//! A HelmApp declares an ordered set of named components, each backed by a
//! versioned Helm chart with its own value tree. The controller converges
//! the declared set against the installed releases and reports an aggregate
//! phase. Declaration order is a contract: components are installed in
//! declared order and torn down in reverse, because later components may
//! depend on earlier ones.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chart repository reference for all components of a HelmApp
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepo {
    /// Repository URL charts are located from
    pub url: String,

    /// Optional repository name, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One declared component of a HelmApp
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmComponent {
    /// Release name, unique within the component list
    pub name: String,

    /// Chart name within the repository
    pub chart: String,

    /// Chart version to install
    #[serde(default)]
    pub version: String,

    /// Per-component value tree, merged on top of the global values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_values: Option<Value>,

    /// When set, global values are not merged into this component
    #[serde(default)]
    pub ignore_global_values: bool,

    /// When set, resources created out-of-band are re-labeled as owned by
    /// the release before install instead of failing with a conflict
    #[serde(default)]
    pub force_adopt: bool,
}

/// Aggregate lifecycle phase of a HelmApp
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum Phase {
    /// No component statuses recorded yet
    #[default]
    Unknown,
    /// At least one component is not yet deployed
    Reconciling,
    /// Every component reports deployed
    Succeeded,
    /// At least one component reports failed
    Failed,
    /// Deletion requested, teardown in progress
    Deleting,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
            Self::Deleting => write!(f, "Deleting"),
        }
    }
}

/// Identity of one child resource rendered by a release
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelmResourceStatus {
    /// Group/version of the resource
    pub api_version: String,

    /// Resource kind
    pub kind: String,

    /// Namespace, empty for cluster-scoped resources
    #[serde(default)]
    pub namespace: String,

    /// Resource name
    pub name: String,
}

/// Reported state of one component's release
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmComponentStatus {
    /// Component name
    pub name: String,

    /// Stringified release revision, "unknown" before the first install
    #[serde(default)]
    pub version: String,

    /// Health state reported by Helm ("deployed", "failed", ...)
    #[serde(default)]
    pub status: String,

    /// Human-readable error message from the last failed operation,
    /// cleared on success
    #[serde(default)]
    pub message: String,

    /// Child resources rendered by the release
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<HelmResourceStatus>,

    /// Total number of rendered child resources
    #[serde(default)]
    pub resources_total: i32,
}

/// Helm health state significant to phase aggregation: release is live.
pub const RELEASE_STATUS_DEPLOYED: &str = "deployed";

/// Helm health state significant to phase aggregation: release failed.
pub const RELEASE_STATUS_FAILED: &str = "failed";

/// Health state recorded before Helm has reported anything.
pub const RELEASE_STATUS_UNKNOWN: &str = "unknown";

/// Status of a HelmApp
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmAppStatus {
    /// Aggregate phase, a pure function of the component list
    #[serde(default)]
    pub phase: Phase,

    /// Per-component statuses, in declaration order; entries for removed
    /// components persist until their uninstall succeeds.
    ///
    /// Always serialized, even when empty: status is persisted as a merge
    /// patch, and an omitted key would leave the previously stored list in
    /// place after the last component is uninstalled.
    #[serde(default)]
    pub components: Vec<HelmComponentStatus>,
}

/// Specification for a HelmApp
///
/// Component order is significant: installs walk the list forward, teardown
/// walks it in reverse.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.helmop.dev",
    version = "v1alpha1",
    kind = "HelmApp",
    plural = "helmapps",
    shortname = "happ",
    namespaced,
    status = "HelmAppStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HelmAppSpec {
    /// Ordered component list; names must be unique
    #[serde(default)]
    pub components: Vec<HelmComponent>,

    /// Value tree merged beneath every component's own values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_values: Option<Value>,

    /// Chart repository all components resolve from
    #[serde(default)]
    pub repo: HelmRepo,
}

impl HelmApp {
    /// Whether forced adoption is enabled app-wide via the action label.
    pub fn allows_force_adopt(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(super::ALLOW_FORCE_ADOPT_LABEL))
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}
