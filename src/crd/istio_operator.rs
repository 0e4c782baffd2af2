//! IstioOperator Custom Resource Definition
//!
//! The subset of the IstioOperator API the translation controller consumes:
//! profile selection, structured component toggles with per-component
//! Kubernetes overrides, mesh configuration and the free-form value tree.
//! Unknown fields are deliberately dropped on deserialization; translation
//! only ever reads the fields modeled here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kubernetes-level overrides for one component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct K8sOverrides {
    /// Resource requests and limits, passed through to chart values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,

    /// Pod affinity, passed through to chart values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Value>,
}

/// Enable toggle plus overrides for a fixed component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentToggle {
    /// Whether the component is emitted at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Kubernetes overrides folded into the component values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<K8sOverrides>,
}

impl ComponentToggle {
    /// Whether this component should be emitted.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

/// A named gateway component
///
/// Gateways additionally require a non-empty name to be emitted at all.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayToggle {
    /// Release name of the gateway; unnamed gateways are skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the gateway is emitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Kubernetes overrides folded into the gateway values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k8s: Option<K8sOverrides>,
}

impl GatewayToggle {
    /// Whether this gateway should be emitted: enabled and named.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
            && self.name.as_deref().map(|n| !n.is_empty()).unwrap_or(false)
    }
}

/// Structured component toggles of an IstioOperator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IstioComponents {
    /// Foundational CRDs and cluster roles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<ComponentToggle>,

    /// Control plane (istiod)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pilot: Option<ComponentToggle>,

    /// Node-level CNI agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni: Option<ComponentToggle>,

    /// Ambient-mode node proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ztunnel: Option<ComponentToggle>,

    /// Ingress gateways, each emitted as its own component
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_gateways: Vec<GatewayToggle>,

    /// Egress gateways, each emitted as its own component
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress_gateways: Vec<GatewayToggle>,
}

/// Reported health of an IstioOperator, mapped from the HelmApp phase
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IopHealth {
    /// Backing HelmApp has no phase yet
    #[default]
    None,
    /// Backing HelmApp is converging or not created yet
    Reconciling,
    /// All components deployed
    Healthy,
    /// At least one component failed
    Error,
}

impl std::fmt::Display for IopHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Reconciling => write!(f, "RECONCILING"),
            Self::Healthy => write!(f, "HEALTHY"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Status of an IstioOperator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IstioOperatorStatus {
    /// Mapped health of the backing HelmApp
    #[serde(default)]
    pub status: IopHealth,

    /// Human-readable detail; serialized as null when absent so a merge
    /// patch clears a stale message on recovery
    #[serde(default)]
    pub message: Option<String>,
}

/// Specification for an IstioOperator
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "install.istio.io",
    version = "v1alpha1",
    kind = "IstioOperator",
    plural = "istiooperators",
    shortname = "iop",
    namespaced,
    status = "IstioOperatorStatus",
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IstioOperatorSpec {
    /// Named profile merged beneath this spec, defaults to "default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Image hub, stamped into global values as the routing hub override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hub: Option<String>,

    /// Image tag, used as the chart version for every component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Revision marker stamped into global values when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    /// Structured component toggles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<IstioComponents>,

    /// Mesh-level configuration, folded into the pilot component values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_config: Option<Value>,

    /// Free-form value tree; `global` feeds the HelmApp global values,
    /// per-component keys override that component's values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,
}

impl IstioOperatorSpec {
    /// Profile name with the documented default applied.
    pub fn profile_name(&self) -> &str {
        self.profile.as_deref().filter(|p| !p.is_empty()).unwrap_or("default")
    }
}
