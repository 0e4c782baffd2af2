//! Custom Resource Definitions
//!
//! `HelmApp` is the generic desired-state object: an ordered bundle of Helm
//! releases reconciled as a unit. `IstioOperator` is the richer mesh-facing
//! object that the translation controller projects into a `HelmApp`.

mod helm_app;
mod istio_operator;

pub use helm_app::*;
pub use istio_operator::*;

/// Label marking an object as created and owned by this operator.
pub const MANAGED_LABEL: &str = "helmop.dev/managed";

/// Value of [`MANAGED_LABEL`] on owned objects.
pub const MANAGED_LABEL_VALUE: &str = "helmop";

/// Label on a translated HelmApp naming the IstioOperator it came from.
pub const SOURCE_FROM_IOP_LABEL: &str = "helmop.dev/source-from-iop";

/// Label enabling forced adoption of out-of-band resources for every
/// component of a HelmApp.
pub const ALLOW_FORCE_ADOPT_LABEL: &str = "action.helmop.dev/allow-force-adopt";

/// Finalizer owned by the HelmApp controller.
pub const HELM_APP_FINALIZER: &str = "helmapp.helmop.dev/finalizer";

/// Finalizer owned by the IstioOperator translation controller.
pub const IOP_FINALIZER: &str = "iop.helmop.dev/finalizer";
