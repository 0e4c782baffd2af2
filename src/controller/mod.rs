//! Reconciliation controllers
//!
//! Two level-triggered controllers share one context: the HelmApp
//! reconciler converges declared components against installed releases, and
//! the IstioOperator translator projects mesh specs into managed HelmApps.

pub mod helm_app;
pub mod istio_operator;

use std::sync::Arc;

use kube::Client;

use crate::config::OperatorConfig;
use crate::controller::helm_app::ResourceAdopter;
use crate::helm::HelmClient;
use crate::profiles::ProfileStore;

/// Shared state handed to every reconcile invocation
pub struct Context {
    /// Kubernetes client
    pub client: Client,

    /// Helm engine
    pub helm: Arc<dyn HelmClient>,

    /// Forced-adoption backend
    pub adopter: Arc<dyn ResourceAdopter>,

    /// Operator settings
    pub config: OperatorConfig,

    /// Profile store for translation
    pub profiles: ProfileStore,
}
