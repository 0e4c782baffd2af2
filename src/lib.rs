//! helmop library
//!
//! A level-triggered operator that reconciles ordered bundles of Helm
//! releases (`HelmApp`) and translates IstioOperator objects into managed
//! HelmApps. Usable as a library for testing the pure core: the merge
//! engine, phase aggregation and the translation projection.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod helm;
pub mod profiles;
pub mod values;

// Re-export commonly used types for convenience
pub use config::OperatorConfig;
pub use controller::helm_app::{calculate_phase, reconcile_component, resolve_values, teardown};
pub use controller::istio_operator::{map_phase, merge_with_profile, project};
pub use error::Error;
pub use profiles::ProfileStore;
