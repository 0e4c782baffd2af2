//! Error types for the operator
//!
//! Errors carry enough context to be debuggable from a single log line:
//! the object or component they relate to and the underlying cause.

use thiserror::Error;

use crate::helm::HelmError;

/// Main error type for reconciliation and translation
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Helm engine error
    #[error("helm error: {source}")]
    Helm {
        /// The underlying helm driver error
        #[from]
        source: HelmError,
    },

    /// A component failed to install, upgrade or uninstall
    #[error("component {component}: {message}")]
    Component {
        /// Component name within the HelmApp
        component: String,
        /// Description of what failed
        message: String,
    },

    /// Profile could not be loaded or parsed
    #[error("profile {profile}: {message}")]
    Profile {
        /// Profile name that was requested
        profile: String,
        /// Description of what failed
        message: String,
    },

    /// A value under a known key had the wrong shape
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
    },

    /// Translation from IstioOperator to HelmApp failed
    #[error("translation error for {name}: {message}")]
    Translation {
        /// Name of the IstioOperator being translated
        name: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a component error
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a profile error
    pub fn profile(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Profile {
            profile: profile.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a translation error
    pub fn translation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Translation {
            name: name.into(),
            message: message.into(),
        }
    }
}
