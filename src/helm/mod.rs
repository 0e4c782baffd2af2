//! Helm engine boundary
//!
//! The operator talks to Helm through the [`HelmClient`] trait so that
//! reconciliation logic can be unit tested against a mock. The production
//! implementation drives the `helm` binary (see [`cli`]).

mod cli;
mod manifest;

pub use cli::HelmCli;
pub use manifest::parse_manifest;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Errors from the Helm driver
#[derive(Debug, Error)]
pub enum HelmError {
    /// The release does not exist
    #[error("release {release} not found")]
    ReleaseNotFound {
        /// Release name that was looked up
        release: String,
    },

    /// A helm command exited non-zero
    #[error("helm {operation} failed for {release}: {stderr}")]
    CommandFailed {
        /// Helm verb that was run
        operation: String,
        /// Release name the command targeted
        release: String,
        /// Captured stderr
        stderr: String,
    },

    /// A helm command did not complete within the configured timeout
    #[error("helm {operation} timed out after {seconds}s")]
    Timeout {
        /// Helm verb that was run
        operation: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Helm output could not be parsed
    #[error("failed to parse helm output: {message}")]
    Parse {
        /// Description of what failed
        message: String,
    },

    /// The helm binary could not be spawned
    #[error("failed to execute helm: {message}")]
    Spawn {
        /// Description of what failed
        message: String,
    },
}

/// Everything needed to install or upgrade one release
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleaseRequest {
    /// Release name
    pub name: String,
    /// Target namespace
    pub namespace: String,
    /// Chart name within the repository
    pub chart: String,
    /// Chart version
    pub version: String,
    /// Chart repository URL
    pub repo_url: String,
    /// Fully resolved value tree
    pub values: Value,
}

/// Record of an installed release, as reported by Helm
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReleaseRecord {
    /// Numeric release revision
    pub revision: i64,
    /// Health state string ("deployed", "failed", ...)
    pub status: String,
    /// Version of the chart the release was installed from
    pub chart_version: String,
    /// Value tree that was applied
    pub values: Value,
    /// Rendered manifest of the release
    pub manifest: String,
    /// When the revision was deployed, if Helm reported it
    pub deployed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Operations the reconciler needs from Helm
///
/// Absence of a release is a normal condition, reported as `Ok(None)` from
/// [`history`](HelmClient::history) and as success from
/// [`uninstall`](HelmClient::uninstall), never as an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelmClient: Send + Sync {
    /// Look up the latest recorded revision of a release.
    ///
    /// Returns `Ok(None)` when the release does not exist.
    async fn history(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ReleaseRecord>, HelmError>;

    /// Install a release.
    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, HelmError>;

    /// Upgrade an existing release.
    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, HelmError>;

    /// Uninstall a release. Uninstalling an absent release is a no-op.
    async fn uninstall(&self, name: &str, namespace: &str) -> Result<(), HelmError>;

    /// Render the chart without installing, returning the manifest.
    ///
    /// Used by forced adoption to enumerate the resources a release would
    /// own before the real install.
    async fn render(&self, request: &ReleaseRequest) -> Result<String, HelmError>;
}
