//! Helm driver backed by the `helm` binary
//!
//! Every command runs with a bounded timeout. "release: not found" on
//! stderr is mapped to the not-found condition instead of an error, which
//! is what makes history lookups and uninstalls idempotent.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{HelmClient, HelmError, ReleaseRecord, ReleaseRequest};

/// Marker helm prints on stderr when a release does not exist
const NOT_FOUND_MARKER: &str = "release: not found";

/// Production [`HelmClient`] driving the `helm` binary
pub struct HelmCli {
    timeout: Duration,
}

impl HelmCli {
    /// Create a driver with the given per-command timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run one helm command, returning captured stdout.
    async fn run(
        &self,
        args: &[&str],
        operation: &str,
        release: &str,
    ) -> Result<String, HelmError> {
        debug!(operation, release, ?args, "running helm");

        let mut cmd = Command::new("helm");
        cmd.args(args);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                warn!(operation, release, "helm command timed out");
                HelmError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| HelmError::Spawn {
                message: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if stderr.contains(NOT_FOUND_MARKER) {
            return Err(HelmError::ReleaseNotFound {
                release: release.to_string(),
            });
        }
        Err(HelmError::CommandFailed {
            operation: operation.to_string(),
            release: release.to_string(),
            stderr,
        })
    }

    /// Write resolved values to a throwaway file helm can read with `-f`.
    ///
    /// JSON is a subset of YAML, so the tree is written as-is. The path
    /// includes the target namespace: reconciles for different objects run
    /// concurrently, and two of them may use the same release name.
    async fn write_values(&self, request: &ReleaseRequest) -> Result<ValuesFile, HelmError> {
        let path = std::env::temp_dir().join(format!(
            "helmop-values-{}-{}-{}.json",
            std::process::id(),
            request.namespace,
            request.name
        ));
        let contents = serde_json::to_string(&request.values).map_err(|e| HelmError::Parse {
            message: e.to_string(),
        })?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| HelmError::Spawn {
                message: format!("failed to write values file {}: {}", path.display(), e),
            })?;
        Ok(ValuesFile { path })
    }

    /// Run install or upgrade and parse the release object helm prints.
    async fn apply(
        &self,
        verb: &str,
        request: &ReleaseRequest,
        dry_run: bool,
    ) -> Result<ReleaseRecord, HelmError> {
        let values_file = self.write_values(request).await?;
        let values_path = values_file.path.display().to_string();

        let mut args = vec![
            verb,
            request.name.as_str(),
            request.chart.as_str(),
            "--namespace",
            request.namespace.as_str(),
            "--repo",
            request.repo_url.as_str(),
            "-f",
            values_path.as_str(),
            "-o",
            "json",
        ];
        if !request.version.is_empty() {
            args.push("--version");
            args.push(request.version.as_str());
        }
        if dry_run {
            args.push("--dry-run");
        }

        let stdout = self.run(&args, verb, &request.name).await?;
        parse_release(&stdout)
    }
}

#[async_trait]
impl HelmClient for HelmCli {
    async fn history(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ReleaseRecord>, HelmError> {
        // Latest revision metadata first; absence means no history.
        let metadata = match self
            .run(
                &["get", "metadata", name, "--namespace", namespace, "-o", "json"],
                "get metadata",
                name,
            )
            .await
        {
            Ok(stdout) => stdout,
            Err(HelmError::ReleaseNotFound { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let metadata: Value = serde_json::from_str(&metadata).map_err(|e| HelmError::Parse {
            message: format!("release metadata: {}", e),
        })?;

        // User-supplied values of the recorded revision, for the config
        // comparison the planner does.
        let values = self
            .run(
                &["get", "values", name, "--namespace", namespace, "-o", "json"],
                "get values",
                name,
            )
            .await?;
        let values: Value = if values.trim() == "null" || values.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&values).map_err(|e| HelmError::Parse {
                message: format!("release values: {}", e),
            })?
        };

        let manifest = self
            .run(
                &["get", "manifest", name, "--namespace", namespace],
                "get manifest",
                name,
            )
            .await?;

        Ok(Some(ReleaseRecord {
            revision: json_i64(&metadata, "revision"),
            status: json_str(&metadata, "status"),
            chart_version: json_str(&metadata, "version"),
            values,
            manifest,
            deployed_at: json_time(&metadata, "deployedAt"),
        }))
    }

    async fn install(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, HelmError> {
        let record = self.apply("install", request, false).await?;
        info!(release = %request.name, revision = record.revision, "installed release");
        Ok(record)
    }

    async fn upgrade(&self, request: &ReleaseRequest) -> Result<ReleaseRecord, HelmError> {
        let record = self.apply("upgrade", request, false).await?;
        info!(release = %request.name, revision = record.revision, "upgraded release");
        Ok(record)
    }

    async fn uninstall(&self, name: &str, namespace: &str) -> Result<(), HelmError> {
        // Explicit existence check: uninstalling an absent release is
        // success, not an error.
        match self
            .run(
                &["status", name, "--namespace", namespace, "-o", "json"],
                "status",
                name,
            )
            .await
        {
            Ok(_) => {}
            Err(HelmError::ReleaseNotFound { .. }) => {
                debug!(release = %name, "release already absent, skipping uninstall");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        match self
            .run(&["uninstall", name, "--namespace", namespace], "uninstall", name)
            .await
        {
            Ok(_) | Err(HelmError::ReleaseNotFound { .. }) => {
                info!(release = %name, "uninstalled release");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn render(&self, request: &ReleaseRequest) -> Result<String, HelmError> {
        let record = self.apply("install", request, true).await?;
        Ok(record.manifest)
    }
}

/// Values file removed when the invocation completes.
struct ValuesFile {
    path: PathBuf,
}

impl Drop for ValuesFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "failed to remove values file");
        }
    }
}

/// Parse the release object `helm install/upgrade -o json` prints.
fn parse_release(stdout: &str) -> Result<ReleaseRecord, HelmError> {
    let release: Value = serde_json::from_str(stdout).map_err(|e| HelmError::Parse {
        message: format!("release object: {}", e),
    })?;

    Ok(ReleaseRecord {
        revision: json_i64(&release, "version"),
        status: release
            .pointer("/info/status")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        chart_version: release
            .pointer("/chart/metadata/version")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        values: release
            .get("config")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
        manifest: release
            .get("manifest")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        deployed_at: release
            .pointer("/info/last_deployed")
            .and_then(|v| v.as_str())
            .and_then(parse_time),
    })
}

fn parse_time(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}

fn json_time(value: &Value, key: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    value.get(key).and_then(|v| v.as_str()).and_then(parse_time)
}

/// Read a numeric field that helm sometimes prints as a string.
fn json_i64(value: &Value, key: &str) -> i64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn json_str(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
