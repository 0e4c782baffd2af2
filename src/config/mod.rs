//! Operator configuration
//!
//! One explicit value threaded into both controller contexts. Defaults are
//! usable out of the box; every knob has a `HELMOP_*` environment override
//! and most are also exposed as CLI flags in `main`.

use std::path::PathBuf;
use std::time::Duration;

/// Tunable settings for both controllers
#[derive(Clone, Debug)]
pub struct OperatorConfig {
    /// Directory profiles are loaded from
    pub profiles_dir: PathBuf,

    /// Chart repository URL stamped into translated HelmApps
    pub charts_repo_url: String,

    /// Per-command timeout for the helm binary
    pub helm_timeout: Duration,

    /// Requeue interval after a HelmApp pass ends in the Failed phase
    pub failure_requeue: Duration,

    /// Requeue interval while a translated HelmApp is still converging
    pub short_requeue: Duration,

    /// Requeue interval after a translated HelmApp reports an error
    pub long_requeue: Duration,

    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("/etc/helmop/profiles"),
            charts_repo_url: "https://istio-release.storage.googleapis.com/charts".to_string(),
            helm_timeout: Duration::from_secs(300),
            failure_requeue: Duration::from_secs(60),
            short_requeue: Duration::from_secs(30),
            long_requeue: Duration::from_secs(180),
            watch_namespace: None,
        }
    }
}

impl OperatorConfig {
    /// Defaults with `HELMOP_*` environment overrides applied.
    ///
    /// Unparseable values fall back to the default for that knob.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("HELMOP_PROFILES_DIR") {
            config.profiles_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("HELMOP_CHARTS_REPO") {
            config.charts_repo_url = url;
        }
        if let Some(secs) = env_secs("HELMOP_HELM_TIMEOUT_SECS") {
            config.helm_timeout = secs;
        }
        if let Some(secs) = env_secs("HELMOP_FAILURE_REQUEUE_SECS") {
            config.failure_requeue = secs;
        }
        if let Some(secs) = env_secs("HELMOP_SHORT_REQUEUE_SECS") {
            config.short_requeue = secs;
        }
        if let Some(secs) = env_secs("HELMOP_LONG_REQUEUE_SECS") {
            config.long_requeue = secs;
        }
        if let Ok(ns) = std::env::var("HELMOP_NAMESPACE") {
            if !ns.is_empty() {
                config.watch_namespace = Some(ns);
            }
        }

        config
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}
