//! HelmApp reconciliation
//!
//! Level-triggered convergence of a HelmApp's declared components against
//! the installed Helm releases. Every pass rebuilds the component status
//! list from scratch, recomputes the aggregate phase and persists both in a
//! single status write. Deletion is finalizer-gated: releases are torn down
//! in reverse declaration order and the finalizer is removed only once the
//! recorded list is empty.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::Api;
use kube::api::{Patch, PatchParams};
use kube::core::{ApiResource, DynamicObject};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use crate::controller::Context;
use crate::crd::{
    HELM_APP_FINALIZER, HelmApp, HelmAppStatus, HelmComponent, HelmComponentStatus,
    HelmResourceStatus, Phase, RELEASE_STATUS_DEPLOYED, RELEASE_STATUS_FAILED,
    RELEASE_STATUS_UNKNOWN,
};
use crate::error::Error;
use crate::helm::{HelmClient, ReleaseRecord, ReleaseRequest, parse_manifest};
use crate::values;

/// Label Helm uses to recognize resources it manages
const HELM_MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Annotation naming the release a resource belongs to
const HELM_RELEASE_NAME_ANNOTATION: &str = "meta.helm.sh/release-name";

/// Annotation naming the namespace of the owning release
const HELM_RELEASE_NAMESPACE_ANNOTATION: &str = "meta.helm.sh/release-namespace";

/// Stamps Helm ownership metadata onto live resources
///
/// Forced adoption re-labels resources that already exist in the cluster so
/// a subsequent install does not fail with an ownership conflict.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceAdopter: Send + Sync {
    /// Mark one live resource as owned by the given release.
    async fn adopt(
        &self,
        resource: &HelmResourceStatus,
        release: &str,
        release_namespace: &str,
    ) -> Result<(), Error>;
}

/// [`ResourceAdopter`] backed by the dynamic Kubernetes API
pub struct DynamicAdopter {
    client: Client,
}

impl DynamicAdopter {
    /// Create an adopter using the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceAdopter for DynamicAdopter {
    async fn adopt(
        &self,
        resource: &HelmResourceStatus,
        release: &str,
        release_namespace: &str,
    ) -> Result<(), Error> {
        let (group, version) = split_api_version(&resource.api_version);
        let ar = ApiResource {
            group: group.to_string(),
            version: version.to_string(),
            api_version: resource.api_version.clone(),
            kind: resource.kind.clone(),
            plural: pluralize_kind(&resource.kind),
        };

        let api: Api<DynamicObject> = if resource.namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), &resource.namespace, &ar)
        };

        let patch = json!({
            "metadata": {
                "labels": { HELM_MANAGED_BY_LABEL: "Helm" },
                "annotations": {
                    HELM_RELEASE_NAME_ANNOTATION: release,
                    HELM_RELEASE_NAMESPACE_ANNOTATION: release_namespace,
                }
            }
        });
        api.patch(&resource.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Split an apiVersion string into (group, version).
fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Lowercase-plural resource name for a kind.
///
/// Kubernetes pluralization is lowercase with a handful of suffix rules;
/// this covers the kinds Helm charts render in practice.
fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Resolve the effective value tree for one component.
pub fn resolve_values(app: &HelmApp, component: &HelmComponent) -> serde_json::Value {
    if component.ignore_global_values {
        values::merge_layers(None, component.component_values.as_ref())
    } else {
        values::merge_layers(
            app.spec.global_values.as_ref(),
            component.component_values.as_ref(),
        )
    }
}

/// Aggregate phase as a pure function of the component statuses.
pub fn calculate_phase(components: &[HelmComponentStatus], deleting: bool) -> Phase {
    if deleting {
        return Phase::Deleting;
    }
    if components.is_empty() {
        return Phase::Unknown;
    }
    if components.iter().any(|c| c.status == RELEASE_STATUS_FAILED) {
        return Phase::Failed;
    }
    if components.iter().all(|c| c.status == RELEASE_STATUS_DEPLOYED) {
        return Phase::Succeeded;
    }
    Phase::Reconciling
}

fn status_from_record(name: &str, namespace: &str, record: &ReleaseRecord) -> HelmComponentStatus {
    let resources = parse_manifest(&record.manifest, namespace);
    HelmComponentStatus {
        name: name.to_string(),
        version: record.revision.to_string(),
        status: record.status.clone(),
        message: String::new(),
        resources_total: resources.len() as i32,
        resources,
    }
}

fn status_from_failure(name: &str, message: String) -> HelmComponentStatus {
    HelmComponentStatus {
        name: name.to_string(),
        version: RELEASE_STATUS_UNKNOWN.to_string(),
        status: RELEASE_STATUS_UNKNOWN.to_string(),
        message,
        resources: Vec::new(),
        resources_total: 0,
    }
}

/// Best-effort adoption of the resources a chart would render.
///
/// Individual failures are logged and skipped; adoption never blocks the
/// install that follows it.
async fn adopt_existing(
    helm: &dyn HelmClient,
    adopter: &dyn ResourceAdopter,
    request: &ReleaseRequest,
) {
    let manifest = match helm.render(request).await {
        Ok(manifest) => manifest,
        Err(e) => {
            warn!(release = %request.name, error = %e, "dry-run render failed, skipping adoption");
            return;
        }
    };

    for resource in parse_manifest(&manifest, &request.namespace) {
        match adopter.adopt(&resource, &request.name, &request.namespace).await {
            Ok(()) => {
                info!(
                    release = %request.name,
                    kind = %resource.kind,
                    resource = %resource.name,
                    "adopted resource"
                );
            }
            Err(e) => {
                warn!(
                    release = %request.name,
                    kind = %resource.kind,
                    resource = %resource.name,
                    error = %e,
                    "resource adoption failed, continuing"
                );
            }
        }
    }
}

/// Decide and execute install, no-op or upgrade for one component.
///
/// Never returns `Err`: failures are folded into the returned status so the
/// caller can continue with sibling components, with the error alongside
/// for logging and requeue decisions.
pub async fn reconcile_component(
    helm: &dyn HelmClient,
    adopter: &dyn ResourceAdopter,
    request: &ReleaseRequest,
    force_adopt: bool,
) -> (HelmComponentStatus, Option<Error>) {
    let history = match helm.history(&request.name, &request.namespace).await {
        Ok(history) => history,
        Err(e) => {
            let err = Error::component(&request.name, e.to_string());
            return (status_from_failure(&request.name, e.to_string()), Some(err));
        }
    };

    let result = match history {
        None => {
            if force_adopt {
                adopt_existing(helm, adopter, request).await;
            }
            info!(release = %request.name, chart = %request.chart, version = %request.version, "installing");
            helm.install(request).await
        }
        Some(record) => {
            if record.chart_version == request.version && record.values == request.values {
                debug!(release = %request.name, revision = record.revision, "unchanged, skipping");
                return (
                    status_from_record(&request.name, &request.namespace, &record),
                    None,
                );
            }
            info!(release = %request.name, from = %record.chart_version, to = %request.version, "upgrading");
            helm.upgrade(request).await
        }
    };

    match result {
        Ok(record) => (
            status_from_record(&request.name, &request.namespace, &record),
            None,
        ),
        Err(e) => {
            let err = Error::component(&request.name, e.to_string());
            (status_from_failure(&request.name, e.to_string()), Some(err))
        }
    }
}

fn build_request(app: &HelmApp, namespace: &str, component: &HelmComponent) -> ReleaseRequest {
    ReleaseRequest {
        name: component.name.clone(),
        namespace: namespace.to_string(),
        chart: component.chart.clone(),
        version: component.version.clone(),
        repo_url: app.spec.repo.url.clone(),
        values: resolve_values(app, component),
    }
}

/// One active convergence pass over the declared component list.
///
/// Returns the rebuilt status list plus whether any operation failed.
/// Previously recorded components missing from the desired set are
/// uninstalled; entries whose uninstall fails are retained as failed.
pub async fn converge_components(
    helm: &dyn HelmClient,
    adopter: &dyn ResourceAdopter,
    app: &HelmApp,
) -> (Vec<HelmComponentStatus>, bool) {
    let namespace = app.namespace().unwrap_or_default();
    let app_force = app.allows_force_adopt();

    let mut statuses = Vec::with_capacity(app.spec.components.len());
    let mut any_error = false;

    for component in &app.spec.components {
        let request = build_request(app, &namespace, component);
        let force = app_force || component.force_adopt;
        let (status, error) = reconcile_component(helm, adopter, &request, force).await;
        if let Some(error) = error {
            warn!(component = %component.name, error = %error, "component reconcile failed");
            any_error = true;
        }
        statuses.push(status);
    }

    // Components that were recorded previously but are no longer declared
    // get uninstalled. Success drops the entry, failure retains it.
    let recorded = app
        .status
        .as_ref()
        .map(|s| s.components.as_slice())
        .unwrap_or_default();
    for previous in recorded {
        if app.spec.components.iter().any(|c| c.name == previous.name) {
            continue;
        }
        match helm.uninstall(&previous.name, &namespace).await {
            Ok(()) => {
                info!(component = %previous.name, "removed component uninstalled");
            }
            Err(e) => {
                warn!(component = %previous.name, error = %e, "uninstall of removed component failed");
                let mut retained = previous.clone();
                retained.status = RELEASE_STATUS_FAILED.to_string();
                retained.message = e.to_string();
                statuses.push(retained);
                any_error = true;
            }
        }
    }

    (statuses, any_error)
}

/// Tear down recorded releases in reverse declaration order.
///
/// Halts at the first failure: entries earlier in declaration order are not
/// touched once a later one fails. Returns the entries still standing, in
/// declaration order, and the halting error if any.
pub async fn teardown(
    helm: &dyn HelmClient,
    namespace: &str,
    statuses: &[HelmComponentStatus],
) -> (Vec<HelmComponentStatus>, Option<Error>) {
    let mut remaining = statuses.to_vec();

    while !remaining.is_empty() {
        let idx = remaining.len() - 1;
        let name = remaining[idx].name.clone();
        match helm.uninstall(&name, namespace).await {
            Ok(()) => {
                info!(component = %name, "uninstalled");
                remaining.pop();
            }
            Err(e) => {
                remaining[idx].status = RELEASE_STATUS_FAILED.to_string();
                remaining[idx].message = e.to_string();
                return (remaining, Some(Error::component(name, e.to_string())));
            }
        }
    }

    (remaining, None)
}

async fn ensure_finalizer(api: &Api<HelmApp>, app: &HelmApp) -> Result<(), Error> {
    if app.finalizers().iter().any(|f| f == HELM_APP_FINALIZER) {
        return Ok(());
    }
    let mut finalizers = app.finalizers().to_vec();
    finalizers.push(HELM_APP_FINALIZER.to_string());
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &app.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    debug!(app = %app.name_any(), "finalizer added");
    Ok(())
}

async fn remove_finalizer(api: &Api<HelmApp>, app: &HelmApp) -> Result<(), Error> {
    let finalizers: Vec<&String> = app
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != HELM_APP_FINALIZER)
        .collect();
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &app.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn patch_app_status(
    api: &Api<HelmApp>,
    name: &str,
    status: &HelmAppStatus,
) -> Result<(), Error> {
    let patch = json!({"status": status});
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

async fn reconcile_delete(
    api: &Api<HelmApp>,
    app: &HelmApp,
    ctx: &Context,
) -> Result<Action, Error> {
    let name = app.name_any();
    let namespace = app.namespace().unwrap_or_default();
    let recorded = app
        .status
        .as_ref()
        .map(|s| s.components.clone())
        .unwrap_or_default();

    let (remaining, failure) = teardown(ctx.helm.as_ref(), &namespace, &recorded).await;

    let status = HelmAppStatus {
        phase: Phase::Deleting,
        components: remaining,
    };
    patch_app_status(api, &name, &status).await?;

    if let Some(error) = failure {
        warn!(app = %name, error = %error, "teardown halted, requeueing");
        return Ok(Action::requeue(Duration::ZERO));
    }

    remove_finalizer(api, app).await?;
    info!(app = %name, "teardown complete, finalizer removed");
    Ok(Action::await_change())
}

/// Reconcile one HelmApp.
pub async fn reconcile(app: Arc<HelmApp>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = app.name_any();
    let namespace = app.namespace().unwrap_or_default();
    let api: Api<HelmApp> = Api::namespaced(ctx.client.clone(), &namespace);

    if app.metadata.deletion_timestamp.is_some() {
        return reconcile_delete(&api, &app, &ctx).await;
    }

    ensure_finalizer(&api, &app).await?;

    let (components, any_error) =
        converge_components(ctx.helm.as_ref(), ctx.adopter.as_ref(), &app).await;
    let phase = calculate_phase(&components, false);
    patch_app_status(&api, &name, &HelmAppStatus { phase, components }).await?;

    info!(app = %name, phase = %phase, "reconciled");
    if phase == Phase::Failed || any_error {
        Ok(Action::requeue(ctx.config.failure_requeue))
    } else {
        Ok(Action::await_change())
    }
}

/// Requeue policy when [`reconcile`] itself returns an error.
pub fn error_policy(app: Arc<HelmApp>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(app = %app.name_any(), error = %error, "reconcile failed");
    Action::requeue(ctx.config.failure_requeue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{HelmAppSpec, HelmRepo};
    use crate::helm::{HelmError, MockHelmClient};
    use serde_json::{Value, json};

    fn component(name: &str, version: &str, values: Option<Value>) -> HelmComponent {
        HelmComponent {
            name: name.to_string(),
            chart: name.to_string(),
            version: version.to_string(),
            component_values: values,
            ignore_global_values: false,
            force_adopt: false,
        }
    }

    fn app(components: Vec<HelmComponent>, global: Option<Value>) -> HelmApp {
        let mut app = HelmApp::new(
            "mesh",
            HelmAppSpec {
                components,
                global_values: global,
                repo: HelmRepo {
                    url: "https://charts.example.com".to_string(),
                    name: None,
                },
            },
        );
        app.metadata.namespace = Some("istio-system".to_string());
        app
    }

    fn component_status(name: &str, status: &str) -> HelmComponentStatus {
        HelmComponentStatus {
            name: name.to_string(),
            version: "1".to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn deployed_record(chart_version: &str, values: Value) -> ReleaseRecord {
        ReleaseRecord {
            revision: 1,
            status: RELEASE_STATUS_DEPLOYED.to_string(),
            chart_version: chart_version.to_string(),
            values,
            ..Default::default()
        }
    }

    fn request(name: &str, version: &str, values: Value) -> ReleaseRequest {
        ReleaseRequest {
            name: name.to_string(),
            namespace: "istio-system".to_string(),
            chart: name.to_string(),
            version: version.to_string(),
            repo_url: "https://charts.example.com".to_string(),
            values,
        }
    }

    #[tokio::test]
    async fn test_install_when_no_history() {
        let mut helm = MockHelmClient::new();
        helm.expect_history().returning(|_, _| Ok(None));
        helm.expect_install()
            .times(1)
            .returning(|req| Ok(deployed_record(&req.version, req.values.clone())));
        let adopter = MockResourceAdopter::new();

        let req = request("istiod", "1.22.2", json!({"pilot": {"replicaCount": 2}}));
        let (status, error) = reconcile_component(&helm, &adopter, &req, false).await;

        assert!(error.is_none());
        assert_eq!(status.name, "istiod");
        assert_eq!(status.status, RELEASE_STATUS_DEPLOYED);
        assert_eq!(status.version, "1");
    }

    #[tokio::test]
    async fn test_noop_when_unchanged() {
        let values = json!({"pilot": {"replicaCount": 2}});
        let record = deployed_record("1.22.2", values.clone());
        let mut helm = MockHelmClient::new();
        helm.expect_history()
            .returning(move |_, _| Ok(Some(record.clone())));
        // install/upgrade have no expectations, calling them panics
        let adopter = MockResourceAdopter::new();

        let req = request("istiod", "1.22.2", values);
        let (status, error) = reconcile_component(&helm, &adopter, &req, false).await;

        assert!(error.is_none());
        assert_eq!(status.status, RELEASE_STATUS_DEPLOYED);
    }

    #[tokio::test]
    async fn test_upgrade_on_value_change() {
        let record = deployed_record("1.22.2", json!({"pilot": {"replicaCount": 2}}));
        let mut helm = MockHelmClient::new();
        helm.expect_history()
            .returning(move |_, _| Ok(Some(record.clone())));
        helm.expect_upgrade().times(1).returning(|req| {
            let mut rec = deployed_record(&req.version, req.values.clone());
            rec.revision = 2;
            Ok(rec)
        });
        let adopter = MockResourceAdopter::new();

        let req = request("istiod", "1.22.2", json!({"pilot": {"replicaCount": 3}}));
        let (status, error) = reconcile_component(&helm, &adopter, &req, false).await;

        assert!(error.is_none());
        assert_eq!(status.version, "2");
    }

    #[tokio::test]
    async fn test_upgrade_on_version_change() {
        let values = json!({});
        let record = deployed_record("1.22.2", values.clone());
        let mut helm = MockHelmClient::new();
        helm.expect_history()
            .returning(move |_, _| Ok(Some(record.clone())));
        helm.expect_upgrade()
            .times(1)
            .returning(|req| Ok(deployed_record(&req.version, req.values.clone())));
        let adopter = MockResourceAdopter::new();

        let req = request("istiod", "1.23.0", values);
        let (_, error) = reconcile_component(&helm, &adopter, &req, false).await;
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_failure_captured_in_status() {
        let mut helm = MockHelmClient::new();
        helm.expect_history().returning(|_, _| Ok(None));
        helm.expect_install().returning(|_| {
            Err(HelmError::CommandFailed {
                operation: "install".to_string(),
                release: "istiod".to_string(),
                stderr: "chart not found".to_string(),
            })
        });
        let adopter = MockResourceAdopter::new();

        let req = request("istiod", "1.22.2", json!({}));
        let (status, error) = reconcile_component(&helm, &adopter, &req, false).await;

        assert!(error.is_some());
        assert_eq!(status.status, RELEASE_STATUS_UNKNOWN);
        assert!(status.message.contains("chart not found"));
    }

    #[tokio::test]
    async fn test_adoption_runs_before_install() {
        let mut helm = MockHelmClient::new();
        helm.expect_history().returning(|_, _| Ok(None));
        helm.expect_render().times(1).returning(|_| {
            Ok("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n".to_string())
        });
        helm.expect_install()
            .times(1)
            .returning(|req| Ok(deployed_record(&req.version, req.values.clone())));

        let mut adopter = MockResourceAdopter::new();
        adopter
            .expect_adopt()
            .times(1)
            .withf(|resource, release, ns| {
                resource.kind == "ConfigMap" && release == "istiod" && ns == "istio-system"
            })
            .returning(|_, _, _| Ok(()));

        let req = request("istiod", "1.22.2", json!({}));
        let (status, error) = reconcile_component(&helm, &adopter, &req, true).await;

        assert!(error.is_none());
        assert_eq!(status.status, RELEASE_STATUS_DEPLOYED);
    }

    #[tokio::test]
    async fn test_adoption_failure_does_not_block_install() {
        let mut helm = MockHelmClient::new();
        helm.expect_history().returning(|_, _| Ok(None));
        helm.expect_render().returning(|_| {
            Ok("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n".to_string())
        });
        helm.expect_install()
            .times(1)
            .returning(|req| Ok(deployed_record(&req.version, req.values.clone())));

        let mut adopter = MockResourceAdopter::new();
        adopter
            .expect_adopt()
            .returning(|r, _, _| Err(Error::component(&r.name, "patch denied")));

        let req = request("istiod", "1.22.2", json!({}));
        let (_, error) = reconcile_component(&helm, &adopter, &req, true).await;
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_implicit_uninstall_of_removed_component() {
        let mut app = app(vec![component("base", "1.22.2", None)], None);
        app.status = Some(HelmAppStatus {
            phase: Phase::Succeeded,
            components: vec![
                component_status("base", RELEASE_STATUS_DEPLOYED),
                component_status("legacy", RELEASE_STATUS_DEPLOYED),
            ],
        });

        let mut helm = MockHelmClient::new();
        helm.expect_history()
            .returning(|_, _| Ok(Some(deployed_record("1.22.2", json!({})))));
        helm.expect_uninstall()
            .times(1)
            .withf(|name, _| name == "legacy")
            .returning(|_, _| Ok(()));
        let adopter = MockResourceAdopter::new();

        let (statuses, any_error) = converge_components(&helm, &adopter, &app).await;

        assert!(!any_error);
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].name, "base");
    }

    #[tokio::test]
    async fn test_failed_implicit_uninstall_retains_entry() {
        let mut app = app(vec![component("base", "1.22.2", None)], None);
        app.status = Some(HelmAppStatus {
            phase: Phase::Succeeded,
            components: vec![
                component_status("base", RELEASE_STATUS_DEPLOYED),
                component_status("legacy", RELEASE_STATUS_DEPLOYED),
            ],
        });

        let mut helm = MockHelmClient::new();
        helm.expect_history()
            .returning(|_, _| Ok(Some(deployed_record("1.22.2", json!({})))));
        helm.expect_uninstall().returning(|name, _| {
            Err(HelmError::CommandFailed {
                operation: "uninstall".to_string(),
                release: name.to_string(),
                stderr: "hooks failed".to_string(),
            })
        });
        let adopter = MockResourceAdopter::new();

        let (statuses, any_error) = converge_components(&helm, &adopter, &app).await;

        assert!(any_error);
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1].name, "legacy");
        assert_eq!(statuses[1].status, RELEASE_STATUS_FAILED);
        assert!(statuses[1].message.contains("hooks failed"));
    }

    #[tokio::test]
    async fn test_teardown_reverse_order_halts_on_failure() {
        let statuses = vec![
            component_status("a", RELEASE_STATUS_DEPLOYED),
            component_status("b", RELEASE_STATUS_DEPLOYED),
            component_status("c", RELEASE_STATUS_DEPLOYED),
        ];

        let mut helm = MockHelmClient::new();
        helm.expect_uninstall()
            .withf(|name, _| name == "c")
            .times(1)
            .returning(|_, _| Ok(()));
        helm.expect_uninstall()
            .withf(|name, _| name == "b")
            .times(1)
            .returning(|name, _| {
                Err(HelmError::CommandFailed {
                    operation: "uninstall".to_string(),
                    release: name.to_string(),
                    stderr: "stuck".to_string(),
                })
            });
        // "a" must not be touched once "b" fails

        let (remaining, error) = teardown(&helm, "istio-system", &statuses).await;

        assert!(error.is_some());
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].name, "a");
        assert_eq!(remaining[0].status, RELEASE_STATUS_DEPLOYED);
        assert_eq!(remaining[1].name, "b");
        assert_eq!(remaining[1].status, RELEASE_STATUS_FAILED);
    }

    #[tokio::test]
    async fn test_teardown_complete_success_empties_list() {
        let statuses = vec![
            component_status("a", RELEASE_STATUS_DEPLOYED),
            component_status("b", RELEASE_STATUS_DEPLOYED),
        ];

        let mut order = Vec::new();
        let mut helm = MockHelmClient::new();
        let recorded = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = recorded.clone();
        helm.expect_uninstall().times(2).returning(move |name, _| {
            if let Ok(mut names) = sink.lock() {
                names.push(name.to_string());
            }
            Ok(())
        });

        let (remaining, error) = teardown(&helm, "istio-system", &statuses).await;
        if let Ok(names) = recorded.lock() {
            order = names.clone();
        }

        assert!(error.is_none());
        assert!(remaining.is_empty());
        assert_eq!(order, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_calculate_phase_table() {
        let deployed = component_status("a", RELEASE_STATUS_DEPLOYED);
        let failed = component_status("b", RELEASE_STATUS_FAILED);
        let pending = component_status("c", "pending-install");

        assert_eq!(calculate_phase(&[], false), Phase::Unknown);
        assert_eq!(calculate_phase(&[], true), Phase::Deleting);
        assert_eq!(
            calculate_phase(&[deployed.clone(), failed.clone()], false),
            Phase::Failed
        );
        assert_eq!(
            calculate_phase(&[deployed.clone(), deployed.clone()], false),
            Phase::Succeeded
        );
        assert_eq!(
            calculate_phase(&[deployed.clone(), pending], false),
            Phase::Reconciling
        );
        assert_eq!(calculate_phase(&[deployed, failed], true), Phase::Deleting);
    }

    #[test]
    fn test_resolve_values_precedence() {
        let global = json!({"global": {"hub": "docker.io/istio", "tag": "1.22.2"}});
        let app = app(
            vec![
                component(
                    "istiod",
                    "1.22.2",
                    Some(json!({"global": {"tag": "override"}})),
                ),
                HelmComponent {
                    ignore_global_values: true,
                    ..component("cni", "1.22.2", Some(json!({"cni": {"enabled": true}})))
                },
            ],
            Some(global),
        );

        let merged = resolve_values(&app, &app.spec.components[0]);
        assert_eq!(
            merged.pointer("/global/hub"),
            Some(&json!("docker.io/istio"))
        );
        assert_eq!(merged.pointer("/global/tag"), Some(&json!("override")));

        let isolated = resolve_values(&app, &app.spec.components[1]);
        assert_eq!(isolated, json!({"cni": {"enabled": true}}));
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("apps/v1"), ("apps", "v1"));
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }

    #[test]
    fn test_pluralize_kind() {
        assert_eq!(pluralize_kind("Deployment"), "deployments");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
        assert_eq!(pluralize_kind("NetworkPolicy"), "networkpolicies");
        assert_eq!(pluralize_kind("Gateway"), "gateways");
    }
}
