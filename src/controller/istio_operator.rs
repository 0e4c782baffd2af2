//! IstioOperator translation
//!
//! Projects an IstioOperator into exactly one managed HelmApp of the same
//! namespace and name. The projection is deterministic: profile merged
//! beneath the spec, structured toggles expanded into ordered components,
//! free-form values scoped per component. The translator only ever touches
//! HelmApps carrying the ownership label; an unmanaged object of the same
//! identity is reported as an error and left alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::Api;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::config::OperatorConfig;
use crate::controller::Context;
use crate::crd::{
    HelmApp, HelmAppSpec, HelmComponent, HelmRepo, IOP_FINALIZER, IopHealth, IstioOperator,
    IstioOperatorSpec, IstioOperatorStatus, K8sOverrides, MANAGED_LABEL, MANAGED_LABEL_VALUE,
    Phase, SOURCE_FROM_IOP_LABEL,
};
use crate::error::Error;
use crate::values;

/// Merge the named profile beneath an IstioOperator spec.
///
/// Both sides are taken to value-tree form so the merge engine applies;
/// the spec wins wherever both define a key.
pub fn merge_with_profile(
    profile: &Value,
    spec: &IstioOperatorSpec,
) -> Result<IstioOperatorSpec, Error> {
    let spec_value =
        serde_json::to_value(spec).map_err(|e| Error::serialization(e.to_string()))?;
    let merged = values::merge(profile, &spec_value);
    serde_json::from_value(merged).map_err(|e| Error::serialization(e.to_string()))
}

/// Labels stamped on every translated HelmApp.
pub fn managed_labels(iop_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_LABEL.to_string(), MANAGED_LABEL_VALUE.to_string()),
        (SOURCE_FROM_IOP_LABEL.to_string(), iop_name.to_string()),
    ])
}

/// Subtree of the free-form value tree under one key, trees only.
fn subtree<'a>(values: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    values.and_then(|v| v.get(key)).filter(|v| v.is_object())
}

fn k8s_base(k8s: Option<&K8sOverrides>) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(k8s) = k8s {
        if let Some(resources) = &k8s.resources {
            map.insert("resources".to_string(), resources.clone());
        }
        if let Some(affinity) = &k8s.affinity {
            map.insert("affinity".to_string(), affinity.clone());
        }
    }
    map
}

/// Structured base overlaid with the free-form per-component subtree.
fn finish_values(base: Map<String, Value>, overlay: Option<&Value>) -> Option<Value> {
    let base = Value::Object(base);
    let merged = match overlay {
        Some(overlay) => values::merge(&base, overlay),
        None => base,
    };
    match &merged {
        Value::Object(map) if map.is_empty() => None,
        _ => Some(merged),
    }
}

fn build_global_values(spec: &IstioOperatorSpec) -> Option<Value> {
    let mut global = match subtree(spec.values.as_ref(), "global") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    if let Some(hub) = spec.hub.as_ref().filter(|h| !h.is_empty()) {
        global.insert("hub".to_string(), json!(hub));
    }
    if let Some(revision) = spec.revision.as_ref().filter(|r| !r.is_empty()) {
        global.insert("revision".to_string(), json!(revision));
    }
    if global.is_empty() {
        None
    } else {
        Some(json!({"global": Value::Object(global)}))
    }
}

/// Deterministic projection of an effective IstioOperator spec into a
/// HelmApp spec.
///
/// Component order is the install order: base, istiod, cni, ztunnel, then
/// gateways. Unnamed gateways are silently skipped.
pub fn project(spec: &IstioOperatorSpec, config: &OperatorConfig) -> HelmAppSpec {
    let version = spec.tag.clone().unwrap_or_default();
    let free_values = spec.values.as_ref();
    let mut components = Vec::new();

    let mut push = |name: &str, chart: &str, values: Option<Value>| {
        components.push(HelmComponent {
            name: name.to_string(),
            chart: chart.to_string(),
            version: version.clone(),
            component_values: values,
            ignore_global_values: false,
            force_adopt: false,
        });
    };

    if let Some(toggles) = &spec.components {
        if toggles.base.as_ref().is_some_and(|t| t.is_enabled()) {
            let k8s = toggles.base.as_ref().and_then(|t| t.k8s.as_ref());
            push(
                "base",
                "base",
                finish_values(k8s_base(k8s), subtree(free_values, "base")),
            );
        }

        if toggles.pilot.as_ref().is_some_and(|t| t.is_enabled()) {
            let k8s = toggles.pilot.as_ref().and_then(|t| t.k8s.as_ref());
            let mut base = k8s_base(k8s);

            // meshConfig: free-form tree as base, structured field on top.
            let from_values = subtree(free_values, "meshConfig");
            if from_values.is_some() || spec.mesh_config.is_some() {
                let left = from_values.cloned().unwrap_or_else(|| json!({}));
                let right = spec.mesh_config.clone().unwrap_or_else(|| json!({}));
                base.insert("meshConfig".to_string(), values::merge(&left, &right));
            }

            push(
                "istiod",
                "istiod",
                finish_values(base, subtree(free_values, "pilot")),
            );
        }

        if toggles.cni.as_ref().is_some_and(|t| t.is_enabled()) {
            let k8s = toggles.cni.as_ref().and_then(|t| t.k8s.as_ref());
            push(
                "cni",
                "cni",
                finish_values(k8s_base(k8s), subtree(free_values, "cni")),
            );
        }

        if toggles.ztunnel.as_ref().is_some_and(|t| t.is_enabled()) {
            let k8s = toggles.ztunnel.as_ref().and_then(|t| t.k8s.as_ref());
            push(
                "ztunnel",
                "ztunnel",
                finish_values(k8s_base(k8s), subtree(free_values, "ztunnel")),
            );
        }

        let gateway_values = subtree(free_values, "gateways");
        for gateway in toggles.ingress_gateways.iter().chain(&toggles.egress_gateways) {
            if !gateway.is_enabled() {
                continue;
            }
            let Some(name) = gateway.name.as_deref() else {
                continue;
            };
            push(
                name,
                "gateway",
                finish_values(k8s_base(gateway.k8s.as_ref()), subtree(gateway_values, name)),
            );
        }
    }

    HelmAppSpec {
        components,
        global_values: build_global_values(spec),
        repo: HelmRepo {
            url: config.charts_repo_url.clone(),
            name: None,
        },
    }
}

/// Map a HelmApp phase to the reported IstioOperator health.
///
/// `None` means the HelmApp or its status does not exist yet.
pub fn map_phase(phase: Option<Phase>) -> IopHealth {
    match phase {
        None => IopHealth::Reconciling,
        Some(Phase::Unknown) => IopHealth::None,
        Some(Phase::Succeeded) => IopHealth::Healthy,
        Some(Phase::Failed) => IopHealth::Error,
        Some(Phase::Reconciling) | Some(Phase::Deleting) => IopHealth::Reconciling,
    }
}

enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
    Unmanaged,
}

fn is_managed(app: &HelmApp) -> bool {
    app.labels().get(MANAGED_LABEL).map(String::as_str) == Some(MANAGED_LABEL_VALUE)
}

#[derive(Debug, PartialEq, Eq)]
enum DeleteDecision {
    Delete,
    SkipUnmanaged,
    Absent,
}

fn delete_decision(existing: Option<&HelmApp>) -> DeleteDecision {
    match existing {
        Some(app) if is_managed(app) => DeleteDecision::Delete,
        Some(_) => DeleteDecision::SkipUnmanaged,
        None => DeleteDecision::Absent,
    }
}

async fn upsert_helm_app(
    api: &Api<HelmApp>,
    name: &str,
    labels: &BTreeMap<String, String>,
    spec: &HelmAppSpec,
) -> Result<UpsertOutcome, Error> {
    match api.get_opt(name).await? {
        None => {
            let mut app = HelmApp::new(name, spec.clone());
            app.metadata.labels = Some(labels.clone());
            api.create(&PostParams::default(), &app).await?;
            Ok(UpsertOutcome::Created)
        }
        Some(mut existing) => {
            if !is_managed(&existing) {
                return Ok(UpsertOutcome::Unmanaged);
            }

            let labels_current = labels
                .iter()
                .all(|(k, v)| existing.labels().get(k) == Some(v));
            if labels_current && existing.spec == *spec {
                return Ok(UpsertOutcome::Unchanged);
            }

            let mut merged_labels = existing.labels().clone();
            merged_labels.extend(labels.clone());
            existing.metadata.labels = Some(merged_labels);
            existing.spec = spec.clone();
            existing.metadata.managed_fields = None;
            api.replace(name, &PostParams::default(), &existing).await?;
            Ok(UpsertOutcome::Updated)
        }
    }
}

/// Delete the backing HelmApp, but only when it is one of ours.
async fn delete_managed_helm_app(api: &Api<HelmApp>, name: &str) -> Result<(), Error> {
    let existing = api.get_opt(name).await?;
    match delete_decision(existing.as_ref()) {
        DeleteDecision::Delete => {
            api.delete(name, &DeleteParams::default()).await?;
            info!(app = %name, "deleted managed HelmApp");
        }
        DeleteDecision::SkipUnmanaged => {
            warn!(app = %name, "HelmApp with same name is not managed, leaving it alone");
        }
        DeleteDecision::Absent => {}
    }
    Ok(())
}

async fn ensure_finalizer(api: &Api<IstioOperator>, iop: &IstioOperator) -> Result<(), Error> {
    if iop.finalizers().iter().any(|f| f == IOP_FINALIZER) {
        return Ok(());
    }
    let mut finalizers = iop.finalizers().to_vec();
    finalizers.push(IOP_FINALIZER.to_string());
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &iop.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn remove_finalizer(api: &Api<IstioOperator>, iop: &IstioOperator) -> Result<(), Error> {
    let finalizers: Vec<&String> = iop
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != IOP_FINALIZER)
        .collect();
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(
        &iop.name_any(),
        &PatchParams::default(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

async fn patch_iop_status(
    api: &Api<IstioOperator>,
    name: &str,
    status: &IstioOperatorStatus,
) -> Result<(), Error> {
    let patch = json!({"status": status});
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

/// Reconcile one IstioOperator.
pub async fn reconcile(iop: Arc<IstioOperator>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = iop.name_any();
    let namespace = iop.namespace().unwrap_or_default();
    let iops: Api<IstioOperator> = Api::namespaced(ctx.client.clone(), &namespace);
    let apps: Api<HelmApp> = Api::namespaced(ctx.client.clone(), &namespace);

    if iop.metadata.deletion_timestamp.is_some() {
        delete_managed_helm_app(&apps, &name).await?;
        remove_finalizer(&iops, &iop).await?;
        info!(iop = %name, "deletion complete, finalizer removed");
        return Ok(Action::await_change());
    }

    ensure_finalizer(&iops, &iop).await?;

    let profile = ctx.profiles.load(iop.spec.profile_name())?;
    let effective = merge_with_profile(&profile, &iop.spec)?;
    let app_spec = project(&effective, &ctx.config);
    let labels = managed_labels(&name);

    match upsert_helm_app(&apps, &name, &labels, &app_spec).await? {
        UpsertOutcome::Created => info!(iop = %name, "created HelmApp"),
        UpsertOutcome::Updated => info!(iop = %name, "updated HelmApp"),
        UpsertOutcome::Unchanged => debug!(iop = %name, "HelmApp up to date"),
        UpsertOutcome::Unmanaged => {
            warn!(iop = %name, "HelmApp exists but is not managed, refusing to overwrite");
            let status = IstioOperatorStatus {
                status: IopHealth::Error,
                message: Some(format!(
                    "HelmApp {name} already exists and is not managed by this operator"
                )),
            };
            if iop.status.as_ref() != Some(&status) {
                patch_iop_status(&iops, &name, &status).await?;
            }
            return Ok(Action::requeue(ctx.config.long_requeue));
        }
    }

    let phase = apps
        .get_opt(&name)
        .await?
        .and_then(|app| app.status.map(|s| s.phase));
    let health = map_phase(phase);
    let status = IstioOperatorStatus {
        status: health,
        message: None,
    };
    if iop.status.as_ref() != Some(&status) {
        patch_iop_status(&iops, &name, &status).await?;
    }

    debug!(iop = %name, health = %health, "translated");
    match health {
        IopHealth::Healthy => Ok(Action::await_change()),
        IopHealth::Error => Ok(Action::requeue(ctx.config.long_requeue)),
        IopHealth::Reconciling | IopHealth::None => Ok(Action::requeue(ctx.config.short_requeue)),
    }
}

/// Requeue policy when [`reconcile`] itself returns an error.
pub fn error_policy(iop: Arc<IstioOperator>, error: &Error, ctx: Arc<Context>) -> Action {
    warn!(iop = %iop.name_any(), error = %error, "translation failed");
    Action::requeue(ctx.config.long_requeue)
}
