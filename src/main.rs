//! helmop - a level-triggered Helm application operator
//!
//! Runs two controllers: one reconciling HelmApps against installed Helm
//! releases, one translating IstioOperators into managed HelmApps.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use tracing::{debug, info, warn};

use helmop::config::OperatorConfig;
use helmop::controller::helm_app::DynamicAdopter;
use helmop::controller::{Context, helm_app, istio_operator};
use helmop::crd::{HelmApp, IstioOperator};
use helmop::helm::HelmCli;
use helmop::profiles::ProfileStore;

/// Level-triggered Helm application operator
#[derive(Parser, Debug)]
#[command(name = "helmop")]
#[command(about = "Reconciles HelmApps and translates IstioOperators", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Directory profiles are loaded from
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Chart repository URL for translated HelmApps
    #[arg(long)]
    charts_repo: Option<String>,

    /// Watch a single namespace instead of all namespaces
    #[arg(long)]
    namespace: Option<String>,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "helmop=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();
}

fn build_config(args: &Args) -> OperatorConfig {
    let mut config = OperatorConfig::from_env();
    if let Some(dir) = &args.profiles_dir {
        config.profiles_dir = dir.clone();
    }
    if let Some(repo) = &args.charts_repo {
        config.charts_repo_url = repo.clone();
    }
    if let Some(ns) = &args.namespace {
        config.watch_namespace = Some(ns.clone());
    }
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = build_config(&args);
    info!(
        profiles_dir = %config.profiles_dir.display(),
        charts_repo = %config.charts_repo_url,
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        "starting helmop"
    );

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let ctx = Arc::new(Context {
        client: client.clone(),
        helm: Arc::new(HelmCli::new(config.helm_timeout)),
        adopter: Arc::new(DynamicAdopter::new(client.clone())),
        profiles: ProfileStore::new(config.profiles_dir.clone()),
        config,
    });

    let apps: Api<HelmApp> = match &ctx.config.watch_namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let iops: Api<IstioOperator> = match &ctx.config.watch_namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    let helm_app_controller = Controller::new(apps, watcher::Config::default())
        .shutdown_on_signal()
        .run(helm_app::reconcile, helm_app::error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(app = %obj.name, "reconciled HelmApp"),
                Err(e) => warn!(error = %e, "HelmApp reconcile error"),
            }
        });

    let iop_controller = Controller::new(iops, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            istio_operator::reconcile,
            istio_operator::error_policy,
            ctx.clone(),
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(iop = %obj.name, "reconciled IstioOperator"),
                Err(e) => warn!(error = %e, "IstioOperator reconcile error"),
            }
        });

    tokio::join!(helm_app_controller, iop_controller);

    info!("controllers stopped");
    Ok(())
}
