//! Phase aggregation rules exercised through the public API.

use helmop::calculate_phase;
use helmop::crd::{
    HelmComponentStatus, Phase, RELEASE_STATUS_DEPLOYED, RELEASE_STATUS_FAILED,
    RELEASE_STATUS_UNKNOWN,
};

fn status(name: &str, health: &str) -> HelmComponentStatus {
    HelmComponentStatus {
        name: name.to_string(),
        version: "1".to_string(),
        status: health.to_string(),
        ..Default::default()
    }
}

#[test]
fn empty_status_list_is_unknown() {
    assert_eq!(calculate_phase(&[], false), Phase::Unknown);
}

#[test]
fn deletion_dominates_everything() {
    assert_eq!(calculate_phase(&[], true), Phase::Deleting);
    assert_eq!(
        calculate_phase(&[status("a", RELEASE_STATUS_FAILED)], true),
        Phase::Deleting
    );
    assert_eq!(
        calculate_phase(&[status("a", RELEASE_STATUS_DEPLOYED)], true),
        Phase::Deleting
    );
}

#[test]
fn any_failed_component_fails_the_app() {
    let components = [
        status("a", RELEASE_STATUS_DEPLOYED),
        status("b", RELEASE_STATUS_FAILED),
        status("c", RELEASE_STATUS_DEPLOYED),
    ];
    assert_eq!(calculate_phase(&components, false), Phase::Failed);
}

#[test]
fn all_deployed_means_succeeded() {
    let components = [
        status("a", RELEASE_STATUS_DEPLOYED),
        status("b", RELEASE_STATUS_DEPLOYED),
    ];
    assert_eq!(calculate_phase(&components, false), Phase::Succeeded);
}

#[test]
fn partial_progress_is_reconciling() {
    let components = [
        status("a", RELEASE_STATUS_DEPLOYED),
        status("b", RELEASE_STATUS_UNKNOWN),
    ];
    assert_eq!(calculate_phase(&components, false), Phase::Reconciling);

    let components = [status("a", "pending-install")];
    assert_eq!(calculate_phase(&components, false), Phase::Reconciling);
}

#[test]
fn phase_is_recomputed_from_scratch() {
    // A previously failed set becomes Succeeded once every entry reports
    // deployed; no sticky state.
    let before = [
        status("a", RELEASE_STATUS_DEPLOYED),
        status("b", RELEASE_STATUS_FAILED),
    ];
    assert_eq!(calculate_phase(&before, false), Phase::Failed);

    let after = [
        status("a", RELEASE_STATUS_DEPLOYED),
        status("b", RELEASE_STATUS_DEPLOYED),
    ];
    assert_eq!(calculate_phase(&after, false), Phase::Succeeded);
}
