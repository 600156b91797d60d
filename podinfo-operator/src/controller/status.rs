//! Readiness propagation onto the MyAppResource status.

use crate::client::ClusterClient;
use crate::crd::{MyAppResource, MyAppResourceStatus};
use crate::error::OperatorResult;
use k8s_openapi::api::apps::v1::Deployment;

/// Ready replicas the Deployment reports, zero when it reports none.
pub fn observed_ready_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0)
}

/// `ready` is true iff observed ready replicas equal the desired count.
pub fn compute_status(app: &MyAppResource, observed: &Deployment) -> MyAppResourceStatus {
    MyAppResourceStatus {
        ready: observed_ready_replicas(observed) == app.spec.replica_count,
    }
}

/// Compute readiness from `observed` and write it onto the parent status.
///
/// The write is guarded by the resource version `app` was read at; a
/// concurrent change to the parent surfaces as a conflict.
pub async fn propagate_status(
    client: &dyn ClusterClient,
    app: &MyAppResource,
    observed: &Deployment,
) -> OperatorResult<bool> {
    let status = compute_status(app, observed);
    let ready = status.ready;

    tracing::debug!(
        name = %app.metadata.name.as_deref().unwrap_or_default(),
        found = observed_ready_replicas(observed),
        desired = app.spec.replica_count,
        ready,
        "Propagating readiness"
    );

    let mut updated = app.clone();
    updated.status = Some(status);
    client.update_app_status(&updated).await?;

    Ok(ready)
}
