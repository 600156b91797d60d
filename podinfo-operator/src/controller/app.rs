//! MyAppResource controller.
//!
//! Reconciles a MyAppResource into its podinfo Deployment and Service and,
//! when enabled, a Redis cache Deployment and Service.

use super::diff::{already_converged, deployment_replacement, service_replacement};
use super::status::propagate_status;
use super::{ControllerContext, PassOutcome, ReconcileAction};
use crate::client::ObjectKey;
use crate::config::UpdatePolicy;
use crate::crd::MyAppResource;
use crate::error::{ignore_not_found, OperatorError, OperatorResult};
use crate::resources::{DesiredChildren, ParentIdentity};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use std::sync::Arc;

/// Controller for MyAppResource resources.
#[derive(Clone)]
pub struct AppController {
    ctx: Arc<ControllerContext>,
}

impl AppController {
    /// Create a new controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile the MyAppResource at `key`.
    ///
    /// Runs one pass and turns its outcome into a requeue decision. A
    /// conflict re-runs the whole pass up to `max_conflict_retries` times
    /// before it is returned.
    pub async fn reconcile(&self, key: &ObjectKey) -> OperatorResult<ReconcileAction> {
        let mut retries = 0;
        loop {
            match self.run_pass(key).await {
                Ok(outcome) => return Ok(outcome.action(&self.ctx.config)),
                Err(e) if e.is_conflict() && retries < self.ctx.config.max_conflict_retries => {
                    retries += 1;
                    tracing::warn!(
                        key = %key,
                        attempt = retries,
                        error = %e,
                        "Conflict during reconcile, re-running pass"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run a single reconcile pass.
    ///
    /// 1. Load the parent; a missing parent ends the pass
    /// 2. On deletion, remove the cache children and stop
    /// 3. Create or replace the podinfo Deployment
    /// 4. Create or replace the podinfo Service
    /// 5. Create or replace the cache children, or delete them when disabled
    /// 6. Write readiness onto the parent status
    pub async fn run_pass(&self, key: &ObjectKey) -> OperatorResult<PassOutcome> {
        let Some(app) = self.ctx.client.get_app(key).await? else {
            tracing::debug!(key = %key, "MyAppResource not found, nothing to do");
            return Ok(PassOutcome::Absent);
        };

        if key.namespace != self.ctx.config.namespace {
            return Err(OperatorError::Invalid {
                kind: self.ctx.registry.parent().kind.clone(),
                name: key.name.clone(),
                message: format!(
                    "only resources in namespace {} are managed",
                    self.ctx.config.namespace
                ),
            });
        }

        let parent = self
            .ctx
            .registry
            .parent_identity(&app, &self.ctx.config.namespace)?;

        if app.metadata.deletion_timestamp.is_some() {
            return self.handle_deletion(&app, &parent).await;
        }

        tracing::info!(
            name = %parent.name,
            namespace = %parent.namespace,
            replicas = app.spec.replica_count,
            cache = app.spec.cache.enabled,
            "Reconciling MyAppResource"
        );

        let desired = DesiredChildren::build(&app.spec, &parent);

        let observed = self.ensure_deployment(&desired.deployment).await?;
        self.ensure_service(&desired.service).await?;

        match &desired.cache {
            Some(cache) => {
                self.ensure_deployment(&cache.deployment).await?;
                self.ensure_service(&cache.service).await?;
            }
            None => self.remove_cache(&parent).await?,
        }

        let ready = propagate_status(self.ctx.client.as_ref(), &app, &observed).await?;
        if ready {
            tracing::info!(name = %parent.name, "MyAppResource is ready");
            Ok(PassOutcome::Converged)
        } else {
            tracing::debug!(name = %parent.name, "Waiting for replicas to become ready");
            Ok(PassOutcome::AwaitingConvergence)
        }
    }

    /// Children owned through owner references are left to garbage
    /// collection; only the cache pair is removed explicitly.
    async fn handle_deletion(
        &self,
        app: &MyAppResource,
        parent: &ParentIdentity,
    ) -> OperatorResult<PassOutcome> {
        tracing::info!(name = %parent.name, "MyAppResource is being deleted");
        if app.spec.cache.enabled {
            self.remove_cache(parent).await?;
        }
        Ok(PassOutcome::ChildrenRemoved)
    }

    /// Create the Deployment if absent, otherwise replace it.
    ///
    /// Returns the Deployment as observed before the write, or as created.
    async fn ensure_deployment(&self, desired: &Deployment) -> OperatorResult<Deployment> {
        let key = ObjectKey::of(desired);
        let client = &self.ctx.client;

        match client.get_deployment(&key).await? {
            None => {
                tracing::info!(name = %key.name, "Creating Deployment");
                client.create_deployment(desired).await
            }
            Some(existing) => {
                if self.skip_update(desired, &existing)? {
                    tracing::debug!(name = %key.name, "Deployment unchanged, skipping update");
                } else {
                    tracing::debug!(name = %key.name, "Updating existing Deployment");
                    client
                        .update_deployment(&deployment_replacement(desired, &existing))
                        .await?;
                }
                Ok(existing)
            }
        }
    }

    /// Create the Service if absent, otherwise replace it.
    async fn ensure_service(&self, desired: &Service) -> OperatorResult<()> {
        let key = ObjectKey::of(desired);
        let client = &self.ctx.client;

        match client.get_service(&key).await? {
            None => {
                tracing::info!(name = %key.name, "Creating Service");
                client.create_service(desired).await?;
            }
            Some(existing) => {
                if self.skip_update(desired, &existing)? {
                    tracing::debug!(name = %key.name, "Service unchanged, skipping update");
                } else {
                    tracing::debug!(name = %key.name, "Updating existing Service");
                    client
                        .update_service(&service_replacement(desired, &existing))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Delete the cache Deployment and Service; absent objects count as deleted.
    async fn remove_cache(&self, parent: &ParentIdentity) -> OperatorResult<()> {
        let key = ObjectKey::new(parent.namespace.clone(), parent.cache_name());
        let client = &self.ctx.client;

        ignore_not_found(client.delete_deployment(&key).await)?;
        ignore_not_found(client.delete_service(&key).await)?;
        tracing::debug!(name = %key.name, "Cache children absent");
        Ok(())
    }

    fn skip_update<T: serde::Serialize>(&self, desired: &T, existing: &T) -> OperatorResult<bool> {
        match self.ctx.config.update_policy {
            UpdatePolicy::AlwaysReplace => Ok(false),
            UpdatePolicy::SkipUnchanged => already_converged(desired, existing),
        }
    }
}
