//! Kubernetes controller for MyAppResource.
//!
//! - [`AppController`]: drives one MyAppResource's children toward its spec
//! - [`error_policy`]: requeue policy for failed passes
//!
//! # Usage with kube-runtime
//!
//! ```ignore
//! use podinfo_operator::client::ObjectKey;
//! use podinfo_operator::controller::{AppController, error_policy};
//!
//! Controller::new(apps, watcher_config)
//!     .run(|app, ctx| async move {
//!         let controller = AppController::new(ctx.clone());
//!         controller.reconcile(&ObjectKey::of(app.as_ref())).await.map(Action::from)
//!     }, error_policy, context)
//!     .for_each(|_| futures::future::ready(()))
//!     .await;
//! ```

mod app;
pub mod diff;
pub mod status;

pub use app::AppController;

use crate::client::ClusterClient;
use crate::config::OperatorConfig;
use crate::crd::MyAppResource;
use crate::error::OperatorError;
use crate::registry::ResourceRegistry;
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;

/// Shared context for controllers.
pub struct ControllerContext {
    /// Cluster client.
    pub client: Arc<dyn ClusterClient>,
    /// Registered kinds, used for ownership references.
    pub registry: Arc<ResourceRegistry>,
    /// Operator configuration.
    pub config: OperatorConfig,
}

impl ControllerContext {
    /// Create a new controller context.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        registry: Arc<ResourceRegistry>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }
}

/// Result type for reconciliation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(Duration),
    /// Don't requeue (reconciliation complete).
    Done,
}

impl ReconcileAction {
    /// Whether another pass was requested.
    pub fn requeue_requested(&self) -> bool {
        matches!(self, Self::Requeue(_))
    }
}

impl From<ReconcileAction> for kube::runtime::controller::Action {
    fn from(action: ReconcileAction) -> Self {
        match action {
            ReconcileAction::Requeue(after) => Self::requeue(after),
            ReconcileAction::Done => Self::await_change(),
        }
    }
}

/// Where a single reconcile pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The parent does not exist; nothing was done.
    Absent,
    /// The parent is being deleted and explicit cleanup ran.
    ChildrenRemoved,
    /// Children were written and the parent reports ready.
    Converged,
    /// Children were written but the parent is not ready yet.
    AwaitingConvergence,
}

impl PassOutcome {
    /// Map the outcome to a requeue decision.
    pub fn action(self, config: &OperatorConfig) -> ReconcileAction {
        match self {
            PassOutcome::AwaitingConvergence => ReconcileAction::Requeue(config.requeue_interval),
            PassOutcome::Absent | PassOutcome::ChildrenRemoved | PassOutcome::Converged => {
                ReconcileAction::Done
            }
        }
    }
}

/// Handle errors during reconciliation.
pub fn error_policy(
    app: Arc<MyAppResource>,
    error: &OperatorError,
    ctx: Arc<ControllerContext>,
) -> kube::runtime::controller::Action {
    if error.is_retryable() {
        tracing::warn!(name = %app.name_any(), error = %error, "Reconciliation failed, will retry");
    } else {
        tracing::error!(name = %app.name_any(), error = %error, "Reconciliation error");
    }
    kube::runtime::controller::Action::requeue(ctx.config.error_requeue_interval)
}
