//! podinfo Kubernetes operator binary.
//!
//! Watches MyAppResource objects in one namespace and reconciles each into
//! its podinfo Deployment and Service plus the optional Redis cache.

use clap::{Parser, ValueEnum};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use podinfo_operator::client::{KubeClusterClient, ObjectKey};
use podinfo_operator::config::{OperatorConfig, UpdatePolicy};
use podinfo_operator::controller::{error_policy, AppController, ControllerContext};
use podinfo_operator::crd::MyAppResource;
use podinfo_operator::registry::ResourceRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

/// Reconciles MyAppResource objects into podinfo workloads.
///
/// Settings come from the `PODINFO_*` environment variables read by
/// [`OperatorConfig::from_env`]; flags given here override them.
#[derive(Parser, Debug)]
#[command(name = "podinfo-operator")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace to watch and write children into
    #[arg(long)]
    namespace: Option<String>,

    /// Seconds before re-checking a parent that is not ready yet
    #[arg(long)]
    requeue_secs: Option<u64>,

    /// Seconds before retrying a failed pass
    #[arg(long)]
    error_requeue_secs: Option<u64>,

    /// How existing children are updated: replace or skip-unchanged
    #[arg(long)]
    update_policy: Option<UpdatePolicy>,

    /// Extra whole-pass attempts after a write conflict
    #[arg(long)]
    conflict_retries: Option<u32>,

    /// Log output format
    #[arg(long, env = "PODINFO_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Print the CRD as YAML and exit
    #[arg(long)]
    generate_crds: bool,
}

impl Args {
    fn operator_config(&self) -> anyhow::Result<OperatorConfig> {
        let mut config = OperatorConfig::from_env()?;
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(secs) = self.requeue_secs {
            config.requeue_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.error_requeue_secs {
            config.error_requeue_interval = Duration::from_secs(secs);
        }
        if let Some(policy) = self.update_policy {
            config.update_policy = policy;
        }
        if let Some(retries) = self.conflict_retries {
            config.max_conflict_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_crds {
        return generate_crds();
    }

    init_tracing(args.log_format)?;
    tracing::info!("Starting podinfo operator");

    let config = args.operator_config()?;

    let client = Client::try_default().await?;
    tracing::info!(namespace = %config.namespace, "Connected to Kubernetes cluster");

    let registry = Arc::new(ResourceRegistry::new());
    let ctx = Arc::new(ControllerContext::new(
        Arc::new(KubeClusterClient::new(client.clone())),
        registry,
        config.clone(),
    ));

    run_controller(client, &config.namespace, ctx).await
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("podinfo_operator=info".parse()?)
        .add_directive("kube=info".parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Run the MyAppResource controller until a shutdown signal arrives.
async fn run_controller(
    client: Client,
    namespace: &str,
    ctx: Arc<ControllerContext>,
) -> anyhow::Result<()> {
    tracing::info!("Starting MyAppResource controller");

    let apps: Api<MyAppResource> = Api::namespaced(client.clone(), namespace);
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), namespace);
    let services: Api<Service> = Api::namespaced(client, namespace);
    let controller = AppController::new(ctx.clone());

    Controller::new(apps, WatcherConfig::default())
        .owns(deployments, WatcherConfig::default())
        .owns(services, WatcherConfig::default())
        .shutdown_on_signal()
        .run(
            move |app, _ctx| {
                let controller = controller.clone();
                async move {
                    let key = ObjectKey::of(app.as_ref());
                    controller.reconcile(&key).await.map(Action::from)
                }
            },
            error_policy,
            ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(
                        name = %obj.name,
                        namespace = ?obj.namespace,
                        ?action,
                        "Reconciled MyAppResource"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "MyAppResource controller stream error");
                }
            }
        })
        .await;

    tracing::info!("Controller shut down");
    Ok(())
}

/// Print the CRD YAML.
fn generate_crds() -> anyhow::Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(&MyAppResource::crd())?);
    Ok(())
}
