//! Deployment builders for the podinfo workload and its Redis cache.

use super::identity::{selector_labels, ParentIdentity, CACHE_PORT};
use super::ContainerRole;
use crate::crd::{MyAppResourceSpec, ResourceSpec};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Redis image run by the cache container.
pub const CACHE_IMAGE: &str = "redis:alpine3.19";

/// Environment variable carrying the podinfo UI color.
pub const UI_COLOR_ENV: &str = "PODINFO_UI_COLOR";

/// Environment variable carrying the podinfo UI message.
pub const UI_MESSAGE_ENV: &str = "PODINFO_UI_MESSAGE";

/// Environment variable pointing podinfo at its cache.
pub const CACHE_SERVER_ENV: &str = "PODINFO_CACHE_SERVER";

/// Port podinfo serves HTTP on.
pub const HTTP_PORT: i32 = 9898;

/// Port podinfo serves Prometheus metrics on.
pub const METRICS_PORT: i32 = 9797;

/// Port podinfo serves gRPC on.
pub const GRPC_PORT: i32 = 9999;

/// Desired podinfo Deployment.
///
/// Carries the podinfo container and, when the cache is enabled, a Redis
/// container plus a `PODINFO_CACHE_SERVER` variable on the podinfo container.
pub fn build_primary_deployment(spec: &MyAppResourceSpec, parent: &ParentIdentity) -> Deployment {
    let name = parent.primary_name();

    let mut env = vec![
        env_var(UI_COLOR_ENV, &spec.ui.color),
        env_var(UI_MESSAGE_ENV, &spec.ui.message),
    ];
    if spec.cache.enabled {
        env.push(env_var(CACHE_SERVER_ENV, &parent.cache_endpoint_url()));
    }

    let mut containers = vec![Container {
        name: ContainerRole::Main.container_name().to_string(),
        image: Some(spec.image.reference()),
        env: Some(env),
        ports: Some(vec![
            container_port("http", HTTP_PORT),
            container_port("http-metrics", METRICS_PORT),
            container_port("grpc", GRPC_PORT),
        ]),
        resources: Some(resource_requirements(&spec.resources)),
        ..Default::default()
    }];
    if spec.cache.enabled {
        containers.push(cache_container(spec));
    }

    deployment(parent, &name, spec.replica_count, containers)
}

/// Desired Redis Deployment, named `<parent>-cache`.
pub fn build_cache_deployment(spec: &MyAppResourceSpec, parent: &ParentIdentity) -> Deployment {
    let name = parent.cache_name();
    deployment(parent, &name, spec.replica_count, vec![cache_container(spec)])
}

fn deployment(
    parent: &ParentIdentity,
    name: &str,
    replicas: i32,
    containers: Vec<Container>,
) -> Deployment {
    Deployment {
        metadata: parent.child_metadata(name),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(parent.child_labels(name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers,
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn cache_container(spec: &MyAppResourceSpec) -> Container {
    Container {
        name: ContainerRole::Cache.container_name().to_string(),
        image: Some(CACHE_IMAGE.to_string()),
        ports: Some(vec![container_port("redis", CACHE_PORT)]),
        resources: spec.cache.resources.as_ref().map(resource_requirements),
        ..Default::default()
    }
}

fn resource_requirements(resources: &ResourceSpec) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([(
            "cpu".to_string(),
            Quantity(resources.cpu_request.clone()),
        )])),
        limits: resources
            .memory_limit
            .as_ref()
            .map(|memory| BTreeMap::from([("memory".to_string(), Quantity(memory.clone()))])),
        ..Default::default()
    }
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}
