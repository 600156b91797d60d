//! Child resource builders.
//!
//! Pure functions from a [`MyAppResourceSpec`] and a [`ParentIdentity`] to
//! the desired shape of each child. Same input, structurally equal output:
//! no timestamps, no randomness, and only ordered maps.

mod deployment;
mod identity;
mod service;

pub use deployment::{
    build_cache_deployment, build_primary_deployment, CACHE_IMAGE, CACHE_SERVER_ENV, GRPC_PORT,
    HTTP_PORT, METRICS_PORT, UI_COLOR_ENV, UI_MESSAGE_ENV,
};
pub use identity::{
    selector_labels, ParentIdentity, CACHE_NAME_SUFFIX, CACHE_PORT, INSTANCE_LABEL,
    MANAGED_BY, MANAGED_BY_LABEL, NAME_LABEL,
};
pub use service::{build_cache_service, build_primary_service};

use crate::crd::MyAppResourceSpec;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Service};

/// Role a container plays inside a pod template.
///
/// Containers are always located by role, never by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRole {
    /// The podinfo application container.
    Main,
    /// The Redis cache container.
    Cache,
}

impl ContainerRole {
    /// Container name used for this role.
    pub fn container_name(self) -> &'static str {
        match self {
            ContainerRole::Main => "podinfo",
            ContainerRole::Cache => "redis",
        }
    }
}

/// Find the container playing `role` in a Deployment's pod template.
pub fn find_container(deployment: &Deployment, role: ContainerRole) -> Option<&Container> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == role.container_name())
}

/// The cache Deployment and Service, present iff the cache is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheChildren {
    /// Redis Deployment.
    pub deployment: Deployment,
    /// Redis Service.
    pub service: Service,
}

/// Every child one parent should own.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredChildren {
    /// podinfo Deployment.
    pub deployment: Deployment,
    /// podinfo Service.
    pub service: Service,
    /// Cache children, when `spec.cache.enabled`.
    pub cache: Option<CacheChildren>,
}

impl DesiredChildren {
    /// Build the full desired child set.
    pub fn build(spec: &MyAppResourceSpec, parent: &ParentIdentity) -> Self {
        Self {
            deployment: build_primary_deployment(spec, parent),
            service: build_primary_service(parent),
            cache: spec.cache.enabled.then(|| CacheChildren {
                deployment: build_cache_deployment(spec, parent),
                service: build_cache_service(parent),
            }),
        }
    }
}
