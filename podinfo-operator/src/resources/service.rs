//! Service builders for the podinfo workload and its Redis cache.

use super::deployment::{GRPC_PORT, HTTP_PORT};
use super::identity::{selector_labels, ParentIdentity, CACHE_PORT};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Desired podinfo Service: `http` 9898 and `grpc` 9999.
pub fn build_primary_service(parent: &ParentIdentity) -> Service {
    let name = parent.primary_name();
    service(
        parent,
        &name,
        vec![
            service_port("http", HTTP_PORT),
            service_port("grpc", GRPC_PORT),
        ],
    )
}

/// Desired Redis Service: `redis` 6379, named `<parent>-cache`.
pub fn build_cache_service(parent: &ParentIdentity) -> Service {
    let name = parent.cache_name();
    service(parent, &name, vec![service_port("redis", CACHE_PORT)])
}

fn service(parent: &ParentIdentity, name: &str, ports: Vec<ServicePort>) -> Service {
    Service {
        metadata: parent.child_metadata(name),
        spec: Some(ServiceSpec {
            ports: Some(ports),
            selector: Some(selector_labels(name)),
            ..Default::default()
        }),
        status: None,
    }
}

fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::String(name.to_string())),
        ..Default::default()
    }
}
