//! Replace preparation and drift detection for existing children.

use crate::error::OperatorResult;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use serde::Serialize;
use serde_json::Value;

/// Desired Deployment ready to replace `observed`.
///
/// Only `metadata.resourceVersion` is copied, so the API server can reject
/// the write if the object moved on since it was read.
pub fn deployment_replacement(desired: &Deployment, observed: &Deployment) -> Deployment {
    let mut replacement = desired.clone();
    replacement.metadata.resource_version = observed.metadata.resource_version.clone();
    replacement
}

/// Desired Service ready to replace `observed`.
///
/// Copies `metadata.resourceVersion` and the allocated cluster IPs, which
/// are immutable once assigned.
pub fn service_replacement(desired: &Service, observed: &Service) -> Service {
    let mut replacement = desired.clone();
    replacement.metadata.resource_version = observed.metadata.resource_version.clone();

    if let (Some(spec), Some(observed_spec)) = (replacement.spec.as_mut(), observed.spec.as_ref()) {
        spec.cluster_ip = observed_spec.cluster_ip.clone();
        spec.cluster_ips = observed_spec.cluster_ips.clone();
    }
    replacement
}

/// Whether every field set on `desired` already holds on `observed`.
///
/// Fields the API server defaults or the platform manages (status,
/// resourceVersion, protocol defaults) are ignored because the builders
/// never set them.
pub fn already_converged<T: Serialize>(desired: &T, observed: &T) -> OperatorResult<bool> {
    let desired = serde_json::to_value(desired)?;
    let observed = serde_json::to_value(observed)?;
    Ok(is_subset(&desired, &observed))
}

fn is_subset(desired: &Value, observed: &Value) -> bool {
    match (desired, observed) {
        (Value::Object(d), Value::Object(o)) => d.iter().all(|(key, dv)| match o.get(key) {
            Some(ov) => is_subset(dv, ov),
            None => is_empty(dv),
        }),
        (Value::Array(d), Value::Array(o)) => {
            d.len() == o.len() && d.iter().zip(o).all(|(dv, ov)| is_subset(dv, ov))
        }
        (d, o) => d == o,
    }
}

// The API server drops empty strings and collections on the way in.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;

    #[test]
    fn subset_ignores_server_defaults() {
        let desired = json!({ "spec": { "ports": [{ "name": "http", "port": 9898 }] } });
        let observed = json!({
            "metadata": { "resourceVersion": "7" },
            "spec": { "ports": [{ "name": "http", "port": 9898, "protocol": "TCP" }], "type": "ClusterIP" }
        });
        assert!(is_subset(&desired, &observed));
    }

    #[test]
    fn subset_detects_changed_and_removed_entries() {
        let desired = json!({ "spec": { "replicas": 3 } });
        assert!(!is_subset(&desired, &json!({ "spec": { "replicas": 2 } })));
        assert!(!is_subset(&desired, &json!({ "spec": {} })));

        let desired = json!({ "containers": [{ "name": "podinfo" }] });
        let observed = json!({ "containers": [{ "name": "podinfo" }, { "name": "redis" }] });
        assert!(!is_subset(&desired, &observed));
    }

    #[test]
    fn empty_env_value_matches_missing_field() {
        let desired = json!({ "env": [{ "name": "PODINFO_UI_COLOR", "value": "" }] });
        let observed = json!({ "env": [{ "name": "PODINFO_UI_COLOR" }] });
        assert!(is_subset(&desired, &observed));
    }

    #[test]
    fn service_replacement_keeps_cluster_ip() {
        let desired = Service {
            metadata: ObjectMeta {
                name: Some("web".into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec::default()),
            status: None,
        };
        let observed = Service {
            metadata: ObjectMeta {
                name: Some("web".into()),
                resource_version: Some("42".into()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: Some("10.96.0.10".into()),
                cluster_ips: Some(vec!["10.96.0.10".into()]),
                ..Default::default()
            }),
            status: None,
        };

        let replacement = service_replacement(&desired, &observed);
        assert_eq!(replacement.metadata.resource_version.as_deref(), Some("42"));
        assert_eq!(
            replacement.spec.and_then(|s| s.cluster_ip),
            Some("10.96.0.10".to_string())
        );
    }
}
