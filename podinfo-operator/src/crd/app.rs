//! MyAppResource Custom Resource Definition.
//!
//! Declares the desired state of one podinfo deployment with an optional
//! Redis cache.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MyAppResource is the Schema for the myappresources API.
///
/// The operator derives a Deployment and a Service named after the resource,
/// plus a `<name>-cache` Deployment and Service when the cache is enabled.
#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "podinfo.podinfo.com",
    version = "v1alpha1",
    kind = "MyAppResource",
    plural = "myappresources",
    shortname = "myapp",
    namespaced,
    status = "MyAppResourceStatus",
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicaCount"}"#,
    printcolumn = r#"{"name":"Cache", "type":"boolean", "jsonPath":".spec.cache.enabled"}"#,
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MyAppResourceSpec {
    /// Number of podinfo replicas to run.
    #[schemars(range(min = 0))]
    pub replica_count: i32,

    /// Image to run.
    pub image: ImageSpec,

    /// User interface options.
    #[serde(default)]
    pub ui: UiSpec,

    /// Resources for the podinfo container.
    pub resources: ResourceSpec,

    /// Optional Redis cache.
    #[serde(default)]
    pub cache: CacheSpec,
}

/// Container image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Repository to pull from.
    pub repository: String,

    /// Image tag.
    pub tag: String,
}

impl ImageSpec {
    /// `repository:tag`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// UI options handed to podinfo through its environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UiSpec {
    /// Background color.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub color: String,

    /// Greeting message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// CPU request and memory limit for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// CPU request (e.g. "100m").
    pub cpu_request: String,

    /// Memory limit (e.g. "64Mi").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
}

/// Redis cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheSpec {
    /// Run a Redis cache next to podinfo.
    #[serde(default)]
    pub enabled: bool,

    /// Resources for the Redis container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

/// MyAppResource status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MyAppResourceStatus {
    /// True iff the podinfo Deployment reports as many ready replicas as desired.
    #[serde(default)]
    pub ready: bool,
}
