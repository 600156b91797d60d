//! Names and labels of the children owned by one MyAppResource.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

/// Suffix appended to the parent name for the cache Deployment and Service.
pub const CACHE_NAME_SUFFIX: &str = "-cache";

/// Port the cache Service exposes.
pub const CACHE_PORT: i32 = 6379;

/// Label selecting the pods of one child workload.
pub const NAME_LABEL: &str = "app.kubernetes.io/name";

/// Label naming the parent a child belongs to.
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label marking objects written by this operator.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`].
pub const MANAGED_BY: &str = "podinfo-operator";

const CLUSTER_DOMAIN: &str = "cluster.local";

/// The parent data child builders see besides the `MyAppResourceSpec`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentIdentity {
    /// Parent name.
    pub name: String,
    /// Namespace the children are written to.
    pub namespace: String,
    /// Parent UID.
    pub uid: String,
    /// Controller back-reference stamped on every child.
    pub owner_reference: OwnerReference,
}

impl ParentIdentity {
    /// Name of the primary Deployment and Service.
    pub fn primary_name(&self) -> String {
        self.name.clone()
    }

    /// Name of the cache Deployment and Service.
    pub fn cache_name(&self) -> String {
        format!("{}{}", self.name, CACHE_NAME_SUFFIX)
    }

    /// Cluster-local address of the cache Service.
    pub fn cache_endpoint_url(&self) -> String {
        format!(
            "tcp://{}.{}.svc.{}:{}",
            self.cache_name(),
            self.namespace,
            CLUSTER_DOMAIN,
            CACHE_PORT
        )
    }

    /// Metadata for a child called `name`.
    pub(crate) fn child_metadata(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.namespace.clone()),
            labels: Some(self.child_labels(name)),
            owner_references: Some(vec![self.owner_reference.clone()]),
            ..Default::default()
        }
    }

    /// Selector labels plus the instance and managed-by labels.
    pub fn child_labels(&self, name: &str) -> BTreeMap<String, String> {
        let mut labels = selector_labels(name);
        labels.insert(INSTANCE_LABEL.to_string(), self.name.clone());
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
        labels
    }
}

/// Labels a workload's selector matches its pods on.
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_string(), name.to_string())])
}
