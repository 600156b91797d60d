//! Resource kind registry.
//!
//! Built once at start-up and handed to the controller behind an `Arc`.
//! Holds the API coordinates of the parent kind and derives the ownership
//! back-references stamped on every child from them.

use crate::crd::MyAppResource;
use crate::error::{OperatorError, OperatorResult};
use crate::resources::ParentIdentity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

/// API coordinates of one registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredKind {
    /// API group; empty for the core group.
    pub group: String,
    /// API version.
    pub version: String,
    /// Kind name.
    pub kind: String,
}

impl RegisteredKind {
    fn of<K: Resource<DynamicType = ()>>() -> Self {
        Self {
            group: K::group(&()).into_owned(),
            version: K::version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
        }
    }

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Immutable registry of the parent kind this operator reconciles.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    parent: RegisteredKind,
}

impl ResourceRegistry {
    /// Register the MyAppResource kind.
    pub fn new() -> Self {
        Self {
            parent: RegisteredKind::of::<MyAppResource>(),
        }
    }

    /// The parent kind.
    pub fn parent(&self) -> &RegisteredKind {
        &self.parent
    }

    /// Controller back-reference from a child to `app`.
    pub fn owner_reference(&self, app: &MyAppResource) -> OperatorResult<OwnerReference> {
        let name = app.metadata.name.clone().ok_or_else(|| self.invalid(app, "missing name"))?;
        let uid = app.uid().ok_or_else(|| self.invalid(app, "missing uid"))?;

        Ok(OwnerReference {
            api_version: self.parent.api_version(),
            kind: self.parent.kind.clone(),
            name,
            uid,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }

    /// Identity the child builders derive names, labels and ownership from.
    pub fn parent_identity(
        &self,
        app: &MyAppResource,
        target_namespace: &str,
    ) -> OperatorResult<ParentIdentity> {
        let owner_reference = self.owner_reference(app)?;
        Ok(ParentIdentity {
            name: owner_reference.name.clone(),
            namespace: target_namespace.to_string(),
            uid: owner_reference.uid.clone(),
            owner_reference,
        })
    }

    fn invalid(&self, app: &MyAppResource, message: &str) -> OperatorError {
        OperatorError::Invalid {
            kind: self.parent.kind.clone(),
            name: app.name_any(),
            message: message.to_string(),
        }
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
