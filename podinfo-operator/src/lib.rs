//! podinfo Kubernetes Operator
//!
//! This crate reconciles `MyAppResource` custom resources into the objects
//! that run podinfo:
//!
//! - a podinfo Deployment and Service named after the resource
//! - when `cache.enabled` is set, a Redis Deployment and Service named
//!   `<name>-cache`, wired into podinfo through `PODINFO_CACHE_SERVER`
//!
//! `status.ready` reports whether the podinfo Deployment has as many ready
//! replicas as `replicaCount` asks for.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: podinfo.podinfo.com/v1alpha1
//! kind: MyAppResource
//! metadata:
//!   name: web
//! spec:
//!   replicaCount: 2
//!   image:
//!     repository: ghcr.io/stefanprodan/podinfo
//!     tag: latest
//!   ui:
//!     color: "#34577c"
//!     message: hello
//!   resources:
//!     cpuRequest: 100m
//!     memoryLimit: 64Mi
//!   cache:
//!     enabled: true
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod registry;
pub mod resources;

pub use crd::{MyAppResource, MyAppResourceSpec, MyAppResourceStatus};
pub use error::{OperatorError, OperatorResult};
