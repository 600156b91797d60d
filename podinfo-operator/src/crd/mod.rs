//! Custom Resource Definitions for the podinfo operator.
//!
//! - [`MyAppResource`]: a podinfo deployment with an optional Redis cache

mod app;

pub use app::{
    CacheSpec, ImageSpec, MyAppResource, MyAppResourceSpec, MyAppResourceStatus, ResourceSpec,
    UiSpec,
};
