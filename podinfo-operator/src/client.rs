//! Orchestration client seam.
//!
//! The reconciler talks to the cluster only through [`ClusterClient`], so a
//! pass can be driven against the real API server or against a fake.

use crate::crd::MyAppResource;
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

#[cfg(test)]
use mockall::automock;

/// Namespace and name of one object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    /// Object namespace.
    pub namespace: String,
    /// Object name.
    pub name: String,
}

impl ObjectKey {
    /// Create a key.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object that carries a name and namespace.
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Get/create/update/delete primitives per resource kind.
///
/// Reads return `Ok(None)` when the object does not exist. Writes and
/// deletes report a missing object as [`OperatorError::NotFound`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Get a MyAppResource.
    async fn get_app(&self, key: &ObjectKey) -> OperatorResult<Option<MyAppResource>>;

    /// Write `app.status`, guarded by `app.metadata.resourceVersion`.
    async fn update_app_status(&self, app: &MyAppResource) -> OperatorResult<MyAppResource>;

    /// Get a Deployment.
    async fn get_deployment(&self, key: &ObjectKey) -> OperatorResult<Option<Deployment>>;

    /// Create a Deployment.
    async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment>;

    /// Replace a Deployment.
    async fn update_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment>;

    /// Delete a Deployment.
    async fn delete_deployment(&self, key: &ObjectKey) -> OperatorResult<()>;

    /// Get a Service.
    async fn get_service(&self, key: &ObjectKey) -> OperatorResult<Option<Service>>;

    /// Create a Service.
    async fn create_service(&self, service: &Service) -> OperatorResult<Service>;

    /// Replace a Service.
    async fn update_service(&self, service: &Service) -> OperatorResult<Service>;

    /// Delete a Service.
    async fn delete_service(&self, key: &ObjectKey) -> OperatorResult<()>;
}

/// [`ClusterClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Wrap a connected client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey) -> OperatorResult<Option<K>>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + fmt::Debug,
    {
        self.api::<K>(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| classify::<K>(key, e))
    }

    async fn create<K>(&self, obj: &K) -> OperatorResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + fmt::Debug,
    {
        let key = ObjectKey::of(obj);
        self.api::<K>(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(&key, e))
    }

    async fn replace<K>(&self, obj: &K) -> OperatorResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Serialize
            + DeserializeOwned
            + fmt::Debug,
    {
        let key = ObjectKey::of(obj);
        self.api::<K>(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify::<K>(&key, e))
    }

    async fn delete<K>(&self, key: &ObjectKey) -> OperatorResult<()>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + fmt::Debug,
    {
        self.api::<K>(&key.namespace)
            .delete(&key.name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| classify::<K>(key, e))
    }
}

fn classify<K: Resource<DynamicType = ()>>(key: &ObjectKey, err: kube::Error) -> OperatorError {
    OperatorError::from_kube(&K::kind(&()), &key.name, &key.namespace, err)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_app(&self, key: &ObjectKey) -> OperatorResult<Option<MyAppResource>> {
        self.get(key).await
    }

    async fn update_app_status(&self, app: &MyAppResource) -> OperatorResult<MyAppResource> {
        let key = ObjectKey::of(app);
        // Merge patch carrying resourceVersion: the API server rejects it with
        // 409 when the parent changed after it was read.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": app.resource_version() },
            "status": app.status,
        });

        self.api::<MyAppResource>(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| classify::<MyAppResource>(&key, e))
    }

    async fn get_deployment(&self, key: &ObjectKey) -> OperatorResult<Option<Deployment>> {
        self.get(key).await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment> {
        self.create(deployment).await
    }

    async fn update_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment> {
        self.replace(deployment).await
    }

    async fn delete_deployment(&self, key: &ObjectKey) -> OperatorResult<()> {
        self.delete::<Deployment>(key).await
    }

    async fn get_service(&self, key: &ObjectKey) -> OperatorResult<Option<Service>> {
        self.get(key).await
    }

    async fn create_service(&self, service: &Service) -> OperatorResult<Service> {
        self.create(service).await
    }

    async fn update_service(&self, service: &Service) -> OperatorResult<Service> {
        self.replace(service).await
    }

    async fn delete_service(&self, key: &ObjectKey) -> OperatorResult<()> {
        self.delete::<Service>(key).await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory [`ClusterClient`] for reconciler tests.
    //!
    //! Tracks resource versions like the API server does, records every
    //! write, and can be told to fail a named operation.

    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    /// One recorded write.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        CreateDeployment(String),
        UpdateDeployment(String),
        DeleteDeployment(String),
        CreateService(String),
        UpdateService(String),
        DeleteService(String),
        UpdateStatus(String),
    }

    #[derive(Default)]
    struct State {
        apps: BTreeMap<ObjectKey, MyAppResource>,
        deployments: BTreeMap<ObjectKey, Deployment>,
        services: BTreeMap<ObjectKey, Service>,
        calls: Vec<Call>,
        failures: HashMap<&'static str, Vec<OperatorError>>,
        next_version: u64,
    }

    impl State {
        fn bump(&mut self) -> String {
            self.next_version += 1;
            self.next_version.to_string()
        }

        fn take_failure(&mut self, op: &'static str) -> OperatorResult<()> {
            match self.failures.get_mut(op).and_then(|queue| queue.pop()) {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    pub struct InMemoryClient {
        state: Mutex<State>,
    }

    fn not_found(kind: &str, key: &ObjectKey) -> OperatorError {
        OperatorError::NotFound {
            kind: kind.to_string(),
            name: key.name.clone(),
            namespace: key.namespace.clone(),
        }
    }

    fn conflict(kind: &str, key: &ObjectKey) -> OperatorError {
        OperatorError::Conflict {
            kind: kind.to_string(),
            name: key.name.clone(),
            message: "the object has been modified".to_string(),
        }
    }

    impl InMemoryClient {
        pub fn new() -> Self {
            Self::default()
        }

        fn state(&self) -> std::sync::MutexGuard<'_, State> {
            self.state.lock().expect("state lock")
        }

        /// Store a parent as the API server would after a create.
        pub fn insert_app(&self, mut app: MyAppResource) {
            let mut state = self.state();
            app.metadata.resource_version = Some(state.bump());
            state.apps.insert(ObjectKey::of(&app), app);
        }

        /// Replace the stored parent spec, bumping its resource version.
        pub fn edit_app(&self, key: &ObjectKey, edit: impl FnOnce(&mut MyAppResource)) {
            let mut state = self.state();
            let version = state.bump();
            let app = state.apps.get_mut(key).expect("app present");
            edit(app);
            app.metadata.resource_version = Some(version);
        }

        pub fn app(&self, key: &ObjectKey) -> Option<MyAppResource> {
            self.state().apps.get(key).cloned()
        }

        pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
            self.state().deployments.get(key).cloned()
        }

        pub fn service(&self, key: &ObjectKey) -> Option<Service> {
            self.state().services.get(key).cloned()
        }

        pub fn deployment_names(&self) -> Vec<String> {
            self.state().deployments.keys().map(|k| k.name.clone()).collect()
        }

        pub fn service_names(&self) -> Vec<String> {
            self.state().services.keys().map(|k| k.name.clone()).collect()
        }

        /// Report `ready` ready replicas on a stored Deployment.
        pub fn set_ready_replicas(&self, key: &ObjectKey, ready: i32) {
            let mut state = self.state();
            let deployment = state.deployments.get_mut(key).expect("deployment present");
            deployment.status.get_or_insert_with(Default::default).ready_replicas = Some(ready);
        }

        /// Fail the next call of `op` with `err`.
        pub fn fail_next(&self, op: &'static str, err: OperatorError) {
            self.state().failures.entry(op).or_default().insert(0, err);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.state().calls.clone()
        }

        pub fn clear_calls(&self) {
            self.state().calls.clear();
        }
    }

    #[async_trait]
    impl ClusterClient for InMemoryClient {
        async fn get_app(&self, key: &ObjectKey) -> OperatorResult<Option<MyAppResource>> {
            let mut state = self.state();
            state.take_failure("get_app")?;
            Ok(state.apps.get(key).cloned())
        }

        async fn update_app_status(&self, app: &MyAppResource) -> OperatorResult<MyAppResource> {
            let key = ObjectKey::of(app);
            let mut state = self.state();
            state.take_failure("update_app_status")?;
            let stored_version = state
                .apps
                .get(&key)
                .ok_or_else(|| not_found("MyAppResource", &key))?
                .metadata
                .resource_version
                .clone();
            if app.metadata.resource_version != stored_version {
                return Err(conflict("MyAppResource", &key));
            }
            let version = state.bump();
            let stored = state.apps.get_mut(&key).expect("checked above");
            stored.status = app.status.clone();
            stored.metadata.resource_version = Some(version);
            let updated = stored.clone();
            state.calls.push(Call::UpdateStatus(key.name));
            Ok(updated)
        }

        async fn get_deployment(&self, key: &ObjectKey) -> OperatorResult<Option<Deployment>> {
            let mut state = self.state();
            state.take_failure("get_deployment")?;
            Ok(state.deployments.get(key).cloned())
        }

        async fn create_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment> {
            let key = ObjectKey::of(deployment);
            let mut state = self.state();
            state.take_failure("create_deployment")?;
            if state.deployments.contains_key(&key) {
                return Err(OperatorError::AlreadyExists {
                    kind: "Deployment".into(),
                    name: key.name,
                    namespace: key.namespace,
                });
            }
            let mut stored = deployment.clone();
            stored.metadata.resource_version = Some(state.bump());
            state.deployments.insert(key.clone(), stored.clone());
            state.calls.push(Call::CreateDeployment(key.name));
            Ok(stored)
        }

        async fn update_deployment(&self, deployment: &Deployment) -> OperatorResult<Deployment> {
            let key = ObjectKey::of(deployment);
            let mut state = self.state();
            state.take_failure("update_deployment")?;
            let existing = state
                .deployments
                .get(&key)
                .ok_or_else(|| not_found("Deployment", &key))?;
            if deployment.metadata.resource_version.is_some()
                && deployment.metadata.resource_version != existing.metadata.resource_version
            {
                return Err(conflict("Deployment", &key));
            }
            let mut stored = deployment.clone();
            stored.status = existing.status.clone();
            stored.metadata.resource_version = Some(state.bump());
            state.deployments.insert(key.clone(), stored.clone());
            state.calls.push(Call::UpdateDeployment(key.name));
            Ok(stored)
        }

        async fn delete_deployment(&self, key: &ObjectKey) -> OperatorResult<()> {
            let mut state = self.state();
            state.take_failure("delete_deployment")?;
            state
                .deployments
                .remove(key)
                .ok_or_else(|| not_found("Deployment", key))?;
            state.calls.push(Call::DeleteDeployment(key.name.clone()));
            Ok(())
        }

        async fn get_service(&self, key: &ObjectKey) -> OperatorResult<Option<Service>> {
            let mut state = self.state();
            state.take_failure("get_service")?;
            Ok(state.services.get(key).cloned())
        }

        async fn create_service(&self, service: &Service) -> OperatorResult<Service> {
            let key = ObjectKey::of(service);
            let mut state = self.state();
            state.take_failure("create_service")?;
            if state.services.contains_key(&key) {
                return Err(OperatorError::AlreadyExists {
                    kind: "Service".into(),
                    name: key.name,
                    namespace: key.namespace,
                });
            }
            let mut stored = service.clone();
            stored.metadata.resource_version = Some(state.bump());
            if let Some(spec) = stored.spec.as_mut() {
                let ip = format!("10.96.0.{}", state.next_version);
                spec.cluster_ip = Some(ip.clone());
                spec.cluster_ips = Some(vec![ip]);
            }
            state.services.insert(key.clone(), stored.clone());
            state.calls.push(Call::CreateService(key.name));
            Ok(stored)
        }

        async fn update_service(&self, service: &Service) -> OperatorResult<Service> {
            let key = ObjectKey::of(service);
            let mut state = self.state();
            state.take_failure("update_service")?;
            let existing = state
                .services
                .get(&key)
                .ok_or_else(|| not_found("Service", &key))?;
            if service.metadata.resource_version.is_some()
                && service.metadata.resource_version != existing.metadata.resource_version
            {
                return Err(conflict("Service", &key));
            }
            let existing_ip = existing.spec.as_ref().and_then(|s| s.cluster_ip.clone());
            let new_ip = service.spec.as_ref().and_then(|s| s.cluster_ip.clone());
            if existing_ip != new_ip {
                return Err(OperatorError::Invalid {
                    kind: "Service".into(),
                    name: key.name,
                    message: "spec.clusterIP: field is immutable".into(),
                });
            }
            let mut stored = service.clone();
            stored.metadata.resource_version = Some(state.bump());
            state.services.insert(key.clone(), stored.clone());
            state.calls.push(Call::UpdateService(key.name));
            Ok(stored)
        }

        async fn delete_service(&self, key: &ObjectKey) -> OperatorResult<()> {
            let mut state = self.state();
            state.take_failure("delete_service")?;
            state
                .services
                .remove(key)
                .ok_or_else(|| not_found("Service", key))?;
            state.calls.push(Call::DeleteService(key.name.clone()));
            Ok(())
        }
    }
}
