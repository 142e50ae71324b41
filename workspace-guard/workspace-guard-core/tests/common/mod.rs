#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use workspace_guard_core::acl::{PermissionMode, Permissions, Principals};
use workspace_guard_core::auth::{AuthInfo, AuthStateReader, AuthStateStorage, AuthStatus};
use workspace_guard_core::saved_objects::{
    BulkCreateObject, BulkResponse, BulkUpdateObject, ClientProviderBuilder, ClientWrapperFactory,
    CreateOptions, FindOptions, FindResponse, InMemoryRepository, ObjectRef, SavedObject,
    SavedObjectsClient, ScopedClientProvider, UpdateOptions, WrapperId, WrapperOptions,
};
use workspace_guard_core::{Request, Result, WorkspaceConfig, WorkspacePlugin};

pub const RECORDER_ID: WrapperId = WrapperId::new("recorder");

/// Auth collaborator that counts lookups.
#[derive(Default)]
pub struct CountingAuth {
    pub storage: AuthStateStorage,
    lookups: AtomicUsize,
}

impl CountingAuth {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }
}

impl AuthStateReader for CountingAuth {
    fn get(&self, request: &Request) -> AuthStatus {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.storage.get(request)
    }
}

/// Records what reaches the store from above.
#[derive(Default)]
pub struct Recorder {
    pub finds: Mutex<Vec<FindOptions>>,
    pub writes: AtomicUsize,
}

impl Recorder {
    pub fn last_find(&self) -> Option<FindOptions> {
        self.finds.lock().last().cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

struct RecordingClient {
    recorder: Arc<Recorder>,
    inner: Arc<dyn SavedObjectsClient>,
}

impl RecordingClient {
    fn wrote(&self) {
        self.recorder.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SavedObjectsClient for RecordingClient {
    async fn get(&self, object_type: &str, id: &str) -> Result<SavedObject> {
        self.inner.get(object_type, id).await
    }

    async fn bulk_get(&self, objects: &[ObjectRef]) -> Result<BulkResponse> {
        self.inner.bulk_get(objects).await
    }

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: CreateOptions,
    ) -> Result<SavedObject> {
        self.wrote();
        self.inner.create(object_type, attributes, options).await
    }

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: CreateOptions,
    ) -> Result<BulkResponse> {
        self.wrote();
        self.inner.bulk_create(objects, options).await
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: UpdateOptions,
    ) -> Result<SavedObject> {
        self.wrote();
        self.inner.update(object_type, id, attributes, options).await
    }

    async fn bulk_update(&self, objects: Vec<BulkUpdateObject>) -> Result<BulkResponse> {
        self.wrote();
        self.inner.bulk_update(objects).await
    }

    async fn delete(&self, object_type: &str, id: &str) -> Result<()> {
        self.wrote();
        self.inner.delete(object_type, id).await
    }

    async fn find(&self, options: FindOptions) -> Result<FindResponse> {
        self.recorder.finds.lock().push(options.clone());
        self.inner.find(options).await
    }

    async fn delete_by_workspace(&self, workspace: &str) -> Result<usize> {
        self.wrote();
        self.inner.delete_by_workspace(workspace).await
    }

    async fn add_to_workspaces(
        &self,
        object_type: &str,
        id: &str,
        workspaces: &[String],
    ) -> Result<SavedObject> {
        self.wrote();
        self.inner.add_to_workspaces(object_type, id, workspaces).await
    }
}

struct RecorderFactory(Arc<Recorder>);

impl ClientWrapperFactory for RecorderFactory {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        Arc::new(RecordingClient {
            recorder: self.0.clone(),
            inner: options.client,
        })
    }
}

pub fn grant(mode: PermissionMode, principals: Principals) -> Permissions {
    let mut permissions = Permissions::new();
    permissions.insert(mode, principals);
    permissions
}

pub fn users(names: &[&str]) -> Principals {
    Principals::with_users(names.iter().copied())
}

/// Store, recorder, and a started workspace plugin, wired the way a server
/// wires them.
pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub recorder: Arc<Recorder>,
    pub auth: Arc<CountingAuth>,
    pub plugin: WorkspacePlugin,
    pub provider: Arc<ScopedClientProvider>,
}

impl Harness {
    pub async fn new(seed: Vec<SavedObject>) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let repo = Arc::new(InMemoryRepository::new());
        for object in seed {
            repo.insert(object).await;
        }
        let recorder = Arc::new(Recorder::default());
        let auth = Arc::new(CountingAuth::default());

        let plugin = WorkspacePlugin::new(
            WorkspaceConfig::from_json(serde_json::json!({ "enabled": true })).unwrap(),
        );
        let mut builder = ClientProviderBuilder::new();
        builder
            .add_client_wrapper(-10, RECORDER_ID, Arc::new(RecorderFactory(recorder.clone())))
            .unwrap();
        plugin.setup(&mut builder).unwrap();
        let provider = builder.build(repo.clone());
        plugin.start(&provider, auth.clone()).unwrap();

        Self {
            repo,
            recorder,
            auth,
            plugin,
            provider,
        }
    }

    pub fn request_as(&self, user: &str) -> Request {
        let request = Request::default();
        self.auth.storage.set(
            &request,
            AuthStatus::Authenticated(AuthInfo {
                backend_roles: None,
                user_name: Some(user.to_string()),
            }),
        );
        request
    }

    pub fn client_as(&self, user: &str) -> Arc<dyn SavedObjectsClient> {
        self.provider.client(&self.request_as(user))
    }
}
