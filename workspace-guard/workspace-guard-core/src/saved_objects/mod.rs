//! Saved-object data model and the client contract shared by the
//! repository and every wrapper layered over it.

pub mod pipeline;
pub mod repository;
pub mod workspace_wrapper;

use crate::acl::{PermissionMode, Permissions, Principals};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use pipeline::{
    ClientProviderBuilder, ClientWrapperFactory, ScopedClientProvider, WrapperId, WrapperOptions,
};
pub use repository::InMemoryRepository;
pub use workspace_wrapper::{
    WorkspaceSavedObjectsClientWrapper, SAVED_OBJECTS_PERMISSION_ERROR, WORKSPACE_PERMISSION_ERROR,
    WORKSPACE_WRAPPER_ID,
};

/// Reserved type of workspace objects.
pub const WORKSPACE_TYPE: &str = "workspace";

/// A persisted record.
///
/// Objects carrying neither `workspaces` nor `permissions` (global settings
/// and the like) sit outside access control.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SavedObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Set on items of a bulk response that could not be served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SavedObjectError>,
}

impl SavedObject {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object_type: object_type.into(),
            attributes: Value::Object(Default::default()),
            workspaces: None,
            permissions: None,
            version: None,
            updated_at: None,
            error: None,
        }
    }

    pub fn with_workspaces<I, S>(mut self, workspaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.workspaces = Some(workspaces.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.object_type, &self.id)
    }

    /// True if this object is governed by neither workspaces nor an ACL.
    pub fn is_unguarded(&self) -> bool {
        self.workspaces.is_none() && self.permissions.is_none()
    }
}

/// Per-item failure inside a bulk response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedObjectError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl SavedObjectError {
    pub fn not_found(object_type: &str, id: &str) -> Self {
        Self {
            error: "Not Found".to_string(),
            message: format!("Saved object [{}/{}] not found", object_type, id),
            status_code: 404,
        }
    }

    pub fn conflict(object_type: &str, id: &str) -> Self {
        Self {
            error: "Conflict".to_string(),
            message: format!("Saved object [{}/{}] conflict", object_type, id),
            status_code: 409,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    pub fn workspace(id: impl Into<String>) -> Self {
        Self::new(WORKSPACE_TYPE, id)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateOptions {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    /// Workspaces the new objects are placed in.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl CreateOptions {
    pub fn has_target_workspaces(&self) -> bool {
        self.workspaces.as_ref().map_or(false, |w| !w.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkCreateObject {
    #[serde(rename = "type")]
    pub object_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl BulkCreateObject {
    pub fn new(object_type: impl Into<String>, id: Option<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id,
            attributes: Value::Object(Default::default()),
            workspaces: None,
            permissions: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateOptions {
    /// Expected current version; a mismatch is a conflict.
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BulkUpdateObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
}

impl BulkUpdateObject {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            attributes: Value::Object(Default::default()),
            version: None,
            permissions: None,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(&self.object_type, &self.id)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkResponse {
    pub saved_objects: Vec<SavedObject>,
}

/// ACL-aware search parameters evaluated by the store itself.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AclSearchParams {
    #[serde(default)]
    pub principals: Option<Principals>,
    #[serde(default)]
    pub permission_modes: Option<Vec<PermissionMode>>,
    /// Rows belonging to any of these workspaces match regardless of their ACL.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FindOptions {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
    /// Restrict results to objects inside any of these workspaces.
    #[serde(default)]
    pub workspaces: Option<Vec<String>>,
    #[serde(default)]
    pub acl_search_params: Option<AclSearchParams>,
}

impl FindOptions {
    pub fn of_type(object_type: impl Into<String>) -> Self {
        Self {
            types: vec![object_type.into()],
            ..Default::default()
        }
    }

    pub fn is_related_to_workspace(&self) -> bool {
        self.types.iter().any(|t| t == WORKSPACE_TYPE)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FindResponse {
    pub saved_objects: Vec<SavedObject>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Persistence operations on saved objects.
///
/// Implemented by the store and by every wrapper stacked over it, so a
/// wrapped client is indistinguishable from the store to its callers.
#[async_trait]
pub trait SavedObjectsClient: Send + Sync {
    async fn get(&self, object_type: &str, id: &str) -> Result<SavedObject>;

    /// Missing objects come back as items carrying an `error`.
    async fn bulk_get(&self, objects: &[ObjectRef]) -> Result<BulkResponse>;

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: CreateOptions,
    ) -> Result<SavedObject>;

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: CreateOptions,
    ) -> Result<BulkResponse>;

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: UpdateOptions,
    ) -> Result<SavedObject>;

    async fn bulk_update(&self, objects: Vec<BulkUpdateObject>) -> Result<BulkResponse>;

    async fn delete(&self, object_type: &str, id: &str) -> Result<()>;

    async fn find(&self, options: FindOptions) -> Result<FindResponse>;

    /// Delete every object inside `workspace`, returning how many were removed.
    async fn delete_by_workspace(&self, workspace: &str) -> Result<usize>;

    async fn add_to_workspaces(
        &self,
        object_type: &str,
        id: &str,
        workspaces: &[String],
    ) -> Result<SavedObject>;
}
