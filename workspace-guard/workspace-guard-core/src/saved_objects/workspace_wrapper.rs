//! Workspace-aware client wrapper.
//!
//! An object is permitted when the caller holds the required library mode on
//! its workspaces, or failing that the required mode in the object's own ACL.
//! Objects with neither attribute are not guarded. Every check runs before
//! the call is delegated, so a denied operation never reaches the store.

use super::pipeline::{ClientWrapperFactory, WrapperId, WrapperOptions};
use super::{
    AclSearchParams, BulkCreateObject, BulkResponse, BulkUpdateObject, CreateOptions, FindOptions,
    FindResponse, ObjectRef, SavedObject, SavedObjectsClient, UpdateOptions, WORKSPACE_TYPE,
};
use crate::acl::{PermissionMode, Principals};
use crate::error::{Result, SavedObjectsError};
use crate::permission_control::{SavedObjectsPermissionControl, ValidateFailure, ValidateResult};
use crate::request::Request;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const WORKSPACE_WRAPPER_ID: WrapperId = WrapperId::new("workspace");

pub const WORKSPACE_PERMISSION_ERROR: &str = "Invalid workspace permission";
pub const SAVED_OBJECTS_PERMISSION_ERROR: &str = "Invalid saved objects permission";

/// Upper bound on workspaces resolved for one `find`.
const PERMITTED_WORKSPACES_PER_PAGE: usize = 999;

const READ_WORKSPACE_MODES: [PermissionMode; 2] =
    [PermissionMode::LibraryRead, PermissionMode::LibraryWrite];
const WRITE_WORKSPACE_MODES: [PermissionMode; 1] = [PermissionMode::LibraryWrite];
const READ_OBJECT_MODES: [PermissionMode; 2] = [PermissionMode::Read, PermissionMode::Write];
const WRITE_OBJECT_MODES: [PermissionMode; 1] = [PermissionMode::Write];

fn workspace_denied() -> SavedObjectsError {
    SavedObjectsError::Forbidden(WORKSPACE_PERMISSION_ERROR.to_string())
}

fn object_denied() -> SavedObjectsError {
    SavedObjectsError::Forbidden(SAVED_OBJECTS_PERMISSION_ERROR.to_string())
}

/// A check that could not run counts as a denial, except a store failure,
/// which is handed back untouched.
fn permitted(result: ValidateResult) -> Result<bool> {
    match result {
        Ok(permitted) => Ok(permitted),
        Err(ValidateFailure::Store(e)) => Err(e),
        Err(failure) => {
            debug!(reason = %failure, "Permission check could not be completed");
            Ok(false)
        }
    }
}

fn into_client_error(failure: ValidateFailure) -> SavedObjectsError {
    match failure {
        ValidateFailure::Store(e) => e,
        other => SavedObjectsError::Store(anyhow::Error::new(other)),
    }
}

/// Registers as the [`WORKSPACE_WRAPPER_ID`] stage of the client pipeline.
pub struct WorkspaceSavedObjectsClientWrapper {
    permission_control: Arc<SavedObjectsPermissionControl>,
}

impl WorkspaceSavedObjectsClientWrapper {
    pub fn new(permission_control: Arc<SavedObjectsPermissionControl>) -> Self {
        Self { permission_control }
    }
}

impl ClientWrapperFactory for WorkspaceSavedObjectsClientWrapper {
    fn wrap(&self, options: WrapperOptions) -> Arc<dyn SavedObjectsClient> {
        Arc::new(WorkspaceScopedClient {
            permission_control: self.permission_control.clone(),
            inner: options.client,
            request: options.request,
        })
    }
}

struct WorkspaceScopedClient {
    permission_control: Arc<SavedObjectsPermissionControl>,
    inner: Arc<dyn SavedObjectsClient>,
    request: Request,
}

impl WorkspaceScopedClient {
    /// Every object must grant one of `modes`.
    async fn validate_objects_permissions(
        &self,
        objects: &[ObjectRef],
        modes: &[PermissionMode],
    ) -> Result<bool> {
        for object in objects {
            let result = self
                .permission_control
                .validate(&self.request, object, modes)
                .await;
            if !permitted(result)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// AND over `workspaces`. An empty list never passes.
    async fn validate_multi_workspaces_permissions(
        &self,
        workspaces: &[String],
        modes: &[PermissionMode],
    ) -> Result<bool> {
        if workspaces.is_empty() {
            return Ok(false);
        }
        let refs: Vec<ObjectRef> = workspaces.iter().map(ObjectRef::workspace).collect();
        self.validate_objects_permissions(&refs, modes).await
    }

    /// OR over `workspaces`. An empty list never passes.
    async fn validate_at_least_one_permitted_workspace(
        &self,
        workspaces: &[String],
        modes: &[PermissionMode],
    ) -> Result<bool> {
        for workspace in workspaces {
            let result = self
                .permission_control
                .validate(&self.request, &ObjectRef::workspace(workspace), modes)
                .await;
            if permitted(result)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Workspace membership first; the object's ACL is only consulted when
    /// the workspace check does not already grant access.
    async fn validate_workspaces_and_saved_objects_permissions(
        &self,
        object: &SavedObject,
        workspace_modes: &[PermissionMode],
        object_modes: &[PermissionMode],
        require_all_workspaces: bool,
    ) -> Result<bool> {
        if object.is_unguarded() {
            return Ok(true);
        }

        if let Some(workspaces) = &object.workspaces {
            if !workspace_modes.is_empty() {
                let granted = if require_all_workspaces {
                    self.validate_multi_workspaces_permissions(workspaces, workspace_modes)
                        .await?
                } else {
                    self.validate_at_least_one_permitted_workspace(workspaces, workspace_modes)
                        .await?
                };
                if granted {
                    return Ok(true);
                }
            }
        }

        if object.permissions.is_none() {
            return Ok(false);
        }
        Ok(match self.permission_control.principals(&self.request) {
            Ok(principals) => self.permission_control.validate_saved_objects_acl(
                std::slice::from_ref(object),
                &principals,
                object_modes,
            ),
            Err(failure) => permitted(Err(failure))?,
        })
    }

    /// Read: any workspace or the object ACL.
    async fn can_read(&self, object: &SavedObject) -> Result<bool> {
        self.validate_workspaces_and_saved_objects_permissions(
            object,
            &READ_WORKSPACE_MODES,
            &READ_OBJECT_MODES,
            false,
        )
        .await
    }

    /// Write: any workspace (or all of them when `require_all_workspaces`)
    /// or the object ACL.
    async fn can_write(&self, object: &SavedObject, require_all_workspaces: bool) -> Result<bool> {
        self.validate_workspaces_and_saved_objects_permissions(
            object,
            &WRITE_WORKSPACE_MODES,
            &WRITE_OBJECT_MODES,
            require_all_workspaces,
        )
        .await
    }

    /// An object about to be overwritten must be writable. One that does not
    /// exist yet has nothing to protect.
    async fn can_overwrite(&self, object_type: &str, id: &str) -> Result<bool> {
        match self.inner.get(object_type, id).await {
            Ok(existing) => self.can_write(&existing, false).await,
            Err(SavedObjectsError::NotFound { .. }) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Targets for a write that names no workspaces: the workspace the
    /// request was addressed to, if any.
    fn default_workspaces(&self, options: &mut CreateOptions) {
        if !options.has_target_workspaces() {
            if let Some(id) = self.request.workspace_id() {
                options.workspaces = Some(vec![id.to_string()]);
            }
        }
    }

    fn principals(&self) -> Result<Principals> {
        self.permission_control
            .principals(&self.request)
            .map_err(into_client_error)
    }

    /// Ids of workspaces on which the caller holds a library mode.
    async fn permitted_workspace_ids(
        &self,
        principals: &Principals,
        requested_modes: Option<&[PermissionMode]>,
    ) -> Result<Vec<String>> {
        // only library modes govern access through workspaces
        let permission_modes: Vec<PermissionMode> = match requested_modes {
            Some(modes) => modes
                .iter()
                .copied()
                .filter(|m| READ_WORKSPACE_MODES.contains(m))
                .collect(),
            None => READ_WORKSPACE_MODES.to_vec(),
        };
        let workspaces = self
            .inner
            .find(FindOptions {
                per_page: Some(PERMITTED_WORKSPACES_PER_PAGE),
                acl_search_params: Some(AclSearchParams {
                    principals: Some(principals.clone()),
                    permission_modes: Some(permission_modes),
                    workspaces: None,
                }),
                ..FindOptions::of_type(WORKSPACE_TYPE)
            })
            .await?;
        Ok(workspaces
            .saved_objects
            .into_iter()
            .map(|workspace| workspace.id)
            .collect())
    }
}

#[async_trait]
impl SavedObjectsClient for WorkspaceScopedClient {
    async fn get(&self, object_type: &str, id: &str) -> Result<SavedObject> {
        let object = self.inner.get(object_type, id).await?;
        if !self.can_read(&object).await? {
            return Err(object_denied());
        }
        Ok(object)
    }

    async fn bulk_get(&self, objects: &[ObjectRef]) -> Result<BulkResponse> {
        let response = self.inner.bulk_get(objects).await?;
        for object in &response.saved_objects {
            if !self.can_read(object).await? {
                return Err(object_denied());
            }
        }
        Ok(response)
    }

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        mut options: CreateOptions,
    ) -> Result<SavedObject> {
        self.default_workspaces(&mut options);
        let has_target_workspaces = options.has_target_workspaces();
        if let Some(targets) = options.workspaces.as_deref().filter(|_| has_target_workspaces) {
            if !self
                .validate_multi_workspaces_permissions(targets, &WRITE_WORKSPACE_MODES)
                .await?
            {
                return Err(workspace_denied());
            }
        }

        // an overwrite naming other workspaces than the existing object's is a
        // store conflict, so only a plain overwrite needs the existing object checked
        if options.overwrite && !has_target_workspaces {
            if let Some(id) = &options.id {
                if !self.can_overwrite(object_type, id).await? {
                    return Err(workspace_denied());
                }
            }
        }

        self.inner.create(object_type, attributes, options).await
    }

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        mut options: CreateOptions,
    ) -> Result<BulkResponse> {
        self.default_workspaces(&mut options);
        let has_target_workspaces = options.has_target_workspaces();
        if let Some(targets) = options.workspaces.as_deref().filter(|_| has_target_workspaces) {
            if !self
                .validate_multi_workspaces_permissions(targets, &WRITE_WORKSPACE_MODES)
                .await?
            {
                return Err(object_denied());
            }
        }

        if !has_target_workspaces {
            for object in &objects {
                // items may carry their own targets
                if let Some(targets) = object.workspaces.as_deref().filter(|w| !w.is_empty()) {
                    if !self
                        .validate_multi_workspaces_permissions(targets, &WRITE_WORKSPACE_MODES)
                        .await?
                    {
                        return Err(object_denied());
                    }
                    continue;
                }
                if !options.overwrite {
                    continue;
                }
                let Some(id) = &object.id else { continue };
                if !self.can_overwrite(&object.object_type, id).await? {
                    return Err(workspace_denied());
                }
            }
        }

        self.inner.bulk_create(objects, options).await
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: UpdateOptions,
    ) -> Result<SavedObject> {
        let existing = self.inner.get(object_type, id).await?;
        if !self.can_write(&existing, false).await? {
            return Err(object_denied());
        }
        self.inner.update(object_type, id, attributes, options).await
    }

    async fn bulk_update(&self, objects: Vec<BulkUpdateObject>) -> Result<BulkResponse> {
        let refs: Vec<ObjectRef> = objects.iter().map(BulkUpdateObject::object_ref).collect();
        let existing = self.inner.bulk_get(&refs).await?;
        for object in &existing.saved_objects {
            if !self.can_write(object, false).await? {
                return Err(object_denied());
            }
        }
        self.inner.bulk_update(objects).await
    }

    async fn delete(&self, object_type: &str, id: &str) -> Result<()> {
        let existing = self.inner.get(object_type, id).await?;
        if !self.can_write(&existing, true).await? {
            return Err(object_denied());
        }
        self.inner.delete(object_type, id).await
    }

    async fn find(&self, mut options: FindOptions) -> Result<FindResponse> {
        let principals = self.principals()?;
        let mut acl_search = options.acl_search_params.take().unwrap_or_default();

        if options.is_related_to_workspace() {
            // workspaces are filtered by their own ACL inside the store
            acl_search
                .permission_modes
                .get_or_insert_with(|| READ_OBJECT_MODES.to_vec());
            acl_search.principals = Some(principals);
        } else {
            let permitted_ids = self
                .permitted_workspace_ids(&principals, acl_search.permission_modes.as_deref())
                .await?;

            let requested = options
                .workspaces
                .take()
                .or_else(|| self.request.workspace_id().map(|id| vec![id.to_string()]));
            match requested {
                Some(requested) => {
                    let narrowed: Vec<String> = requested
                        .into_iter()
                        .filter(|w| permitted_ids.contains(w))
                        .collect();
                    if narrowed.is_empty() {
                        return Err(SavedObjectsError::NotAuthorized(
                            WORKSPACE_PERMISSION_ERROR.to_string(),
                        ));
                    }
                    options.workspaces = Some(narrowed);
                }
                None => {
                    // rows in a permitted workspace, rows whose ACL matches,
                    // and unguarded rows
                    acl_search.workspaces = Some(permitted_ids);
                    acl_search
                        .permission_modes
                        .get_or_insert_with(|| READ_OBJECT_MODES.to_vec());
                    acl_search.principals = Some(principals);
                }
            }
        }

        options.acl_search_params = Some(acl_search);
        self.inner.find(options).await
    }

    async fn delete_by_workspace(&self, workspace: &str) -> Result<usize> {
        if !self
            .validate_multi_workspaces_permissions(&[workspace.to_string()], &WRITE_WORKSPACE_MODES)
            .await?
        {
            return Err(workspace_denied());
        }
        self.inner.delete_by_workspace(workspace).await
    }

    async fn add_to_workspaces(
        &self,
        object_type: &str,
        id: &str,
        workspaces: &[String],
    ) -> Result<SavedObject> {
        if !self
            .validate_multi_workspaces_permissions(workspaces, &WRITE_WORKSPACE_MODES)
            .await?
        {
            return Err(workspace_denied());
        }
        self.inner.add_to_workspaces(object_type, id, workspaces).await
    }
}
