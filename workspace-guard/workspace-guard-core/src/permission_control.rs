//! Principal-vs-ACL validation of saved objects.
//!
//! Denials are returned, never raised: a `ValidateResult` is `Ok(false)` when
//! the caller lacks permission and `Err(_)` only when the check itself could
//! not be carried out. Converting a denial into an error is the caller's job.

use crate::acl::{Acl, FlatPermission, PermissionMode, Principals};
use crate::auth::{extract_principals, AuthStateReader};
use crate::error::SavedObjectsError;
use crate::request::Request;
use crate::saved_objects::{ObjectRef, SavedObject, ScopedClientProvider, WORKSPACE_WRAPPER_ID};
use anyhow::anyhow;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ValidateFailure {
    #[error("Can not find target saved objects.")]
    NotFound,

    /// Per-object fetch errors, one per line.
    #[error("{0}")]
    Fetch(String),

    #[error("saved objects permission control is not initialized")]
    NotInitialized,

    /// The store call itself failed; carried through untouched.
    #[error(transparent)]
    Store(#[from] SavedObjectsError),
}

/// `Ok(result)` is a completed check, `Err` a check that could not run.
pub type ValidateResult = std::result::Result<bool, ValidateFailure>;

struct Collaborators {
    clients: Weak<ScopedClientProvider>,
    auth: Arc<dyn AuthStateReader>,
}

#[derive(Serialize)]
struct DeniedObject<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    object_type: &'a str,
    workspaces: &'a Option<Vec<String>>,
    permissions: &'a Option<crate::acl::Permissions>,
}

impl<'a> From<&'a SavedObject> for DeniedObject<'a> {
    fn from(object: &'a SavedObject) -> Self {
        Self {
            id: &object.id,
            object_type: &object.object_type,
            workspaces: &object.workspaces,
            permissions: &object.permissions,
        }
    }
}

/// Gatekeeper over the saved-object store.
///
/// Constructed empty and wired once through [`setup`](Self::setup); every
/// validation before that reports [`ValidateFailure::NotInitialized`].
#[derive(Default)]
pub struct SavedObjectsPermissionControl {
    collaborators: OnceCell<Collaborators>,
}

impl SavedObjectsPermissionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire the client provider and the auth collaborator. Only the first call
    /// succeeds.
    pub fn setup(
        &self,
        clients: &Arc<ScopedClientProvider>,
        auth: Arc<dyn AuthStateReader>,
    ) -> anyhow::Result<()> {
        self.collaborators
            .set(Collaborators {
                clients: Arc::downgrade(clients),
                auth,
            })
            .map_err(|_| anyhow!("saved objects permission control is already set up"))
    }

    pub fn is_initialized(&self) -> bool {
        self.collaborators.get().is_some()
    }

    fn collaborators(&self) -> Result<&Collaborators, ValidateFailure> {
        self.collaborators.get().ok_or(ValidateFailure::NotInitialized)
    }

    /// Principals of the caller behind `request`.
    pub fn principals(&self, request: &Request) -> Result<Principals, ValidateFailure> {
        let collaborators = self.collaborators()?;
        Ok(extract_principals(request, collaborators.auth.as_ref()))
    }

    /// Fetch through every stage but the workspace wrapper, so checks never
    /// re-enter themselves.
    async fn bulk_get_saved_objects(
        &self,
        request: &Request,
        objects: &[ObjectRef],
    ) -> Result<Vec<SavedObject>, ValidateFailure> {
        let clients = self
            .collaborators()?
            .clients
            .upgrade()
            .ok_or(ValidateFailure::NotInitialized)?;
        let client = clients.client_bypassing(request, WORKSPACE_WRAPPER_ID);
        Ok(client.bulk_get(objects).await?.saved_objects)
    }

    pub async fn validate(
        &self,
        request: &Request,
        object: &ObjectRef,
        modes: &[PermissionMode],
    ) -> ValidateResult {
        self.batch_validate(request, std::slice::from_ref(object), modes)
            .await
    }

    /// Permitted only if every object is permitted.
    pub async fn batch_validate(
        &self,
        request: &Request,
        objects: &[ObjectRef],
        modes: &[PermissionMode],
    ) -> ValidateResult {
        let fetched = self.bulk_get_saved_objects(request, objects).await?;
        if fetched.is_empty() {
            return Err(ValidateFailure::NotFound);
        }

        let errors: Vec<&str> = fetched
            .iter()
            .filter_map(|o| o.error.as_ref())
            .map(|e| e.error.as_str())
            .collect();
        if !errors.is_empty() {
            return Err(ValidateFailure::Fetch(errors.join("\n")));
        }

        let principals = self.principals(request)?;
        Ok(self.evaluate(&fetched, &principals, modes, true))
    }

    /// Same rule as [`batch_validate`](Self::batch_validate) for an object
    /// already in hand. No I/O.
    pub fn in_memory_validate(
        &self,
        object: &SavedObject,
        principals: &Principals,
        modes: &[PermissionMode],
        should_log: bool,
    ) -> bool {
        self.evaluate(std::slice::from_ref(object), principals, modes, should_log)
    }

    /// ACL-only AND decision over pre-fetched objects.
    pub fn validate_saved_objects_acl(
        &self,
        objects: &[SavedObject],
        principals: &Principals,
        modes: &[PermissionMode],
    ) -> bool {
        self.evaluate(objects, principals, modes, true)
    }

    /// Who holds which mode on each object, keyed by object id.
    pub async fn get_principals_of_objects(
        &self,
        request: &Request,
        objects: &[ObjectRef],
    ) -> Result<HashMap<String, Vec<FlatPermission>>, ValidateFailure> {
        let fetched = self.bulk_get_saved_objects(request, objects).await?;
        Ok(fetched
            .into_iter()
            .map(|o| {
                let flat = Acl::new(o.permissions).to_flat_list();
                (o.id, flat)
            })
            .collect())
    }

    /// Objects without an ACL pass. Every object is examined so a single
    /// diagnostic can list all of the denials.
    fn evaluate(
        &self,
        objects: &[SavedObject],
        principals: &Principals,
        modes: &[PermissionMode],
        should_log: bool,
    ) -> bool {
        let denied: Vec<&SavedObject> = objects
            .iter()
            .filter(|o| match &o.permissions {
                None => false,
                Some(permissions) => {
                    !Acl::from(permissions.clone()).has_permission(modes, principals)
                }
            })
            .collect();
        if denied.is_empty() {
            return true;
        }
        if should_log {
            let denied: Vec<DeniedObject<'_>> = denied.into_iter().map(Into::into).collect();
            debug!(
                principals = %serde_json::to_string(principals).unwrap_or_default(),
                modes = ?modes,
                objects = %serde_json::to_string(&denied).unwrap_or_default(),
                "Authorization failed: principals lack the requested permissions on saved objects"
            );
        }
        false
    }
}
