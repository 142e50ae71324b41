//! In-memory saved-object store.
//!
//! Evaluates ACL search parameters itself, so permission filtering on `find`
//! happens at the data layer rather than after the fact.

use super::{
    AclSearchParams, BulkCreateObject, BulkResponse, BulkUpdateObject, CreateOptions, FindOptions,
    FindResponse, ObjectRef, SavedObject, SavedObjectError, SavedObjectsClient, UpdateOptions,
};
use crate::acl::{Acl, PermissionMode};
use crate::error::{Result, SavedObjectsError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

const DEFAULT_PER_PAGE: usize = 20;

type Key = (String, String);

fn key(object_type: &str, id: &str) -> Key {
    (object_type.to_string(), id.to_string())
}

#[derive(Default)]
pub struct InMemoryRepository {
    objects: RwLock<HashMap<Key, SavedObject>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object as-is, bypassing create semantics. Used for seeding.
    pub async fn insert(&self, mut object: SavedObject) -> SavedObject {
        object.version.get_or_insert_with(|| "1".to_string());
        object.updated_at = Some(Utc::now());
        object.error = None;
        self.objects
            .write()
            .await
            .insert(key(&object.object_type, &object.id), object.clone());
        object
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn next_version(current: Option<&str>) -> String {
        let n = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        (n + 1).to_string()
    }

    fn build_object(
        object_type: &str,
        id: Option<String>,
        attributes: Value,
        workspaces: Option<Vec<String>>,
        permissions: Option<crate::acl::Permissions>,
    ) -> SavedObject {
        SavedObject {
            id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            object_type: object_type.to_string(),
            attributes,
            workspaces,
            permissions,
            version: None,
            updated_at: None,
            error: None,
        }
    }

    /// Insert `object`, honoring `overwrite`. Returns a conflict if the
    /// object exists and overwriting was not requested, or if the overwrite
    /// would move it into other workspaces.
    fn put(
        objects: &mut HashMap<Key, SavedObject>,
        mut object: SavedObject,
        overwrite: bool,
    ) -> Result<SavedObject> {
        let k = key(&object.object_type, &object.id);
        let existing = objects.get(&k);
        if existing.is_some() && !overwrite {
            return Err(SavedObjectsError::conflict(&object.object_type, &object.id));
        }
        if let Some(existing) = existing {
            match object.workspaces.as_deref() {
                None | Some([]) => object.workspaces = existing.workspaces.clone(),
                Some(requested) => {
                    if !same_workspaces(existing.workspaces.as_deref(), requested) {
                        return Err(SavedObjectsError::conflict(
                            &object.object_type,
                            &object.id,
                        ));
                    }
                }
            }
            if object.permissions.is_none() {
                object.permissions = existing.permissions.clone();
            }
        }
        object.version = Some(Self::next_version(
            existing.and_then(|e| e.version.as_deref()),
        ));
        object.updated_at = Some(Utc::now());
        objects.insert(k, object.clone());
        Ok(object)
    }

    fn apply_update(
        objects: &mut HashMap<Key, SavedObject>,
        object_type: &str,
        id: &str,
        attributes: Value,
        version: Option<&str>,
        permissions: Option<crate::acl::Permissions>,
    ) -> Result<SavedObject> {
        let object = objects
            .get_mut(&key(object_type, id))
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;
        if let Some(expected) = version {
            if object.version.as_deref() != Some(expected) {
                return Err(SavedObjectsError::conflict(object_type, id));
            }
        }
        merge_attributes(&mut object.attributes, attributes);
        if permissions.is_some() {
            object.permissions = permissions;
        }
        object.version = Some(Self::next_version(object.version.as_deref()));
        object.updated_at = Some(Utc::now());
        Ok(object.clone())
    }
}

/// Shallow merge of a partial attribute update.
fn merge_attributes(target: &mut Value, update: Value) {
    match (target, update) {
        (Value::Object(target), Value::Object(update)) => {
            for (k, v) in update {
                target.insert(k, v);
            }
        }
        (target, update) if !update.is_null() => *target = update,
        _ => {}
    }
}

fn same_workspaces(current: Option<&[String]>, requested: &[String]) -> bool {
    let current: BTreeSet<&String> = current.unwrap_or_default().iter().collect();
    let requested: BTreeSet<&String> = requested.iter().collect();
    current == requested
}

fn workspaces_intersect(object: &SavedObject, workspaces: &[String]) -> bool {
    object
        .workspaces
        .as_ref()
        .map_or(false, |own| own.iter().any(|w| workspaces.contains(w)))
}

/// A row matches the ACL search if it is unguarded, if it lives in one of the
/// permitted workspaces, or if its own ACL grants one of the requested modes.
fn matches_acl_search(object: &SavedObject, params: &AclSearchParams) -> bool {
    let Some(principals) = &params.principals else {
        return true;
    };
    if object.is_unguarded() {
        return true;
    }
    if let Some(workspaces) = &params.workspaces {
        if workspaces_intersect(object, workspaces) {
            return true;
        }
    }
    let default_modes = [PermissionMode::Read, PermissionMode::Write];
    let modes = params
        .permission_modes
        .as_deref()
        .unwrap_or(&default_modes);
    object
        .permissions
        .as_ref()
        .map_or(false, |p| Acl::from(p.clone()).has_permission(modes, principals))
}

#[async_trait]
impl SavedObjectsClient for InMemoryRepository {
    async fn get(&self, object_type: &str, id: &str) -> Result<SavedObject> {
        self.objects
            .read()
            .await
            .get(&key(object_type, id))
            .cloned()
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))
    }

    async fn bulk_get(&self, objects: &[ObjectRef]) -> Result<BulkResponse> {
        let store = self.objects.read().await;
        let saved_objects = objects
            .iter()
            .map(|r| match store.get(&key(&r.object_type, &r.id)) {
                Some(object) => object.clone(),
                None => SavedObject {
                    error: Some(SavedObjectError::not_found(&r.object_type, &r.id)),
                    attributes: Value::Null,
                    ..SavedObject::new(&r.object_type, &r.id)
                },
            })
            .collect();
        Ok(BulkResponse { saved_objects })
    }

    async fn create(
        &self,
        object_type: &str,
        attributes: Value,
        options: CreateOptions,
    ) -> Result<SavedObject> {
        let object = Self::build_object(
            object_type,
            options.id,
            attributes,
            options.workspaces,
            options.permissions,
        );
        let mut store = self.objects.write().await;
        Self::put(&mut store, object, options.overwrite)
    }

    async fn bulk_create(
        &self,
        objects: Vec<BulkCreateObject>,
        options: CreateOptions,
    ) -> Result<BulkResponse> {
        let mut store = self.objects.write().await;
        let mut saved_objects = Vec::with_capacity(objects.len());
        for item in objects {
            let object = Self::build_object(
                &item.object_type,
                item.id,
                item.attributes,
                options.workspaces.clone().or(item.workspaces),
                item.permissions.or_else(|| options.permissions.clone()),
            );
            let (object_type, id) = (object.object_type.clone(), object.id.clone());
            match Self::put(&mut store, object, options.overwrite) {
                Ok(created) => saved_objects.push(created),
                Err(SavedObjectsError::Conflict { .. }) => saved_objects.push(SavedObject {
                    error: Some(SavedObjectError::conflict(&object_type, &id)),
                    attributes: Value::Null,
                    ..SavedObject::new(&object_type, &id)
                }),
                Err(e) => return Err(e),
            }
        }
        Ok(BulkResponse { saved_objects })
    }

    async fn update(
        &self,
        object_type: &str,
        id: &str,
        attributes: Value,
        options: UpdateOptions,
    ) -> Result<SavedObject> {
        let mut store = self.objects.write().await;
        Self::apply_update(
            &mut store,
            object_type,
            id,
            attributes,
            options.version.as_deref(),
            options.permissions,
        )
    }

    async fn bulk_update(&self, objects: Vec<BulkUpdateObject>) -> Result<BulkResponse> {
        let mut store = self.objects.write().await;
        let mut saved_objects = Vec::with_capacity(objects.len());
        for item in objects {
            let result = Self::apply_update(
                &mut store,
                &item.object_type,
                &item.id,
                item.attributes,
                item.version.as_deref(),
                item.permissions,
            );
            let error = match result {
                Ok(updated) => {
                    saved_objects.push(updated);
                    continue;
                }
                Err(SavedObjectsError::NotFound { .. }) => {
                    SavedObjectError::not_found(&item.object_type, &item.id)
                }
                Err(SavedObjectsError::Conflict { .. }) => {
                    SavedObjectError::conflict(&item.object_type, &item.id)
                }
                Err(e) => return Err(e),
            };
            saved_objects.push(SavedObject {
                error: Some(error),
                attributes: Value::Null,
                ..SavedObject::new(&item.object_type, &item.id)
            });
        }
        Ok(BulkResponse { saved_objects })
    }

    async fn delete(&self, object_type: &str, id: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .remove(&key(object_type, id))
            .map(|_| ())
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))
    }

    async fn find(&self, options: FindOptions) -> Result<FindResponse> {
        let page = options.page.unwrap_or(1).max(1);
        let per_page = options.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let store = self.objects.read().await;
        let mut matched: Vec<&SavedObject> = store
            .values()
            .filter(|o| options.types.is_empty() || options.types.contains(&o.object_type))
            .filter(|o| {
                options
                    .workspaces
                    .as_ref()
                    .map_or(true, |ws| workspaces_intersect(o, ws))
            })
            .filter(|o| {
                options
                    .acl_search_params
                    .as_ref()
                    .map_or(true, |params| matches_acl_search(o, params))
            })
            .collect();
        matched.sort_by(|a, b| (&a.object_type, &a.id).cmp(&(&b.object_type, &b.id)));
        let total = matched.len();
        let saved_objects = matched
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();
        Ok(FindResponse {
            saved_objects,
            total,
            page,
            per_page,
        })
    }

    async fn delete_by_workspace(&self, workspace: &str) -> Result<usize> {
        let mut store = self.objects.write().await;
        let before = store.len();
        store.retain(|_, o| {
            !o.workspaces
                .as_ref()
                .map_or(false, |ws| ws.iter().any(|w| w == workspace))
        });
        Ok(before - store.len())
    }

    async fn add_to_workspaces(
        &self,
        object_type: &str,
        id: &str,
        workspaces: &[String],
    ) -> Result<SavedObject> {
        if workspaces.is_empty() {
            return Err(SavedObjectsError::BadRequest(
                "workspaces must not be empty".to_string(),
            ));
        }
        let mut store = self.objects.write().await;
        let object = store
            .get_mut(&key(object_type, id))
            .ok_or_else(|| SavedObjectsError::not_found(object_type, id))?;
        let own = object.workspaces.get_or_insert_with(Vec::new);
        for workspace in workspaces {
            if !own.contains(workspace) {
                own.push(workspace.clone());
            }
        }
        object.version = Some(Self::next_version(object.version.as_deref()));
        object.updated_at = Some(Utc::now());
        Ok(object.clone())
    }
}
