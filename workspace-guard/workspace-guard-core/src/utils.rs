use crate::acl::{PermissionMode, Permissions};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;

/// Path segment that scopes a URL to a workspace: `/w/{id}/...`.
pub const WORKSPACE_PATH_PREFIX: &str = "/w";

/// Generate a URL friendly random id of exactly `size` characters.
pub fn generate_random_id(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut id = URL_SAFE_NO_PAD.encode(bytes);
    id.truncate(size);
    id
}

/// Fill in empty grant lists for every workspace-level mode that is missing.
pub fn to_full_workspace_permissions(mut permissions: Permissions) -> Permissions {
    for mode in PermissionMode::WORKSPACE_MODES {
        permissions.entry(mode).or_default();
    }
    permissions
}

/// Workspace id carried by a `/w/{id}/...` path, if any.
pub fn get_workspace_id_from_url(path: &str) -> Option<String> {
    let rest = path.strip_prefix(WORKSPACE_PATH_PREFIX)?.strip_prefix('/')?;
    let id = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// Strip the `/w/{id}` prefix from a path, leaving the rest untouched.
pub fn clean_workspace_id(path: &str) -> String {
    let Some(rest) = path
        .strip_prefix(WORKSPACE_PATH_PREFIX)
        .and_then(|r| r.strip_prefix('/'))
    else {
        return path.to_string();
    };
    let cut = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let remainder = &rest[cut..];
    if remainder.is_empty() || remainder.starts_with(['?', '#']) {
        format!("/{}", remainder)
    } else {
        remainder.to_string()
    }
}
