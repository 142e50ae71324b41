//! Access control lists attached to saved objects and workspaces.
//!
//! An ACL maps a [`PermissionMode`] to the users and groups granted that mode.
//! Missing modes grant nothing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Capability a principal may hold on an object.
///
/// `Read`/`Write` guard ordinary objects. The library modes and `Management`
/// only appear on workspace objects.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Read,
    Write,
    LibraryRead,
    LibraryWrite,
    Management,
}

impl PermissionMode {
    pub const WORKSPACE_MODES: [PermissionMode; 3] = [
        PermissionMode::LibraryRead,
        PermissionMode::LibraryWrite,
        PermissionMode::Management,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Read => "read",
            PermissionMode::Write => "write",
            PermissionMode::LibraryRead => "library_read",
            PermissionMode::LibraryWrite => "library_write",
            PermissionMode::Management => "management",
        }
    }
}

impl std::fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of user and group identifiers.
///
/// Used both as the grant list of one mode inside an ACL and as the identity
/// of a caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principals {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
            groups: Vec::new(),
        }
    }

    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: Vec::new(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }

    /// True if any user or group of `other` is also listed here.
    pub fn intersects(&self, other: &Principals) -> bool {
        other.users.iter().any(|u| self.users.contains(u))
            || other.groups.iter().any(|g| self.groups.contains(g))
    }

    fn merge(&mut self, other: &Principals) {
        for user in &other.users {
            if !self.users.contains(user) {
                self.users.push(user.clone());
            }
        }
        for group in &other.groups {
            if !self.groups.contains(group) {
                self.groups.push(group.clone());
            }
        }
    }

    fn subtract(&mut self, other: &Principals) {
        self.users.retain(|u| !other.users.contains(u));
        self.groups.retain(|g| !other.groups.contains(g));
    }
}

/// Raw `permissions` attribute of a saved object.
pub type Permissions = BTreeMap<PermissionMode, Principals>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    Users,
    Groups,
}

/// One principal and every mode it holds, for "who has access" listings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlatPermission {
    #[serde(rename = "type")]
    pub principal_type: PrincipalType,
    pub name: String,
    pub permissions: Vec<PermissionMode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Acl {
    permissions: Permissions,
}

impl Acl {
    pub fn new(permissions: Option<Permissions>) -> Self {
        Self {
            permissions: permissions.unwrap_or_default(),
        }
    }

    /// True iff `principals` appears in the grant list of at least one of
    /// `modes`. No modes means nothing is satisfied.
    pub fn has_permission(&self, modes: &[PermissionMode], principals: &Principals) -> bool {
        modes.iter().any(|mode| {
            self.permissions
                .get(mode)
                .map_or(false, |granted| granted.intersects(principals))
        })
    }

    pub fn add_permission(&mut self, modes: &[PermissionMode], principals: &Principals) -> &mut Self {
        for mode in modes {
            self.permissions.entry(*mode).or_default().merge(principals);
        }
        self
    }

    pub fn remove_permission(
        &mut self,
        modes: &[PermissionMode],
        principals: &Principals,
    ) -> &mut Self {
        for mode in modes {
            if let Some(granted) = self.permissions.get_mut(mode) {
                granted.subtract(principals);
            }
        }
        self
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn into_permissions(self) -> Permissions {
        self.permissions
    }

    pub fn reset(&mut self) {
        self.permissions.clear();
    }

    /// Invert the grant structure: one entry per principal, listing its modes.
    pub fn to_flat_list(&self) -> Vec<FlatPermission> {
        let mut out: Vec<FlatPermission> = Vec::new();
        for (mode, granted) in &self.permissions {
            let entries = granted
                .users
                .iter()
                .map(|u| (PrincipalType::Users, u))
                .chain(granted.groups.iter().map(|g| (PrincipalType::Groups, g)));
            for (principal_type, name) in entries {
                match out
                    .iter_mut()
                    .find(|e| e.principal_type == principal_type && &e.name == name)
                {
                    Some(existing) => existing.permissions.push(*mode),
                    None => out.push(FlatPermission {
                        principal_type,
                        name: name.clone(),
                        permissions: vec![*mode],
                    }),
                }
            }
        }
        out
    }
}

impl From<Permissions> for Acl {
    fn from(permissions: Permissions) -> Self {
        Self { permissions }
    }
}
