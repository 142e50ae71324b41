//! Per-request authentication outcome.

use crate::request::Request;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identity attached to an authenticated request.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthInfo {
    #[serde(default)]
    pub backend_roles: Option<Vec<String>>,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthStatus {
    /// No authentication is configured or active for the request.
    Unknown,
    /// Authentication is active and the request failed it.
    Unauthenticated,
    Authenticated(AuthInfo),
}

/// Auth collaborator: reports the authentication outcome of a request.
pub trait AuthStateReader: Send + Sync {
    fn get(&self, request: &Request) -> AuthStatus;
}

/// Auth outcomes recorded by the HTTP edge, keyed by request id.
///
/// Requests that were never recorded report [`AuthStatus::Unknown`].
#[derive(Default)]
pub struct AuthStateStorage {
    states: RwLock<HashMap<Uuid, AuthStatus>>,
}

impl AuthStateStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, request: &Request, status: AuthStatus) {
        self.states.write().insert(request.id(), status);
    }

    pub fn remove(&self, request: &Request) -> Option<AuthStatus> {
        self.states.write().remove(&request.id())
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl AuthStateReader for AuthStateStorage {
    fn get(&self, request: &Request) -> AuthStatus {
        self.states
            .read()
            .get(&request.id())
            .cloned()
            .unwrap_or(AuthStatus::Unknown)
    }
}
