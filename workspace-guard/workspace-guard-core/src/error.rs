//! Errors surfaced by saved-object clients and the permission wrapper.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SavedObjectsError>;

/// Error returned from every [`SavedObjectsClient`](crate::saved_objects::SavedObjectsClient)
/// operation.
///
/// `Forbidden` and `NotAuthorized` are kept apart so the HTTP edge can tell a
/// denied object from a caller with no workspace access at all.
#[derive(Debug, Error)]
pub enum SavedObjectsError {
    #[error("Saved object [{object_type}/{id}] not found")]
    NotFound { object_type: String, id: String },

    #[error("Saved object [{object_type}/{id}] conflict")]
    Conflict { object_type: String, id: String },

    #[error("{0}")]
    BadRequest(String),

    /// The caller lacks the workspace or ACL permission for a specific object.
    #[error("{0}")]
    Forbidden(String),

    /// The caller has no access to any of the workspaces a query asked about.
    #[error("{0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SavedObjectsError {
    pub fn not_found(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            object_type: object_type.into(),
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }

    pub fn is_not_authorized(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }

    /// Short error class name, as reported in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "Not Found",
            Self::Conflict { .. } => "Conflict",
            Self::BadRequest(_) => "Bad Request",
            Self::Forbidden(_) => "Forbidden",
            Self::NotAuthorized(_) => "Unauthorized",
            Self::Store(_) => "Internal Server Error",
        }
    }
}
