pub mod acl;
pub mod auth;
pub mod config;
pub mod error;
pub mod permission_control;
pub mod plugin;
pub mod request;
pub mod saved_objects;
pub mod utils;

pub use acl::{Acl, PermissionMode, Permissions, Principals};
pub use config::WorkspaceConfig;
pub use error::{Result, SavedObjectsError};
pub use permission_control::{SavedObjectsPermissionControl, ValidateFailure, ValidateResult};
pub use plugin::WorkspacePlugin;
pub use request::Request;
