//! Workspace feature configuration.
//!
//! Resolved once at startup and handed to [`WorkspacePlugin`](crate::plugin::WorkspacePlugin)
//! by value.

use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Whether the workspace feature registers anything at all (default false)
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub permission: PermissionConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PermissionConfig {
    /// Whether the permission wrapper is installed when workspaces are enabled (default true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            permission: PermissionConfig::default(),
        }
    }
}

impl WorkspaceConfig {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Load from `WORKSPACE_ENABLED` and `WORKSPACE_PERMISSION_ENABLED`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enabled: parse_flag(lookup("WORKSPACE_ENABLED"), defaults.enabled)?,
            permission: PermissionConfig {
                enabled: parse_flag(
                    lookup("WORKSPACE_PERMISSION_ENABLED"),
                    defaults.permission.enabled,
                )?,
            },
        })
    }

    /// True when the permission wrapper should be registered.
    pub fn permission_control_enabled(&self) -> bool {
        self.enabled && self.permission.enabled
    }
}

fn parse_flag(value: Option<String>, default: bool) -> Result<bool> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some("1") | Some("true") | Some("TRUE") | Some("True") => Ok(true),
        Some("0") | Some("false") | Some("FALSE") | Some("False") => Ok(false),
        Some(other) => Err(anyhow!("invalid boolean flag: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_disable_workspaces() {
        let config = WorkspaceConfig::default();
        assert!(!config.enabled);
        assert!(config.permission.enabled);
        assert!(!config.permission_control_enabled());
    }

    #[test]
    fn json_fills_missing_sections() {
        let config = WorkspaceConfig::from_json(serde_json::json!({ "enabled": true })).unwrap();
        assert!(config.permission_control_enabled());

        let config = WorkspaceConfig::from_json(serde_json::json!({
            "enabled": true,
            "permission": { "enabled": false }
        }))
        .unwrap();
        assert!(!config.permission_control_enabled());
    }

    #[test]
    fn env_lookup() {
        let vars: HashMap<&str, &str> =
            [("WORKSPACE_ENABLED", "true"), ("WORKSPACE_PERMISSION_ENABLED", "0")].into();
        let config = WorkspaceConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert!(config.enabled);
        assert!(!config.permission.enabled);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = WorkspaceConfig::from_lookup(|k| {
            (k == "WORKSPACE_ENABLED").then(|| "maybe".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("maybe"));
    }
}
