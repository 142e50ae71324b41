//! Two-phase wiring of the workspace permission layer.
//!
//! `setup` runs while the client pipeline is still being assembled and only
//! registers the wrapper. `start` runs once the pipeline exists and hands the
//! permission control its collaborators.

use crate::auth::AuthStateReader;
use crate::config::WorkspaceConfig;
use crate::permission_control::SavedObjectsPermissionControl;
use crate::saved_objects::{
    ClientProviderBuilder, ScopedClientProvider, WorkspaceSavedObjectsClientWrapper,
    WORKSPACE_WRAPPER_ID,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Pipeline priority of the workspace wrapper.
pub const WORKSPACE_WRAPPER_PRIORITY: i32 = 0;

pub struct WorkspacePlugin {
    config: WorkspaceConfig,
    permission_control: Arc<SavedObjectsPermissionControl>,
}

impl WorkspacePlugin {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            config,
            permission_control: Arc::new(SavedObjectsPermissionControl::new()),
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn setup(&self, builder: &mut ClientProviderBuilder) -> Result<()> {
        debug!(enabled = self.config.enabled, "Setting up workspace plugin");
        if !self.config.permission_control_enabled() {
            return Ok(());
        }
        builder.add_client_wrapper(
            WORKSPACE_WRAPPER_PRIORITY,
            WORKSPACE_WRAPPER_ID,
            Arc::new(WorkspaceSavedObjectsClientWrapper::new(
                self.permission_control.clone(),
            )),
        )?;
        debug!(
            priority = WORKSPACE_WRAPPER_PRIORITY,
            "Registered workspace saved objects client wrapper"
        );
        Ok(())
    }

    pub fn start(
        &self,
        clients: &Arc<ScopedClientProvider>,
        auth: Arc<dyn AuthStateReader>,
    ) -> Result<()> {
        debug!("Starting workspace plugin");
        if !self.config.permission_control_enabled() {
            return Ok(());
        }
        self.permission_control.setup(clients, auth)
    }

    pub fn permission_control(&self) -> Arc<SavedObjectsPermissionControl> {
        self.permission_control.clone()
    }
}
