//! HTTP edge: request authentication, workspace URLs, and error responses.

pub mod auth_middleware;
pub mod errors;
pub mod workspace_url;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use workspace_guard_core::auth::{AuthStateStorage, TokenVerifier};
use workspace_guard_core::saved_objects::{
    ClientProviderBuilder, SavedObjectsClient, ScopedClientProvider,
};
use workspace_guard_core::{Request as ClientRequest, WorkspaceConfig, WorkspacePlugin};

pub use auth_middleware::authenticate;
pub use errors::ApiError;
pub use workspace_url::{strip_workspace_prefix, with_workspace_urls, WorkspaceId};

/// Shared state of the guarded routes.
#[derive(Clone)]
pub struct AppState {
    /// `None` when no authentication is configured.
    pub verifier: Option<Arc<dyn TokenVerifier>>,
    pub auth_states: Arc<AuthStateStorage>,
    pub clients: Arc<ScopedClientProvider>,
}

impl AppState {
    /// Assemble the client pipeline over `store` and start the workspace plugin.
    pub fn bootstrap(
        config: WorkspaceConfig,
        store: Arc<dyn SavedObjectsClient>,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> anyhow::Result<(Self, WorkspacePlugin)> {
        let plugin = WorkspacePlugin::new(config);
        let mut builder = ClientProviderBuilder::new();
        plugin.setup(&mut builder)?;
        let clients = builder.build(store);

        let auth_states = Arc::new(AuthStateStorage::new());
        plugin.start(&clients, auth_states.clone())?;
        tracing::info!(
            wrappers = ?clients.wrapper_ids(),
            authentication = verifier.is_some(),
            "Saved objects client pipeline ready"
        );

        Ok((
            Self {
                verifier,
                auth_states,
                clients,
            },
            plugin,
        ))
    }
}

/// Wrap `routes` with authentication and request tracing.
///
/// URL rewriting has to happen before routing, so apply
/// [`with_workspace_urls`] to the returned router.
pub fn guarded(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Saved-objects client scoped to the current request.
pub struct ScopedClient(pub Arc<dyn SavedObjectsClient>);

impl FromRequestParts<AppState> for ScopedClient {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request = parts
            .extensions
            .get::<ClientRequest>()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
        Ok(Self(state.clients.client(request)))
    }
}
