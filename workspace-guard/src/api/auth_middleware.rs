use super::{workspace_url::WorkspaceId, AppState};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use workspace_guard_core::auth::{AuthStateStorage, AuthStatus, TokenVerifier};
use workspace_guard_core::Request as ClientRequest;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Resolve the auth outcome from request headers.
pub async fn auth_status(
    headers: &HeaderMap,
    verifier: Option<&Arc<dyn TokenVerifier>>,
) -> AuthStatus {
    let Some(verifier) = verifier else {
        return AuthStatus::Unknown;
    };
    match bearer_token(headers) {
        Some(token) => match verifier.verify(token).await {
            Some(claims) => AuthStatus::Authenticated(claims.into_auth_info()),
            None => AuthStatus::Unauthenticated,
        },
        None => AuthStatus::Unauthenticated,
    }
}

/// Drops the recorded auth state when the request finishes, is cancelled,
/// or panics.
struct AuthStateGuard {
    states: Arc<AuthStateStorage>,
    request: ClientRequest,
}

impl Drop for AuthStateGuard {
    fn drop(&mut self) {
        self.states.remove(&self.request);
    }
}

/// Record the caller's auth outcome for the permission layer.
///
/// Requests are never rejected here; unauthenticated callers get a principal
/// that no ACL grants, so guarded objects are denied further down. The
/// recorded state lives exactly as long as the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut client_request = ClientRequest::new(request.uri().path());
    if let Some(WorkspaceId(id)) = request.extensions().get::<WorkspaceId>() {
        client_request = client_request.with_workspace_id(id.clone());
    }

    let status = auth_status(request.headers(), state.verifier.as_ref()).await;
    tracing::debug!(
        request_id = %client_request.id(),
        authenticated = matches!(status, AuthStatus::Authenticated(_)),
        "Recorded auth state"
    );
    state.auth_states.set(&client_request, status);
    let _guard = AuthStateGuard {
        states: state.auth_states.clone(),
        request: client_request.clone(),
    };

    request.extensions_mut().insert(client_request);
    next.run(request).await
}
