//! `/w/{workspaceId}/...` URLs address a workspace; routes see the path
//! without the prefix.

use axum::{
    extract::Request,
    http::{uri::PathAndQuery, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower::Layer;
use workspace_guard_core::utils::{clean_workspace_id, get_workspace_id_from_url};

/// Workspace a request was addressed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceId(pub String);

pub async fn strip_workspace_prefix(mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if let Some(workspace_id) = get_workspace_id_from_url(&path) {
        let target = request
            .uri()
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or(path.as_str());
        let cleaned = clean_workspace_id(target);
        match cleaned.parse::<PathAndQuery>() {
            Ok(path_and_query) => {
                let mut parts = request.uri().clone().into_parts();
                parts.path_and_query = Some(path_and_query);
                if let Ok(uri) = Uri::from_parts(parts) {
                    *request.uri_mut() = uri;
                    request.extensions_mut().insert(WorkspaceId(workspace_id));
                }
            }
            Err(e) => tracing::warn!(error = %e, path = %path, "Could not rewrite workspace URL"),
        }
    }
    next.run(request).await
}

/// Rewrite workspace URLs before `app` routes them.
pub fn with_workspace_urls(app: Router) -> Router {
    Router::new().fallback_service(middleware::from_fn(strip_workspace_prefix).layer(app))
}
