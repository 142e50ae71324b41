use axum::{
    body::{to_bytes, Body},
    extract::Path,
    http::{Request, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use workspace_guard::api::{guarded, with_workspace_urls, ApiError, AppState, ScopedClient};
use workspace_guard_core::acl::{PermissionMode, Permissions, Principals};
use workspace_guard_core::auth::{Claims, Hs256Verifier, TokenVerifier};
use workspace_guard_core::saved_objects::{
    FindOptions, FindResponse, InMemoryRepository, SavedObject, WORKSPACE_TYPE,
};
use workspace_guard_core::{Request as ClientRequest, WorkspaceConfig};

const SECRET: &str = "test-secret";

async fn get_object(
    ScopedClient(client): ScopedClient,
    Path((object_type, id)): Path<(String, String)>,
) -> Result<Json<SavedObject>, ApiError> {
    Ok(Json(client.get(&object_type, &id).await?))
}

async fn delete_object(
    ScopedClient(client): ScopedClient,
    Path((object_type, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    client.delete(&object_type, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_objects(
    ScopedClient(client): ScopedClient,
    Json(options): Json<FindOptions>,
) -> Result<Json<FindResponse>, ApiError> {
    Ok(Json(client.find(options).await?))
}

async fn whoami(Extension(request): Extension<ClientRequest>) -> Json<Value> {
    Json(json!({
        "path": request.path(),
        "workspace": request.workspace_id(),
    }))
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_millis(200)).await;
    StatusCode::OK
}

fn library(mode: PermissionMode, user: &str) -> Permissions {
    let mut permissions = Permissions::new();
    permissions.insert(mode, Principals::with_users([user]));
    permissions
}

async fn app(with_auth: bool) -> (Router, AppState) {
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert(
        SavedObject::new(WORKSPACE_TYPE, "w1").with_permissions(library(PermissionMode::LibraryWrite, "alice")),
    )
    .await;
    repo.insert(
        SavedObject::new(WORKSPACE_TYPE, "w2").with_permissions(library(PermissionMode::LibraryWrite, "bob")),
    )
    .await;
    repo.insert(SavedObject::new("dashboard", "d1").with_workspaces(["w1"])).await;
    repo.insert(SavedObject::new("config", "global")).await;

    let verifier: Option<Arc<dyn TokenVerifier>> = if with_auth {
        Some(Arc::new(Hs256Verifier::new(SECRET.into())))
    } else {
        None
    };
    let config = WorkspaceConfig {
        enabled: true,
        ..Default::default()
    };
    let (state, _plugin) = AppState::bootstrap(config, repo, verifier).unwrap();

    let routes = Router::new()
        .route(
            "/api/saved_objects/{type}/{id}",
            get(get_object).delete(delete_object),
        )
        .route("/api/saved_objects/_find", post(find_objects))
        .route("/api/whoami", get(whoami))
        .route("/api/slow", get(slow));
    (with_workspace_urls(guarded(routes, state.clone())), state)
}

fn token_for(user: &str) -> String {
    encode(
        &Header::default(),
        &Claims {
            sub: user.into(),
            roles: vec![],
            exp: None,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("Authorization", format!("Bearer {}", token_for(user)));
    }
    match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn workspace_member_reads_object() {
    let (app, _) = app(true).await;
    let (status, body) = send(&app, request("GET", "/api/saved_objects/dashboard/d1", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "d1");
    assert_eq!(body["type"], "dashboard");
}

#[tokio::test]
async fn outsider_is_forbidden() {
    let (app, _) = app(true).await;
    let (status, body) = send(&app, request("GET", "/api/saved_objects/dashboard/d1", Some("bob"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body,
        json!({
            "statusCode": 403,
            "error": "Forbidden",
            "message": "Invalid saved objects permission"
        })
    );

    let (status, _) = send(&app, request("DELETE", "/api/saved_objects/dashboard/d1", Some("bob"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, request("DELETE", "/api/saved_objects/dashboard/d1", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn anonymous_caller_only_sees_unguarded_objects() {
    let (app, _) = app(true).await;
    let (status, _) = send(&app, request("GET", "/api/saved_objects/dashboard/d1", None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = send(&app, request("GET", "/api/saved_objects/config/global", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "global");
}

#[tokio::test]
async fn without_authentication_guarded_objects_are_denied() {
    let (app, _) = app(false).await;
    let (status, _) = send(&app, request("GET", "/api/saved_objects/dashboard/d1", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, request("GET", "/api/saved_objects/config/global", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_object_is_not_found() {
    let (app, _) = app(true).await;
    let (status, body) = send(&app, request("GET", "/api/saved_objects/dashboard/nope", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn find_outside_permitted_workspaces_is_unauthorized() {
    let (app, _) = app(true).await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/saved_objects/_find",
            Some("alice"),
            Some(json!({ "types": ["dashboard"], "workspaces": ["w2"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid workspace permission");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/api/saved_objects/_find",
            Some("alice"),
            Some(json!({ "types": ["dashboard"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn workspace_prefix_is_stripped_and_recorded() {
    let (app, _) = app(true).await;
    let (status, body) = send(&app, request("GET", "/w/w1/api/whoami?x=1", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "path": "/api/whoami", "workspace": "w1" }));

    let (status, body) = send(&app, request("GET", "/api/whoami", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["workspace"], Value::Null);

    let (status, _) = send(&app, request("GET", "/w/w1/api/saved_objects/dashboard/d1", Some("alice"), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn auth_state_is_cleared_after_each_request() {
    let (app, state) = app(true).await;
    for user in [Some("alice"), Some("bob"), None] {
        send(&app, request("GET", "/api/saved_objects/dashboard/d1", user, None)).await;
    }
    assert!(state.auth_states.is_empty());
}

#[tokio::test]
async fn auth_state_is_cleared_when_request_is_cancelled() {
    let (app, state) = app(true).await;
    for _ in 0..5 {
        let pending = app
            .clone()
            .oneshot(request("GET", "/api/slow", Some("alice"), None));
        let outcome = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(outcome.is_err());
    }
    assert!(state.auth_states.is_empty());
}

#[tokio::test]
async fn workspace_url_scopes_find() {
    let (app, _) = app(true).await;
    let (status, body) = send(
        &app,
        request(
            "POST",
            "/w/w1/api/saved_objects/_find",
            Some("alice"),
            Some(json!({ "types": ["dashboard"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["saved_objects"][0]["id"], "d1");

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/w/w2/api/saved_objects/_find",
            Some("alice"),
            Some(json!({ "types": ["dashboard"] })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid workspace permission");
}
