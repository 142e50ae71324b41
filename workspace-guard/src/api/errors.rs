use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use workspace_guard_core::SavedObjectsError;

/// A saved-objects failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SavedObjectsError);

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "statusCode")]
    status_code: u16,
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SavedObjectsError::NotFound { .. } => StatusCode::NOT_FOUND,
            SavedObjectsError::Conflict { .. } => StatusCode::CONFLICT,
            SavedObjectsError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SavedObjectsError::Forbidden(_) => StatusCode::FORBIDDEN,
            SavedObjectsError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            SavedObjectsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SavedObjectsError> for ApiError {
    fn from(err: SavedObjectsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            SavedObjectsError::Store(e) => {
                tracing::error!(error = ?e, "Saved objects store failure");
                "An internal server error occurred".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            status_code: status.as_u16(),
            error: self.0.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
