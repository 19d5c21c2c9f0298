//! Error responses and request extractors.
//!
//! Every failure is rendered as `{ "success": false, "message": ... }`. The status code follows
//! the core error kind: not found 404, validation 400, conflict 409, internal 500.

use api_shared::auth::{parse_actor, AuthError, ACTOR_HEADER};
use api_shared::dto::ErrorRes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lis_core::{EntityId, ErrorKind, LisError};

#[derive(Debug)]
pub enum ApiError {
    Lis(LisError),
    Auth(AuthError),
    Body(JsonRejection),
}

impl From<LisError> for ApiError {
    fn from(e: LisError) -> Self {
        ApiError::Lis(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Body(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Lis(e) => match e.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, e.to_string()),
                ErrorKind::Validation => (StatusCode::BAD_REQUEST, e.to_string()),
                ErrorKind::Conflict => (StatusCode::CONFLICT, e.to_string()),
                ErrorKind::Internal => {
                    tracing::error!("internal error: {:?}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
                }
            },
            ApiError::Auth(e @ (AuthError::MissingApiKey | AuthError::InvalidApiKey)) => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            ApiError::Auth(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Body(e) => (StatusCode::BAD_REQUEST, e.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(ErrorRes::new(message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// The acting user, read from the `x-actor-id` header.
#[derive(Clone, Copy, Debug)]
pub struct Actor(pub EntityId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok());
        Ok(Actor(parse_actor(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_status_codes() {
        let cases = [
            (LisError::not_found("sample", "x"), StatusCode::NOT_FOUND),
            (LisError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (LisError::StateConflict("busy".into()), StatusCode::CONFLICT),
            (
                LisError::InvalidTransition {
                    entity: "order",
                    from: "completed".into(),
                    to: "pending".into(),
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_and_message().0, status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let error = ApiError::from(LisError::FileWrite(std::io::Error::other("disk full")));
        let (status, message) = error.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal error");
    }

    #[test]
    fn missing_api_key_is_unauthorized() {
        let error = ApiError::from(AuthError::MissingApiKey);
        assert_eq!(error.status_and_message().0, StatusCode::UNAUTHORIZED);
        let error = ApiError::from(AuthError::MissingActor);
        assert_eq!(error.status_and_message().0, StatusCode::BAD_REQUEST);
    }
}
