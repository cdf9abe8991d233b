use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};

use parley_types::api::{ErrorResponse, LoginRequest, MeResponse, RegisterRequest};
use parley_types::models::Identity;

use crate::service::{AuthError, AuthService};

pub type ApiState = Arc<AuthService>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Validation => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken | AuthError::UsernameTaken => StatusCode::CONFLICT,
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::UnknownAccount
            | AuthError::BadCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn register(
    State(auth): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let resp = auth.register(&req.email, &req.username, &req.password)?;
    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn login(
    State(auth): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let resp = auth.login(&req.email, &req.password)?;
    Ok(Json(resp))
}

/// Identity was attached by the auth middleware.
pub async fn me(Extension(identity): Extension<Identity>) -> Json<MeResponse> {
    Json(MeResponse { user: identity })
}
