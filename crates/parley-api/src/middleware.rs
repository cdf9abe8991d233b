use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::handlers::ApiState;
use crate::service::AuthError;

/// Extract and verify a bearer token, attaching the resolved `Identity` to
/// the request for downstream handlers.
pub async fn require_auth(
    State(auth): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::MissingToken)?;

    let identity = auth.verify_token(token)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
