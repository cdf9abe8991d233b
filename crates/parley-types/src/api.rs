use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Identity;

/// JWT claims shared between the HTTP auth surface and the gateway admission
/// check. Canonical definition lives here to avoid duplication. Verification
/// resolves the claims back to a live account rather than trusting these
/// fields, so identity construction lives with the account store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

/// Returned by `GET /auth/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: Identity,
}

/// Error body for the HTTP surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
