use std::collections::HashMap;
use std::sync::RwLock;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use parley_types::api::{AuthResponse, Claims};
use parley_types::models::Identity;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token resolves to no known account")]
    UnknownAccount,
    #[error("email already registered")]
    EmailTaken,
    #[error("username already taken")]
    UsernameTaken,
    #[error("incorrect email or password")]
    BadCredentials,
    #[error("invalid registration data")]
    Validation,
    #[error("internal auth failure")]
    Internal,
}

#[derive(Debug, Clone)]
struct Account {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

impl Account {
    fn identity(&self) -> Identity {
        Identity {
            user_id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Identity subsystem: issues tokens at registration/login and verifies
/// presented tokens for both the HTTP surface and gateway admission.
/// Account storage is in-memory; nothing survives a restart.
pub struct AuthService {
    accounts: RwLock<HashMap<Uuid, Account>>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            jwt_secret,
        }
    }

    /// Dev convenience: a known account to poke the server with.
    pub fn seed_dev_account(&self) {
        match self.register("user@example.com", "testuser", "password123") {
            Ok(_) => info!("seeded dev account user@example.com"),
            Err(AuthError::EmailTaken) => {}
            Err(e) => tracing::warn!("failed to seed dev account: {e}"),
        }
    }

    pub fn register(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        if email.is_empty() || !(3..=32).contains(&username.len()) || password.len() < 8 {
            return Err(AuthError::Validation);
        }

        let mut accounts = self.accounts.write().map_err(|_| AuthError::Internal)?;
        if accounts.values().any(|a| a.email == email) {
            return Err(AuthError::EmailTaken);
        }
        if accounts.values().any(|a| a.username == username) {
            return Err(AuthError::UsernameTaken);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| AuthError::Internal)?
            .to_string();

        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: username.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        let identity = account.identity();
        accounts.insert(account.id, account);
        drop(accounts);

        info!("registered {} ({})", identity.username, identity.email);
        let token = self.issue_token(&identity)?;
        Ok(AuthResponse {
            token,
            user: identity,
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let identity = {
            let accounts = self.accounts.read().map_err(|_| AuthError::Internal)?;
            let account = accounts
                .values()
                .find(|a| a.email == email)
                .ok_or(AuthError::BadCredentials)?;

            let parsed =
                PasswordHash::new(&account.password_hash).map_err(|_| AuthError::Internal)?;
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .map_err(|_| AuthError::BadCredentials)?;

            account.identity()
        };

        info!("login {} ({})", identity.username, identity.email);
        let token = self.issue_token(&identity)?;
        Ok(AuthResponse {
            token,
            user: identity,
        })
    }

    /// The credential gate: decode the token and resolve it to a live
    /// account. Both checks must pass before a connection is admitted.
    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AuthError::InvalidToken)?;

        let accounts = self.accounts.read().map_err(|_| AuthError::Internal)?;
        let account = accounts
            .get(&data.claims.sub)
            .ok_or(AuthError::UnknownAccount)?;
        Ok(account.identity())
    }

    fn issue_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let claims = Claims {
            sub: identity.user_id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            exp: (Utc::now() + chrono::Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|_| AuthError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new("test-secret".into())
    }

    #[test]
    fn register_then_verify_token() {
        let auth = service();
        let resp = auth
            .register("alice@example.com", "alice", "correct-horse")
            .unwrap();

        let identity = auth.verify_token(&resp.token).unwrap();
        assert_eq!(identity, resp.user);
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn duplicate_email_and_username_are_rejected() {
        let auth = service();
        auth.register("alice@example.com", "alice", "correct-horse")
            .unwrap();

        assert_eq!(
            auth.register("alice@example.com", "alice2", "correct-horse"),
            Err(AuthError::EmailTaken)
        );
        assert_eq!(
            auth.register("alice2@example.com", "alice", "correct-horse"),
            Err(AuthError::UsernameTaken)
        );
    }

    #[test]
    fn login_checks_password() {
        let auth = service();
        auth.register("alice@example.com", "alice", "correct-horse")
            .unwrap();

        assert!(auth.login("alice@example.com", "correct-horse").is_ok());
        assert_eq!(
            auth.login("alice@example.com", "wrong"),
            Err(AuthError::BadCredentials)
        );
        assert_eq!(
            auth.login("nobody@example.com", "correct-horse"),
            Err(AuthError::BadCredentials)
        );
    }

    #[test]
    fn garbage_token_is_invalid() {
        let auth = service();
        assert_eq!(
            auth.verify_token("not-a-jwt"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn token_from_another_secret_is_invalid() {
        let auth = service();
        let other = AuthService::new("other-secret".into());
        let resp = other
            .register("alice@example.com", "alice", "correct-horse")
            .unwrap();

        assert_eq!(auth.verify_token(&resp.token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn weak_registration_data_is_rejected() {
        let auth = service();
        assert_eq!(
            auth.register("alice@example.com", "al", "correct-horse"),
            Err(AuthError::Validation)
        );
        assert_eq!(
            auth.register("alice@example.com", "alice", "short"),
            Err(AuthError::Validation)
        );
    }
}
