//! Sessions and credentials
//!
//! Passwords are stored as bcrypt hashes. Sessions are HS256 JWTs carrying the
//! user id, handed out both in the response body and as an HttpOnly cookie.

use chrono::{Duration, Utc};
use cookie::{time, Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    db::{CatalogStore, DUPLICATE_EMAIL},
    error::{AppError, AppResult},
    models::{LoginRequest, RegisterRequest, User},
};

/// Cookie carrying the session token
pub const AUTH_COOKIE: &str = "jwt";

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Claims embedded in a session token
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id
    sub: String,
    iat: i64,
    exp: i64,
}

/// Token signing and cookie settings
#[derive(Clone)]
pub struct AuthSettings {
    secret: String,
    expiry_days: i64,
    cookie_secure: bool,
    bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("expiry_days", &self.expiry_days)
            .field("cookie_secure", &self.cookie_secure)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl AuthSettings {
    pub fn new(
        secret: impl Into<String>,
        expiry_days: i64,
        cookie_secure: bool,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            secret: secret.into(),
            expiry_days,
            cookie_secure,
            bcrypt_cost,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.jwt_expiry_days,
            config.cookie_secure,
            config.bcrypt_cost,
        )
    }

    /// Signs a session token for `user_id`
    pub fn issue_token(&self, user_id: Uuid) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.expiry_days)).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Validates signature and expiry, returning the user id
    pub fn verify_token(&self, token: &str) -> AppResult<Uuid> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected session token");
            AppError::Unauthorized("Not authorized, token failed".to_string())
        })?;

        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| AppError::Unauthorized("Not authorized, token failed".to_string()))
    }

    /// HttpOnly cookie holding `token` for the token's lifetime
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.cookie_secure)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::days(self.expiry_days))
            .build()
    }

    /// Expired cookie that clears the session
    pub fn logout_cookie(&self) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, ""))
            .path("/")
            .http_only(true)
            .expires(time::OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

/// Hashes a password on the blocking pool
pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Checks a password against a stored hash on the blocking pool
pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
}

/// Creates an account with empty shelves and the `user` role
#[tracing::instrument(skip(store, settings, request), fields(email = %request.email))]
pub async fn register(
    store: &dyn CatalogStore,
    settings: &AuthSettings,
    request: RegisterRequest,
) -> AppResult<User> {
    let name = request.name.trim();
    let email = request.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || request.password.is_empty() {
        return Err(AppError::InvalidInput("Please add all fields".to_string()));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::InvalidInput(DUPLICATE_EMAIL.to_string()));
    }

    let hash = hash_password(&request.password, settings.bcrypt_cost).await?;
    let photo = request.photo.filter(|p| !p.trim().is_empty());
    let user = User::new(name.to_string(), email, hash, photo);
    store.insert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// Resolves credentials to a user. Unknown email and wrong password fail alike.
#[tracing::instrument(skip(store, request), fields(email = %request.email))]
pub async fn login(store: &dyn CatalogStore, request: LoginRequest) -> AppResult<User> {
    let email = request.email.trim().to_lowercase();
    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(&request.password, &user.password_hash).await? {
        tracing::info!(user_id = %user.id, "Login rejected");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    Ok(user)
}

/// Loads the account behind a session
pub async fn current_user(store: &dyn CatalogStore, user_id: Uuid) -> AppResult<User> {
    store
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
