use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::request::Parts,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    validate_email, validate_full_name, validate_password, validate_phone,
};
use crate::db::{
    AuthResponse, DbPool, LoginRequest, ProfileUpdateRequest, RegisterRequest, Session, User,
    UserResponse,
};
use crate::AppState;

/// Name of the fallback session cookie set by the OAuth exchange
pub const SESSION_COOKIE: &str = "session_token";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random bearer token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create a session row and return the plaintext token
async fn create_session(db: &DbPool, user_id: &str, ttl_days: i64) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let now = chrono::Utc::now();
    let expires_at = (now + chrono::Duration::days(ttl_days)).to_rfc3339();

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO sessions (id, user_id, token_hash, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(&expires_at)
    .bind(now.to_rfc3339())
    .execute(db)
    .await?;

    Ok(token)
}

async fn find_session_user(db: &DbPool, token: &str) -> Result<Option<User>, sqlx::Error> {
    let token_hash = hash_token(token);
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > ?",
    )
    .bind(&token_hash)
    .bind(chrono::Utc::now().to_rfc3339())
    .fetch_optional(db)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(db)
        .await
}

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_full_name(&req.full_name) {
        errors.add("full_name", e);
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }

    errors.finish()
}

/// Register endpoint
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    validate_register_request(&req)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, phone, role, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 'user', 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&req.email)
    .bind(&password_hash)
    .bind(&req.full_name)
    .bind(&req.phone)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    tracing::info!(user = %req.email, "User registered");

    // Welcome email, fire and forget
    let email = state.email.clone();
    let to = req.email.clone();
    let name = req.full_name.clone();
    tokio::spawn(async move {
        if let Err(e) = email.send_welcome_email(&to, &name).await {
            tracing::warn!(error = %e, "Failed to send welcome email");
        }
    });

    let token = create_session(&state.db, &id, state.config.auth.session_ttl_days).await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&req.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Resolve the current session
///
/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

#[derive(Debug, Deserialize)]
pub struct OAuthSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamSession {
    email: String,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct OAuthSessionResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
}

/// Exchange an OAuth session_id with the upstream auth service and establish
/// a cookie session.
///
/// POST /api/auth/session
pub async fn oauth_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<OAuthSessionRequest>,
) -> Result<(CookieJar, Json<OAuthSessionResponse>), ApiError> {
    if req.session_id.is_empty() {
        return Err(ApiError::bad_request("session_id required"));
    }

    let endpoint = state
        .config
        .oauth
        .session_endpoint
        .as_ref()
        .ok_or_else(|| ApiError::bad_request("OAuth login is not configured"))?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(
            state.config.oauth.timeout_seconds,
        ))
        .build()
        .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

    let upstream = client
        .get(endpoint)
        .header("X-Session-ID", &req.session_id)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "OAuth session exchange failed");
            ApiError::upstream("Authentication service unavailable")
        })?;

    if !upstream.status().is_success() {
        return Err(ApiError::unauthorized("Invalid session"));
    }

    let session: UpstreamSession = upstream
        .json()
        .await
        .map_err(|_| ApiError::upstream("Malformed response from authentication service"))?;

    // Find or create the user for this identity
    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&session.email)
        .fetch_optional(&state.db)
        .await?;

    let user = match existing {
        Some(user) => {
            sqlx::query("UPDATE users SET full_name = ?, updated_at = ? WHERE id = ?")
                .bind(&session.name)
                .bind(chrono::Utc::now().to_rfc3339())
                .bind(&user.id)
                .execute(&state.db)
                .await?;
            user
        }
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            let now = chrono::Utc::now().to_rfc3339();
            sqlx::query(
                r#"
                INSERT INTO users (id, email, password_hash, full_name, phone, role, email_verified, created_at, updated_at)
                VALUES (?, ?, '', ?, NULL, 'user', 1, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&session.email)
            .bind(&session.name)
            .bind(&now)
            .bind(&now)
            .execute(&state.db)
            .await?;

            sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(&id)
                .fetch_one(&state.db)
                .await?
        }
    };

    let token = create_session(&state.db, &user.id, state.config.auth.session_ttl_days).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build();

    Ok((
        jar.add(cookie),
        Json(OAuthSessionResponse {
            id: user.id,
            email: user.email,
            full_name: session.name,
            role: user.role,
        }),
    ))
}

/// Logout endpoint: invalidate the cookie session if present
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let token_hash = hash_token(cookie.value());
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(&state.db)
            .await?;
    }

    let mut removal = Cookie::from(SESSION_COOKIE);
    removal.set_path("/");

    Ok((
        jar.remove(removal),
        Json(serde_json::json!({ "message": "Logged out" })),
    ))
}

/// Update the caller's profile
///
/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(ref name) = req.full_name {
        if let Err(e) = validate_full_name(name) {
            errors.add("full_name", e);
        }
    }
    if let Err(e) = validate_phone(&req.phone) {
        errors.add("phone", e);
    }
    errors.finish()?;

    let full_name = req.full_name.unwrap_or(user.full_name);
    let phone = req.phone.or(user.phone);

    sqlx::query("UPDATE users SET full_name = ?, phone = ?, updated_at = ? WHERE id = ?")
        .bind(&full_name)
        .bind(&phone)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(&user.id)
        .execute(&state.db)
        .await?;

    let updated = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(&user.id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(UserResponse::from(updated)))
}

/// Create the bootstrap admin account if no admin exists yet
pub async fn ensure_admin_user(db: &DbPool, email: &str, password: &str) -> anyhow::Result<()> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE role = 'admin' LIMIT 1")
            .fetch_optional(db)
            .await?;
    if existing.is_some() {
        return Ok(());
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash =
        hash_password(password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, full_name, phone, role, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, 'Administrator', NULL, 'admin', 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::info!(email = %email, "Created bootstrap admin user");
    Ok(())
}

/// Extract the bearer token from request headers
fn extract_bearer(parts: &Parts) -> Option<String> {
    let header = parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        Some(token.to_string())
    } else {
        Some(header.to_string())
    }
}

/// Extractor for the current authenticated user.
///
/// Tries the Authorization header first, then the session cookie set by the
/// OAuth exchange.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = match extract_bearer(parts) {
            Some(token) => token,
            None => {
                let jar = CookieJar::from_headers(&parts.headers);
                jar.get(SESSION_COOKIE)
                    .map(|c| c.value().to_string())
                    .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?
            }
        };

        find_session_user(&state.db, &token)
            .await
            .map_err(ApiError::from)?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
    }
}

/// Extractor that additionally requires the admin role
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = User::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2secret").unwrap();
        assert!(verify_password("hunter2secret", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_tokens_are_unique_and_hashed() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
        assert_eq!(t1.len(), 64);
        assert_ne!(hash_token(&t1), t1);
        assert_eq!(hash_token(&t1), hash_token(&t1));
    }

    #[tokio::test]
    async fn test_ensure_admin_user_is_idempotent() {
        let db = crate::db::init_in_memory().await.unwrap();

        ensure_admin_user(&db, "admin@rafflr.local", "change-me-now")
            .await
            .unwrap();
        ensure_admin_user(&db, "other@rafflr.local", "change-me-now")
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'admin'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let admin: User = sqlx::query_as("SELECT * FROM users WHERE role = 'admin'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(admin.email, "admin@rafflr.local");
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let db = crate::db::init_in_memory().await.unwrap();
        ensure_admin_user(&db, "admin@rafflr.local", "change-me-now")
            .await
            .unwrap();
        let admin: User = sqlx::query_as("SELECT * FROM users WHERE role = 'admin'")
            .fetch_one(&db)
            .await
            .unwrap();

        let token = create_session(&db, &admin.id, 7).await.unwrap();
        let found = find_session_user(&db, &token).await.unwrap();
        assert_eq!(found.unwrap().id, admin.id);

        assert!(find_session_user(&db, "bogus-token").await.unwrap().is_none());
    }
}
