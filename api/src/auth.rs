use axum::{
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use qaforum_shared::{ApiResponse, AuthResponse, LoginUser, RegisterUser, User};
use serde::{Deserialize, Serialize};

use crate::{
    config::JwtConfig,
    db,
    error::{AppError, AppResult},
    extract::AppJson,
    password, users, AppState,
};

const MIN_USERNAME_LEN: usize = 3;

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
}

impl Claims {
    pub fn new(user_id: i64, expiry_days: u64) -> Self {
        let exp = now_secs() + expiry_days as usize * 24 * 60 * 60;
        Self { sub: user_id, exp }
    }
}

fn now_secs() -> usize {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

pub fn issue_token(user_id: i64, config: &JwtConfig) -> AppResult<String> {
    encode(
        &Header::default(),
        &Claims::new(user_id, config.expiry_days),
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign token: {e}")))
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> AppResult<i64> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".into()))?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Not authorized, token failed".into()))?;

    Ok(data.claims.sub)
}

/// The caller's identity, resolved from the bearer token on every request.
///
/// Rejects with `Unauthorized` when the header is missing, the token does not
/// verify, or the user it names has been removed.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = extract_user_id(&parts.headers, &state.jwt.secret)?;

        let user = db::run(&state.db, move |conn| Ok(users::find_user(conn, user_id)?))
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not authorized, user not found".into()))?;

        Ok(AuthUser { user })
    }
}

// ── Handlers ──

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at least {MIN_USERNAME_LEN} characters"
        )));
    }
    if ammonia::clean(&username) != username {
        return Err(AppError::Validation(
            "Username may not contain markup".into(),
        ));
    }
    if !is_plausible_email(&email) {
        return Err(AppError::Validation(
            "Please enter a valid email address".into(),
        ));
    }
    password::validate_password_strength(&payload.password).map_err(AppError::Validation)?;

    let secret = payload.password;
    let user = db::run(&state.db, move |conn| {
        let hash = password::hash_password(&secret)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
        users::insert_user(conn, &username, &email, &hash)
    })
    .await?;

    let token = issue_token(user.id, &state.jwt)?;
    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AuthResponse { token, user })),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginUser>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let email = payload.email.trim().to_lowercase();
    let secret = payload.password;

    let user = db::run(&state.db, move |conn| {
        let invalid = || AppError::Unauthorized("Invalid credentials".into());
        let creds = users::find_credentials(conn, &email)?.ok_or_else(invalid)?;
        let matches = password::verify_password(&secret, &creds.password_hash)
            .map_err(|e| AppError::Internal(format!("stored password hash unreadable: {e}")))?;
        if matches {
            Ok(creds.user)
        } else {
            Err(invalid())
        }
    })
    .await?;

    let token = issue_token(user.id, &state.jwt)?;
    tracing::debug!(user_id = user.id, "user logged in");

    Ok(Json(ApiResponse::ok(AuthResponse { token, user })))
}

/// GET /api/auth/me
pub async fn me(auth: AuthUser) -> Json<ApiResponse<User>> {
    Json(ApiResponse::ok(auth.user))
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the
/// domain with text on both sides of it.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.contains('@') => domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len()),
        _ => false,
    }
}
