use std::sync::OnceLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use roadeye_db::CommitGate;
use roadeye_db::models::UserRow;
use roadeye_types::api::{
    AuthResponse, LoginRequest, ProfileResponse, RefreshRequest, RegisterRequest, TokenKind,
    TokenResponse,
};
use roadeye_types::models::User;

use crate::deadline::{Deadline, run_blocking};
use crate::middleware::Authenticated;
use crate::session::SessionError;
use crate::{ApiError, AppState, AppStateInner};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 254;

// -- Operations --

/// Creates an account and opens a session for it.
pub fn register_user(
    state: &AppStateInner,
    req: &RegisterRequest,
    gate: &CommitGate,
) -> Result<AuthResponse, ApiError> {
    validate_registration(req)?;

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let row = state
        .db
        .create_user(&user_id.to_string(), &req.username, &req.email, &password_hash, gate)?;
    let user = User::try_from(row)?;

    info!("User {} registered", user.id);
    session_for(state, user)
}

/// Checks credentials and opens a session. Unknown email and wrong password
/// are indistinguishable to the caller.
pub fn login_user(state: &AppStateInner, req: &LoginRequest) -> Result<AuthResponse, ApiError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Email and password are required"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::validation("Invalid email address"));
    }

    let row = state.db.get_user_by_email(&req.email)?;
    if !credentials_match(row.as_ref(), &req.password)? {
        match &row {
            Some(row) => warn!("Login rejected: wrong password for user {}", row.id),
            None => warn!("Login rejected: unknown email"),
        }
        return Err(invalid_credentials());
    }

    match row {
        Some(row) => session_for(state, User::try_from(row)?),
        None => Err(invalid_credentials()),
    }
}

/// Trades a refresh token for a new access/refresh pair. Refresh tokens stay
/// valid until they expire; there is no server-side revocation.
pub fn refresh_session(state: &AppStateInner, refresh_token: &str) -> Result<TokenResponse, ApiError> {
    let claims = state
        .sessions
        .validate_kind(refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            warn!("Refresh rejected: {}", e);
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

    if state.db.get_user_by_id(&claims.sub.to_string())?.is_none() {
        warn!("Refresh rejected: user {} no longer exists", claims.sub);
        return Err(ApiError::Unauthorized("Invalid or expired token".into()));
    }

    let (token, refresh_token) = issue_pair(state, claims.sub, &claims.email)?;
    Ok(TokenResponse {
        token,
        refresh_token,
    })
}

pub fn load_profile(state: &AppStateInner, user_id: Uuid) -> Result<User, ApiError> {
    let row = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(User::try_from(row)?)
}

// -- Handlers --

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    deadline: Deadline,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let response = run_blocking(deadline, move |gate| register_user(&state, &req, gate)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    deadline: Deadline,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let response = run_blocking(deadline, move |_| login_user(&state, &req)).await?;
    Ok(Json(response))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    deadline: Deadline,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let response =
        run_blocking(deadline, move |_| refresh_session(&state, &req.refresh_token)).await?;
    Ok(Json(response))
}

/// GET /auth/profile
pub async fn profile(
    Authenticated(claims): Authenticated,
    State(state): State<AppState>,
    deadline: Deadline,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_blocking(deadline, move |_| load_profile(&state, claims.sub)).await?;
    Ok(Json(ProfileResponse { user }))
}

// -- Helpers --

pub fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if !USERNAME_LEN.contains(&req.username.chars().count()) {
        return Err(ApiError::validation("Username must be 3 to 50 characters"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::validation("Invalid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 8 characters"));
    }
    Ok(())
}

/// Shape check only: `local@domain.tld`, no whitespace, one `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

fn session_for(state: &AppStateInner, user: User) -> Result<AuthResponse, ApiError> {
    let (token, refresh_token) = issue_pair(state, user.id, &user.email)?;
    Ok(AuthResponse {
        user,
        token,
        refresh_token,
    })
}

fn issue_pair(state: &AppStateInner, user_id: Uuid, email: &str) -> Result<(String, String), ApiError> {
    let access = state
        .sessions
        .issue_access_token(user_id, email)
        .map_err(signing_failed)?;
    let refresh = state
        .sessions
        .issue_refresh_token(user_id, email)
        .map_err(signing_failed)?;
    Ok((access, refresh))
}

fn signing_failed(e: SessionError) -> ApiError {
    error!("Token signing failed: {}", e);
    ApiError::Internal
}

/// Checks `password` against the user's hash. An unknown user is checked
/// against a throwaway hash instead, so both paths cost one Argon2 verify.
fn credentials_match(row: Option<&UserRow>, password: &str) -> Result<bool, ApiError> {
    match row {
        Some(row) => verify_password(password, &row.password_hash),
        None => {
            if let Some(hash) = dummy_hash() {
                verify_password(password, hash)?;
            }
            Ok(false)
        }
    }
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password("roadeye-unknown-account").ok())
        .as_deref()
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".into())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Stored password hash is unreadable: {}", e);
        ApiError::Internal
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
