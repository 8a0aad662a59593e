use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{
        Claims, ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
        ResetPasswordRequest, TwoFactorRequest, TwoFactorStatus, VerifyOtpRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    services::token_service::{self, TokenPurpose},
    state::AppState,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    two_factor_enabled: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            email: row.email,
            two_factor_enabled: row.two_factor_enabled,
            created_at: row.created_at,
        }
    }
}

fn check_email(email: &str) -> AppResult<()> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::Validation("email is invalid".into())),
    }
}

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 6 {
        return Err(AppError::Validation(
            "password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

fn check_otp(otp: &str) -> AppResult<()> {
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("otp must be 6 digits".into()));
    }
    Ok(())
}

fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    if payload.username.trim().chars().count() < 3 {
        return Err(AppError::Validation(
            "username must be at least 3 characters".into(),
        ));
    }
    check_email(&payload.email)?;
    check_password(&payload.password)
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn issue_token(user_id: Uuid, config: &AppConfig) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    validate_registration(&payload)?;
    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 OR username = $2")
            .bind(email.as_str())
            .bind(username)
            .fetch_optional(&state.pool)
            .await?;

    if exist.is_some() {
        return Err(AppError::Conflict(
            "User with this email or username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;

    let user: UserRow = sqlx::query_as(
        "INSERT INTO users (id, username, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", user.into(), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { identifier, password } = payload;
    let identifier = identifier.trim();
    let user: Option<UserRow> =
        sqlx::query_as("SELECT * FROM users WHERE email = lower($1) OR username = $1 LIMIT 1")
            .bind(identifier)
            .fetch_optional(&state.pool)
            .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid credentials".into())),
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid credentials".into()));
    }

    if user.two_factor_enabled {
        let code = token_service::issue(&state.pool, user.id, TokenPurpose::LoginOtp).await?;
        state.notifier.login_code(&user.email, &code);
        audit::record(
            &state.pool,
            Some(user.id),
            "user_login_otp_sent",
            "users",
            serde_json::json!({ "user_id": user.id }),
        )
        .await;
        return Ok(ApiResponse::success(
            "Verification code sent",
            LoginResponse::otp_pending(user.id),
            Some(Meta::empty()),
        ));
    }

    let token = issue_token(user.id, &state.config)?;

    audit::record(
        &state.pool,
        Some(user.id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse::token(token),
        Some(Meta::empty()),
    ))
}

/// Second login step for two-factor accounts. The code is single use.
pub async fn verify_otp(
    state: &AppState,
    payload: VerifyOtpRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let otp = payload.otp.trim();
    check_otp(otp)?;

    let user_id =
        token_service::consume(&state.pool, TokenPurpose::LoginOtp, otp, Some(payload.user_id))
            .await?
            .ok_or_else(|| AppError::BadRequest("Invalid or expired OTP".into()))?;

    let token = issue_token(user_id, &state.config)?;

    audit::record(
        &state.pool,
        Some(user_id),
        "user_login",
        "users",
        serde_json::json!({ "user_id": user_id, "two_factor": true }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse::token(token),
        Some(Meta::empty()),
    ))
}

pub async fn set_two_factor(
    state: &AppState,
    user: &AuthUser,
    payload: TwoFactorRequest,
) -> AppResult<ApiResponse<TwoFactorStatus>> {
    let row: Option<(Uuid, bool)> = sqlx::query_as(
        "UPDATE users SET two_factor_enabled = $1 WHERE id = $2 RETURNING id, two_factor_enabled",
    )
    .bind(payload.enabled)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;
    let (id, two_factor_enabled) = row.ok_or(AppError::NotFound("User"))?;

    if !two_factor_enabled {
        token_service::revoke(&state.pool, id, TokenPurpose::LoginOtp).await?;
    }

    audit::record(
        &state.pool,
        Some(id),
        "two_factor_update",
        "users",
        serde_json::json!({ "enabled": two_factor_enabled }),
    )
    .await;

    Ok(ApiResponse::success(
        "Two-factor setting updated",
        TwoFactorStatus {
            id,
            two_factor_enabled,
        },
        None,
    ))
}

const RESET_REQUESTED: &str =
    "If a user with that email exists, a password reset link has been sent.";

/// Always answers with the same message whether or not the email is known.
pub async fn forgot_password(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    check_email(&payload.email)?;
    let email = payload.email.trim().to_lowercase();

    let user: Option<(Uuid, String)> = sqlx::query_as("SELECT id, email FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    match user {
        Some((user_id, email)) => {
            let token =
                token_service::issue(&state.pool, user_id, TokenPurpose::PasswordReset).await?;
            let reset_url = format!(
                "{}/reset-password?token={token}",
                state.config.frontend_url
            );
            state.notifier.password_reset(&email, &reset_url);
            audit::record(
                &state.pool,
                Some(user_id),
                "password_reset_requested",
                "users",
                serde_json::json!({ "user_id": user_id }),
            )
            .await;
        }
        None => tracing::debug!("password reset requested for unknown email"),
    }

    Ok(ApiResponse::success(
        RESET_REQUESTED,
        serde_json::json!({}),
        None,
    ))
}

/// Consume the reset token and replace the password in one transaction.
pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    check_password(&payload.password)?;
    let password_hash = hash_password(&payload.password)?;

    let mut tx = state.pool.begin().await?;
    let user_id = token_service::consume(
        &mut *tx,
        TokenPurpose::PasswordReset,
        payload.token.trim(),
        None,
    )
    .await?
    .ok_or_else(|| AppError::BadRequest("Token is invalid or has expired".into()))?;

    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    audit::record(
        &state.pool,
        Some(user_id),
        "password_reset",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Password has been reset successfully.",
        serde_json::json!({}),
        None,
    ))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?;
    let row = row.ok_or(AppError::NotFound("User"))?;
    Ok(ApiResponse::success("OK", row.into(), None))
}
