//! Time-boxed, single-use tokens shared by the login OTP and password-reset
//! flows. Only a SHA-256 digest of each token is stored.

use chrono::{Duration, Utc};
use password_hash::rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    LoginOtp,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenPurpose::LoginOtp => "login_otp",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    pub fn ttl(self) -> Duration {
        Duration::minutes(10)
    }

    fn generate(self) -> String {
        match self {
            TokenPurpose::LoginOtp => format!("{:06}", 100_000 + OsRng.next_u32() % 900_000),
            TokenPurpose::PasswordReset => {
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
        }
    }
}

pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a fresh token for `user_id`, replacing any earlier one of the same
/// purpose. Returns the plain token for delivery.
pub async fn issue<'e, E: PgExecutor<'e>>(
    exec: E,
    user_id: Uuid,
    purpose: TokenPurpose,
) -> AppResult<String> {
    let token = purpose.generate();
    let expires_at = Utc::now() + purpose.ttl();

    sqlx::query(
        r#"
        INSERT INTO one_time_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, purpose)
        DO UPDATE SET token_hash = EXCLUDED.token_hash,
                      expires_at = EXCLUDED.expires_at,
                      consumed_at = NULL,
                      created_at = now()
        "#,
    )
    .bind(user_id)
    .bind(purpose.as_str())
    .bind(digest(&token))
    .bind(expires_at)
    .execute(exec)
    .await?;

    Ok(token)
}

/// Mark a live token as used and return its owner. `None` when the token is
/// unknown, expired, already used, or (with `user_id`) owned by someone else.
pub async fn consume<'e, E: PgExecutor<'e>>(
    exec: E,
    purpose: TokenPurpose,
    token: &str,
    user_id: Option<Uuid>,
) -> AppResult<Option<Uuid>> {
    let owner: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE one_time_tokens
        SET consumed_at = now()
        WHERE purpose = $1
          AND token_hash = $2
          AND consumed_at IS NULL
          AND expires_at > now()
          AND ($3::uuid IS NULL OR user_id = $3)
        RETURNING user_id
        "#,
    )
    .bind(purpose.as_str())
    .bind(digest(token))
    .bind(user_id)
    .fetch_optional(exec)
    .await?;

    Ok(owner.map(|(id,)| id))
}

pub async fn revoke<'e, E: PgExecutor<'e>>(
    exec: E,
    user_id: Uuid,
    purpose: TokenPurpose,
) -> AppResult<()> {
    sqlx::query("DELETE FROM one_time_tokens WHERE user_id = $1 AND purpose = $2")
        .bind(user_id)
        .bind(purpose.as_str())
        .execute(exec)
        .await?;
    Ok(())
}
