use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// `identifier` may be either the email or the username.
#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// Either a bearer token, or (for accounts with two-factor enabled) the
/// user id to present with the emailed code at `/api/auth/verify-otp`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub two_factor_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl LoginResponse {
    pub fn token(token: String) -> Self {
        Self {
            token: Some(token),
            two_factor_required: false,
            user_id: None,
        }
    }

    pub fn otp_pending(user_id: Uuid) -> Self {
        Self {
            token: None,
            two_factor_required: true,
            user_id: Some(user_id),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub user_id: Uuid,
    pub otp: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TwoFactorRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorStatus {
    pub id: Uuid,
    pub two_factor_enabled: bool,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}
