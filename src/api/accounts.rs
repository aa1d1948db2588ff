use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::AuthUser;
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::services::{NewAccount, ProfileUpdate};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /accounts
/// Register a new account; the activation secret goes out by email.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts()
        .register(NewAccount {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageResponse {
            message: "Account created; check your email for the activation code".to_string(),
        })),
    ))
}

/// POST /accounts/activate
/// Consume an activation secret. Works exactly once per secret.
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ActivateRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.token.is_empty() {
        return Err(ApiError::validation("Activation token is required"));
    }

    let user = state.accounts().activate(&payload.token).await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /accounts/password-reset
/// Issue a reset secret for the given email address.
pub async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    state
        .accounts()
        .request_password_reset(&payload.email)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password reset code sent".to_string(),
    })))
}

/// POST /accounts/password-reset/confirm
/// Consume a reset secret and set the new password. Every live session for
/// the account is revoked on success.
pub async fn confirm_password_reset(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    if payload.token.is_empty() {
        return Err(ApiError::validation("Reset token is required"));
    }

    state
        .accounts()
        .consume_password_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Password updated; please log in again".to_string(),
    })))
}

/// GET /account
/// Current user profile (requires authentication)
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .store()
        .get_user_by_id(user_id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// PUT /account
/// Update profile fields. A new password is stored without comparing the
/// old one; possession of a valid session is the credential here.
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let user = state
        .accounts()
        .update_profile(
            user_id,
            ProfileUpdate {
                username: payload.username,
                email: payload.email,
                password: payload.password,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// DELETE /account
/// Delete the account; every session it owned dies with it.
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.accounts().delete_account(user_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Account deleted".to_string(),
    })))
}
