use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub token: String,
}

/// Authenticated user id, inserted into request extensions by the middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i32);

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware that accepts the session token from:
/// 1. `Authorization: Bearer <token>` header
/// 2. `X-Session-Token` header
///
/// A valid token is refreshed as a side effect of verification (sliding
/// expiration). Failures degrade to 401 without detail about whether the
/// token was unknown or expired.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(token) = extract_session_token(&headers) else {
        let response = (StatusCode::UNAUTHORIZED, "Unauthorized");
        return Ok(response.into_response());
    };

    match state.sessions().verify(&token).await {
        Ok(user_id) => {
            tracing::Span::current().record("user_id", user_id);
            request.extensions_mut().insert(AuthUser(user_id));
            Ok(next.run(request).await)
        }
        Err(crate::services::SessionError::Unauthorized) => {
            let response = (StatusCode::UNAUTHORIZED, "Unauthorized");
            Ok(response.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Extract the session token from request headers
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    // Check Authorization: Bearer header
    if let Some(auth_header) = headers.get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    // Check X-Session-Token header
    if let Some(token) = headers.get("X-Session-Token")
        && let Ok(token_str) = token.to_str()
    {
        return Some(token_str.to_string());
    }

    None
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with username and password, returns a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let is_valid = state
        .store()
        .verify_user_password(&payload.username, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?;

    if !is_valid {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user = state
        .store()
        .get_user_by_username(&payload.username)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    if user.inactive {
        return Err(ApiError::Forbidden("Account is not activated".to_string()));
    }

    let token = state.sessions().issue(user.id).await?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(ApiResponse::success(LoginResponse {
        username: user.username,
        token,
    })))
}

/// POST /auth/logout
/// Revoke the presented session token. Revoking an absent token succeeds.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.sessions().revoke(&token).await?;
    }

    Ok((StatusCode::OK, "Logged out"))
}
