use axum::{extract::State, Json};

use crate::{
    error::AppResult,
    middleware::{auth::ClientIp, rate_limit::attempt_key},
    models::{
        auth::AuthenticatedUser,
        user::{
            ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
            RefreshResponse, RefreshTokenRequest, RegisterRequest, RegisterResponse,
            ResetPasswordRequest, UpdateUserRequest, UserPublic,
        },
    },
    AppState,
};

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    state.sessions.register(body).await.map(Json)
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    // 5 attempts per 15 min per identifier
    if let Some(limiter) = &state.rate_limiter {
        limiter
            .check(&attempt_key("login", &body.login_identifier), 5, 900)
            .await?;
    }

    state.sessions.login(body, client_ip).await.map(Json)
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> AppResult<Json<RefreshResponse>> {
    state.sessions.refresh(&body.refresh_token).await.map(Json)
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    state.sessions.logout(user.user_id).await?;
    Ok(Json(MessageResponse::new("Logged out.")))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    // 3 requests per hour per address
    if let Some(limiter) = &state.rate_limiter {
        limiter
            .check(&attempt_key("forgot", &body.email), 3, 3600)
            .await?;
    }

    state
        .sessions
        .request_password_reset(&body.email)
        .await
        .map(Json)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .sessions
        .reset_password(&body.token, &body.new_password)
        .await
        .map(Json)
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserPublic>> {
    state.sessions.me(user.user_id).await.map(Json)
}

pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateUserRequest>,
) -> AppResult<Json<MessageResponse>> {
    let outcome = state.sessions.update_user(user.user_id, body).await?;
    Ok(Json(MessageResponse::new(outcome.message())))
}

/// Admin only.
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<UserPublic>>> {
    state.sessions.list_users(&user).await.map(Json)
}
