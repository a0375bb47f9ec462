use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::{AuthenticatedUser, ProfileSession},
        user::{CreateProfileRequest, ProfileSummary, ProfileTokenResponse},
    },
    AppState,
};

pub async fn list_profiles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ProfileSummary>>> {
    state.sessions.list_profiles(user.user_id).await.map(Json)
}

pub async fn create_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateProfileRequest>,
) -> AppResult<Json<ProfileSummary>> {
    state.sessions.create_profile(user.user_id, body).await.map(Json)
}

pub async fn select_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<ProfileTokenResponse>> {
    state.sessions.select_profile(&user, profile_id).await.map(Json)
}

/// Echo the profile session carried by the token. Needs a profile-level token.
pub async fn current_profile(session: ProfileSession) -> Json<Value> {
    Json(json!({
        "user_id": session.user_id,
        "profile_id": session.profile_id,
        "role": session.role,
    }))
}
