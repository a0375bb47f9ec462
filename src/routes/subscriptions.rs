use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        subscription::{EntitlementResponse, SubscribeQuery, SubscriptionState, SubscriptionView},
        user::MessageResponse,
    },
    AppState,
};

pub async fn my_subscriptions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<SubscriptionView>>> {
    state
        .subscriptions
        .list_mine(user.user_id, Utc::now())
        .await
        .map(Json)
}

/// Admin only. `?user_id=` selects the account, otherwise the caller's own.
pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SubscribeQuery>,
) -> AppResult<Json<SubscriptionView>> {
    let target = query.user_id.unwrap_or(user.user_id);
    state
        .subscriptions
        .subscribe(&user, target, query.plan, Utc::now())
        .await
        .map(Json)
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.subscriptions.cancel(user.user_id, id).await?;
    Ok(Json(MessageResponse::new("Subscription cancelled.")))
}

/// Behind `require_subscription`, which supplies both extensions.
pub async fn entitlement(
    Extension(user): Extension<AuthenticatedUser>,
    Extension(entitlement): Extension<SubscriptionState>,
) -> Json<EntitlementResponse> {
    Json(EntitlementResponse {
        user_id: user.user_id,
        is_subscribed: entitlement.is_subscribed,
        expires_at: entitlement.expires_at,
    })
}
