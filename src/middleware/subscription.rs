use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{error::AppError, models::auth::AuthenticatedUser, AppState};

/// Layer for subscription-gated routes.
///
/// Runs after token validation: a missing or bad token is still 401, a valid
/// token without an active subscription is 403. The loaded state is handed to
/// the handler through request extensions.
pub async fn require_subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let entitlement = state.subscriptions.gate(user.user_id, Utc::now()).await?;

    request.extensions_mut().insert(entitlement);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
