use chrono::{DateTime, Months, Utc};
use uuid::Uuid;

use crate::{
    db::store::CredentialStore,
    error::{AppError, AppResult},
    models::{
        auth::AuthenticatedUser,
        subscription::{NewSubscription, SubscriptionPlan, SubscriptionState, SubscriptionView},
    },
    services::metrics::GATE_DENIALS_COUNTER,
};

/// Pure entitlement decision over the stored flag and expiry.
pub fn check_entitlement(state: &SubscriptionState, now: DateTime<Utc>) -> AppResult<()> {
    if state.is_active(now) {
        return Ok(());
    }
    let reason = if state.is_subscribed { "expired" } else { "not_subscribed" };
    GATE_DENIALS_COUNTER.with_label_values(&[reason]).inc();
    Err(AppError::Forbidden("An active subscription is required".into()))
}

pub struct SubscriptionService<S> {
    store: S,
}

impl<S: CredentialStore> SubscriptionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fails closed: an unknown user is treated as not entitled.
    pub async fn gate(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<SubscriptionState> {
        let Some(state) = self.store.subscription_state(user_id).await? else {
            GATE_DENIALS_COUNTER.with_label_values(&["unknown_user"]).inc();
            return Err(AppError::Forbidden("An active subscription is required".into()));
        };
        check_entitlement(&state, now)?;
        Ok(state)
    }

    /// Activate a one-month plan for `user_id`. There is no payment check, so only an
    /// Admin (the operator confirming a payment) may call it.
    pub async fn subscribe(
        &self,
        caller: &AuthenticatedUser,
        user_id: Uuid,
        plan: SubscriptionPlan,
        now: DateTime<Utc>,
    ) -> AppResult<SubscriptionView> {
        if !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Subscriptions are activated by an administrator".into(),
            ));
        }
        if self.store.find_by_id(user_id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }

        let ends_at = now
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::Internal("subscription end date out of range".into()))?;

        let record = self
            .store
            .activate_subscription(NewSubscription {
                user_id,
                plan,
                tx_ref: format!("tx-{}", Uuid::new_v4()),
                starts_at: now,
                ends_at: Some(ends_at),
            })
            .await?;

        tracing::info!(user_id = %user_id, admin_id = %caller.user_id, %plan, "subscription activated");
        Ok(SubscriptionView::from_record(record, now))
    }

    pub async fn list_mine(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<Vec<SubscriptionView>> {
        Ok(self
            .store
            .list_active_subscriptions(user_id, now)
            .await?
            .into_iter()
            .map(|s| SubscriptionView::from_record(s, now))
            .collect())
    }

    pub async fn cancel(&self, user_id: Uuid, subscription_id: Uuid) -> AppResult<()> {
        let sub = self
            .store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".into()))?;
        if sub.user_id != user_id {
            return Err(AppError::Forbidden("Subscription belongs to another account".into()));
        }

        self.store.cancel_subscription(subscription_id, user_id).await?;
        tracing::info!(user_id = %user_id, subscription_id = %subscription_id, "subscription cancelled");
        Ok(())
    }
}
