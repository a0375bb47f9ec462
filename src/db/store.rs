//! Credential store interface consumed by the session and subscription services.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    subscription::{NewSubscription, Subscription, SubscriptionState},
    user::{NewProfile, NewUser, Profile, User, UserChanges},
};

#[trait_variant::make(CredentialStore: Send)]
pub trait LocalCredentialStore {
    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Match `identifier` against username or email.
    async fn find_by_username_or_email(&self, identifier: &str) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn username_taken(&self, username: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    async fn email_taken(&self, email: &str, exclude: Option<Uuid>) -> AppResult<bool>;

    /// Insert the user and its default profile in one transaction.
    async fn create_user(&self, user: NewUser, profile: NewProfile) -> AppResult<(User, Profile)>;

    /// Overwrite the refresh token and its expiry together.
    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Swap `presented_hash` for `new_hash` if it is still current and unexpired at `now`.
    ///
    /// Single conditional write: of two concurrent rotations with the same
    /// token exactly one gets `Some`.
    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>>;

    async fn clear_refresh_token(&self, user_id: Uuid) -> AppResult<()>;

    async fn record_login_ip(&self, user_id: Uuid, ip: &str) -> AppResult<()>;

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn find_by_reset_token(&self, token_hash: &str) -> AppResult<Option<User>>;

    /// Replace the password hash and clear the reset token, its expiry and the
    /// refresh token, if `token_hash` is still current and unexpired at `now`.
    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> AppResult<Option<User>>;

    async fn list_users(&self) -> AppResult<Vec<User>>;

    async fn list_profiles(&self, user_id: Uuid) -> AppResult<Vec<Profile>>;

    /// Only returns the profile if `user_id` owns it.
    async fn find_profile(&self, user_id: Uuid, profile_id: Uuid) -> AppResult<Option<Profile>>;

    async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> AppResult<Profile>;

    async fn subscription_state(&self, user_id: Uuid) -> AppResult<Option<SubscriptionState>>;

    /// Set the entitlement flag and expiry and append a history row.
    async fn activate_subscription(&self, sub: NewSubscription) -> AppResult<Subscription>;

    async fn list_active_subscriptions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>>;

    async fn find_subscription(&self, subscription_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Mark the row cancelled and clear the owner's entitlement.
    async fn cancel_subscription(&self, subscription_id: Uuid, user_id: Uuid) -> AppResult<()>;
}
