//! In-process credential store for service tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    db::store::CredentialStore,
    error::{AppError, AppResult},
    models::{
        subscription::{NewSubscription, Subscription, SubscriptionState, SubscriptionStatus},
        user::{NewProfile, NewUser, Profile, User, UserChanges},
    },
};

/// Same comparison as the `LOWER(..)` unique indexes.
fn same_identity(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    profiles: Vec<Profile>,
    subscriptions: Vec<Subscription>,
}

/// Each operation runs under one lock, so conditional updates are atomic.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct row access for arranging test fixtures.
    pub async fn with_user<R>(&self, user_id: Uuid, f: impl FnOnce(&mut User) -> R) -> Option<R> {
        let mut tables = self.tables.lock().await;
        tables.users.iter_mut().find(|u| u.id == user_id).map(f)
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn find_by_username_or_email(&self, identifier: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .filter(|u| same_identity(&u.username, identifier) || same_identity(&u.email, identifier))
            .min_by_key(|u| !same_identity(&u.username, identifier))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| same_identity(&u.email, email))
            .cloned())
    }

    async fn username_taken(&self, username: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .any(|u| same_identity(&u.username, username) && Some(u.id) != exclude))
    }

    async fn email_taken(&self, email: &str, exclude: Option<Uuid>) -> AppResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .any(|u| same_identity(&u.email, email) && Some(u.id) != exclude))
    }

    async fn create_user(&self, user: NewUser, profile: NewProfile) -> AppResult<(User, Profile)> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| {
            same_identity(&u.username, &user.username) || same_identity(&u.email, &user.email)
        }) {
            return Err(AppError::Conflict("Username or email already exists".into()));
        }
        let now = Utc::now();
        let (refresh_token_hash, refresh_token_expires_at) = user.refresh_token.unzip();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            role: user.role.to_string(),
            avatar: Some(user.avatar),
            last_login_ip: None,
            refresh_token_hash,
            refresh_token_expires_at,
            reset_token_hash: None,
            reset_token_expires_at: None,
            is_subscribed: false,
            subscription_expires_at: None,
            created_at: now,
        };
        let default_profile = Profile {
            id: Uuid::new_v4(),
            user_id: created.id,
            name: profile.name,
            avatar: profile.avatar,
            is_kids_profile: profile.is_kids_profile,
            created_at: now,
        };
        tables.users.push(created.clone());
        tables.profiles.push(default_profile.clone());
        Ok((created, default_profile))
    }

    async fn store_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == user_id) {
            u.refresh_token_hash = Some(token_hash.to_string());
            u.refresh_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let current = tables.users.iter_mut().find(|u| {
            u.refresh_token_hash.as_deref() == Some(presented_hash)
                && u.refresh_token_expires_at.is_some_and(|exp| exp > now)
        });
        Ok(current.map(|u| {
            u.refresh_token_hash = Some(new_hash.to_string());
            u.refresh_token_expires_at = Some(new_expires_at);
            u.clone()
        }))
    }

    async fn clear_refresh_token(&self, user_id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == user_id) {
            u.refresh_token_hash = None;
            u.refresh_token_expires_at = None;
        }
        Ok(())
    }

    async fn record_login_ip(&self, user_id: Uuid, ip: &str) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == user_id) {
            u.last_login_ip = Some(ip.to_string());
        }
        Ok(())
    }

    async fn store_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == user_id) {
            u.reset_token_hash = Some(token_hash.to_string());
            u.reset_token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn consume_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        let Some(u) = tables.users.iter_mut().find(|u| {
            u.id == user_id
                && u.reset_token_hash.as_deref() == Some(token_hash)
                && u.reset_token_expires_at.is_some_and(|exp| exp > now)
        }) else {
            return Ok(false);
        };
        u.password_hash = password_hash.to_string();
        u.reset_token_hash = None;
        u.reset_token_expires_at = None;
        u.refresh_token_hash = None;
        u.refresh_token_expires_at = None;
        Ok(true)
    }

    async fn update_user(&self, user_id: Uuid, changes: UserChanges) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.users.iter_mut().find(|u| u.id == user_id).map(|u| {
            if let Some(username) = changes.username {
                u.username = username;
            }
            if let Some(email) = changes.email {
                u.email = email;
            }
            if let Some(hash) = changes.password_hash {
                u.password_hash = hash;
            }
            u.clone()
        }))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.lock().await.users.clone())
    }

    async fn list_profiles(&self, user_id: Uuid) -> AppResult<Vec<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_profile(&self, user_id: Uuid, profile_id: Uuid) -> AppResult<Option<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .find(|p| p.id == profile_id && p.user_id == user_id)
            .cloned())
    }

    async fn create_profile(&self, user_id: Uuid, profile: NewProfile) -> AppResult<Profile> {
        let mut tables = self.tables.lock().await;
        let created = Profile {
            id: Uuid::new_v4(),
            user_id,
            name: profile.name,
            avatar: profile.avatar,
            is_kids_profile: profile.is_kids_profile,
            created_at: Utc::now(),
        };
        tables.profiles.push(created.clone());
        Ok(created)
    }

    async fn subscription_state(&self, user_id: Uuid) -> AppResult<Option<SubscriptionState>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| SubscriptionState {
                is_subscribed: u.is_subscribed,
                expires_at: u.subscription_expires_at,
            }))
    }

    async fn activate_subscription(&self, sub: NewSubscription) -> AppResult<Subscription> {
        let mut tables = self.tables.lock().await;
        let record = Subscription {
            id: Uuid::new_v4(),
            user_id: sub.user_id,
            plan: sub.plan.to_string(),
            status: SubscriptionStatus::Active.to_string(),
            tx_ref: sub.tx_ref,
            starts_at: sub.starts_at,
            ends_at: sub.ends_at,
        };
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == sub.user_id) {
            u.is_subscribed = true;
            u.subscription_expires_at = sub.ends_at;
        }
        tables.subscriptions.push(record.clone());
        Ok(record)
    }

    async fn list_active_subscriptions(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active(now))
            .cloned()
            .collect())
    }

    async fn find_subscription(&self, subscription_id: Uuid) -> AppResult<Option<Subscription>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn cancel_subscription(&self, subscription_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if let Some(s) = tables
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id && s.user_id == user_id)
        {
            s.status = SubscriptionStatus::Cancelled.to_string();
        }
        if let Some(u) = tables.users.iter_mut().find(|u| u.id == user_id) {
            u.is_subscribed = false;
            u.subscription_expires_at = None;
        }
        Ok(())
    }
}
