use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionPlan {
    Basic,
    Standard,
    Premium,
}

impl std::fmt::Display for SubscriptionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionPlan::Basic => "Basic",
            SubscriptionPlan::Standard => "Standard",
            SubscriptionPlan::Premium => "Premium",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubscriptionPlan {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Basic" => Ok(SubscriptionPlan::Basic),
            "Standard" => Ok(SubscriptionPlan::Standard),
            "Premium" => Ok(SubscriptionPlan::Premium),
            _ => Err(anyhow::anyhow!("Unknown plan: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Active => "Active",
            SubscriptionStatus::Cancelled => "Cancelled",
            SubscriptionStatus::Expired => "Expired",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(SubscriptionStatus::Pending),
            "Active" => Ok(SubscriptionStatus::Active),
            "Cancelled" => Ok(SubscriptionStatus::Cancelled),
            "Expired" => Ok(SubscriptionStatus::Expired),
            _ => Err(anyhow::anyhow!("Unknown subscription status: {s}")),
        }
    }
}

/// Entitlement columns read off the user record by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct SubscriptionState {
    pub is_subscribed: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// A set expiry in the past revokes access; no expiry means a non-expiring plan.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.is_subscribed && self.expires_at.map_or(true, |exp| exp > now)
    }
}

/// History row, one per activation. Plan and status are TEXT columns.
#[derive(Debug, Clone, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub tx_ref: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn status(&self) -> SubscriptionStatus {
        self.status.parse().unwrap_or(SubscriptionStatus::Pending)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status() == SubscriptionStatus::Active && self.ends_at.map_or(true, |end| end > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub tx_ref: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub plan: SubscriptionPlan,
    /// Account to activate; defaults to the caller.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub tx_ref: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl SubscriptionView {
    pub fn from_record(sub: Subscription, now: DateTime<Utc>) -> Self {
        let is_active = sub.is_active(now);
        Self {
            id: sub.id,
            user_id: sub.user_id,
            plan: sub.plan.parse().unwrap_or(SubscriptionPlan::Basic),
            status: sub.status(),
            tx_ref: sub.tx_ref,
            starts_at: sub.starts_at,
            ends_at: sub.ends_at,
            is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntitlementResponse {
    pub user_id: Uuid,
    pub is_subscribed: bool,
    pub expires_at: Option<DateTime<Utc>>,
}
