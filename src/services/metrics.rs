use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};
use sqlx::PgPool;
use tracing::warn;

lazy_static! {
    // ── Event counters ───────────────────────────────────────────────────────
    pub static ref REGISTRATIONS_COUNTER: Counter = register_counter!(
        "auth_registrations_total",
        "Accounts created through self-service registration"
    ).unwrap();

    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "auth_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref REFRESH_COUNTER: CounterVec = register_counter_vec!(
        "auth_refresh_total",
        "Refresh-token rotations by outcome",
        &["status"]
    ).unwrap();

    pub static ref PASSWORD_RESETS_COUNTER: CounterVec = register_counter_vec!(
        "auth_password_resets_total",
        "Password reset requests and consumptions by stage",
        &["stage"]
    ).unwrap();

    pub static ref GATE_DENIALS_COUNTER: CounterVec = register_counter_vec!(
        "auth_subscription_denials_total",
        "Requests refused by the subscription gate",
        &["reason"]
    ).unwrap();

    // ── Business metrics ────────────────────────────────────────────────────
    pub static ref USERS_GAUGE: GaugeVec = register_gauge_vec!(
        "reelgate_users_total",
        "Registered accounts by role",
        &["role"]
    ).unwrap();

    pub static ref SUBSCRIBED_USERS_GAUGE: Gauge = register_gauge!(
        "reelgate_subscribed_users_total",
        "Accounts with an unexpired subscription"
    ).unwrap();
}

/// Spawn the background metrics collector (refreshes every 5 minutes).
pub fn start(pool: PgPool) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = collect(&pool).await {
                warn!("Metrics: collection failed: {}", e);
            }
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
        }
    });
}

async fn collect(pool: &PgPool) -> anyhow::Result<()> {
    let by_role: Vec<(String, i64)> =
        sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(pool)
            .await?;
    for (role, count) in by_role {
        USERS_GAUGE.with_label_values(&[role.as_str()]).set(count as f64);
    }

    let subscribed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE is_subscribed = TRUE
           AND (subscription_expires_at IS NULL OR subscription_expires_at > NOW())",
    )
    .fetch_one(pool)
    .await?;
    SUBSCRIBED_USERS_GAUGE.set(subscribed as f64);

    Ok(())
}
