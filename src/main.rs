use std::net::SocketAddr;
use std::sync::Arc;

use redis::Client as RedisClient;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelgate_api::{
    config::Config,
    db,
    middleware::rate_limit::RateLimiter,
    routes,
    services::{self, email::EmailService},
    AppState,
};

async fn connect_rate_limiter(redis_url: Option<&str>) -> Option<RateLimiter> {
    let url = redis_url?;
    let conn = async {
        RedisClient::open(url)?
            .get_multiplexed_async_connection()
            .await
    };
    match conn.await {
        Ok(conn) => {
            info!("Redis connected, rate limiting enabled");
            Some(RateLimiter::new(conn))
        }
        Err(e) => {
            warn!("Redis unavailable, rate limiting disabled: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let rate_limiter = connect_rate_limiter(config.redis_url.as_deref()).await;

    let email = EmailService::new(&config).map(Arc::new);
    if email.is_some() {
        info!("SMTP email service configured");
    } else {
        info!("SMTP not configured, notifications will be dropped");
    }

    services::metrics::start(pool.clone());

    let state = AppState::new(pool, config.clone(), email, rate_limiter)?;
    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("reelgate API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
