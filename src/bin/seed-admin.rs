/// Create an administrator account.
///
/// Admins cannot self-register; run this once per operator.
///
/// Usage: seed-admin --username root --email root@example.com --password ...
///   Reads the same environment as the API (DATABASE_URL, JWT_SECRET, BCRYPT_COST).
use anyhow::Context;
use clap::Parser;

use reelgate_api::{
    config::Config,
    db::{self, PgCredentialStore},
    services::{session::SessionManager, tokens::TokenService},
};

#[derive(Parser)]
#[command(name = "seed-admin", about = "Create a reelgate administrator account")]
struct Args {
    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,

    /// Falls back to ADMIN_PASSWORD so it stays out of shell history.
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let store = PgCredentialStore::new(pool, config.store_timeout());
    let sessions = SessionManager::new(
        store,
        TokenService::from_config(&config),
        None,
        config.bcrypt_cost,
        config.app_base_url.clone(),
    )?;

    let admin = sessions
        .create_admin(&args.username, &args.email, &args.password)
        .await
        .context("could not create admin account")?;

    tracing::info!(user_id = %admin.id, username = %admin.username, "admin account ready");
    Ok(())
}
