//! Entry point: load config, wire dependencies, and run the server.

use casebook_auth::auth::TokenCodec;
use casebook_auth::config::Config;
use casebook_auth::db::{self, PgUserStore};
use casebook_auth::middleware::LoginLimiter;
use casebook_auth::{create_app, AppState, AuthService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_pool = db::create_pool(&config.database_url).await?;
    let store = Arc::new(PgUserStore::new(db_pool));
    let tokens = TokenCodec::from_config(&config);
    let state = AppState::new(AuthService::new(store, tokens))
        .with_login_limiter(LoginLimiter::default().trust_forwarded_for(config.trust_proxy));

    let app = create_app(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(addr = %config.server_addr, "listening");
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
