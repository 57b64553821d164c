use formflexi_backend::api::{self, AppState};
use formflexi_backend::config::Config;
use formflexi_backend::database::{
    self, PgCorrelationStore, PgEventLog, PgSubmissionHost, PoolConfig,
};
use formflexi_backend::gateway::hooks::GatewayHooks;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Formflexi Gateway");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("API mode: {}", config.gateway.api_mode);
    tracing::info!("Enabled gateway: {}", config.gateway.enabled_gateway);

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await?;

    let state = AppState {
        config: config.clone(),
        store: Arc::new(PgCorrelationStore::new(pool.clone())),
        host: Arc::new(PgSubmissionHost::new(pool.clone())),
        event_log: Arc::new(PgEventLog::new(pool)),
        hooks: GatewayHooks::new(),
    };

    let app = api::router(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
