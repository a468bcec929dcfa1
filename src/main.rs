// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use transcript_quiz::config::Config;
use transcript_quiz::db::SqliteStore;
use transcript_quiz::generation::QuestionGenerator;
use transcript_quiz::routes;
use transcript_quiz::state::AppState;
use transcript_quiz::store::StateStore;

const CONNECT_RETRIES: u32 = 5;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // A missing or unreachable store is a configuration error, not a crash.
    let store = match &config.database_url {
        Some(url) => open_store(url).await,
        None => {
            tracing::error!("DATABASE_URL is not set; store-backed routes will answer 503");
            None
        }
    };

    let generator = QuestionGenerator::from_config(&config.generation);
    if generator.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; question generation is disabled");
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(store, generator, config);

    // Expired quiz sessions are also dropped lazily on lookup; this bounds idle memory.
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let expired = sessions.sweep_expired().await;
            if expired > 0 {
                tracing::debug!(expired, "Swept expired quiz sessions");
            }
        }
    });

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects with retry, applies migrations and loads the mirror.
/// Returns `None` (after logging why) when any step fails.
async fn open_store(url: &str) -> Option<Arc<StateStore>> {
    let mut retry_count = 0;
    let db = loop {
        match SqliteStore::connect(url).await {
            Ok(db) => break db,
            Err(e) => {
                retry_count += 1;
                if retry_count > CONNECT_RETRIES {
                    tracing::error!(
                        "Failed to connect to database after {} retries: {}",
                        CONNECT_RETRIES,
                        e
                    );
                    return None;
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    if let Err(e) = db.migrate().await {
        tracing::error!("Failed to run database migrations: {}", e);
        return None;
    }
    tracing::info!("Migrations applied successfully.");

    match StateStore::load(Arc::new(db)).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::error!("Failed to load application state: {}", e);
            None
        }
    }
}
