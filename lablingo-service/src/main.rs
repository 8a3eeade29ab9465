use lablingo_service::{GateMode, Settings, create_app};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lablingo_service=debug,lablingo=debug,tower_http=debug".into());

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::from_env();

    if settings.gate_mode == GateMode::Env && std::env::var(&settings.api_key_var).is_err() {
        warn!(
            var = %settings.api_key_var,
            "API key not set; sessions will ask for a key before analyzing"
        );
    }

    let app = create_app(&settings);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    let addr = listener.local_addr()?;

    info!(model = %settings.model, "LabLingo service starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Start a session: POST http://{}/sessions", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
