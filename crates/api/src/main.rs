use safetrack_api::{build_router, state::AppState};
use safetrack_config::Settings;
use safetrack_db::{connect, indexes::ensure_indexes};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "safetrack_api=debug,safetrack_services=debug,safetrack_db=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!("Starting SafeTrack API on {}:{}", settings.app.host, settings.app.port);
    info!(
        notifications_enabled = settings.notifications.enabled,
        email_enabled = settings.email.enabled,
        database = %settings.database.name,
        "Action subsystem config"
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    // Spawns the notification consumer, so it must run inside the runtime.
    let app_state = AppState::new(db, &settings)?;
    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
