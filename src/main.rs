use std::sync::Arc;

use anyhow::Context;
use signup_bot::api;
use signup_bot::channels::{Channel, CliChannel, TelegramChannel};
use signup_bot::config::BotConfig;
use signup_bot::dialog::RegistrationService;
use signup_bot::dispatcher::Dispatcher;
use signup_bot::session::SessionTable;
use signup_bot::store::{LibSqlBackend, RegistrationStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("invalid configuration")?;

    eprintln!("📝 Signup Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Reporting API: http://0.0.0.0:{}/users", config.http_port);

    // ── Store ───────────────────────────────────────────────────────────
    let store: Arc<dyn RegistrationStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .context("opening registration database")?,
    );
    let existing = store.count_registrations().await?;
    eprintln!("   Registrations on file: {}", existing);

    // ── Reporting server ────────────────────────────────────────────────
    let app = api::router(Arc::clone(&store), &config.cors_origin)?;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("binding reporting port {}", config.http_port))?;
    let http_port = config.http_port;
    tokio::spawn(async move {
        tracing::info!(port = http_port, "Reporting server started");
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Reporting server stopped: {}", e);
        }
    });

    // ── Channel ─────────────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = match config.telegram_token.clone() {
        Some(token) => {
            let telegram = TelegramChannel::new(token);
            if let Err(e) = telegram.health_check().await {
                tracing::warn!("Telegram health check failed: {}", e);
            }
            eprintln!("   Channel: telegram\n");
            Arc::new(telegram)
        }
        None => {
            eprintln!("   Channel: cli (set TELEGRAM_BOT_TOKEN for Telegram)");
            eprintln!("   Type /start to begin, /contact <phone> to share a contact.\n");
            Arc::new(CliChannel::new())
        }
    };

    let sessions = Arc::new(SessionTable::new());
    let service = Arc::new(RegistrationService::new(sessions, store));
    let dispatcher = Dispatcher::new(
        service,
        channel,
        config.prompts.clone(),
        config.session_idle_timeout,
    );
    dispatcher.run().await?;

    Ok(())
}
