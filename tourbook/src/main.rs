use std::{net::SocketAddr, sync::Arc};

use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use tokio::{net::TcpListener, signal};
use tourbook::{AppState, Config, Migrator, config, email::SmtpMailer, routes};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if config::load_env_file(config::ENV_FILE)? {
        info!(path = config::ENV_FILE, "Environment file loaded");
    }

    let config = Config::from_env()?;
    info!(environment = ?config.environment, "Configuration loaded");

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database ready");

    let mailer = Arc::new(SmtpMailer::new(&config.email)?);
    let address = format!("0.0.0.0:{}", config.port);
    let app = routes::app(AppState::new(db, config, mailer));

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
