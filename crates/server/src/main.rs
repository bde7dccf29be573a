use admit_core::{config::AppConfig, store};
use anyhow::Result;
use axum::serve;
use server::{create_app, load_auditor, load_rules, AppState};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.logging.level.as_str();
        EnvFilter::try_new(format!("warn,admit_core={level},server={level}"))
            .unwrap_or_else(|_| EnvFilter::new("warn,admit_core=info,server=info"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json();
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;
    config.validate().map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;

    init_logging(&config);
    info!("Starting admission gateway");
    debug!(
        backend = %config.store.backend,
        keywords_path = %config.audit.keywords_path,
        rules_path = %config.quota.rules_path,
        bind_port = config.server.bind_port,
        "Configuration loaded"
    );

    let store = store::connect(&config.store)
        .await
        .map_err(|e| anyhow::anyhow!("Store initialization failed: {e}"))?;
    let auditor = load_auditor(&config.audit.keywords_path);
    let rules = load_rules(&config.quota.rules_path)
        .map_err(|e| anyhow::anyhow!("Rate limit rules could not be loaded: {e}"))?;

    let state = AppState::new(&config, store, auditor, rules).map_err(|e| anyhow::anyhow!(e))?;
    let app = create_app(state, config.server.max_concurrent_requests);

    let addr: SocketAddr = config.socket_addr().map_err(|e| anyhow::anyhow!(e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Admission server listening");

    if let Err(e) = serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error occurred");
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight requests");
}
