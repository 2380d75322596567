// Main entry point for the QHSE assistant

use anyhow::Context;
use qhse_assistant::analysis::{LlmTextAnalyzer, ResilientTextAnalyzer};
use qhse_assistant::api::{create_router, AppState, TextAnalyzer};
use qhse_assistant::config::Config;
use qhse_assistant::core::crypto::LedgerSigner;
use qhse_assistant::db;
use qhse_assistant::iot::spawn_simulator;
use qhse_assistant::ledger::Ledger;
use qhse_assistant::notifications::spawn_sweep;
use qhse_assistant::state::session_cache::MokaSessionStore;

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Expired session rows are purged this often
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load and validate configuration first (before any logging)
    let config = Config::from_env().context("Configuration error")?;

    // 2. Initialize tracing subscriber with config values
    init_tracing(&config)?;

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        "Starting QHSE assistant"
    );

    // 3. Database pool and migrations
    let db_pool = db::connect(&config).await.context("Failed to open database")?;

    // 4. Reference rows, then demo data when enabled
    db::seed::seed_reference_data(&db_pool, &config.admin_password)
        .await
        .context("Failed to seed reference data")?;
    if config.seed_demo_data {
        db::seed::seed_demo_data(&db_pool).await.context("Failed to seed demo data")?;
        info!("Demo data ready");
    }

    // 5. Ledger signer: PEM file when configured, otherwise an ephemeral key
    let signer = match &config.ledger_signing_key_path {
        Some(path) => LedgerSigner::from_pem_file(path)
            .with_context(|| format!("Failed to load ledger signing key from {}", path.display()))?,
        None => {
            warn!("No LEDGER_SIGNING_KEY_PATH set, generating an ephemeral signing key");
            LedgerSigner::generate()
        }
    };
    let signer = Arc::new(signer);
    info!(public_key = %signer.public_key_hex(), "Ledger signer initialized");

    // 6. Ledger, reloaded from the database
    let ledger = Arc::new(
        Ledger::load(db_pool.clone(), signer, config.ledger_difficulty)
            .await
            .context("Failed to load ledger")?,
    );

    // 7. Text analyzer: LLM behind the circuit breaker when a key is set
    let primary: Option<Arc<dyn TextAnalyzer + Send + Sync>> = match &config.llm_api_key {
        Some(key) => {
            let client = LlmTextAnalyzer::new(
                config.llm_api_url.clone(),
                key.clone(),
                config.llm_model.clone(),
                config.llm_timeout_secs,
            )?;
            info!(model = %config.llm_model, "LLM text analyzer enabled");
            Some(Arc::new(client) as Arc<dyn TextAnalyzer + Send + Sync>)
        }
        None => {
            info!("No LLM_API_KEY set, using keyword text analysis");
            None
        }
    };
    let text_analyzer = Arc::new(ResilientTextAnalyzer::new(primary));

    // 8. Sessions
    let session_store = Arc::new(MokaSessionStore::new(
        db_pool.clone(),
        config.session_ttl_secs,
        config.session_cache_capacity,
    ));

    // 9. Application state and router
    let config = Arc::new(config);
    let app_state = AppState::new(
        config.clone(),
        db_pool,
        ledger,
        session_store.clone(),
        text_analyzer,
    )?;
    let scenes = app_state.arvr.seed_default_scenes().await?;
    info!(scenes, "AR/VR scenes ready");

    let auth_state = app_state.auth_state();
    let router = create_router(&app_state, Some(auth_state)).with_state(app_state.clone());

    // 10. Background tasks
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if config.iot_simulator_enabled {
        tasks.push(spawn_simulator(
            app_state.iot.clone(),
            Duration::from_secs(config.iot_simulator_interval_secs),
        ));
    }
    tasks.push(spawn_sweep(
        app_state.notifications.clone(),
        Duration::from_secs(config.notification_sweep_interval_secs),
    ));
    tasks.push(spawn_session_purge(session_store));

    // 11. Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(addr = %addr, "Server listening");

    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    for task in &tasks {
        task.abort();
    }

    if let Err(e) = served {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

fn spawn_session_purge(store: Arc<MokaSessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Expired sessions purged"),
                Err(e) => error!(error = %e, "Session purge failed"),
            }
        }
    })
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
