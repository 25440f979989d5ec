//! vendorad: Vendora sales chat daemon.
//!
//! Serves [`ChatService`](vendora::ChatService) over HTTP, with Prometheus
//! metrics on `/metrics`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vendora::server::config::{Config, LoggingConfig, Secrets};
use vendora::{ChatModel, ChatService, HttpUpstream, LlmChatModel, VendoraError, http_client};

/// Vendora daemon: sales chat agents backed by business APIs.
#[derive(Parser)]
#[command(name = "vendorad")]
#[command(version = vendora::PKG_VERSION)]
#[command(about = "Vendora sales chat daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "VENDORA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from the config file.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    init_tracing(&config.logging);
    let secrets = Secrets::load()?;

    let address = args.address.unwrap_or_else(|| config.server.address.clone());
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| VendoraError::Configuration(format!("Invalid address {address:?}: {e}")))?;

    let service = Arc::new(build_service(&config, &secrets)?);
    let metrics = vendora::server::install_metrics()?;

    info!(
        version = vendora::version_string(),
        %addr,
        model = %config.model.model,
        backend = %config.model.backend,
        chat_timeout_secs = config.server.chat_timeout_secs,
        upstream_timeout_secs = config.upstream.timeout_secs,
        "vendorad starting"
    );

    vendora::server::serve(service, addr, Some(metrics), shutdown_signal()).await?;
    info!("vendorad stopped");
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the [`ChatService`] from configuration.
///
/// The chat model is created on the first agent build, so a missing key
/// surfaces as a configuration reply rather than a startup failure.
fn build_service(config: &Config, secrets: &Secrets) -> Result<ChatService, VendoraError> {
    let client = http_client(config.upstream.timeout())?;
    let information = HttpUpstream::new(
        "information_api",
        &config.upstream.information_url,
        client.clone(),
    )
    .retry(config.retry());
    let faq = HttpUpstream::new("faq_api", config.upstream.faq_url(), client).retry(config.retry());

    let model_config = config.model(secrets);
    if model_config.api_key.is_none() && model_config.backend != "ollama" {
        warn!(backend = %model_config.backend, "no API key configured for model backend");
    }

    ChatService::builder()
        .information_api(Arc::new(information))
        .faq_api(Arc::new(faq))
        .model_factory(move || {
            let model: Arc<dyn ChatModel> = Arc::new(LlmChatModel::new(model_config.clone())?);
            Ok(model)
        })
        .business_config(config.business())
        .agent_cache(config.agent_cache())
        .conversation(config.conversation())
        .session_sweep_threshold(config.locks.session_sweep_threshold)
        .chat_timeout(config.chat_timeout())
        .build()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
