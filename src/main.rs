use std::sync::Arc;

use clap::Parser;
use gitguardian_extension::cli::Cli;
use gitguardian_extension::config::AppConfig;
use gitguardian_extension::credential::CredentialProvider;
use gitguardian_extension::credential::ssm::SsmSecretStore;
use gitguardian_extension::lifecycle::{self, extensions_api::ExtensionsApiClient};
use gitguardian_extension::pipeline::ScanPipeline;
use gitguardian_extension::proxy::ProxyServer;
use gitguardian_extension::scan::client::GitGuardianClient;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::from_env()?,
    };

    info!("Starting GitGuardian Lambda Extension...");

    let store = SsmSecretStore::from_env().await;
    let credentials = Arc::new(CredentialProvider::new(
        Arc::new(store),
        config.credential.ssm_key_path.clone(),
    ));
    let scanner = GitGuardianClient::new(config.scanner.endpoint.clone(), credentials);
    let pipeline = Arc::new(ScanPipeline::new(Arc::new(scanner)));

    let fatal = Arc::new(Notify::new());
    let server = ProxyServer::from_config(&config, pipeline).with_fatal_notifier(fatal.clone());
    let addr = server.start().await?;
    info!("Runtime API proxy running on {}", addr);

    let register = config.extension.enabled && !cli.no_register;
    let events = async {
        if register {
            let client = ExtensionsApiClient::from_config(&config);
            lifecycle::run_event_loop(&client).await
        } else {
            std::future::pending().await
        }
    };

    tokio::select! {
        result = events => {
            result?;
            info!("Lifecycle loop finished, exiting...");
        }
        _ = shutdown_signal() => {
            info!("Received termination signal, exiting...");
        }
        _ = fatal.notified() => {
            anyhow::bail!("runtime API is unreachable, execution environment is compromised");
        }
    }

    Ok(())
}

/// Resolve on ctrl-c, or SIGTERM on Unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
