use crate::{
    config::Config,
    scanner::ScanService,
    server::{HttpServer, SharedState},
    telemetry::Metrics,
};
use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};
use viume_annotator::ClassRegistry;
use viume_detector::{config::Validatable, Detector, OrtDetector};

fn load_registry(config: &Config) -> Result<ClassRegistry, Box<dyn Error>> {
    let Some(labels) = &config.labels else {
        return Ok(ClassRegistry::cervical_cells());
    };

    match ClassRegistry::from_labels_file(&labels.get_path()) {
        Ok(registry) => {
            tracing::info!(
                "Loaded {} classes from {:?}",
                registry.len(),
                labels.get_path()
            );
            Ok(registry)
        }
        Err(e) => {
            tracing::error!("Failed to load class labels: {}", e);
            Err(Box::new(e))
        }
    }
}

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let metrics = Arc::new(Metrics::new()?);
    let registry = load_registry(&config)?;

    let detector: Arc<dyn Detector> = match OrtDetector::new(&config.model) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            tracing::error!("Failed to initialize detector: {}", e);
            return Err(Box::new(e));
        }
    };

    let scan_service = ScanService::new(detector, registry, metrics.clone())?;
    let state = SharedState {
        scan_service,
        metrics,
    };

    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    if let Ok(Err(e)) = server_handle.await {
        tracing::error!("Server stopped with an error: {}", e);
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
