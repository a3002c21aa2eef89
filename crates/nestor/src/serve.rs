// SPDX-FileCopyrightText: 2026 Nestor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nestor serve` command implementation.
//!
//! Opens storage, builds the bus and the socket propagator, starts the job
//! worker over the durable queue and serves the gateway until a shutdown
//! signal arrives.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use nestor_bus::build_bus;
use nestor_config::NestorConfig;
use nestor_core::{MessageConsumer, NestorError, RecordStore};
use nestor_dispatch::{AUDIT_COLLECTION, JobDispatcher, JobWorker};
use nestor_gateway::{GatewayState, MetricsRender, start_server};
use nestor_model::ModelService;
use nestor_query::SchemaRegistry;
use nestor_socket::{ConnectionHub, EventPropagator, SocketRegistry};
use nestor_storage::{Database, DocumentRecordStore, SqlRecordStore, SqliteQueueBroker};
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `nestor serve` command.
pub async fn run_serve(config: NestorConfig) -> Result<(), NestorError> {
    let metrics_render = install_metrics();
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let cancel = shutdown::install_signal_handler();

    let bus = build_bus(&config.bus, &db, &cancel).await?;
    let propagator = EventPropagator::new(
        bus.clone(),
        Arc::new(SocketRegistry::new()),
        Arc::new(ConnectionHub::new()),
        config.socket.role_delivery,
    );
    propagator.start(&cancel).await?;

    let registry = Arc::new(SchemaRegistry::new());
    let audit: Arc<dyn RecordStore> = Arc::new(DocumentRecordStore::new(
        db.clone(),
        &registry,
        AUDIT_COLLECTION,
        config.query,
    ));
    let broker = Arc::new(SqliteQueueBroker::new(db.clone(), config.broker.max_attempts));
    let dispatcher = JobDispatcher::new(broker.clone(), audit);
    let worker = build_worker(&config, &db, broker, dispatcher, registry).await?;
    let worker_task = tokio::spawn({
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    info!(
        app = %config.app.id,
        bus = ?config.bus.mode,
        queues = ?config.broker.queues,
        "nestor started"
    );

    let served = if config.socket.enabled {
        let mut state = GatewayState::for_propagator(&propagator, &config.socket);
        if let Some(render) = metrics_render {
            state = state.with_metrics_render(render);
        }
        start_server(&config.socket, state, cancel.clone()).await
    } else {
        cancel.cancelled().await;
        Ok(())
    };

    cancel.cancel();
    if let Err(e) = worker_task.await {
        warn!(error = %e, "job worker task ended abnormally");
    }
    if let Err(e) = bus.shutdown().await {
        warn!(error = %e, "bus shutdown failed");
    }
    db.close().await?;
    info!("nestor stopped");
    served
}

/// Routes every configured queue to the model of the entity with the same
/// name.
async fn build_worker(
    config: &NestorConfig,
    db: &Database,
    consumer: Arc<dyn MessageConsumer>,
    dispatcher: JobDispatcher,
    registry: Arc<SchemaRegistry>,
) -> Result<JobWorker, NestorError> {
    let mut worker = JobWorker::new(consumer, dispatcher, &config.broker, &config.app.id);
    for queue in &config.broker.queues {
        let store = SqlRecordStore::open(db.clone(), registry.clone(), queue, config.query).await?;
        worker = worker.route(queue, Arc::new(ModelService::new(Arc::new(store))));
    }
    Ok(worker)
}

/// Installs the Prometheus recorder and describes every counter. Serving
/// continues without `/metrics` when a recorder is already installed.
fn install_metrics() -> Option<MetricsRender> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            nestor_dispatch::metrics::register_metrics();
            nestor_socket::metrics::register_metrics();
            info!("prometheus metrics recorder installed");
            Some(Arc::new(move || handle.render()))
        }
        Err(e) => {
            warn!(error = %e, "metrics recorder not installed");
            None
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nestor={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
