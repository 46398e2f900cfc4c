use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use minion_core::{LogFormat, MinionConfig};
use minion_gateway::{HttpRegistryClient, HttpTenantClient};
use minion_sync::{Minion, RecordHandler};

use crate::error::{io_err, DaemonError};
use crate::routes;

/// Run a minion and block the current thread until it exits.
pub fn start_blocking(
    config: MinionConfig,
    handler: Arc<dyn RecordHandler>,
) -> Result<(), DaemonError> {
    init_tracing(config.log_format);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, handler))
}

/// Build the HTTP gateways for `config` and run the minion until ctrl-c.
pub async fn run(config: MinionConfig, handler: Arc<dyn RecordHandler>) -> Result<(), DaemonError> {
    config.validate()?;

    let registry = Arc::new(HttpRegistryClient::from_config(&config)?);
    let tenants = Arc::new(HttpTenantClient::from_config(&config)?);
    let port = config.port()?;
    let minion = Arc::new(Minion::new(config, registry, tenants, handler)?);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| DaemonError::Bind { addr, source })?;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    serve(listener, minion, shutdown_tx).await
}

/// Serve ingress on `listener`, then run the startup sequence.
///
/// The listener is bound before startup so deliveries triggered by the
/// resume acknowledgment have somewhere to land. A startup failure stops
/// the server and is returned. Otherwise this runs until ctrl-c or a message
/// on `shutdown`.
pub async fn serve(
    listener: TcpListener,
    minion: Arc<Minion>,
    shutdown: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let local_addr = listener
        .local_addr()
        .map_err(|e| io_err("listener address", e))?;
    tracing::info!(%local_addr, minion_id = %minion.config().minion_id, "ingress listening");
    let mut signal_shutdown_rx = shutdown.subscribe();

    let server_handle = {
        let shutdown = shutdown.clone();
        let mut shutdown_rx = shutdown.subscribe();
        let app = routes::router(minion.clone());
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .map_err(|e| io_err("http server", e));
            let _ = shutdown.send(());
            result
        })
    };

    if let Err(err) = minion.start().await {
        tracing::error!(error = %err, "startup failed; stopping ingress");
        let _ = shutdown.send(());
        handle_join("http_server", server_handle.await)?;
        return Err(err.into());
    }

    let signal_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal_shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down minion");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (server_result, signal_result) = tokio::join!(server_handle, signal_handle);
    handle_join("http_server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("minion stopped");
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
