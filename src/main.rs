mod buffers;
mod config;
mod connector;
mod ingest_listener;
mod poller;
mod sample;
mod transport;

#[cfg(test)]
mod testing;

use std::future::Future;

use buffers::SampleBuffer;
use connector::HttpPushConnector;
use poller::Poller;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use transport::HttpTransport;

/// Exceptional init failure: log and exit.
fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("HTTP_PUSH_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid HTTP_PUSH_LOG_LEVEL: {val:?}, defaulting to INFO");
                None
            })
        })
        .unwrap_or(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stderr).with_target(true))
        .init();
}

fn setup_rustls() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }
}

/// Resolves on Ctrl-C or SIGTERM. The SIGTERM handler is registered when this
/// is called, not when the future is first polled.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    let term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .inspect_err(|e| warn!(error = %e, "failed to install SIGTERM handler"))
        .ok();

    async move {
        #[cfg(unix)]
        {
            if let Some(mut term) = term {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
        }

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logging();
    setup_rustls();

    let shutdown = shutdown_signal();

    let config = config::Config::from_env().unwrap_or_else(|e| fatal("config error", &e));
    let transport =
        HttpTransport::new(&config).unwrap_or_else(|e| fatal("failed to build HTTP transport", &e));

    let listener = TcpListener::bind(("127.0.0.1", config.listener_port))
        .await
        .unwrap_or_else(|e| fatal("failed to bind ingest listener", &e));

    info!(
        target_url = %transport.target(),
        listener_port = config.listener_port,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "connector started"
    );

    let cancel = CancellationToken::new();
    let buffer = SampleBuffer::new();

    let listener_task = tokio::spawn(ingest_listener::serve(
        listener,
        buffer.clone(),
        cancel.clone(),
    ));

    let connector = HttpPushConnector::new(buffer, config.mac.clone(), transport);
    let mut poller = Poller::new(connector, config.poll_interval, cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown.await;
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    poller.run().await;

    // Producers are disconnected before the final cycle drains the buffer.
    if let Err(e) = listener_task.await {
        error!(error = %e, "ingest listener task panicked");
    }
    poller.shutdown().await;
    info!("connector stopped");
}
