use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::buffers::SampleBuffer;
use crate::sample::{Sample, SampleBatch};

const SAMPLES_PATH: &str = "/samples";

/// Upper bound on waiting for open producer connections after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::default());
    *resp.status_mut() = status;
    resp
}

/// Validate the incoming request: route, method, and body.
async fn validate<B>(req: Request<B>) -> Result<Vec<Sample>, (StatusCode, String)>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    let path = req.uri().path().to_owned();
    let method = req.method().clone();

    if path != SAMPLES_PATH {
        return Err((StatusCode::NOT_FOUND, format!("unknown path: {path}")));
    }
    if method != Method::POST {
        return Err((StatusCode::METHOD_NOT_ALLOWED, format!("{method} {path}")));
    }

    let body = req.collect().await.map(|c| c.to_bytes()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("POST {path}: failed to read body"),
        )
    })?;

    serde_json::from_slice::<SampleBatch>(&body)
        .map(SampleBatch::into_vec)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid samples: {e}")))
}

async fn handle<B>(
    req: Request<B>,
    buffer: SampleBuffer,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
{
    match validate(req).await {
        Ok(samples) => {
            let count = samples.len();
            buffer.extend(samples);
            debug!(count, buffered = buffer.len(), "samples buffered");
            Ok(response(StatusCode::ACCEPTED))
        }
        Err((status, reason)) => {
            warn!(reason, "ingest request rejected");
            Ok(response(status))
        }
    }
}

/// Accept producer connections until `cancel` fires.
///
/// On cancellation the listener is closed and open connections are shut down
/// gracefully, letting a request already in progress finish. Returns once
/// those connections are gone, so nothing reaches the buffer afterwards.
pub async fn serve(listener: TcpListener, buffer: SampleBuffer, cancel: CancellationToken) {
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            result = listener.accept() => {
                let stream = match result {
                    Ok((stream, _)) => stream,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };
                connections.spawn(serve_connection(stream, buffer.clone(), cancel.clone()));
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }

    drop(listener);
    connections.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, connections.wait())
        .await
        .is_err()
    {
        warn!(
            open = connections.len(),
            "ingest connections still open after shutdown grace period"
        );
    }
}

async fn serve_connection(stream: TcpStream, buffer: SampleBuffer, cancel: CancellationToken) {
    let service = service_fn(move |req| handle(req, buffer.clone()));
    let builder = Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(error = %e, "ingest connection closed with error");
    }
}
