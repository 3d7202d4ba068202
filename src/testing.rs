use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use tokio::net::TcpListener;
use url::Url;

use crate::transport::{PushResponse, Transport, TransportError};

/// Records every body it is handed and answers with a fixed response.
/// Clones share the same record.
#[derive(Clone)]
pub struct RecordingTransport {
    bodies: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    response: PushResponse,
}

impl RecordingTransport {
    pub fn ok() -> Self {
        Self::responding(200, "")
    }

    pub fn responding(status: u16, body: &str) -> Self {
        Self {
            bodies: Arc::default(),
            calls: Arc::default(),
            response: PushResponse {
                status,
                body: body.to_owned(),
            },
        }
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    async fn post(&self, body: String) -> Result<PushResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(body);
        Ok(self.response.clone())
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

/// Local HTTP server standing in for the remote collector.
pub struct FakeCollector {
    pub url: Url,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl FakeCollector {
    pub async fn start(status: StatusCode, reply: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| {
                        let captured = Arc::clone(&captured);
                        async move {
                            let (parts, body) = req.into_parts();
                            let bytes = body
                                .collect()
                                .await
                                .map(|c| c.to_bytes())
                                .unwrap_or_default();
                            captured.lock().unwrap().push(CapturedRequest {
                                method: parts.method,
                                path: parts.uri.path().to_owned(),
                                headers: parts.headers,
                                body: String::from_utf8_lossy(&bytes).into_owned(),
                            });
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(status)
                                    .body(Full::new(Bytes::from_static(reply.as_bytes())))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = Builder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Bind to port 0 and return the OS-assigned port.
/// The listener is dropped, freeing the port for the caller to rebind.
pub async fn free_port() -> u16 {
    tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub async fn dummy_config(url: &Url) -> crate::config::Config {
    let _ = rustls::crypto::ring::default_provider().install_default();
    crate::config::Config {
        url: url.clone(),
        mac: "AA:BB".into(),
        headers: vec![],
        poll_interval: std::time::Duration::from_millis(100),
        listener_port: free_port().await,
        request_timeout: Some(std::time::Duration::from_secs(5)),
    }
}
