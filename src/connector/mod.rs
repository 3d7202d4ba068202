use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::buffers::SampleBuffer;
use crate::poller::PollingConnector;
use crate::sample::{NodeReading, Sample, SensorValue};
use crate::transport::{Transport, TransportError};

/// Result of one dispatched send, as seen by its completion handler.
#[derive(Debug)]
pub enum PushOutcome {
    Delivered { status: u16 },
    Rejected { status: u16, body: String },
    Failed(TransportError),
}

/// Drains the sample buffer once per cycle and pushes the batch to the
/// collector without waiting for the answer.
pub struct HttpPushConnector<T: Transport> {
    buffer: SampleBuffer,
    mac: String,
    transport: Arc<T>,
    in_flight: TaskTracker,
}

impl<T: Transport> HttpPushConnector<T> {
    pub fn new(buffer: SampleBuffer, mac: impl Into<String>, transport: T) -> Self {
        Self {
            buffer,
            mac: mac.into(),
            transport: Arc::new(transport),
            in_flight: TaskTracker::new(),
        }
    }

    /// Drain the buffer into wire readings. The buffer is always left empty;
    /// `None` means the batch held no sensor values at all.
    pub fn prepare_payload(&self) -> Option<Vec<NodeReading>> {
        build_payload(self.buffer.drain_all(), &self.mac)
    }

    /// Run one cycle. Returns the handle of the spawned send, or `None` when
    /// there was nothing to send.
    pub fn dispatch(&self) -> Option<JoinHandle<PushOutcome>> {
        let Some(payload) = self.prepare_payload() else {
            info!("no data to send");
            return None;
        };

        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "failed to serialize payload");
                return None;
            }
        };

        info!(count = payload.len(), "sending data");
        debug!(%body, "payload");

        let transport = Arc::clone(&self.transport);
        Some(self.in_flight.spawn(async move {
            let outcome = match transport.post(body).await {
                Ok(resp) if resp.is_success() => PushOutcome::Delivered {
                    status: resp.status,
                },
                Ok(resp) => PushOutcome::Rejected {
                    status: resp.status,
                    body: resp.body,
                },
                Err(e) => PushOutcome::Failed(e),
            };
            log_outcome(&outcome);
            outcome
        }))
    }
}

impl<T: Transport> PollingConnector for HttpPushConnector<T> {
    fn process(&self) {
        let _ = self.dispatch();
    }

    fn wait_in_flight(&self) -> impl Future<Output = ()> + Send + '_ {
        self.in_flight.close();
        self.in_flight.wait()
    }
}

fn log_outcome(outcome: &PushOutcome) {
    match outcome {
        PushOutcome::Delivered { status } => info!(status, "data sent successfully"),
        PushOutcome::Rejected { status, body } => {
            error!(status, %body, "collector rejected data")
        }
        PushOutcome::Failed(e) => error!(error = %e, "failed to send data"),
    }
}

/// One reading per sample, in buffer order, each sensor named
/// `<sample id>-<data type>`.
fn build_payload(samples: Vec<Sample>, mac: &str) -> Option<Vec<NodeReading>> {
    let mut has_values = false;
    let readings: Vec<NodeReading> = samples
        .into_iter()
        .map(|sample| {
            let sensors: Vec<SensorValue> = sample
                .data
                .into_iter()
                .map(|(data_type, value)| SensorValue {
                    name: format!("{}-{data_type}", sample.id),
                    value,
                })
                .collect();
            has_values |= !sensors.is_empty();
            NodeReading {
                mac: mac.to_owned(),
                sensors,
            }
        })
        .collect();

    has_values.then_some(readings)
}
