use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A connector driven by [`Poller`] once per tick.
pub trait PollingConnector: Send + Sync {
    /// Run one cycle. Must not block on network I/O.
    fn process(&self);

    /// Resolve once every send started by `process` has completed.
    fn wait_in_flight(&self) -> impl Future<Output = ()> + Send + '_;
}

/// Owns the poll timer and drives a connector on each tick.
///
/// `run()` returns once the cancel token fires; `shutdown()` then runs the
/// last cycle and waits for outstanding sends.
pub struct Poller<C: PollingConnector> {
    connector: C,
    interval: Interval,
    cancel: CancellationToken,
}

impl<C: PollingConnector> Poller<C> {
    /// The first cycle runs one full `period` after construction.
    pub fn new(connector: C, period: Duration, cancel: CancellationToken) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            connector,
            interval,
            cancel,
        }
    }

    pub async fn run(&mut self) {
        loop {
            if let ControlFlow::Break(()) = self.tick().await {
                return;
            }
        }
    }

    async fn tick(&mut self) -> ControlFlow<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("poller cancelled");
                ControlFlow::Break(())
            }
            _ = self.interval.tick() => {
                self.connector.process();
                ControlFlow::Continue(())
            }
        }
    }

    /// Final cycle for samples that arrived after the last tick, then wait
    /// for every in-flight send.
    pub async fn shutdown(self) {
        self.connector.process();
        self.connector.wait_in_flight().await;
    }
}
