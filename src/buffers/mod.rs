use std::sync::{Arc, Mutex, MutexGuard};

use crate::sample::Sample;

/// Shared sample buffer. Producers append, the connector drains.
///
/// Uses `std::sync::Mutex` (not tokio) because the lock is never held across
/// `.await`; every operation is a push or a `mem::take`.
#[derive(Clone, Default)]
pub struct SampleBuffer {
    samples: Arc<Mutex<Vec<Sample>>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn push(&self, sample: Sample) {
        self.lock().push(sample);
    }

    pub fn extend(&self, samples: impl IntoIterator<Item = Sample>) {
        self.lock().extend(samples);
    }

    /// Take every buffered sample in arrival order, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-push cannot leave a Vec half-written, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Vec<Sample>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
