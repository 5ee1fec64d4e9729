//! Admission control for in-flight requests.
//!
//! The [`AdmissionGate`] is a counting semaphore sized to the batch
//! concurrency. Every target holds one unit while it is being fetched,
//! retries and backoff sleeps included. The unit is returned when the
//! [`Admission`] guard is dropped, so it is released on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Semaphore, SemaphorePermit};

/// Caps the number of targets being fetched at the same time
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Semaphore,
    capacity: usize,
    active: AtomicUsize,
}

/// RAII guard for one unit of an [`AdmissionGate`]
#[derive(Debug)]
pub struct Admission<'a> {
    _permit: SemaphorePermit<'a>,
    active: &'a AtomicUsize,
    position: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `capacity` holders at once
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            active: AtomicUsize::new(0),
        }
    }

    /// Wait until a unit is available and take it
    ///
    /// # Panics
    ///
    /// Panics if the underlying semaphore was closed, which never happens
    /// because the gate does not expose `close`.
    pub async fn admit(&self) -> Admission<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            // SAFETY: this should not panic as we never close the semaphore
            .expect("Semaphore was closed unexpectedly");
        let position = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        Admission {
            _permit: permit,
            active: &self.active,
            position,
        }
    }

    /// Maximum number of concurrent holders
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of units currently held
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of units currently free
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Admission<'_> {
    /// Number of holders (this one included) at the moment of admission
    #[must_use]
    pub const fn active_at_admission(&self) -> usize {
        self.position
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
