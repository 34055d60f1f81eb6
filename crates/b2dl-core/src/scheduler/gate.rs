//! Concurrency gate bounding the number of active download pipelines.
//!
//! A task must hold a [`GatePermit`] while its pipeline runs; dropping the
//! permit releases the slot whatever the outcome. Occupancy never exceeds
//! the capacity, and the highest occupancy seen is kept for diagnostics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct ConcurrencyGate {
    capacity: usize,
    permits: Arc<Semaphore>,
    in_use: Arc<AtomicUsize>,
    peak: AtomicUsize,
}

/// One occupied slot. Released on drop.
#[derive(Debug)]
pub struct GatePermit {
    in_use: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        // Runs before the semaphore permit field is dropped, so the counter
        // is decremented before another waiter can be admitted.
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ConcurrencyGate {
    /// Create a gate admitting up to `capacity` holders (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            in_use: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_use())
    }

    /// Highest occupancy observed since the gate was created.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Wait until a slot is free, then take it.
    pub async fn acquire(&self) -> GatePermit {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("gate semaphore is never closed"),
        };
        self.admit(permit)
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> GatePermit {
        let now = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        GatePermit {
            in_use: Arc::clone(&self.in_use),
            _permit: permit,
        }
    }
}
