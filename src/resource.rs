// src/resource.rs
// Resource Monitor (spec §4.8/§7): caps the number of in-flight operations
// so a burst of tool calls degrades gracefully (`Busy`) instead of
// exhausting the connection pool or the process.

use crate::error::{Result, SlunkError};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Holding this permit keeps one "slot" of `max_in_flight` reserved; drop it
/// to release the slot back to the pool.
pub struct InFlightGuard(#[allow(dead_code)] OwnedSemaphorePermit);

#[derive(Clone)]
pub struct ResourceMonitor {
    semaphore: Arc<Semaphore>,
}

impl ResourceMonitor {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Reserve one in-flight slot, returning `Busy` immediately rather than
    /// queuing (spec §7: "Busy: caller should retry after a short delay,
    /// never block indefinitely").
    pub fn try_acquire(&self) -> Result<InFlightGuard> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .map(InFlightGuard)
            .map_err(|_| SlunkError::Busy("max_in_flight operations already running".to_string()))
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_beyond_capacity() {
        let monitor = ResourceMonitor::new(1);
        let _first = monitor.try_acquire().expect("first slot");
        assert!(monitor.try_acquire().is_err());
    }

    #[test]
    fn releases_slot_on_drop() {
        let monitor = ResourceMonitor::new(1);
        {
            let _first = monitor.try_acquire().expect("first slot");
        }
        assert!(monitor.try_acquire().is_ok());
    }
}
