//! Health Registry (C2)
//!
//! Tracks per-backend availability and orders backends for the
//! orchestrators: available backends first (configured order), then
//! unavailable ones appended, so there is always something left to try.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::events::EventBus;

pub struct HealthRegistry {
    available: Mutex<Vec<bool>>,
    events: Arc<EventBus>,
}

impl HealthRegistry {
    pub fn new(backend_count: usize, events: Arc<EventBus>) -> Self {
        Self {
            available: Mutex::new(vec![true; backend_count]),
            events,
        }
    }

    pub fn is_available(&self, backend: usize) -> bool {
        self.available.lock()[backend]
    }

    /// Marks `backend` unavailable. Idempotent: only the first transition
    /// emits `availability_changed`.
    pub fn mark_unavailable(&self, backend: usize) {
        let mut guard = self.available.lock();
        if guard[backend] {
            guard[backend] = false;
            drop(guard);
            self.events.emit_availability_changed(backend, false);
        }
    }

    /// Marks `backend` available. Idempotent: only the first transition
    /// emits `availability_changed`.
    pub fn mark_available(&self, backend: usize) {
        let mut guard = self.available.lock();
        if !guard[backend] {
            guard[backend] = true;
            drop(guard);
            self.events.emit_availability_changed(backend, true);
        }
    }

    /// Backend indices in try order: available backends first (configured
    /// order), then unavailable ones appended last.
    pub fn order(&self) -> Vec<usize> {
        let guard = self.available.lock();
        let n = guard.len();
        let mut order: Vec<usize> = (0..n).filter(|&i| guard[i]).collect();
        order.extend((0..n).filter(|&i| !guard[i]));
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_puts_unavailable_last() {
        let events = Arc::new(EventBus::new());
        let health = HealthRegistry::new(3, events);

        health.mark_unavailable(0);
        assert_eq!(health.order(), vec![1, 2, 0]);
    }

    #[test]
    fn transition_is_idempotent() {
        let events = Arc::new(EventBus::new());
        let health = HealthRegistry::new(1, events.clone());
        let rx = events.subscribe();

        health.mark_unavailable(0);
        health.mark_unavailable(0); // no-op, no second event

        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
