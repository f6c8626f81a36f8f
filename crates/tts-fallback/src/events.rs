//! Event Bus (C8)
//!
//! Listeners are invoked synchronously, in emission order, on whatever
//! task calls into the registry (§5 ordering guarantees: availability
//! events are emitted in transition order). A listener that panics is
//! caught and logged rather than allowed to unwind into adapter code
//! (§4.8, §7: "listener exceptions must not propagate").

use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use tokio::sync::broadcast;

/// Emitted whenever a backend's availability flips.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityChangedEvent {
    pub backend: usize,
    pub available: bool,
}

type Listener = Box<dyn Fn(AvailabilityChangedEvent) + Send + Sync>;

pub struct EventBus {
    listeners: Mutex<Vec<Listener>>,
    channel: broadcast::Sender<AvailabilityChangedEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(64);
        Self {
            listeners: Mutex::new(Vec::new()),
            channel,
        }
    }

    /// Registers an `on("tts_availability_changed", handler)`-style
    /// listener (§6 Events).
    pub fn on_availability_changed<F>(&self, handler: F)
    where
        F: Fn(AvailabilityChangedEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Box::new(handler));
    }

    /// Subscribe to a broadcast stream of events, independent of the
    /// synchronous listener list above — used by callers (and tests) that
    /// want to await transitions rather than register a callback.
    pub fn subscribe(&self) -> broadcast::Receiver<AvailabilityChangedEvent> {
        self.channel.subscribe()
    }

    pub(crate) fn emit_availability_changed(&self, backend: usize, available: bool) {
        let event = AvailabilityChangedEvent { backend, available };

        tracing::info!(backend, available, "tts backend availability changed");

        for listener in self.listeners.lock().iter() {
            if std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!("availability listener panicked, ignoring");
            }
        }

        // No subscribers is a normal, non-error state.
        let _ = self.channel.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
