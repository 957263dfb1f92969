//! A small observer-pattern event bus, shared by the retry controller,
//! the endpoint pool/circuit breaker, and the orchestrator.
//!
//! A typed event trait, a boxed-listener collection, and panic-isolated
//! dispatch so one misbehaving listener can't take down the others.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Trait for events emitted by RPC-layer components.
pub trait RpcEvent: Send + Sync + fmt::Debug {
    /// A short, stable name for the event (e.g. `"retry"`, `"circuit_open"`).
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;
}

/// Trait for listening to RPC-layer events.
pub trait EventListener<E: RpcEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

/// A listener built from a plain closure.
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    E: RpcEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

type BoxedListener<E> = Arc<dyn EventListener<E>>;

/// A collection of event listeners that dispatches to all of them,
/// isolating panics so one listener can't break the others.
#[derive(Clone)]
pub struct EventListeners<E: RpcEvent> {
    listeners: Vec<BoxedListener<E>>,
}

impl<E: RpcEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(event_type = event.event_type(), "event listener panicked");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: RpcEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
