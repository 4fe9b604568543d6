//! Event-type keyed fan-out of incoming payloads to subscribers.
//!
//! Each event type maps to an ordered list of callbacks. Dispatch iterates a
//! snapshot of that list taken under a short lock, so callbacks may add or
//! remove listeners (their own included) while being invoked. A cancelled
//! listener is never invoked again, even when cancellation happens in the
//! middle of a dispatch that already holds it in its snapshot.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use felt_core::events::decode_payload;
use felt_core::{DomainEvent, ListenerId};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, warn};

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: ListenerId,
    active: Arc<AtomicBool>,
    callback: Callback,
}

#[derive(Default)]
struct RegistryInner {
    listeners: Mutex<HashMap<String, Vec<ListenerEntry>>>,
    next_id: AtomicU64,
}

impl RegistryInner {
    fn remove(&self, event_type: &str, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(entries) = listeners.get_mut(event_type) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                let _ = listeners.remove(event_type);
            }
        }
    }
}

/// Registry of event listeners. Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct DispatchRegistry {
    inner: Arc<RegistryInner>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to every payload of `event_type`.
    ///
    /// Listeners for the same type run in registration order. Registering the
    /// same closure twice yields two independent subscriptions.
    pub fn add_event_listener<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = ListenerId::from_raw(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let active = Arc::new(AtomicBool::new(true));

        self.inner
            .listeners
            .lock()
            .entry(event_type.clone())
            .or_default()
            .push(ListenerEntry {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(callback),
            });
        debug!(event_type = event_type.as_str(), listener = %id, "listener added");

        Subscription {
            id,
            event_type,
            active,
            registry: Arc::downgrade(&self.inner),
            detach_on_drop: true,
        }
    }

    /// Subscribe to `E::NAME`, decoding each payload into `E` first.
    ///
    /// Payloads that do not fit `E` are logged and skipped for this listener
    /// only; other listeners of the same type still see them.
    pub fn add_typed_listener<E, F>(&self, callback: F) -> Subscription
    where
        E: DomainEvent + 'static,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.add_event_listener(E::NAME, move |payload| match decode_payload::<E>(payload) {
            Ok(event) => callback(event),
            Err(error) => warn!(event_type = E::NAME, %error, "payload shape mismatch, listener skipped"),
        })
    }

    /// Invoke every listener of `event_type` with `payload`.
    ///
    /// Returns the number of listeners invoked. A panicking listener is
    /// logged and does not stop the remaining ones.
    pub fn dispatch(&self, event_type: &str, payload: &Value) -> usize {
        let snapshot: Vec<ListenerEntry> = match self.inner.listeners.lock().get(event_type) {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for entry in snapshot {
            if !entry.active.load(Ordering::SeqCst) {
                continue;
            }
            invoked += 1;
            let callback = &entry.callback;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                error!(
                    event_type,
                    listener = %entry.id,
                    panic = panic_message(panic.as_ref()),
                    "listener panicked"
                );
                metrics::counter!("realtime_listener_panics_total").increment(1);
            }
        }
        invoked
    }

    /// Number of active listeners for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(event_type)
            .map_or(0, |entries| {
                entries
                    .iter()
                    .filter(|e| e.active.load(Ordering::SeqCst))
                    .count()
            })
    }

    /// Whether no listener is registered for any type.
    pub fn is_empty(&self) -> bool {
        self.inner.listeners.lock().is_empty()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic>"
    }
}

/// Handle to one registered listener.
///
/// Dropping it detaches the listener; call [`Subscription::persist`] to keep
/// the listener for the lifetime of the registry instead.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    id: ListenerId,
    event_type: String,
    active: Arc<AtomicBool>,
    registry: Weak<RegistryInner>,
    detach_on_drop: bool,
}

impl Subscription {
    /// Identifier of the listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Event type the listener is registered for.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Remove the listener. Safe to call repeatedly and from inside the
    /// listener itself.
    pub fn detach(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event_type, self.id);
            debug!(event_type = self.event_type.as_str(), listener = %self.id, "listener detached");
        }
    }

    /// Keep the listener registered after this handle is dropped.
    pub fn persist(mut self) -> ListenerId {
        self.detach_on_drop = false;
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detach_on_drop {
            self.detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
