//! Per-session lifecycle listeners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::ConnectionOutcome;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of listeners for events of type `E`.
///
/// Listeners run synchronously on the emitting task, in registration order.
pub struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}

impl<E> Listeners<E> {
    /// Appends a listener.
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Number of listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Calls every listener with `event`.
    ///
    /// Iterates over a snapshot, so listeners may add or remove listeners.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener<E>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Events published by the keep-alive sweep for one session.
#[derive(Debug, Default)]
pub struct Lifecycle {
    /// Fired after every reconnection attempt, successful or not.
    pub connection: Listeners<ConnectionOutcome>,
    /// Fired at the end of every successful keep-alive cycle.
    pub keep_alive: Listeners<()>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_order_and_remove() {
        let listeners = Listeners::<u32>::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let first = listeners.add(move |e| s.lock().unwrap().push(("first", *e)));
        let s = Arc::clone(&seen);
        listeners.add(move |e| s.lock().unwrap().push(("second", *e)));

        listeners.emit(&1);
        assert!(listeners.remove(first));
        assert!(!listeners.remove(first));
        listeners.emit(&2);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("second", 2)]
        );
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_listener_may_register_during_emit() {
        let listeners = Arc::new(Listeners::<()>::default());
        let inner = Arc::clone(&listeners);
        listeners.add(move |()| {
            inner.add(|()| {});
        });
        listeners.emit(&());
        assert_eq!(listeners.len(), 2);
    }
}
