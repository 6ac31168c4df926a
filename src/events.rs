//! Minimal publish/subscribe used by parsers and stores
//!
//! Emission is a synchronous fan-out at the call site; listeners always
//! observe fully-constructed payloads. Event kinds are closed enums defined
//! next to their emitters, not free-form strings.

/// Opaque handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Per-instance observer list for one event payload type.
pub struct EventEmitter<E> {
    listeners: Vec<(ListenerHandle, Box<dyn Fn(&E) + Send + Sync>)>,
    next_handle: u64,
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            next_handle: 0,
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return the handle that removes it again.
    pub fn on<F>(&mut self, listener: F) -> ListenerHandle
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.push((handle, Box::new(listener)));
        handle
    }

    /// Remove a listener; returns `false` if the handle was already gone.
    pub fn off(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    /// Synchronously invoke every registered listener with the event.
    pub fn emit(&self, event: &E) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut emitter: EventEmitter<u32> = EventEmitter::new();

        for _ in 0..3 {
            let count = Arc::clone(&count);
            emitter.on(move |value| {
                count.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }

        emitter.emit(&2);
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_off_removes_single_listener() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut emitter: EventEmitter<()> = EventEmitter::new();

        let keep = Arc::clone(&count);
        emitter.on(move |()| {
            keep.fetch_add(1, Ordering::SeqCst);
        });
        let gone = Arc::clone(&count);
        let handle = emitter.on(move |()| {
            gone.fetch_add(10, Ordering::SeqCst);
        });

        assert!(emitter.off(handle));
        assert!(!emitter.off(handle));

        emitter.emit(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 1);
    }
}
