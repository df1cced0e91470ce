// SPDX-License-Identifier: GPL-3.0-only

//! Event notification between the controller, the facade and their listeners
//!
//! Each listener gets its own unbounded channel. Events are delivered in the
//! order they were emitted, and a listener only sees events emitted after it
//! subscribed. Listeners that dropped their receiver are pruned on the next
//! emit.

use futures::channel::mpsc;

/// Receiving end handed to a listener
pub type EventReceiver<T> = mpsc::UnboundedReceiver<T>;

/// Fan-out emitter for events of type `T`
#[derive(Debug)]
pub struct EventEmitter<T> {
    listeners: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a new listener
    pub fn subscribe(&mut self) -> EventReceiver<T> {
        let (sender, receiver) = mpsc::unbounded();
        self.listeners.push(sender);
        receiver
    }

    /// Deliver `event` to every live listener
    pub fn emit(&mut self, event: T) {
        self.listeners
            .retain(|listener| listener.unbounded_send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Clone> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain everything currently queued on `receiver` without waiting
pub fn drain<T>(receiver: &mut EventReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(Some(event)) = receiver.try_next() {
        events.push(event);
    }
    events
}

/// One-time subscription to the UI synchronization point
///
/// Armed by whoever needs work deferred to the next sync; `fire` returns
/// `true` exactly once per arming and disarms itself.
#[derive(Debug, Default)]
pub struct SyncOnce {
    armed: bool,
}

impl SyncOnce {
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn fire(&mut self) -> bool {
        std::mem::take(&mut self.armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let mut emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        emitter.emit(1);
        emitter.emit(2);
        emitter.emit(3);

        assert_eq!(drain(&mut rx), vec![1, 2, 3]);
    }

    #[test]
    fn test_late_listener_gets_no_backlog() {
        let mut emitter = EventEmitter::new();
        emitter.emit("early");

        let mut rx = emitter.subscribe();
        assert!(drain(&mut rx).is_empty());

        emitter.emit("late");
        assert_eq!(drain(&mut rx), vec!["late"]);
    }

    #[test]
    fn test_dropped_listener_is_pruned() {
        let mut emitter = EventEmitter::new();
        let rx = emitter.subscribe();
        let mut kept = emitter.subscribe();
        drop(rx);

        emitter.emit(7u32);
        assert_eq!(emitter.listener_count(), 1);
        assert_eq!(drain(&mut kept), vec![7]);
    }

    #[test]
    fn test_sync_once_fires_once() {
        let mut sync = SyncOnce::default();
        assert!(!sync.fire());

        sync.arm();
        assert!(sync.fire());
        assert!(!sync.fire());
    }
}
