//! Named-event publish/subscribe bus.
//!
//! Synchronous and ordered: `publish` runs every listener inline on the
//! caller's stack, in registration order. There is no channel and no queue,
//! so listeners must stay cheap — telemetry dispatch happens on the
//! transport's delivery path.
//!
//! A panicking listener unwinds through `publish` and skips the rest of that
//! dispatch. Listeners must not touch the bus they are being dispatched from.

use std::collections::HashMap;

/// Token identifying one registration on the bus.
///
/// Closures have no usable identity, so every `register` call hands one of
/// these back; `unregister` takes it to name the entry to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Box<dyn Fn(&E) + Send>;

struct Registration<E> {
    id: ListenerId,
    listener: Listener<E>,
}

/// Synchronous named-event bus.
///
/// Events are plain string names; the payload type `E` is shared by all of
/// them. The same closure may be registered any number of times and each
/// registration fires once per publish.
pub struct EventBus<E> {
    listeners: HashMap<String, Vec<Registration<E>>>,
    next_id: u64,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 0,
        }
    }

    /// Attach a listener to the end of `event`'s list.
    pub fn register(&mut self, event: &str, listener: impl Fn(&E) + Send + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Registration {
                id,
                listener: Box::new(listener),
            });
        id
    }

    /// Drop the first registration with this id from `event`'s list.
    ///
    /// Returns whether anything was removed; unknown events and ids are a
    /// no-op.
    pub fn unregister(&mut self, event: &str, id: ListenerId) -> bool {
        let Some(registrations) = self.listeners.get_mut(event) else {
            return false;
        };
        match registrations.iter().position(|r| r.id == id) {
            Some(index) => {
                registrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every listener currently registered for `event`, in
    /// registration order. Returns whether the event had any listener.
    pub fn publish(&self, event: &str, payload: &E) -> bool {
        let Some(registrations) = self.listeners.get(event) else {
            return false;
        };
        if registrations.is_empty() {
            return false;
        }
        for registration in registrations {
            (registration.listener)(payload);
        }
        true
    }

    /// Number of live registrations for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<u32>>>, tag: u32) -> impl Fn(&u32) + Send + 'static {
        let log = Arc::clone(log);
        move |payload| log.lock().unwrap().push(tag * 100 + payload)
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register("tick", recorder(&log, 1));
        bus.register("tick", recorder(&log, 2));
        bus.register("tick", recorder(&log, 3));

        assert!(bus.publish("tick", &7));
        assert_eq!(*log.lock().unwrap(), vec![107, 207, 307]);
    }

    #[test]
    fn publish_without_listeners_reports_false() {
        let bus: EventBus<u32> = EventBus::new();
        assert!(!bus.publish("tick", &0));
    }

    #[test]
    fn unregister_mid_list_keeps_the_others() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register("tick", recorder(&log, 1));
        let middle = bus.register("tick", recorder(&log, 2));
        bus.register("tick", recorder(&log, 3));

        assert!(bus.unregister("tick", middle));
        bus.publish("tick", &0);

        assert_eq!(*log.lock().unwrap(), vec![100, 300]);
        assert_eq!(bus.listener_count("tick"), 2);
    }

    #[test]
    fn unregister_unknown_event_or_id_is_a_noop() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = bus.register("tick", recorder(&log, 1));

        assert!(!bus.unregister("tock", id));
        assert!(bus.unregister("tick", id));
        assert!(!bus.unregister("tick", id));
    }

    #[test]
    fn duplicate_registrations_each_fire_once() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::new(recorder(&log, 5));
        let a = Arc::clone(&shared);
        let b = Arc::clone(&shared);
        let first = bus.register("tick", move |p| (*a)(p));
        bus.register("tick", move |p| (*b)(p));

        bus.publish("tick", &1);
        assert_eq!(*log.lock().unwrap(), vec![501, 501]);

        // Dropping one copy leaves the other registration live.
        assert!(bus.unregister("tick", first));
        bus.publish("tick", &2);
        assert_eq!(*log.lock().unwrap(), vec![501, 501, 502]);
    }

    #[test]
    fn events_are_isolated_from_each_other() {
        let mut bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.register("left", recorder(&log, 1));
        bus.register("right", recorder(&log, 2));

        bus.publish("right", &9);
        assert_eq!(*log.lock().unwrap(), vec![209]);
    }
}
