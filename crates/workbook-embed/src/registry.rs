//! Per-event-type multicast dispatch.
//!
//! Any number of handlers may subscribe to the same [`EventType`]. They run in
//! subscription order, and a handler that fails (returns `Err` or panics) is
//! logged without stopping the ones after it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use log::warn;
use workbook_protocol::EventType;

use crate::channel::InboundEvent;
use crate::lock;

pub type Handler = Arc<dyn Fn(&InboundEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Slots {
    next_id: u64,
    handlers: HashMap<EventType, Vec<(u64, Handler)>>,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Cheap-to-clone handle to a shared set of subscriptions.
#[derive(Clone, Default)]
pub struct EventRegistry {
    slots: Arc<Mutex<Slots>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&InboundEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut slots = lock(&self.slots);
        slots.next_id += 1;
        let id = slots.next_id;
        slots
            .handlers
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            id,
            event_type,
            slots: Arc::downgrade(&self.slots),
        }
    }

    /// Invoke every handler subscribed to the event's type.
    ///
    /// Handlers are snapshotted first, so a handler may subscribe or
    /// unsubscribe without deadlocking. Handlers added during a dispatch run
    /// from the next one; handlers removed during a dispatch (including by
    /// [`clear`](Self::clear) on detach) are skipped if they have not run yet.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchReport {
        let event_type = event.event_type();
        let handlers: Vec<(u64, Handler)> = lock(&self.slots)
            .handlers
            .get(&event_type)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (id, handler) in handlers {
            if !self.contains(event_type, id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    warn!("Handler for {} failed: {:#}", event_type, e);
                    report.failed += 1;
                }
                Err(panic) => {
                    warn!(
                        "Handler for {} panicked: {}",
                        event_type,
                        panic_message(panic.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    fn contains(&self, event_type: EventType, id: u64) -> bool {
        lock(&self.slots)
            .handlers
            .get(&event_type)
            .is_some_and(|list| list.iter().any(|(sid, _)| *sid == id))
    }

    /// Drop every subscription. Outstanding [`Subscription`]s become inert.
    pub fn clear(&self) -> usize {
        let mut slots = lock(&self.slots);
        let removed = slots.handlers.values().map(Vec::len).sum();
        slots.handlers.clear();
        removed
    }

    /// Number of active subscriptions across all event types.
    pub fn len(&self) -> usize {
        lock(&self.slots).handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribers(&self, event_type: EventType) -> usize {
        lock(&self.slots)
            .handlers
            .get(&event_type)
            .map_or(0, Vec::len)
    }
}

/// Handle returned by [`EventRegistry::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    event_type: EventType,
    slots: Weak<Mutex<Slots>>,
}

impl Subscription {
    /// Remove the handler. Idempotent; returns whether it was still active.
    pub fn unsubscribe(&self) -> bool {
        let Some(slots) = self.slots.upgrade() else {
            return false;
        };
        let mut slots = lock(&slots);
        let Some(list) = slots.handlers.get_mut(&self.event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != self.id);
        let removed = list.len() != before;
        if list.is_empty() {
            slots.handlers.remove(&self.event_type);
        }
        removed
    }

    pub fn is_active(&self) -> bool {
        let Some(slots) = self.slots.upgrade() else {
            return false;
        };
        let slots = lock(&slots);
        slots
            .handlers
            .get(&self.event_type)
            .is_some_and(|list| list.iter().any(|(id, _)| *id == self.id))
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use workbook_protocol::{EventPayload, VariableChange};

    fn variable_event(value: &str) -> InboundEvent {
        InboundEvent::new(
            EventPayload::VariableChange(VariableChange {
                name: "k".into(),
                value: value.into(),
            }),
            "https://app.example.com".into(),
        )
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let registry = EventRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            registry.subscribe(EventType::VariableChange, move |_| {
                order.lock().unwrap().push(i);
                Ok(())
            });
        }

        let report = registry.dispatch(&variable_event("1"));
        assert_eq!(report.delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_dispatch() {
        let registry = EventRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));

        registry.subscribe(EventType::VariableChange, |_| anyhow::bail!("boom"));
        registry.subscribe(EventType::VariableChange, |_| panic!("handler panicked"));
        let seen_clone = seen.clone();
        registry.subscribe(EventType::VariableChange, move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry.dispatch(&variable_event("1"));
        assert_eq!(report, DispatchReport { delivered: 1, failed: 2 });
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // Registry is still usable after a panicking handler
        registry.dispatch(&variable_event("2"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispatch_only_reaches_matching_type() {
        let registry = EventRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        registry.subscribe(EventType::Loaded, move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry.dispatch(&variable_event("1"));
        assert_eq!(report, DispatchReport::default());
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let registry = EventRegistry::new();
        let first = registry.subscribe(EventType::VariableChange, |_| Ok(()));
        let second = registry.subscribe(EventType::VariableChange, |_| Ok(()));

        assert!(first.unsubscribe());
        assert!(!first.unsubscribe());
        assert!(!first.is_active());
        assert!(second.is_active());
        assert_eq!(registry.subscribers(EventType::VariableChange), 1);
    }

    #[test]
    fn test_clear_makes_subscriptions_inert() {
        let registry = EventRegistry::new();
        let sub = registry.subscribe(EventType::Error, |_| Ok(()));
        registry.subscribe(EventType::Loaded, |_| Ok(()));

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
        assert_eq!(registry.clear(), 0);
    }

    #[test]
    fn test_clear_during_dispatch_skips_remaining_handlers() {
        let registry = EventRegistry::new();
        let later = Arc::new(AtomicUsize::new(0));

        let clearing = registry.clone();
        registry.subscribe(EventType::VariableChange, move |_| {
            clearing.clear();
            Ok(())
        });
        let later_clone = later.clone();
        registry.subscribe(EventType::VariableChange, move |_| {
            later_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = registry.dispatch(&variable_event("1"));
        assert_eq!(report, DispatchReport { delivered: 1, failed: 0 });
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_dispatch() {
        let registry = EventRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot_clone = slot.clone();
        let calls_clone = calls.clone();
        let sub = registry.subscribe(EventType::VariableChange, move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = slot_clone.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(sub);

        registry.dispatch(&variable_event("1"));
        registry.dispatch(&variable_event("2"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
