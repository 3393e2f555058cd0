use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::underwriting::Decision;

/// Signals exchanged between the console's independent controls.
#[derive(Debug, Clone, PartialEq)]
pub enum UnderwritingEvent {
    /// Exact operator text; receivers normalize it themselves.
    SearchSubmitted(String),
    DecisionCompleted(Decision),
}

type Callback = Arc<dyn Fn(&UnderwritingEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(u64, Callback)>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publish/subscribe bus. Publishers hold no reference to their subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback`; it stays registered until the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&UnderwritingEvent) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.push((id, Arc::new(callback)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every current subscriber in registration order and return how many
    /// received it. Callbacks run outside the registry lock, so they may publish or subscribe.
    pub fn publish(&self, event: UnderwritingEvent) -> usize {
        let subscribers: Vec<Callback> = lock(&self.registry)
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &subscribers {
            callback(&event);
        }
        subscribers.len()
    }

    pub fn search_submitted(&self, text: impl Into<String>) -> usize {
        self.publish(UnderwritingEvent::SearchSubmitted(text.into()))
    }

    pub fn decision_completed(&self, decision: Decision) -> usize {
        self.publish(UnderwritingEvent::DecisionCompleted(decision))
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).subscribers.len()
    }
}

/// Scoped registration on an [`EventBus`].
#[must_use = "dropping a Subscription unregisters its callback"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry)
                .subscribers
                .retain(|(id, _)| *id != self.id);
        }
    }
}
