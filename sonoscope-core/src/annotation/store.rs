use super::{Annotation, AnnotationId};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&AnnotationStore)>;

/// Authoritative set of annotations keyed by identity.
///
/// Every successful mutation calls each subscriber with the store itself;
/// subscribers re-read whatever they need.
#[derive(Default)]
pub struct AnnotationStore {
    annotations: HashMap<AnnotationId, Annotation>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl Fn(&AnnotationStore) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    fn notify(&self) {
        for (_, subscriber) in &self.subscribers {
            subscriber(self);
        }
    }

    /// Insert, replacing any annotation with the same identity.
    pub fn add(&mut self, annotation: Annotation) {
        self.annotations.insert(annotation.id(), annotation);
        self.notify();
    }

    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.annotations.remove(&id);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.annotations.clear();
        self.notify();
    }

    /// Swap in a new value for an identity that is already stored.
    /// Unknown identities are ignored and nobody is notified.
    pub fn replace(&mut self, annotation: Annotation) -> bool {
        match self.annotations.get_mut(&annotation.id()) {
            Some(slot) => {
                *slot = annotation;
                self.notify();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    /// All annotations, ordered by identity.
    pub fn annotations(&self) -> Vec<&Annotation> {
        let mut all: Vec<&Annotation> = self.annotations.values().collect();
        all.sort_by_key(|a| a.id());
        all
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}
