use crate::types::{InboundMessage, SubscriptionId, SubscriptionKind, TopicParams};
use std::fmt;
use std::sync::Arc;

/// Callback invoked for every routed message of a subscription's kind.
pub type SubscriptionCallback = Arc<dyn Fn(&InboundMessage) + Send + Sync + 'static>;

/// A registered subscription. Survives reconnects; removed only by
/// unsubscribe or teardown.
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub params: TopicParams,
    pub callback: SubscriptionCallback,
}

impl Subscription {
    pub fn new(params: TopicParams, callback: SubscriptionCallback) -> Self {
        Self {
            id: SubscriptionId::generate(),
            params,
            callback,
        }
    }

    pub fn kind(&self) -> SubscriptionKind {
        self.params.kind()
    }

    pub fn info(&self) -> SubscriptionInfo {
        SubscriptionInfo {
            id: self.id.clone(),
            kind: self.kind(),
            params: self.params.clone(),
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Callback-free view of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub kind: SubscriptionKind,
    pub params: TopicParams,
}

/// Registration-ordered store of subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription: Subscription) {
        debug_assert!(
            !self.contains(&subscription.id),
            "subscription ids are never reused"
        );
        self.entries.push(subscription);
    }

    /// Removes an entry. Unknown ids return `None`.
    pub fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        let index = self.entries.iter().position(|s| &s.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.entries.iter().any(|s| &s.id == id)
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    pub fn matching(&self, kind: SubscriptionKind) -> impl Iterator<Item = &Subscription> {
        self.entries.iter().filter(move |s| s.kind() == kind)
    }

    /// Drops every entry, returning how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        self.entries.iter().map(Subscription::info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> SubscriptionCallback {
        Arc::new(|_msg: &InboundMessage| {})
    }

    fn report(id: &str) -> TopicParams {
        TopicParams::Report {
            report_id: id.to_string(),
        }
    }

    #[test]
    fn test_keeps_registration_order_after_removal() {
        let mut registry = SubscriptionRegistry::new();
        let a = Subscription::new(report("R1"), noop());
        let b = Subscription::new(TopicParams::Global, noop());
        let c = Subscription::new(report("R2"), noop());
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
        registry.insert(a);
        registry.insert(b);
        registry.insert(c);

        assert!(registry.remove(&b_id).is_some());
        let order: Vec<_> = registry.iter().map(|s| s.id.clone()).collect();
        assert_eq!(order, vec![a_id, c_id]);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert(Subscription::new(TopicParams::Global, noop()));
        assert!(registry.remove(&SubscriptionId::from("sub_missing")).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_matching_filters_by_kind_only() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert(Subscription::new(
            TopicParams::Location {
                lat: 1.0,
                lng: 2.0,
                radius_km: 3.0,
            },
            noop(),
        ));
        registry.insert(Subscription::new(
            TopicParams::Location {
                lat: 40.0,
                lng: -70.0,
                radius_km: 50.0,
            },
            noop(),
        ));
        registry.insert(Subscription::new(report("R9"), noop()));

        assert_eq!(registry.matching(SubscriptionKind::Location).count(), 2);
        assert_eq!(registry.matching(SubscriptionKind::Report).count(), 1);
        assert_eq!(registry.matching(SubscriptionKind::Global).count(), 0);
    }

    #[test]
    fn test_clear_and_snapshot() {
        let mut registry = SubscriptionRegistry::new();
        registry.insert(Subscription::new(report("R1"), noop()));
        registry.insert(Subscription::new(TopicParams::Global, noop()));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].kind, SubscriptionKind::Report);
        assert_eq!(snapshot[1].params, TopicParams::Global);

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }
}
