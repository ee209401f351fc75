// (C) Copyright IBM Corp. 2025.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::SubscriptionId;

pub(crate) type SubscriptionCallback = Arc<dyn Fn(Value) + Send + Sync>;

pub(crate) struct Subscription {
    pub(crate) query: String,
    pub(crate) callback: SubscriptionCallback,
}

/// Subscriptions registered in a manager, indexed by their id.
///
/// Entries stay here across reconnections, they are only removed once
/// the server has been told to end them.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl SubscriptionRegistry {
    pub(crate) fn insert(&mut self, query: String, callback: SubscriptionCallback) -> SubscriptionId {
        let id = SubscriptionId::from(self.next_id);
        self.next_id += 1;
        self.subscriptions
            .insert(id, Subscription { query, callback });
        id
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<Subscription> {
        self.subscriptions.remove(&id)
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    pub(crate) fn callback(&self, id: SubscriptionId) -> Option<SubscriptionCallback> {
        self.subscriptions.get(&id).map(|s| s.callback.clone())
    }

    pub(crate) fn query(&self, id: SubscriptionId) -> Option<String> {
        self.subscriptions.get(&id).map(|s| s.query.clone())
    }

    /// Ids in allocation order.
    pub(crate) fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("next_id", &self.next_id)
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn noop() -> SubscriptionCallback {
        Arc::new(|_: Value| {})
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut registry = SubscriptionRegistry::default();
        let first = registry.insert("a".into(), noop());
        let second = registry.insert("b".into(), noop());
        assert_eq!(first.value(), 0);
        assert_eq!(second.value(), 1);

        assert!(registry.remove(second).is_some());
        assert!(registry.remove(second).is_none());

        let third = registry.insert("c".into(), noop());
        assert_eq!(third.value(), 2);
        assert_eq!(registry.ids(), vec![first, third]);
        assert_eq!(registry.ids().len(), 2);
    }

    #[test]
    fn test_lookup() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        let mut registry = SubscriptionRegistry::default();
        let id = registry.insert(
            "subscription { x }".into(),
            Arc::new(move |data: Value| received_clone.lock().unwrap().push(data)),
        );

        assert!(registry.contains(id));
        assert_eq!(registry.query(id).unwrap(), "subscription { x }");
        (registry.callback(id).unwrap())(serde_json::json!(1));
        assert_eq!(*received.lock().unwrap(), vec![serde_json::json!(1)]);

        let unknown = SubscriptionId::from(99);
        assert!(!registry.contains(unknown));
        assert!(registry.callback(unknown).is_none());
        assert!(registry.query(unknown).is_none());

        registry.remove(id);
        assert!(registry.ids().is_empty());
    }
}
