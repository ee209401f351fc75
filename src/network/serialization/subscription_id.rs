// (C) Copyright IBM Corp. 2024.
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

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

/// Identifies a subscription within the connection it was started on.
///
/// Ids are allocated by the [`SubscriptionManager`](crate::SubscriptionManager)
/// and they are never reused by the same manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Servers echo the id either as the number we sent or as its decimal string.
    pub(crate) fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self),
            Value::String(s) => s.parse().ok().map(Self),
            _ => None,
        }
    }
}

impl From<u64> for SubscriptionId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(3), Some(3))]
    #[case(json!("3"), Some(3))]
    #[case(json!("03"), Some(3))]
    #[case(json!(-1), None)]
    #[case(json!(1.5), None)]
    #[case(json!("abc"), None)]
    #[case(json!({"id": 1}), None)]
    fn test_from_json(#[case] value: Value, #[case] expected: Option<u64>) {
        assert_eq!(
            SubscriptionId::from_json(&value),
            expected.map(SubscriptionId::from)
        );
    }

    #[test]
    fn test_serializes_as_number() {
        assert_eq!(
            serde_json::to_string(&SubscriptionId::from(42)).unwrap(),
            "42"
        );
    }
}
