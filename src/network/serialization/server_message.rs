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

use serde::Deserialize;
use serde_json::Value;

use super::SubscriptionId;

const INIT_FAIL: &str = "init_fail";
const COMPLETE: &str = "complete";

/// A message received from the server. Every member is optional, the
/// server is free to omit whatever does not apply to the message type.
#[derive(Debug, Deserialize, PartialEq)]
pub(crate) struct ServerMessage {
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,

    #[serde(default)]
    pub id: Option<Value>,

    #[serde(default)]
    pub payload: Option<Value>,
}

/// What the client should do with a [`ServerMessage`].
#[derive(Debug, PartialEq)]
pub(crate) enum Route {
    /// The server rejected the `init` payload.
    InitFail,

    /// Messages without id are not addressed to any subscription.
    NoId,

    /// The server confirms a subscription has been ended.
    Complete(Value),

    /// Addressed to a subscription but it carries no data.
    NoPayload,

    /// The id cannot be one we allocated.
    InvalidId(Value),

    Data { id: SubscriptionId, payload: Value },
}

impl ServerMessage {
    pub(crate) fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub(crate) fn route(self) -> Route {
        let message_type = self.message_type.unwrap_or_default();
        if message_type == INIT_FAIL {
            return Route::InitFail;
        }

        let Some(id) = self.id else {
            return Route::NoId;
        };

        if message_type == COMPLETE {
            return Route::Complete(id);
        }

        let Some(payload) = self.payload else {
            return Route::NoPayload;
        };

        match SubscriptionId::from_json(&id) {
            Some(id) => Route::Data { id, payload },
            None => Route::InvalidId(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn route(text: &str) -> Route {
        ServerMessage::parse(text).unwrap().route()
    }

    #[test]
    fn test_data() {
        assert_eq!(
            route(r#"{"type": "subscription_data", "id": 2, "payload": {"data": {"power": 12}}}"#),
            Route::Data {
                id: SubscriptionId::from(2),
                payload: json!({"data": {"power": 12}})
            }
        );

        // Servers may send the id back as a string
        assert_eq!(
            route(r#"{"id": "2", "payload": 1}"#),
            Route::Data {
                id: SubscriptionId::from(2),
                payload: json!(1)
            }
        );
    }

    #[test]
    fn test_init_fail_takes_precedence() {
        assert_eq!(
            route(r#"{"type": "init_fail", "id": 1, "payload": {"error": "bad token"}}"#),
            Route::InitFail
        );
        assert_eq!(route(r#"{"type": "init_fail"}"#), Route::InitFail);
    }

    #[test]
    fn test_complete() {
        assert_eq!(
            route(r#"{"type": "complete", "id": 4, "payload": {}}"#),
            Route::Complete(json!(4))
        );
    }

    #[rstest]
    #[case(r#"{}"#, Route::NoId)]
    #[case(r#"{"type": "init_success"}"#, Route::NoId)]
    #[case(r#"{"type": "ka", "id": null}"#, Route::NoId)]
    #[case(r#"{"type": "subscription_success", "id": 1}"#, Route::NoPayload)]
    #[case(r#"{"id": 1, "payload": null}"#, Route::NoPayload)]
    #[case(r#"{"id": "one", "payload": 1}"#, Route::InvalidId(json!("one")))]
    #[case(r#"{"type": null, "id": 0, "payload": 1}"#, Route::Data { id: SubscriptionId::from(0), payload: json!(1) })]
    fn test_routes(#[case] text: &str, #[case] expected: Route) {
        assert_eq!(route(text), expected);
    }

    #[rstest]
    #[case("not json")]
    #[case("[1, 2]")]
    #[case(r#"{"type": 3}"#)]
    fn test_parse_errors(#[case] text: &str) {
        assert!(ServerMessage::parse(text).is_err());
    }
}
