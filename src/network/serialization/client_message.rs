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

use serde::Serialize;
use serde_json::Value;

use super::SubscriptionId;

/// Messages sent from the client to the server.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientMessage<'a> {
    Init { payload: &'a Value },
    SubscriptionStart { query: &'a str, id: SubscriptionId },
    SubscriptionEnd { id: SubscriptionId },
}

impl ClientMessage<'_> {
    pub(crate) fn to_message(&self) -> serde_json::Result<tungstenite::Message> {
        Ok(tungstenite::Message::text(serde_json::to_string(self)?))
    }
}
