//! Wire contract with the dialogue front end.
//!
//! One turn in: recognized intent, slots, raw utterance, session
//! attributes. One response out: dialog directive, intent disposition, the
//! (possibly mutated) session attributes, and user-visible messages. The
//! response is always well-formed, even when the turn failed internally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::intent::{Intent, SlotValues};
use super::session::SessionAttributes;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnEvent {
    #[serde(default)]
    pub session_state: SessionStatePayload,
    #[serde(default)]
    pub input_transcript: String,
}

impl TurnEvent {
    pub fn intent(&self) -> Intent {
        Intent::from_name(&self.session_state.intent.name)
    }

    pub fn attributes(&self) -> SessionAttributes {
        SessionAttributes::from_map(self.session_state.session_attributes.clone())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatePayload {
    #[serde(default)]
    pub intent: IntentPayload,
    #[serde(default)]
    pub session_attributes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IntentPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slots: SlotValues,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DialogActionType {
    /// End the session after this turn.
    Close,
    /// Keep the session open and wait for the next utterance.
    ElicitIntent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FulfillmentState {
    Fulfilled,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct DialogAction {
    #[serde(rename = "type")]
    pub action_type: DialogActionType,
}

#[derive(Clone, Debug, Serialize)]
pub struct IntentDisposition {
    pub name: String,
    pub state: FulfillmentState,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSessionState {
    pub dialog_action: DialogAction,
    pub intent: IntentDisposition,
    pub session_attributes: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub content_type: &'static str,
    pub content: String,
}

impl Message {
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self { content_type: "PlainText", content: content.into() }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub session_state: ResponseSessionState,
    pub messages: Vec<Message>,
}

impl TurnResponse {
    pub fn new(
        action_type: DialogActionType,
        intent_name: &str,
        state: FulfillmentState,
        attributes: SessionAttributes,
        content: impl Into<String>,
    ) -> Self {
        Self {
            session_state: ResponseSessionState {
                dialog_action: DialogAction { action_type },
                intent: IntentDisposition { name: intent_name.to_owned(), state },
                session_attributes: attributes.into_map(),
            },
            messages: vec![Message::plain_text(content)],
        }
    }

    pub fn close(
        intent_name: &str,
        state: FulfillmentState,
        attributes: SessionAttributes,
        content: impl Into<String>,
    ) -> Self {
        Self::new(DialogActionType::Close, intent_name, state, attributes, content)
    }

    pub fn elicit(
        intent_name: &str,
        attributes: SessionAttributes,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            DialogActionType::ElicitIntent,
            intent_name,
            FulfillmentState::Fulfilled,
            attributes,
            content,
        )
    }

    pub fn first_message(&self) -> Option<&str> {
        self.messages.first().map(|message| message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{DialogActionType, FulfillmentState, TurnEvent, TurnResponse};
    use crate::domain::intent::Intent;
    use crate::domain::session::SessionAttributes;

    #[test]
    fn turn_event_deserializes_front_end_shape() {
        let event: TurnEvent = serde_json::from_value(serde_json::json!({
            "inputTranscript": "delete my info",
            "sessionState": {
                "intent": {
                    "name": "DeleteMyInfoIntent",
                    "slots": {
                        "VisitorPhoneNumber": {"value": {"interpretedValue": "555-123-4567"}},
                        "VisitorLastName": {"value": {"interpretedValue": "o'brien"}}
                    }
                },
                "sessionAttributes": {"conversationHistory": "User: hi\nBot: hello"}
            }
        }))
        .expect("event should deserialize");

        assert_eq!(event.intent(), Intent::DeleteMyInfo);
        assert_eq!(event.input_transcript, "delete my info");
        assert_eq!(
            event.session_state.intent.slots.interpreted("VisitorPhoneNumber"),
            Some("555-123-4567")
        );
        assert!(!event.attributes().history().is_empty());
    }

    #[test]
    fn turn_response_serializes_the_front_end_contract() {
        let response = TurnResponse::close(
            "GreetingIntent",
            FulfillmentState::Fulfilled,
            SessionAttributes::default(),
            "hello!",
        );
        let value = serde_json::to_value(&response).expect("should serialize");

        assert_eq!(value["sessionState"]["dialogAction"]["type"], "Close");
        assert_eq!(value["sessionState"]["intent"]["state"], "Fulfilled");
        assert_eq!(value["messages"][0]["contentType"], "PlainText");
        assert_eq!(value["messages"][0]["content"], "hello!");
    }

    #[test]
    fn elicit_keeps_the_session_open() {
        let response =
            TurnResponse::elicit("FallbackIntent", SessionAttributes::default(), "go on");
        assert_eq!(
            response.session_state.dialog_action.action_type,
            DialogActionType::ElicitIntent
        );
    }
}
