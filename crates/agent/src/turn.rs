//! Conversation Turn Engine.
//!
//! Routes each dialogue turn by modality and intent. A turn never fails
//! outward: every path, including internal errors, produces a well-formed
//! response with an apology message where needed.

use std::sync::Arc;

use tracing::{info, warn};

use outdial_core::domain::dialogue::{DialogActionType, FulfillmentState, TurnEvent, TurnResponse};
use outdial_core::domain::intent::{Intent, SLOT_FULL_NAME, SLOT_LAST_NAME, SLOT_PHONE_NUMBER};
use outdial_core::domain::interaction::{InteractionKey, InteractionRecord};
use outdial_core::domain::session::SessionAttributes;
use outdial_core::domain::workflow::{DemoRequest, WORKFLOW_PAYLOAD_VERSION};
use outdial_core::phone::{normalize_last_name, split_full_name, NormalizedPhone};
use outdial_db::repositories::InteractionRepository;

use crate::capabilities::{CrmClient, WorkflowClient};
use crate::llm::{GenerationRequest, TextGenerator};
use crate::prompts;

const REPHRASE_MAX_TOKENS: u32 = 512;
const PHONE_TURN_MAX_TOKENS: u32 = 150;
const GENERATION_TEMPERATURE: f32 = 0.7;

pub struct TurnEngine {
    generator: Arc<dyn TextGenerator>,
    crm: Arc<dyn CrmClient>,
    workflow: Arc<dyn WorkflowClient>,
    interactions: Arc<dyn InteractionRepository>,
    max_turns: usize,
}

impl TurnEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        crm: Arc<dyn CrmClient>,
        workflow: Arc<dyn WorkflowClient>,
        interactions: Arc<dyn InteractionRepository>,
        max_turns: usize,
    ) -> Self {
        Self { generator, crm, workflow, interactions, max_turns }
    }

    pub async fn handle_turn(&self, event: &TurnEvent) -> TurnResponse {
        let mut attributes = event.attributes();
        let (scenario, record) = self.resolve_phone_context(&mut attributes).await;
        let intent = event.intent();

        info!(
            event_name = "turn.routed",
            intent = intent.name(),
            phone_context = scenario.is_some(),
            "routing dialogue turn"
        );

        if let Some(scenario) = scenario {
            return match intent {
                Intent::Greeting => {
                    self.grounded_reply(
                        event,
                        attributes,
                        &intent,
                        prompts::GROUNDING_GREETING,
                        DialogActionType::Close,
                    )
                    .await
                }
                Intent::Callback => self.callback_request(&intent, record.as_ref()).await,
                Intent::Close => TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Fulfilled,
                    attributes,
                    prompts::MSG_CLOSE_FAREWELL,
                ),
                _ => self.phone_reply(event, attributes, &intent, &scenario).await,
            };
        }

        match intent {
            Intent::InitiateDemo => self.initiate_demo(event, attributes, &intent).await,
            Intent::DeleteMyInfo => self.delete_my_info(event, attributes, &intent).await,
            Intent::Greeting => {
                self.grounded_reply(
                    event,
                    attributes,
                    &intent,
                    prompts::GROUNDING_GREETING,
                    DialogActionType::Close,
                )
                .await
            }
            Intent::AboutTechnology => {
                self.grounded_reply(
                    event,
                    attributes,
                    &intent,
                    prompts::GROUNDING_TECHNOLOGY,
                    DialogActionType::Close,
                )
                .await
            }
            Intent::AboutDemo => {
                self.grounded_reply(
                    event,
                    attributes,
                    &intent,
                    prompts::GROUNDING_DEMO,
                    DialogActionType::Close,
                )
                .await
            }
            Intent::Fallback => {
                self.grounded_reply(
                    event,
                    attributes,
                    &intent,
                    prompts::GROUNDING_FALLBACK,
                    DialogActionType::Close,
                )
                .await
            }
            Intent::Close => TurnResponse::close(
                intent.name(),
                FulfillmentState::Fulfilled,
                attributes,
                prompts::MSG_CLOSE_FAREWELL,
            ),
            Intent::Callback => self.callback_request(&intent, None).await,
            Intent::Unknown(ref name) => {
                warn!(event_name = "turn.unknown_intent", intent = name.as_str(), "unknown intent");
                TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Failed,
                    attributes,
                    prompts::MSG_UNKNOWN_INTENT,
                )
            }
        }
    }

    /// Resolve phone-call context. An `interactionKey` attribute points at
    /// the durable record holding the scenario; without one, a scenario may
    /// still be carried in session from a previous turn. Lookup failures
    /// (malformed key, missing record, store errors) abort only the lookup.
    async fn resolve_phone_context(
        &self,
        attributes: &mut SessionAttributes,
    ) -> (Option<String>, Option<InteractionRecord>) {
        let Some(raw_key) = attributes.interaction_key().map(str::to_owned) else {
            return (attributes.scenario().map(str::to_owned), None);
        };

        let key = match InteractionKey::parse(&raw_key) {
            Ok(key) => key,
            Err(error) => {
                warn!(
                    event_name = "turn.interaction_key_malformed",
                    error = %error,
                    "proceeding without phone context"
                );
                return (attributes.scenario().map(str::to_owned), None);
            }
        };

        match self.interactions.find_by_key(&key).await {
            Ok(Some(record)) => {
                let scenario = record.scenario.clone();
                if let Some(text) = scenario.as_deref() {
                    attributes.set_scenario(text);
                }
                (scenario.or_else(|| attributes.scenario().map(str::to_owned)), Some(record))
            }
            Ok(None) => {
                warn!(
                    event_name = "turn.interaction_record_missing",
                    interaction_key = raw_key.as_str(),
                    "no record for interaction key"
                );
                (attributes.scenario().map(str::to_owned), None)
            }
            Err(error) => {
                warn!(
                    event_name = "turn.interaction_lookup_failed",
                    error = %error,
                    "proceeding without phone context"
                );
                (attributes.scenario().map(str::to_owned), None)
            }
        }
    }

    /// Rephrase a grounding context through the generator, falling back to
    /// the verbatim grounding text. A turn never fails because generation
    /// failed.
    async fn grounded_reply(
        &self,
        event: &TurnEvent,
        mut attributes: SessionAttributes,
        intent: &Intent,
        grounding: &str,
        action: DialogActionType,
    ) -> TurnResponse {
        let history = attributes.history();
        let request = GenerationRequest {
            system: prompts::REPHRASE_SYSTEM.to_owned(),
            user: prompts::rephrase_prompt(grounding, &history, &event.input_transcript),
            max_tokens: REPHRASE_MAX_TOKENS,
            temperature: GENERATION_TEMPERATURE,
        };

        let content = match self.generator.generate(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
            Ok(_) | Err(_) => grounding.to_owned(),
        };

        self.record_exchange(&mut attributes, &event.input_transcript, &content);
        TurnResponse::new(action, intent.name(), FulfillmentState::Fulfilled, attributes, content)
    }

    /// Generative phone-call reply grounded on the scenario. Keeps the
    /// session open and preserves the scenario for the next turn.
    async fn phone_reply(
        &self,
        event: &TurnEvent,
        mut attributes: SessionAttributes,
        intent: &Intent,
        scenario: &str,
    ) -> TurnResponse {
        let history = attributes.history();
        let request = GenerationRequest {
            system: prompts::PHONE_TURN_SYSTEM.to_owned(),
            user: prompts::phone_turn_prompt(scenario, &history, &event.input_transcript),
            max_tokens: PHONE_TURN_MAX_TOKENS,
            temperature: GENERATION_TEMPERATURE,
        };

        let content = match self.generator.generate(request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_owned(),
            Ok(_) | Err(_) => prompts::MSG_PHONE_FALLBACK.to_owned(),
        };

        self.record_exchange(&mut attributes, &event.input_transcript, &content);
        attributes.set_scenario(scenario);
        TurnResponse::elicit(intent.name(), attributes, content)
    }

    /// Callback request during a phone call: file a CRM case against the
    /// interaction's lead, then end the call with cleared session state.
    async fn callback_request(
        &self,
        intent: &Intent,
        record: Option<&InteractionRecord>,
    ) -> TurnResponse {
        let Some(record) = record.filter(|record| !record.lead_id.is_empty()) else {
            warn!(event_name = "turn.callback_without_record", "no interaction record for callback");
            return TurnResponse::close(
                intent.name(),
                FulfillmentState::Failed,
                SessionAttributes::default(),
                prompts::MSG_INTERNAL_ERROR,
            );
        };

        let description =
            format!("User requested a callback during the outbound call. Lead ID: {}", record.lead_id);
        match self.crm.create_case("Outdial: Callback Request", &description).await {
            Ok(case_id) => {
                info!(
                    event_name = "turn.callback_case_created",
                    case_id = case_id.as_str(),
                    lead_id = record.lead_id.as_str(),
                    "callback case created"
                );
                TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Fulfilled,
                    SessionAttributes::default(),
                    prompts::MSG_CALLBACK_CONFIRMED,
                )
            }
            Err(error) => {
                warn!(event_name = "turn.callback_case_failed", error = %error, "case create failed");
                TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Failed,
                    SessionAttributes::default(),
                    prompts::MSG_CALLBACK_FAILED,
                )
            }
        }
    }

    /// Compliance path: verify by phone number and last name together, then
    /// delete. Static messages only; the response must be literally
    /// accurate, so generative rephrasing is skipped.
    async fn delete_my_info(
        &self,
        event: &TurnEvent,
        mut attributes: SessionAttributes,
        intent: &Intent,
    ) -> TurnResponse {
        let slots = &event.session_state.intent.slots;
        let (Some(phone_raw), Some(last_name_raw)) =
            (slots.interpreted(SLOT_PHONE_NUMBER), slots.interpreted(SLOT_LAST_NAME))
        else {
            let content = prompts::MSG_DELETE_MISSING_SLOTS;
            self.record_exchange(&mut attributes, &event.input_transcript, content);
            return TurnResponse::close(
                intent.name(),
                FulfillmentState::Fulfilled,
                attributes,
                content,
            );
        };

        let content = match NormalizedPhone::parse(phone_raw) {
            Ok(phone) => {
                let last_name = normalize_last_name(last_name_raw);
                match self.crm.find_and_delete_lead(&phone, &last_name).await {
                    Ok(true) => {
                        info!(event_name = "turn.lead_deleted", "lead verified and deleted");
                        prompts::MSG_DELETE_CONFIRMED
                    }
                    Ok(false) => prompts::MSG_DELETE_NOT_FOUND,
                    Err(error) => {
                        warn!(event_name = "turn.delete_failed", error = %error, "delete failed");
                        prompts::MSG_DELETE_ERROR
                    }
                }
            }
            Err(error) => {
                warn!(event_name = "turn.delete_phone_unparseable", error = %error, "phone rejected");
                prompts::MSG_DELETE_ERROR
            }
        };

        self.record_exchange(&mut attributes, &event.input_transcript, content);
        TurnResponse::close(intent.name(), FulfillmentState::Fulfilled, attributes, content)
    }

    /// Conversion path: validate and normalize the phone and name slots,
    /// start the demo workflow, and confirm with static text.
    async fn initiate_demo(
        &self,
        event: &TurnEvent,
        mut attributes: SessionAttributes,
        intent: &Intent,
    ) -> TurnResponse {
        let slots = &event.session_state.intent.slots;
        let (Some(full_name), Some(phone_raw)) =
            (slots.interpreted(SLOT_FULL_NAME), slots.interpreted(SLOT_PHONE_NUMBER))
        else {
            return TurnResponse::close(
                intent.name(),
                FulfillmentState::Failed,
                attributes,
                prompts::MSG_SLOT_ERROR,
            );
        };

        let phone = match NormalizedPhone::parse_valid(phone_raw) {
            Ok(phone) => phone,
            Err(error) => {
                warn!(event_name = "turn.invalid_phone", error = %error, "phone rejected");
                return TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Failed,
                    attributes,
                    prompts::MSG_INVALID_PHONE,
                );
            }
        };

        let (first_name, last_name) = split_full_name(full_name);

        // The chat transcript handed to the scenario generator ends with the
        // user's conversion utterance and keeps only the retention window.
        let mut transcript = attributes.history();
        transcript.append_user_line(&event.input_transcript);
        let chat_transcript = transcript.tail(self.max_turns * 2);

        let request = DemoRequest {
            version: WORKFLOW_PAYLOAD_VERSION,
            first_name: first_name.clone(),
            last_name,
            phone: phone.as_e164().to_owned(),
            chat_transcript,
        };

        match self.workflow.start_execution(&request).await {
            Ok(()) => {
                info!(event_name = "turn.demo_started", "demo workflow started");
                let content = prompts::demo_confirmation(&first_name);
                self.record_exchange(&mut attributes, &event.input_transcript, &content);
                TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Fulfilled,
                    attributes,
                    content,
                )
            }
            Err(error) => {
                warn!(event_name = "turn.demo_start_failed", error = %error, "workflow start failed");
                TurnResponse::close(
                    intent.name(),
                    FulfillmentState::Failed,
                    attributes,
                    prompts::MSG_WORKFLOW_ERROR,
                )
            }
        }
    }

    fn record_exchange(&self, attributes: &mut SessionAttributes, user_input: &str, content: &str) {
        let mut history = attributes.history();
        history.append_exchange(user_input, content, self.max_turns);
        attributes.set_history(&history);
    }
}
