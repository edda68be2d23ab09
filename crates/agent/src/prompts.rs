//! Static grounding contexts, user-facing messages, and prompt builders.
//!
//! Grounding contexts are the authoritative texts the generator is
//! constrained to rephrase; the compliance and conversion paths bypass
//! generation entirely and use the static messages verbatim.

use outdial_core::domain::session::ConversationHistory;

pub const GROUNDING_GREETING: &str = "Hi there! I'm the assistant for our \
outbound sales demo. Ready to see it in action? Just say 'start demo' to begin!";

pub const GROUNDING_TECHNOLOGY: &str = "This demo runs on an event-driven \
service stack: natural language understanding for the chat front end, a \
workflow orchestrator for the call pipeline, a language model for generation, \
and an outbound telephony platform, all integrated with the CRM in real time.";

pub const GROUNDING_DEMO: &str = "This is an end-to-end sales acceleration \
workflow: AI-assisted outbound calling with live CRM integration, \
personalized conversations built from your chat, and automatic lead \
qualification and follow-up.";

pub const GROUNDING_FALLBACK: &str = "I didn't quite catch that. Here's what \
I can help with: say 'start demo' to begin the experience, ask about the \
technology for technical details, ask about the demo for an overview, or say \
'delete my info' to remove your data. What would you like to do?";

pub const MSG_CLOSE_FAREWELL: &str = "Thank you for your time. Have a great day!";

pub const MSG_CALLBACK_CONFIRMED: &str = "Thank you. I've created a priority \
request for our team, and someone will call you back shortly. Have a great day.";

pub const MSG_CALLBACK_FAILED: &str =
    "I'm sorry, I ran into an error trying to process your request. Please try again.";

pub const MSG_INTERNAL_ERROR: &str =
    "I'm sorry, I ran into an internal error. Please try again later.";

pub const MSG_DELETE_CONFIRMED: &str = "Your information has been successfully \
verified and completely removed from our systems. This demonstrates our \
commitment to data privacy and compliance.";

pub const MSG_DELETE_NOT_FOUND: &str = "I was unable to find a record matching \
that phone number and last name. Please verify your information and try again.";

pub const MSG_DELETE_MISSING_SLOTS: &str = "I need both your phone number and \
last name to securely verify and delete your information. Please provide both.";

pub const MSG_DELETE_ERROR: &str = "I encountered an issue processing your \
deletion request. Please contact support if this persists.";

pub const MSG_SLOT_ERROR: &str = "Sorry, there was an error processing your information.";

pub const MSG_INVALID_PHONE: &str = "Sorry, the phone number provided is invalid.";

pub const MSG_WORKFLOW_ERROR: &str = "Sorry, there was an error processing your request.";

pub const MSG_UNKNOWN_INTENT: &str = "Sorry, I encountered an unexpected error.";

pub const MSG_PHONE_FALLBACK: &str =
    "I'm here to discuss how our solution can help you. What questions do you have?";

pub fn demo_confirmation(first_name: &str) -> String {
    format!(
        "Thank you for your interest, {first_name}! I'll reach out within 2 minutes. \
         Prefer scheduling tools? Let me know during our call!"
    )
}

pub fn static_scenario(prospect_name: &str) -> String {
    format!(
        "Hello {prospect_name}, this is the assistant from the AI demo, \
         calling to follow up on our chat."
    )
}

pub const REPHRASE_SYSTEM: &str = "You are an AI assistant for an outbound \
sales demo. You are not a human and must never claim to be one. Be helpful \
and conversational.";

/// Constrain the generator to deliver only the grounding context,
/// acknowledging the user's last message.
pub fn rephrase_prompt(grounding: &str, history: &ConversationHistory, user_input: &str) -> String {
    let history_text = if history.is_empty() {
        "User: (Initiated conversation)".to_owned()
    } else {
        history.as_str().to_owned()
    };
    format!(
        "Your only goal is to provide the information in the <grounding_context> in a \
         natural, conversational way.\n\
         - First, briefly acknowledge the user's last message.\n\
         - Then deliver the information from the <grounding_context>.\n\
         - Do NOT add any new information or answer questions outside the context.\n\
         - Keep the response to 1-3 sentences and include no markup tags.\n\n\
         <conversation_history>\n{history_text}\nUser: {user_input}\n</conversation_history>\n\n\
         <grounding_context>\n{grounding}\n</grounding_context>"
    )
}

pub const PHONE_TURN_SYSTEM: &str =
    "You are an AI sales assistant on a live phone call. Be concise and conversational.";

pub fn phone_turn_prompt(
    scenario: &str,
    history: &ConversationHistory,
    user_input: &str,
) -> String {
    format!(
        "You are conducting a personalized outbound sales call. Use the scenario below \
         as your script and context.\n\n\
         <scenario>\n{scenario}\n</scenario>\n\n\
         <conversation_history>\n{}\n</conversation_history>\n\n\
         User just said: {user_input}\n\n\
         Respond naturally based on the scenario. Keep responses to 1-2 sentences.",
        history.as_str()
    )
}

pub fn scenario_prompt(prospect_name: &str, chat_transcript: &str) -> String {
    format!(
        "You are an AI assistant re-engaging a user who just talked to your web-chat \
         bot; you are now calling them on the phone. Generate a single, short, \
         conversational greeting (1-2 sentences) that greets them by name, references \
         the core topic of the chat, and asks an open-ended question.\n\n\
         Name: {prospect_name}\nChat Transcript: {chat_transcript}"
    )
}

pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Analyze this call transcript and provide a concise summary as 3 bullet points. \
         Never comment on the transcript itself. Use specific phrases or names as \
         expressed, staying generic when the transcript is generic:\n\
         \u{2022} Key topics discussed\n\
         \u{2022} Important decisions or outcomes\n\
         \u{2022} Next steps or action items\n\
         Transcript:\n{transcript}\nSummary:"
    )
}
