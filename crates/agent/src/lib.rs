//! Agent runtime - conversation turns and workflow callbacks
//!
//! This crate holds the decision-making core of the outdial system:
//! - The **Turn Engine** (`turn`) routes each dialogue turn by modality
//!   (web chat vs. live phone call) and intent, maintaining the bounded
//!   conversation history carried in session attributes.
//! - The **Callback Resumer** (`resumer`) joins asynchronous transcription
//!   completion events back to a paused workflow through the durable
//!   continuation record, resolving each continuation at most once.
//! - Capability traits (`llm`, `capabilities`) are the narrow seams to the
//!   LLM, CRM, telephony, transcription, object storage, and workflow
//!   orchestrator; reqwest adapters live in the server crate and in-memory
//!   fakes (`fakes`) back the tests.
//!
//! # Safety principle
//!
//! The LLM only rephrases grounded text and summarizes transcripts. It
//! never decides compliance-sensitive outcomes (data deletion, demo
//! conversion); those paths return static text and deterministic results.

pub mod capabilities;
pub mod fakes;
pub mod llm;
pub mod prompts;
pub mod resumer;
pub mod turn;

pub use capabilities::{
    CapabilityError, CrmClient, ObjectStore, OutboundDialer, TranscriptionJob,
    TranscriptionJobStatus, TranscriptionService, WorkflowClient,
};
pub use llm::{GenerationError, GenerationRequest, TextGenerator};
pub use resumer::{CallbackResumer, CompletionEvent, CompletionOutcome, ResumerSettings};
pub use turn::TurnEngine;
