pub mod config;
pub mod domain;
pub mod errors;
pub mod phone;

pub use chrono;

pub use domain::dialogue::{
    DialogActionType, FulfillmentState, Message, TurnEvent, TurnResponse,
};
pub use domain::intent::{Intent, SlotValues};
pub use domain::interaction::{InteractionKey, InteractionRecord, PendingContinuation};
pub use domain::session::{ConversationHistory, SessionAttributes};
pub use domain::workflow::{CallStepEnvelope, CallStepInput, DemoRequest, SummaryOutput};
pub use errors::{ApplicationError, DomainError};
pub use phone::{NormalizedPhone, PhoneError};
