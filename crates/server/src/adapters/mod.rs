//! Reqwest-backed implementations of the agent capability traits.
//!
//! Each adapter owns its base URL and credentials from one config section
//! and maps transport or decode failures into [`CapabilityError`] with the
//! service name attached.

pub mod crm;
pub mod generation;
pub mod storage;
pub mod telephony;
pub mod transcription;
pub mod workflow;

pub use crm::HttpCrmClient;
pub use generation::HttpTextGenerator;
pub use storage::HttpObjectStore;
pub use telephony::HttpOutboundDialer;
pub use transcription::HttpTranscriptionService;
pub use workflow::HttpWorkflowClient;
