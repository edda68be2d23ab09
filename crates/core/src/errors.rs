use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed interaction key: `{0}`")]
    MalformedInteractionKey(String),
    #[error(transparent)]
    Phone(#[from] crate::phone::PhoneError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("validation failure: {0}")]
    Validation(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Message safe to surface to an end user, with no internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) | Self::Validation(_) => {
                "Sorry, there was an error processing your information."
            }
            Self::Persistence(_) | Self::Integration(_) | Self::Configuration(_) => {
                "Sorry, I ran into an internal error. Please try again later."
            }
        }
    }
}
