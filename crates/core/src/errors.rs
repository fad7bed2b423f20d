use thiserror::Error;

use crate::domain::conversation::ConversationState;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("illegal conversation transition from {from:?} to {to:?}")]
    IllegalTransition { from: ConversationState, to: ConversationState },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Errors that escape the Orchestrator. Everything recoverable (validation
/// rejections, model unavailability, lock contention) is absorbed before it
/// reaches this type; what remains is persistence trouble and collaborator
/// outages the caller has to know about.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Message safe to show an operator dashboard; never sent to customers.
    pub fn operator_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "A conversation update was rejected by domain rules.",
            Self::Persistence(_) => {
                "Conversation state could not be saved; the thread needs manual review."
            }
            Self::Integration(_) => "An external collaborator is unavailable.",
            Self::Configuration(_) => "The service is misconfigured.",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::ConversationState;

    use super::{ApplicationError, DomainError};

    #[test]
    fn domain_error_wraps_transparently() {
        let error = ApplicationError::from(DomainError::IllegalTransition {
            from: ConversationState::Greeting,
            to: ConversationState::OrderPlaced,
        });

        assert!(error.to_string().contains("illegal conversation transition"));
    }

    #[test]
    fn persistence_failure_flags_manual_review() {
        let error = ApplicationError::Persistence("disk full".to_string());
        assert!(error.operator_message().contains("manual review"));
    }
}
