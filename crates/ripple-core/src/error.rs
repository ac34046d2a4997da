//! Validation and state-transition errors shared across the workspace.

use thiserror::Error;

/// Errors raised by synchronous input validation.
///
/// Every validation failure is also logged at the throw site so operators
/// see it even when the caller discards the error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Participant id outside the 2-64 length / `[A-Za-z0-9_-]` rule.
    #[error("[ripple] invalid participant id {0:?}: must be 2-64 characters of [A-Za-z0-9_-]")]
    InvalidParticipantId(String),

    /// Channel names follow the participant-id rule.
    #[error("[ripple] invalid channel name {0:?}: must be 2-64 characters of [A-Za-z0-9_-]")]
    InvalidChannelName(String),

    /// Environment string not one of `dev`, `prod`, `local`.
    #[error("[ripple] invalid environment {0:?}: expected one of dev, prod, local")]
    InvalidEnvironment(String),

    /// Auth form not legal for the configured runtime, or incomplete.
    #[error("[ripple] invalid auth: {0}")]
    InvalidAuth(&'static str),
}

/// A state transition not present in the legal-transition table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("[ripple] illegal state transition: {from} -> {to}")]
pub struct StateError {
    /// Name of the state the machine was in.
    pub from: &'static str,
    /// Name of the refused target state.
    pub to: &'static str,
}
