//! Participants and the shared id rule.
//!
//! Channel names reuse the participant-id rule, so both validators live
//! here.

use crate::error::ValidationError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Minimum id length.
pub const ID_MIN_LENGTH: usize = 2;

/// Maximum id length.
pub const ID_MAX_LENGTH: usize = 64;

/// Prefix for synthesized participant ids.
pub const GENERATED_ID_PREFIX: &str = "sv-";

/// Length of the random hash in synthesized ids.
const GENERATED_HASH_LENGTH: usize = 30;

const GENERATED_HASH_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn id_shape_is_valid(id: &str) -> bool {
    (ID_MIN_LENGTH..=ID_MAX_LENGTH).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate a participant id: 2-64 characters of `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidParticipantId`] on violation.
pub fn validate_participant_id(id: &str) -> Result<(), ValidationError> {
    if id_shape_is_valid(id) {
        Ok(())
    } else {
        let err = ValidationError::InvalidParticipantId(id.to_string());
        error!(id = %id, "{err}");
        Err(err)
    }
}

/// Validate a channel name. Channel names follow the participant-id rule.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidChannelName`] on violation.
pub fn validate_channel_name(name: &str) -> Result<(), ValidationError> {
    if id_shape_is_valid(name) {
        Ok(())
    } else {
        let err = ValidationError::InvalidChannelName(name.to_string());
        error!(channel = %name, "{err}");
        Err(err)
    }
}

/// A local or remote participant. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique participant id, validated on construction.
    pub id: String,
    /// Optional display name.
    pub name: Option<String>,
}

impl Participant {
    /// Create a participant with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidParticipantId`] if the id violates
    /// the length or character-set rule.
    pub fn new(id: impl Into<String>, name: Option<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        validate_participant_id(&id)?;
        Ok(Self { id, name })
    }

    /// Synthesize an anonymous participant with an `sv-<30-char-hash>` id.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let hash: String = (0..GENERATED_HASH_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..GENERATED_HASH_CHARSET.len());
                GENERATED_HASH_CHARSET[idx] as char
            })
            .collect();

        Self {
            id: format!("{GENERATED_ID_PREFIX}{hash}"),
            name: None,
        }
    }
}
