//! Usage limits fetched once at component startup.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Participant cap for a realtime room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxParticipants {
    /// Hard participant cap.
    Limited(u64),
    /// The plan imposes no cap; the wire value is the string `"unlimited"`.
    Unlimited,
}

impl Serialize for MaxParticipants {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxParticipants::Limited(n) => serializer.serialize_u64(*n),
            MaxParticipants::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxParticipants {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(MaxParticipants::Limited(n)),
            Raw::Text(s) if s == "unlimited" => Ok(MaxParticipants::Unlimited),
            Raw::Text(s) => Err(D::Error::custom(format!(
                "expected a number or \"unlimited\", got {s:?}"
            ))),
        }
    }
}

/// The `realtime` sub-object of the limits response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeLimits {
    /// Whether the plan allows the realtime product at all.
    pub can_use: bool,
    /// Room participant cap.
    pub max_participants: MaxParticipants,
}

/// Full response of the check-limits endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CheckLimitsResponse {
    pub limits: LimitsBlock,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LimitsBlock {
    pub realtime: RealtimeLimits,
}
