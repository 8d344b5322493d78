//! Messages exchanged with game-client WebSocket sessions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::save::{CharacteristicsPayload, CurrencyPayload, StagePayload};

/// Messages accepted from game-client WebSocket sessions.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum SaveInboundMessage {
    #[serde(rename = "identification")]
    Identification {
        game_save_id: Uuid,
        user_email: String,
    },
    #[serde(rename = "characteristics_update")]
    CharacteristicsUpdate { data: CharacteristicsPayload },
    #[serde(rename = "currency_update")]
    CurrencyUpdate { data: CurrencyPayload },
    #[serde(rename = "stage_update")]
    StageUpdate { data: StagePayload },
    #[serde(other)]
    Unknown,
}

impl SaveInboundMessage {
    /// Parse a text frame and run field validation on the carried payload.
    pub fn from_json_str(text: &str) -> Result<Self, String> {
        let message: Self =
            serde_json::from_str(text).map_err(|err| format!("malformed message: {err}"))?;
        match &message {
            Self::CharacteristicsUpdate { data } => validate(data)?,
            Self::CurrencyUpdate { data } => validate(data)?,
            Self::StageUpdate { data } => validate(data)?,
            Self::Identification { .. } | Self::Unknown => {}
        }
        Ok(message)
    }
}

fn validate<T: Validate>(data: &T) -> Result<(), String> {
    data.validate().map_err(|err| format!("invalid payload: {err}"))
}

/// Positive acknowledgement sent after an update was accepted.
#[derive(Debug, Serialize)]
pub struct UpdateAck {
    pub entity: String,
    pub status: String,
}

impl UpdateAck {
    /// Acknowledgement for a processed update of `entity`.
    pub fn accepted(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            status: "accepted".to_string(),
        }
    }
}

/// Error frame sent when an inbound message is rejected.
#[derive(Debug, Serialize)]
pub struct UpdateRejected {
    pub status: String,
    pub reason: String,
}

impl UpdateRejected {
    /// Rejection frame carrying the failure reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            status: "rejected".to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identification_parses() {
        let id = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"identification","game_save_id":"{id}","user_email":"a@x.com"}}"#
        );
        let message = SaveInboundMessage::from_json_str(&text).unwrap();
        assert!(matches!(
            message,
            SaveInboundMessage::Identification { game_save_id, .. } if game_save_id == id
        ));
    }

    #[test]
    fn update_with_invalid_fields_is_rejected() {
        let text = r#"{"type":"currency_update","data":{"gold":-5}}"#;
        assert!(SaveInboundMessage::from_json_str(text).is_err());
    }

    #[test]
    fn unknown_message_types_fall_through() {
        let text = r#"{"type":"emote","data":{}}"#;
        let message = SaveInboundMessage::from_json_str(text).unwrap();
        assert!(matches!(message, SaveInboundMessage::Unknown));
    }
}
