//! Request and response bodies for the save REST surface.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::{Characteristics, Currency, GameMetadata, GameSave, Stage};

/// Partial characteristics update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CharacteristicsPayload {
    #[validate(range(min = 0))]
    pub attack: Option<i64>,
    #[validate(range(min = 0))]
    pub crit_chance: Option<i64>,
    #[validate(range(min = 0))]
    pub crit_damage: Option<i64>,
    #[validate(range(min = 0))]
    pub health: Option<i64>,
    #[validate(range(min = 0))]
    pub resistance: Option<i64>,
}

impl From<CharacteristicsPayload> for Characteristics {
    fn from(payload: CharacteristicsPayload) -> Self {
        Self {
            attack: payload.attack,
            crit_chance: payload.crit_chance,
            crit_damage: payload.crit_damage,
            health: payload.health,
            resistance: payload.resistance,
        }
    }
}

impl From<Characteristics> for CharacteristicsPayload {
    fn from(value: Characteristics) -> Self {
        Self {
            attack: value.attack,
            crit_chance: value.crit_chance,
            crit_damage: value.crit_damage,
            health: value.health,
            resistance: value.resistance,
        }
    }
}

/// Partial currency update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CurrencyPayload {
    #[validate(range(min = 0))]
    pub gold: Option<i64>,
    #[validate(range(min = 0))]
    pub diamond: Option<i64>,
    #[validate(range(min = 0))]
    pub emerald: Option<i64>,
    #[validate(range(min = 0))]
    pub amethyst: Option<i64>,
}

impl From<CurrencyPayload> for Currency {
    fn from(payload: CurrencyPayload) -> Self {
        Self {
            gold: payload.gold,
            diamond: payload.diamond,
            emerald: payload.emerald,
            amethyst: payload.amethyst,
        }
    }
}

impl From<Currency> for CurrencyPayload {
    fn from(value: Currency) -> Self {
        Self {
            gold: value.gold,
            diamond: value.diamond,
            emerald: value.emerald,
            amethyst: value.amethyst,
        }
    }
}

/// Partial stage update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_stage_bounds))]
pub struct StagePayload {
    #[validate(range(min = 1))]
    pub current_stage: Option<i64>,
    #[validate(range(min = 1))]
    pub max_stage: Option<i64>,
    #[validate(range(min = 0))]
    pub wave: Option<i64>,
}

/// A caller cannot claim to stand past its own best stage.
fn validate_stage_bounds(payload: &StagePayload) -> Result<(), ValidationError> {
    if let (Some(current), Some(max)) = (payload.current_stage, payload.max_stage) {
        if current > max {
            let mut err = ValidationError::new("stage_bounds");
            err.message = Some(
                format!("current_stage ({current}) cannot exceed max_stage ({max})").into(),
            );
            return Err(err);
        }
    }
    Ok(())
}

impl From<StagePayload> for Stage {
    fn from(payload: StagePayload) -> Self {
        Self {
            current_stage: payload.current_stage,
            max_stage: payload.max_stage,
            wave: payload.wave,
        }
    }
}

impl From<Stage> for StagePayload {
    fn from(value: Stage) -> Self {
        Self {
            current_stage: value.current_stage,
            max_stage: value.max_stage,
            wave: value.wave,
        }
    }
}

/// Body for `POST /api/saves`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSaveRequest {
    pub id: Option<Uuid>,
    #[validate(email)]
    pub user_email: String,
    #[validate(length(min = 3, max = 16))]
    pub nickname: Option<String>,
    #[validate(nested)]
    pub characteristics: Option<CharacteristicsPayload>,
    #[validate(nested)]
    pub currency: Option<CurrencyPayload>,
    #[validate(nested)]
    pub stage: Option<StagePayload>,
}

/// Body for `PUT /api/saves/{id}/nickname`.
#[derive(Debug, Deserialize, Validate)]
pub struct NicknameUpdateRequest {
    #[validate(length(min = 3, max = 16))]
    pub nickname: String,
}

/// Ownership and naming facet of a save in responses.
#[derive(Debug, Serialize)]
pub struct MetadataResponse {
    pub id: Uuid,
    pub user_email: String,
    pub nickname: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<GameMetadata> for MetadataResponse {
    fn from(metadata: GameMetadata) -> Self {
        Self {
            id: metadata.id,
            user_email: metadata.user_email,
            nickname: metadata.nickname,
            created_at: metadata.created_at,
            updated_at: metadata.updated_at,
        }
    }
}

/// Full save view returned by creation and whole-save reads.
#[derive(Debug, Serialize)]
pub struct GameSaveResponse {
    pub metadata: MetadataResponse,
    pub characteristics: CharacteristicsPayload,
    pub currency: CurrencyPayload,
    pub stage: StagePayload,
}

impl From<GameSave> for GameSaveResponse {
    fn from(save: GameSave) -> Self {
        Self {
            metadata: save.metadata.into(),
            characteristics: save.characteristics.into(),
            currency: save.currency.into(),
            stage: save.stage.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_payload_rejects_current_past_max() {
        let payload = StagePayload {
            current_stage: Some(10),
            max_stage: Some(5),
            wave: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn stage_payload_with_one_bound_is_valid() {
        let payload = StagePayload {
            current_stage: Some(10),
            max_stage: None,
            wave: None,
        };
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn negative_currency_is_rejected() {
        let payload = CurrencyPayload {
            gold: Some(-1),
            ..Default::default()
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn create_request_requires_a_real_email() {
        let request = CreateSaveRequest {
            id: None,
            user_email: "not-an-email".into(),
            nickname: None,
            characteristics: None,
            currency: None,
            stage: None,
        };
        assert!(request.validate().is_err());
    }
}
