//! Stage progression of a game save.

use serde::{Deserialize, Serialize};

use super::Mergeable;

/// Default starting stage for a freshly created save.
pub const DEFAULT_STAGE: i64 = 1;

/// Stage progress of a player save.
///
/// `wave` was introduced after the original schema; legacy complete records
/// may not carry it, so completeness only requires `current_stage` and
/// `max_stage`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stage {
    pub current_stage: Option<i64>,
    pub max_stage: Option<i64>,
    pub wave: Option<i64>,
}

impl Stage {
    /// Complete record with every field set.
    pub fn complete(current_stage: i64, max_stage: i64, wave: i64) -> Self {
        Self {
            current_stage: Some(current_stage),
            max_stage: Some(max_stage),
            wave: Some(wave),
        }
    }

    /// Initialization defaults: stage 1, wave 0.
    pub fn default_complete() -> Self {
        Self::complete(DEFAULT_STAGE, DEFAULT_STAGE, 0)
    }

    /// Fill every absent field with its initialization default.
    pub fn with_defaults(self) -> Self {
        Self {
            current_stage: self.current_stage.or(Some(DEFAULT_STAGE)),
            max_stage: self.max_stage.or(Some(DEFAULT_STAGE)),
            wave: self.wave.or(Some(0)),
        }
    }
}

impl Mergeable for Stage {
    fn merge(existing: &Self, update: &Self) -> Self {
        Self {
            current_stage: update.current_stage.or(existing.current_stage),
            max_stage: update.max_stage.or(existing.max_stage),
            wave: update.wave.or(existing.wave),
        }
    }

    fn is_complete(&self) -> bool {
        self.current_stage.is_some() && self.max_stage.is_some()
    }

    fn is_empty(&self) -> bool {
        self.current_stage.is_none() && self.max_stage.is_none() && self.wave.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_is_optional_for_completeness() {
        let legacy = Stage {
            current_stage: Some(3),
            max_stage: Some(9),
            wave: None,
        };
        assert!(legacy.is_complete());
        assert!(!legacy.is_empty());
    }

    #[test]
    fn merge_keeps_existing_wave() {
        let existing = Stage::complete(3, 9, 12);
        let update = Stage {
            current_stage: Some(4),
            ..Default::default()
        };
        let merged = Stage::merge(&existing, &update);
        assert_eq!(merged, Stage::complete(4, 9, 12));
    }
}
