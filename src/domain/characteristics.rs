//! Player combat characteristics.

use serde::{Deserialize, Serialize};

use super::Mergeable;

/// Default attack value for a freshly created save.
pub const DEFAULT_ATTACK: i64 = 1;
/// Default health value for a freshly created save.
pub const DEFAULT_HEALTH: i64 = 1;

/// Combat characteristics of a player save. Every field is optional so the
/// same type can carry both incremental updates and full records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Characteristics {
    pub attack: Option<i64>,
    pub crit_chance: Option<i64>,
    pub crit_damage: Option<i64>,
    pub health: Option<i64>,
    pub resistance: Option<i64>,
}

impl Characteristics {
    /// Complete record with every field set.
    pub fn complete(
        attack: i64,
        crit_chance: i64,
        crit_damage: i64,
        health: i64,
        resistance: i64,
    ) -> Self {
        Self {
            attack: Some(attack),
            crit_chance: Some(crit_chance),
            crit_damage: Some(crit_damage),
            health: Some(health),
            resistance: Some(resistance),
        }
    }

    /// Hard-coded initialization defaults (attack and health start at 1).
    pub fn default_complete() -> Self {
        Self::complete(DEFAULT_ATTACK, 0, 0, DEFAULT_HEALTH, 0)
    }

    /// Fill every absent field with its initialization default so save
    /// creation always produces a complete record.
    pub fn with_defaults(self) -> Self {
        Self {
            attack: self.attack.or(Some(DEFAULT_ATTACK)),
            crit_chance: self.crit_chance.or(Some(0)),
            crit_damage: self.crit_damage.or(Some(0)),
            health: self.health.or(Some(DEFAULT_HEALTH)),
            resistance: self.resistance.or(Some(0)),
        }
    }
}

impl Mergeable for Characteristics {
    fn merge(existing: &Self, update: &Self) -> Self {
        Self {
            attack: update.attack.or(existing.attack),
            crit_chance: update.crit_chance.or(existing.crit_chance),
            crit_damage: update.crit_damage.or(existing.crit_damage),
            health: update.health.or(existing.health),
            resistance: update.resistance.or(existing.resistance),
        }
    }

    fn is_complete(&self) -> bool {
        self.attack.is_some()
            && self.crit_chance.is_some()
            && self.crit_damage.is_some()
            && self.health.is_some()
            && self.resistance.is_some()
    }

    fn is_empty(&self) -> bool {
        self.attack.is_none()
            && self.crit_chance.is_none()
            && self.crit_damage.is_none()
            && self.health.is_none()
            && self.resistance.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_right_biased() {
        let existing = Characteristics::complete(10, 0, 0, 100, 5);
        let update = Characteristics {
            attack: Some(20),
            ..Default::default()
        };

        let merged = Characteristics::merge(&existing, &update);
        assert_eq!(merged, Characteristics::complete(20, 0, 0, 100, 5));
    }

    #[test]
    fn merge_is_idempotent() {
        let partial = Characteristics {
            attack: Some(3),
            health: Some(7),
            ..Default::default()
        };
        assert_eq!(Characteristics::merge(&partial, &partial), partial);

        let complete = Characteristics::complete(1, 2, 3, 4, 5);
        assert_eq!(Characteristics::merge(&complete, &complete), complete);
    }

    #[test]
    fn completeness_and_emptiness() {
        assert!(Characteristics::default().is_empty());
        assert!(!Characteristics::default().is_complete());
        assert!(Characteristics::default_complete().is_complete());

        let partial = Characteristics {
            attack: Some(1),
            ..Default::default()
        };
        assert!(!partial.is_empty());
        assert!(!partial.is_complete());
    }

    #[test]
    fn defaults_fill_only_absent_fields() {
        let partial = Characteristics {
            attack: Some(42),
            ..Default::default()
        };
        let filled = partial.with_defaults();
        assert_eq!(filled.attack, Some(42));
        assert_eq!(filled.health, Some(DEFAULT_HEALTH));
        assert!(filled.is_complete());
    }
}
