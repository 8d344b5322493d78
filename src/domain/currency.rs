//! Player currency balances.

use serde::{Deserialize, Serialize};

use super::Mergeable;

/// Currency balances of a player save. Optional fields carry partial updates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Currency {
    pub gold: Option<i64>,
    pub diamond: Option<i64>,
    pub emerald: Option<i64>,
    pub amethyst: Option<i64>,
}

impl Currency {
    /// Complete record with every field set.
    pub fn complete(gold: i64, diamond: i64, emerald: i64, amethyst: i64) -> Self {
        Self {
            gold: Some(gold),
            diamond: Some(diamond),
            emerald: Some(emerald),
            amethyst: Some(amethyst),
        }
    }

    /// Initialization defaults: every balance starts at zero.
    pub fn default_complete() -> Self {
        Self::complete(0, 0, 0, 0)
    }

    /// Fill every absent field with zero.
    pub fn with_defaults(self) -> Self {
        Self {
            gold: self.gold.or(Some(0)),
            diamond: self.diamond.or(Some(0)),
            emerald: self.emerald.or(Some(0)),
            amethyst: self.amethyst.or(Some(0)),
        }
    }
}

impl Mergeable for Currency {
    fn merge(existing: &Self, update: &Self) -> Self {
        Self {
            gold: update.gold.or(existing.gold),
            diamond: update.diamond.or(existing.diamond),
            emerald: update.emerald.or(existing.emerald),
            amethyst: update.amethyst.or(existing.amethyst),
        }
    }

    fn is_complete(&self) -> bool {
        self.gold.is_some()
            && self.diamond.is_some()
            && self.emerald.is_some()
            && self.amethyst.is_some()
    }

    fn is_empty(&self) -> bool {
        self.gold.is_none()
            && self.diamond.is_none()
            && self.emerald.is_none()
            && self.amethyst.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_updates_both_survive() {
        let base = Currency::default();
        let gold = Currency {
            gold: Some(5),
            ..Default::default()
        };
        let diamond = Currency {
            diamond: Some(9),
            ..Default::default()
        };

        // Arrival order must not matter for non-overlapping fields.
        let a = Currency::merge(&Currency::merge(&base, &gold), &diamond);
        let b = Currency::merge(&Currency::merge(&base, &diamond), &gold);
        assert_eq!(a, b);
        assert_eq!(a.gold, Some(5));
        assert_eq!(a.diamond, Some(9));
    }

    #[test]
    fn defaults_produce_complete_record() {
        assert!(Currency::default().with_defaults().is_complete());
        assert_eq!(Currency::default_complete().gold, Some(0));
    }
}
