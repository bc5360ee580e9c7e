//! Plausible value ranges per declared unit.

use std::collections::HashMap;

use shared_types::Unit;

/// Inclusive `[min, max]` per unit. Units without an entry only require a
/// finite value.
#[derive(Debug, Clone)]
pub struct UnitRanges {
    ranges: HashMap<Unit, (f32, f32)>,
}

impl Default for UnitRanges {
    fn default() -> Self {
        let ranges = HashMap::from([
            (Unit::EngineSpeed, (0.0, 20_000.0)),
            (Unit::Afr, (5.0, 30.0)),
            (Unit::Lambda, (0.3, 2.0)),
            (Unit::Percentage, (-5.0, 105.0)),
            (Unit::Temperature, (-60.0, 1_500.0)),
            (Unit::Pressure, (-110.0, 1_000.0)),
            (Unit::Volts, (-60.0, 60.0)),
        ]);
        Self { ranges }
    }
}

impl UnitRanges {
    /// No range checks at all, only finiteness.
    pub fn unbounded() -> Self {
        Self {
            ranges: HashMap::new(),
        }
    }

    pub fn set(&mut self, unit: Unit, min: f32, max: f32) {
        self.ranges.insert(unit, (min, max));
    }

    pub fn get(&self, unit: Unit) -> Option<(f32, f32)> {
        self.ranges.get(&unit).copied()
    }

    /// NaN and infinities are never valid.
    pub fn is_valid(&self, unit: Unit, value: f32) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.get(unit)
            .map_or(true, |(min, max)| (min..=max).contains(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_finite_always_invalid() {
        let ranges = UnitRanges::unbounded();
        assert!(!ranges.is_valid(Unit::NoUnit, f32::NAN));
        assert!(!ranges.is_valid(Unit::NoUnit, f32::INFINITY));
        assert!(ranges.is_valid(Unit::NoUnit, 1e30));
    }

    #[test]
    fn test_declared_unit_range() {
        let mut ranges = UnitRanges::default();
        assert!(ranges.is_valid(Unit::EngineSpeed, 3_000.0));
        assert!(!ranges.is_valid(Unit::EngineSpeed, -1.0));

        ranges.set(Unit::Torque, 0.0, 2_000.0);
        assert!(!ranges.is_valid(Unit::Torque, 2_500.0));
        assert!(ranges.is_valid(Unit::Power, 2_500.0));
    }
}
