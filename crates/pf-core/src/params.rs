//! Parameter types for effects
//!
//! Every effect exposes a flat `ParamId -> f64` map. Ids are dense indices
//! into the effect's static `ParamSpec` table, so the map is a fixed array
//! and a snapshot of it is a plain `Copy` value that can cross threads
//! through a lock-free queue.

use serde::{Deserialize, Serialize};

/// Upper bound on parameters per effect
pub const MAX_PARAMS: usize = 32;

/// Parameter ID (dense index into the owning effect's spec table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamId(pub u32);

impl ParamId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parameter skew type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamSkew {
    Linear,
    Logarithmic,
    /// Integer steps (enum choices, switches)
    Stepped,
}

/// Parameter range: bounds, default and skew
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub skew: ParamSkew,
}

impl ParamRange {
    pub const fn linear(min: f64, max: f64, default: f64) -> Self {
        Self {
            min,
            max,
            default,
            skew: ParamSkew::Linear,
        }
    }

    pub const fn logarithmic(min: f64, max: f64, default: f64) -> Self {
        Self {
            min,
            max,
            default,
            skew: ParamSkew::Logarithmic,
        }
    }

    pub const fn stepped(min: f64, max: f64, default: f64) -> Self {
        Self {
            min,
            max,
            default,
            skew: ParamSkew::Stepped,
        }
    }

    /// Switch parameter (0 = off, 1 = on)
    pub const fn toggle(default_on: bool) -> Self {
        Self::stepped(0.0, 1.0, if default_on { 1.0 } else { 0.0 })
    }

    /// Clamp into range. NaN maps to the default.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.default;
        }
        let clamped = value.clamp(self.min, self.max);
        match self.skew {
            ParamSkew::Stepped => clamped.round(),
            _ => clamped,
        }
    }

    /// Denormalize a 0-1 value to actual value
    pub fn denormalize(&self, normalized: f64) -> f64 {
        let n = if normalized.is_nan() {
            0.0
        } else {
            normalized.clamp(0.0, 1.0)
        };
        let value = match self.skew {
            ParamSkew::Linear | ParamSkew::Stepped => self.min + n * (self.max - self.min),
            ParamSkew::Logarithmic => {
                let log_min = self.min.ln();
                let log_max = self.max.ln();
                (log_min + n * (log_max - log_min)).exp()
            }
        };
        self.clamp(value)
    }

    /// Normalize an actual value to 0-1
    pub fn normalize(&self, value: f64) -> f64 {
        if self.max <= self.min {
            return 0.0;
        }
        let clamped = self.clamp(value);
        match self.skew {
            ParamSkew::Linear | ParamSkew::Stepped => (clamped - self.min) / (self.max - self.min),
            ParamSkew::Logarithmic => {
                let log_min = self.min.ln();
                let log_max = self.max.ln();
                (clamped.ln() - log_min) / (log_max - log_min)
            }
        }
    }
}

/// Static description of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub id: ParamId,
    pub name: &'static str,
    pub unit: &'static str,
    pub range: ParamRange,
}

impl ParamSpec {
    pub const fn new(id: u32, name: &'static str, unit: &'static str, range: ParamRange) -> Self {
        Self {
            id: ParamId(id),
            name,
            unit,
            range,
        }
    }
}

/// Plain-value copy of a parameter map, published from the control thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSnapshot {
    values: [f64; MAX_PARAMS],
    len: usize,
    generation: u64,
}

impl ParamSnapshot {
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Monotonic counter bumped by the publisher
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> Option<f64> {
        (id.index() < self.len).then(|| self.values[id.index()])
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values[..self.len]
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

/// Flat id -> value store with per-block change flags.
///
/// `set`/`apply_snapshot` mark ids whose value actually changed; the audio
/// thread drains them once per block with `take_changed`.
#[derive(Debug, Clone)]
pub struct ParamMap {
    specs: &'static [ParamSpec],
    values: [f64; MAX_PARAMS],
    changed: u64,
}

impl ParamMap {
    /// Map initialised to every parameter's default. Every id starts changed
    /// so the first block configures the effect from scratch.
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        debug_assert!(specs.len() <= MAX_PARAMS);
        debug_assert!(specs.iter().enumerate().all(|(i, s)| s.id.index() == i));

        let mut values = [0.0; MAX_PARAMS];
        for (slot, spec) in values.iter_mut().zip(specs.iter()) {
            *slot = spec.range.default;
        }
        let len = specs.len().min(MAX_PARAMS);

        Self {
            specs,
            values,
            changed: (1u64 << len) - 1,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len().min(MAX_PARAMS)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    pub fn spec(&self, id: ParamId) -> Option<&'static ParamSpec> {
        self.specs.get(id.index())
    }

    /// Looks a parameter up by name (control side only).
    pub fn id_of(&self, name: &str) -> Option<ParamId> {
        self.specs.iter().find(|s| s.name == name).map(|s| s.id)
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f64 {
        if id.index() < self.len() {
            self.values[id.index()]
        } else {
            0.0
        }
    }

    /// Store a clamped value. Returns true when the stored value changed.
    /// Unknown ids are ignored.
    pub fn set(&mut self, id: ParamId, value: f64) -> bool {
        let Some(spec) = self.specs.get(id.index()) else {
            return false;
        };
        let clamped = spec.range.clamp(value);
        let slot = &mut self.values[id.index()];
        if slot.to_bits() == clamped.to_bits() {
            return false;
        }
        *slot = clamped;
        self.changed |= 1 << id.index();
        true
    }

    /// Set from a normalized 0-1 value
    pub fn set_normalized(&mut self, id: ParamId, normalized: f64) -> bool {
        match self.specs.get(id.index()) {
            Some(spec) => self.set(id, spec.range.denormalize(normalized)),
            None => false,
        }
    }

    /// Adopt every value of a snapshot, marking only those that differ.
    pub fn apply_snapshot(&mut self, snapshot: &ParamSnapshot) {
        let n = snapshot.len().min(self.len());
        for (i, &value) in snapshot.values()[..n].iter().enumerate() {
            self.set(ParamId(i as u32), value);
        }
    }

    pub fn snapshot(&self) -> ParamSnapshot {
        ParamSnapshot {
            values: self.values,
            len: self.len(),
            generation: 0,
        }
    }

    #[inline]
    pub fn is_changed(&self, id: ParamId) -> bool {
        id.index() < 64 && self.changed & (1 << id.index()) != 0
    }

    #[inline]
    pub fn has_changes(&self) -> bool {
        self.changed != 0
    }

    /// Returns the ids changed since the last call and clears the flags.
    #[inline]
    pub fn take_changed(&mut self) -> ChangedParams {
        let bits = self.changed;
        self.changed = 0;
        ChangedParams { bits }
    }

    /// Mark every parameter changed (after prepare/reset).
    pub fn mark_all_changed(&mut self) {
        self.changed = (1u64 << self.len()) - 1;
    }

    /// Restore all defaults.
    pub fn reset_to_defaults(&mut self) {
        for spec in self.specs {
            self.set(spec.id, spec.range.default);
        }
    }
}

/// Iterator over changed parameter ids
#[derive(Debug, Clone, Copy)]
pub struct ChangedParams {
    bits: u64,
}

impl Iterator for ChangedParams {
    type Item = ParamId;

    #[inline]
    fn next(&mut self) -> Option<ParamId> {
        if self.bits == 0 {
            return None;
        }
        let index = self.bits.trailing_zeros();
        self.bits &= self.bits - 1;
        Some(ParamId(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    static SPECS: [ParamSpec; 3] = [
        ParamSpec::new(0, "freq", "Hz", ParamRange::logarithmic(20.0, 20000.0, 1000.0)),
        ParamSpec::new(1, "mix", "", ParamRange::linear(0.0, 1.0, 0.5)),
        ParamSpec::new(2, "mode", "", ParamRange::stepped(0.0, 3.0, 0.0)),
    ];

    #[test]
    fn test_range_clamp() {
        let range = ParamRange::linear(0.0, 1.0, 0.5);
        assert_eq!(range.clamp(2.0), 1.0);
        assert_eq!(range.clamp(-1.0), 0.0);
        assert_eq!(range.clamp(f64::NAN), 0.5);

        let stepped = ParamRange::stepped(0.0, 4.0, 0.0);
        assert_eq!(stepped.clamp(2.6), 3.0);
    }

    #[test]
    fn test_log_range_normalize() {
        let range = ParamRange::logarithmic(20.0, 20000.0, 1000.0);
        let n = range.normalize(632.455532);
        assert_relative_eq!(n, 0.5, epsilon = 1e-6);
        assert_relative_eq!(range.denormalize(n), 632.455532, epsilon = 1e-4);
    }

    #[test]
    fn test_map_starts_all_changed() {
        let mut map = ParamMap::new(&SPECS);
        assert_eq!(map.get(ParamId(0)), 1000.0);
        let changed: Vec<_> = map.take_changed().collect();
        assert_eq!(changed, vec![ParamId(0), ParamId(1), ParamId(2)]);
        assert!(!map.has_changes());
    }

    #[test]
    fn test_map_change_flags() {
        let mut map = ParamMap::new(&SPECS);
        map.take_changed();

        assert!(!map.set(ParamId(1), 0.5));
        assert!(map.set(ParamId(1), 5.0));
        assert_eq!(map.get(ParamId(1)), 1.0);
        assert!(map.is_changed(ParamId(1)));
        assert!(!map.is_changed(ParamId(0)));

        assert!(!map.set(ParamId(9), 1.0));
        assert_eq!(map.get(ParamId(9)), 0.0);
    }

    #[test]
    fn test_snapshot_apply_marks_only_diffs() {
        let mut control = ParamMap::new(&SPECS);
        control.set(ParamId(2), 2.0);
        let snapshot = control.snapshot().with_generation(7);
        assert_eq!(snapshot.generation(), 7);

        let mut audio = ParamMap::new(&SPECS);
        audio.take_changed();
        audio.apply_snapshot(&snapshot);

        let changed: Vec<_> = audio.take_changed().collect();
        assert_eq!(changed, vec![ParamId(2)]);
        assert_eq!(audio.get(ParamId(2)), 2.0);
    }

    #[test]
    fn test_lookup_by_name() {
        let map = ParamMap::new(&SPECS);
        assert_eq!(map.id_of("mix"), Some(ParamId(1)));
        assert_eq!(map.id_of("nope"), None);
    }
}
