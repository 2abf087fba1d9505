//! Change detection for derived coefficients
//!
//! Coefficient design (trig, `exp`, `powf`) is far more expensive than the
//! per-sample recursion it feeds. A `ParameterGate` remembers the last set
//! of design inputs and only lets a recomputation through when they differ.

/// Remembers the last design inputs of type `K`.
#[derive(Debug, Clone)]
pub struct ParameterGate<K> {
    last: Option<K>,
    recomputations: u64,
}

impl<K: PartialEq + Copy> ParameterGate<K> {
    pub const fn new() -> Self {
        Self {
            last: None,
            recomputations: 0,
        }
    }

    /// Returns true (and records `key`) when `key` differs from the last
    /// accepted inputs, or when nothing has been accepted yet.
    #[inline]
    pub fn changed(&mut self, key: K) -> bool {
        if self.last == Some(key) {
            return false;
        }
        self.last = Some(key);
        self.recomputations += 1;
        true
    }

    /// Runs `recompute` only if `key` changed. Returns whether it ran.
    #[inline]
    pub fn update(&mut self, key: K, recompute: impl FnOnce(&K)) -> bool {
        if self.changed(key) {
            recompute(&key);
            true
        } else {
            false
        }
    }

    /// Forget the last inputs so the next call always recomputes.
    #[inline]
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    #[inline]
    pub fn last(&self) -> Option<&K> {
        self.last.as_ref()
    }

    /// Number of recomputations let through so far
    #[inline]
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

impl<K: PartialEq + Copy> Default for ParameterGate<K> {
    fn default() -> Self {
        Self::new()
    }
}
