//! Recursion guard for walks over carrier chains.
//!
//! `RecursionGuard` combines:
//! 1. **Cycle detection** via a visiting set (`FxHashSet<K>`)
//! 2. **Depth limiting** so a long acyclic chain cannot blow the stack
//! 3. **Iteration bounding** so a single resolution has a fixed work budget
//!
//! Every top-level resolution creates its own guard. Guards are never shared
//! between threads, so a concurrent caller can never observe another caller's
//! half-walked chain.

use ilc_common::limits::{MAX_CARRIER_CHAIN_DEPTH, MAX_RESOLUTION_ITERATIONS};
use rustc_hash::FxHashSet;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// RecursionProfile
// ---------------------------------------------------------------------------

/// Named recursion limit presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionProfile {
    /// Walking a wrapper's carrier chain during representation resolution.
    ///
    /// depth = `MAX_CARRIER_CHAIN_DEPTH`, iterations = `MAX_RESOLUTION_ITERATIONS`
    CarrierChain,

    /// Following type parameter bounds (`T : U`, `U : Name`) to an erasure.
    ///
    /// depth = 32, iterations = 1,000
    TypeParameterBounds,

    /// Custom limits, e.g. from `LoweringOptions::max_carrier_depth`.
    Custom { max_depth: u32, max_iterations: u32 },
}

impl RecursionProfile {
    pub const fn max_depth(self) -> u32 {
        match self {
            Self::CarrierChain => MAX_CARRIER_CHAIN_DEPTH,
            Self::TypeParameterBounds => 32,
            Self::Custom { max_depth, .. } => max_depth,
        }
    }

    pub const fn max_iterations(self) -> u32 {
        match self {
            Self::CarrierChain => MAX_RESOLUTION_ITERATIONS,
            Self::TypeParameterBounds => 1_000,
            Self::Custom { max_iterations, .. } => max_iterations,
        }
    }
}

// ---------------------------------------------------------------------------
// RecursionResult
// ---------------------------------------------------------------------------

/// Result of attempting to enter a recursive computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    /// Proceed with the computation.
    Entered,
    /// This key is already being visited.
    Cycle,
    /// Maximum recursion depth exceeded.
    DepthExceeded,
    /// Maximum iteration count exceeded.
    IterationExceeded,
}

impl RecursionResult {
    #[inline]
    pub fn is_entered(self) -> bool {
        matches!(self, Self::Entered)
    }

    #[inline]
    pub fn is_cycle(self) -> bool {
        matches!(self, Self::Cycle)
    }

    #[inline]
    pub fn is_exceeded(self) -> bool {
        matches!(self, Self::DepthExceeded | Self::IterationExceeded)
    }
}

// ---------------------------------------------------------------------------
// RecursionGuard
// ---------------------------------------------------------------------------

/// Tracks recursion state for cycle detection, depth limiting and iteration
/// bounding.
///
/// Every successful [`enter`](Self::enter) must be paired with exactly one
/// [`leave`](Self::leave) for the same key. Debug builds panic on a dropped
/// guard with live entries and on unmatched leaves.
pub struct RecursionGuard<K: Hash + Eq + Copy> {
    visiting: FxHashSet<K>,
    /// Entry order of the keys in `visiting`, for cycle traces.
    path: Vec<K>,
    iterations: u32,
    max_depth: u32,
    max_iterations: u32,
}

impl<K: Hash + Eq + Copy> RecursionGuard<K> {
    pub fn new(max_depth: u32, max_iterations: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            path: Vec::new(),
            iterations: 0,
            max_depth,
            max_iterations,
        }
    }

    pub fn with_profile(profile: RecursionProfile) -> Self {
        Self::new(profile.max_depth(), profile.max_iterations())
    }

    /// Try to enter a recursive computation for `key`.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        self.iterations = self.iterations.saturating_add(1);

        if self.iterations > self.max_iterations {
            return RecursionResult::IterationExceeded;
        }
        if self.visiting.contains(&key) {
            return RecursionResult::Cycle;
        }
        if self.depth() >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }

        self.visiting.insert(key);
        self.path.push(key);
        RecursionResult::Entered
    }

    /// Leave a recursive computation for `key`.
    pub fn leave(&mut self, key: K) {
        let was_present = self.visiting.remove(&key);
        debug_assert!(
            was_present,
            "RecursionGuard::leave() called with a key that is not in the visiting set"
        );
        if let Some(pos) = self.path.iter().rposition(|k| *k == key) {
            self.path.remove(pos);
        }
    }

    /// Execute `f` inside a guarded scope.
    ///
    /// Returns `Err(reason)` without running `f` if entry was denied.
    pub fn scope<T>(
        &mut self,
        key: K,
        f: impl FnOnce(&mut Self) -> T,
    ) -> Result<T, RecursionResult> {
        match self.enter(key) {
            RecursionResult::Entered => {
                let result = f(self);
                self.leave(key);
                Ok(result)
            }
            denied => Err(denied),
        }
    }

    #[inline]
    pub fn is_visiting(&self, key: &K) -> bool {
        self.visiting.contains(key)
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.path.len() as u32
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Keys currently entered, outermost first.
    #[inline]
    pub fn path(&self) -> &[K] {
        &self.path
    }

    /// The cycle closed by re-entering `key`: `key`, then every key entered
    /// after it, then `key` again. Empty if `key` is not being visited.
    pub fn cycle_through(&self, key: K) -> Vec<K> {
        let Some(start) = self.path.iter().position(|k| *k == key) else {
            return Vec::new();
        };
        let mut cycle = self.path[start..].to_vec();
        cycle.push(key);
        cycle
    }
}

#[cfg(debug_assertions)]
impl<K: Hash + Eq + Copy> Drop for RecursionGuard<K> {
    fn drop(&mut self) {
        if !std::thread::panicking() && !self.visiting.is_empty() {
            panic!(
                "RecursionGuard dropped with {} active entries still in the visiting set",
                self.visiting.len(),
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/recursion_tests.rs"]
mod tests;
