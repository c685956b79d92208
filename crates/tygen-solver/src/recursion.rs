//! Recursion guard combining cycle detection and depth limiting.
//!
//! Instantiation uses a guard keyed by canonical memo key as its
//! call-ancestry set; the intersection solver uses one keyed by memo key for
//! operand dereferences. Both also rely on the depth ceiling so that
//! pathologically deep declarations surface as a user error instead of a
//! stack overflow.

use rustc_hash::FxHashSet;
use std::hash::Hash;

/// Result of attempting to enter a recursive computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecursionResult {
    /// Proceed with the computation.
    Entered,
    /// This key is already being visited: cycle detected.
    Cycle,
    /// Maximum recursion depth exceeded.
    DepthExceeded,
}

/// Cycle detection via a visiting set plus a depth ceiling.
#[derive(Debug)]
pub struct RecursionGuard<K: Eq + Hash + Clone> {
    visiting: FxHashSet<K>,
    depth: u32,
    max_depth: u32,
}

impl<K: Eq + Hash + Clone> RecursionGuard<K> {
    pub fn new(max_depth: u32) -> Self {
        Self {
            visiting: FxHashSet::default(),
            depth: 0,
            max_depth,
        }
    }

    /// Try to enter a computation for `key`.
    ///
    /// On [`RecursionResult::Entered`] the caller must balance with
    /// [`leave`](Self::leave); the other results mean the key was not pushed.
    pub fn enter(&mut self, key: K) -> RecursionResult {
        if self.depth >= self.max_depth {
            return RecursionResult::DepthExceeded;
        }
        if !self.visiting.insert(key) {
            return RecursionResult::Cycle;
        }
        self.depth += 1;
        RecursionResult::Entered
    }

    /// Leave a previously entered computation.
    pub fn leave(&mut self, key: &K) {
        let was_visiting = self.visiting.remove(key);
        debug_assert!(was_visiting, "leave() without matching enter()");
        self.depth = self.depth.saturating_sub(1);
    }

    /// Whether `key` is on the current ancestry path.
    pub fn contains(&self, key: &K) -> bool {
        self.visiting.contains(key)
    }

    /// Whether no computation is currently in flight.
    pub fn is_idle(&self) -> bool {
        self.visiting.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cycles() {
        let mut guard = RecursionGuard::new(16);
        assert_eq!(guard.enter("a"), RecursionResult::Entered);
        assert_eq!(guard.enter("b"), RecursionResult::Entered);
        assert_eq!(guard.enter("a"), RecursionResult::Cycle);
        assert!(guard.contains(&"a"));

        guard.leave(&"b");
        guard.leave(&"a");
        assert!(guard.is_idle());
        assert_eq!(guard.enter("a"), RecursionResult::Entered);
    }

    #[test]
    fn enforces_depth_ceiling() {
        let mut guard = RecursionGuard::new(2);
        assert_eq!(guard.enter(1), RecursionResult::Entered);
        assert_eq!(guard.enter(2), RecursionResult::Entered);
        assert_eq!(guard.enter(3), RecursionResult::DepthExceeded);
    }
}
