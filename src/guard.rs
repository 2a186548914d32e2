//! Loop metering. Every guest loop calls `_g(id, maxiter)` on each pass;
//! the id is the call site, so each loop is counted independently.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct GuardMap {
    hits: BTreeMap<u32, u32>,
}

/// Outcome of recording one guard pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCheck {
    Pass(u32),
    Violation { id: u32, hits: u32 },
}

impl GuardMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a pass through guard `id`. The first pass counts as 1.
    pub fn hit(&mut self, id: u32, max_iterations: u32) -> GuardCheck {
        let hits = self.hits.entry(id).or_insert(0);
        *hits = hits.saturating_add(1);
        if *hits > max_iterations {
            GuardCheck::Violation { id, hits: *hits }
        } else {
            GuardCheck::Pass(*hits)
        }
    }

    pub fn hits(&self, id: u32) -> u32 {
        self.hits.get(&id).copied().unwrap_or(0)
    }

    /// Number of distinct guard sites reached.
    pub fn sites(&self) -> usize {
        self.hits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_macro_allows_n_plus_one_passes() {
        // GUARD(3) passes maxiter 4
        let mut guards = GuardMap::new();
        for pass in 1..=4 {
            assert_eq!(guards.hit(7, 4), GuardCheck::Pass(pass));
        }
        assert_eq!(guards.hit(7, 4), GuardCheck::Violation { id: 7, hits: 5 });
    }

    #[test]
    fn test_sites_counted_independently() {
        let mut guards = GuardMap::new();
        guards.hit(1, 1);
        assert_eq!(guards.hit(2, 1), GuardCheck::Pass(1));
        assert_eq!(guards.hits(1), 1);
        assert_eq!(guards.hits(3), 0);
        assert_eq!(guards.sites(), 2);
    }
}
