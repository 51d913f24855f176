//! Rollover and eviction decisions.

use super::state::{RotationState, SegmentRef};

/// Outcome of placing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// State after the record is accounted for.
    pub state: RotationState,
    /// Segment the record must be inserted into.
    pub target: String,
    /// Whether a new current segment was opened.
    pub rolled_over: bool,
    /// Segment that fell out of retention and must be dropped.
    pub evicted: Option<SegmentRef>,
}

/// Decides where each record goes and which segment, if any, to drop.
///
/// The engine does no I/O. Callers load the state, call [`apply`], then
/// carry out the drop, persist and insert themselves.
///
/// [`apply`]: RotationEngine::apply
#[derive(Debug, Clone)]
pub struct RotationEngine {
    base_name: String,
}

impl RotationEngine {
    /// Creates an engine that names segments `<base_name>_<stamp>`.
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
        }
    }

    /// The segment name prefix.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// A fresh state whose current segment is stamped `now`.
    #[must_use]
    pub fn initial_state(
        &self,
        tag: &str,
        capacity_bytes: u64,
        max_segments: u32,
        now: u64,
    ) -> RotationState {
        let current = SegmentRef::new(SegmentRef::name_for(&self.base_name, now), 0);
        RotationState::initial(tag, capacity_bytes, max_segments, current)
    }

    /// Accounts for a record of `record_size` bytes.
    ///
    /// The size check runs first. If the record fits, it lands in the
    /// current segment. Otherwise the current segment is archived with its
    /// recorded size and a new segment holding just this record becomes
    /// current, even if the record alone exceeds the capacity.
    ///
    /// The count check only runs on rollover: archiving when no slot is
    /// left evicts the oldest archived segment, which for `max_segments == 1`
    /// is the segment that was just archived.
    #[must_use]
    pub fn apply(&self, state: &RotationState, record_size: u64, now: u64) -> Decision {
        let mut next = state.clone();
        let projected = next.current.size.saturating_add(record_size);

        if projected <= next.capacity_bytes {
            next.current.size = projected;
            let target = next.current.name.clone();
            return Decision {
                state: next,
                target,
                rolled_over: false,
                evicted: None,
            };
        }

        let stamp = self.next_stamp(&next, now);
        let fresh = SegmentRef::new(SegmentRef::name_for(&self.base_name, stamp), record_size);
        let archived = std::mem::replace(&mut next.current, fresh);
        next.history.push(archived);

        let evicted = if next.remaining_slots == 0 {
            // No slot for the archived segment: the oldest goes, the count
            // stays where it was.
            Some(next.history.remove(0))
        } else {
            next.remaining_slots -= 1;
            None
        };

        let target = next.current.name.clone();
        Decision {
            state: next,
            target,
            rolled_over: true,
            evicted,
        }
    }

    /// Stamp for a new segment: `now`, unless that would not sort after
    /// every live segment's stamp.
    fn next_stamp(&self, state: &RotationState, now: u64) -> u64 {
        let latest = state
            .history
            .iter()
            .chain(std::iter::once(&state.current))
            .filter_map(SegmentRef::stamp)
            .max();
        match latest {
            Some(latest) if now <= latest => latest + 1,
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000;

    fn engine() -> RotationEngine {
        RotationEngine::new("logs")
    }

    /// Feeds `sizes` through the engine one second apart.
    fn run(state: RotationState, sizes: &[u64]) -> (RotationState, Vec<Decision>) {
        let engine = engine();
        let mut state = state;
        let mut decisions = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let d = engine.apply(&state, *size, T0 + 1 + i as u64);
            state = d.state.clone();
            decisions.push(d);
        }
        (state, decisions)
    }

    #[test]
    fn record_that_fits_stays_in_current() {
        let state = engine().initial_state("t", 1024, 3, T0);
        let d = engine().apply(&state, 300, T0 + 1);
        assert!(!d.rolled_over);
        assert_eq!(d.target, "logs_1700000000");
        assert_eq!(d.state.current.size, 300);
        assert_eq!(d.evicted, None);
    }

    #[test]
    fn exact_fit_does_not_roll() {
        let state = engine().initial_state("t", 1000, 3, T0);
        let (state, decisions) = run(state, &[600, 400]);
        assert!(decisions.iter().all(|d| !d.rolled_over));
        assert_eq!(state.current.size, 1000);
    }

    #[test]
    fn fourth_record_rolls_over() {
        let state = engine().initial_state("t", 1024, 3, T0);
        let (state, decisions) = run(state, &[300, 300, 300, 300]);

        let a = "logs_1700000000";
        assert_eq!(decisions[0].state.current.size, 300);
        assert_eq!(decisions[1].state.current.size, 600);
        assert_eq!(decisions[2].state.current.size, 900);
        assert!(decisions[..3].iter().all(|d| d.target == a));

        let fourth = &decisions[3];
        assert!(fourth.rolled_over);
        assert_ne!(fourth.target, a);
        assert_eq!(fourth.evicted, None);
        assert_eq!(state.history, vec![SegmentRef::new(a, 900)]);
        assert_eq!(state.current.size, 300);
        assert_eq!(state.remaining_slots, 1);
    }

    #[test]
    fn third_rollover_evicts_oldest() {
        let state = engine().initial_state("t", 1024, 3, T0);
        // Records 4, 7 and 10 roll over.
        let (state, decisions) = run(state, &[300; 12]);

        let rollovers: Vec<&Decision> = decisions.iter().filter(|d| d.rolled_over).collect();
        assert_eq!(rollovers.len(), 3);
        assert_eq!(rollovers[0].evicted, None);
        assert_eq!(rollovers[1].evicted, None);
        assert_eq!(rollovers[1].state.remaining_slots, 0);

        let evicted = rollovers[2].evicted.as_ref().unwrap();
        assert_eq!(evicted.name, "logs_1700000000");
        assert_eq!(evicted.size, 900);

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.remaining_slots, 0);
        assert!(state.history.iter().all(|s| s.name != evicted.name));
        assert_eq!(state.history[0].name, rollovers[0].target);
        assert_eq!(state.history[1].name, rollovers[1].target);
    }

    #[test]
    fn single_segment_evicts_on_every_rollover() {
        let state = engine().initial_state("t", 100, 1, T0);
        let (state, decisions) = run(state, &[60, 60, 60]);

        assert!(decisions[1].rolled_over);
        assert_eq!(
            decisions[1].evicted.as_ref().map(|s| s.name.as_str()),
            Some("logs_1700000000")
        );
        assert!(decisions[2].rolled_over);
        assert_eq!(
            decisions[2].evicted.as_ref().map(|s| s.name.clone()),
            Some(decisions[1].target.clone())
        );
        assert!(state.history.is_empty());
        assert_eq!(state.remaining_slots, 0);
    }

    #[test]
    fn oversize_record_gets_fresh_segment() {
        let state = engine().initial_state("t", 1024, 3, T0);
        let (state, decisions) = run(state, &[100, 5000]);

        let d = &decisions[1];
        assert!(d.rolled_over);
        assert_eq!(state.current.size, 5000);
        assert!(state.current.size > state.capacity_bytes);
        assert_eq!(state.history, vec![SegmentRef::new("logs_1700000000", 100)]);
    }

    #[test]
    fn oversize_into_empty_segment_still_rolls() {
        let state = engine().initial_state("t", 10, 3, T0);
        let d = engine().apply(&state, 50, T0 + 1);
        assert!(d.rolled_over);
        assert_eq!(d.state.history, vec![SegmentRef::new("logs_1700000000", 0)]);
        assert_eq!(d.state.current.size, 50);
    }

    #[test]
    fn record_after_oversize_rolls_again() {
        let state = engine().initial_state("t", 1024, 5, T0);
        let (state, decisions) = run(state, &[5000, 10]);
        assert!(decisions[1].rolled_over);
        assert_eq!(state.history.last().map(|s| s.size), Some(5000));
        assert_eq!(state.current.size, 10);
    }

    #[test]
    fn names_stay_unique_when_clock_stalls() {
        let engine = engine();
        let mut state = engine.initial_state("t", 10, 4, T0);
        let mut names = vec![state.current.name.clone()];
        for _ in 0..3 {
            let d = engine.apply(&state, 11, T0);
            names.push(d.target.clone());
            state = d.state;
        }
        assert_eq!(
            names,
            vec!["logs_1700000000", "logs_1700000001", "logs_1700000002", "logs_1700000003"]
        );
    }

    #[test]
    fn names_follow_clock_when_it_advances() {
        let state = engine().initial_state("t", 10, 4, T0);
        let d = engine().apply(&state, 11, T0 + 3600);
        assert_eq!(d.target, "logs_1700003600");
    }

    #[test]
    fn apply_leaves_identity_and_version_alone() {
        let mut state = engine().initial_state("t", 10, 2, T0);
        state.version = 7;
        let d = engine().apply(&state, 11, T0 + 1);
        assert_eq!(d.state.version, 7);
        assert_eq!(d.state.identity, state.identity);
    }

    #[test]
    fn invariants_hold_through_long_run() {
        let state = engine().initial_state("t", 500, 4, T0);
        let sizes: Vec<u64> = (0..200).map(|i| (i * 37 % 450) + 1).collect();
        let (_, decisions) = run(state, &sizes);
        for d in decisions {
            d.state.check_invariants().unwrap();
            assert!(d.state.current.size <= d.state.capacity_bytes);
        }
    }

    proptest! {
        #[test]
        fn bytes_are_accounted_exactly(
            capacity in 1u64..=2048,
            max in 1u32..=6,
            sizes in prop::collection::vec(1u64..=3000, 1..120),
        ) {
            let engine = engine();
            let mut state = engine.initial_state("t", capacity, max, T0);
            for (i, size) in sizes.into_iter().enumerate() {
                let d = engine.apply(&state, size, T0 + i as u64);
                let expected_rollover = state.current.size + size > capacity;
                prop_assert_eq!(d.rolled_over, expected_rollover);
                prop_assert!(d.evicted.is_none() || d.rolled_over);
                prop_assert_eq!(&d.target, &d.state.current.name);

                let dropped = d.evicted.as_ref().map_or(0, |s| s.size);
                prop_assert_eq!(d.state.total_size(), state.total_size() + size - dropped);
                prop_assert!(d.state.check_invariants().is_ok());
                state = d.state;
            }
        }
    }
}
