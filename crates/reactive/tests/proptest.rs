//! Property-based tests for the update coalescer.

use horizon_reactive::{CoalesceConfig, UpdateCoalescer};
use proptest::prelude::*;

proptest! {
    /// Every pushed item is released exactly once, in push order, and no
    /// release happens later than `max_wait` after its first pending push.
    #[test]
    fn coalescer_is_lossless_and_bounded(
        base in 1u64..20,
        extra in 0u64..100,
        gaps in prop::collection::vec(0u64..30, 1..100),
    ) {
        let max_wait = base + extra;
        let mut c: UpdateCoalescer<Vec<usize>> =
            UpdateCoalescer::new(CoalesceConfig::new(base, max_wait));
        let mut released = Vec::new();
        let mut now = 0u64;
        let mut first_pending = None;

        for (i, gap) in gaps.iter().enumerate() {
            // Tick every millisecond so no due release is skipped.
            for _ in 0..*gap {
                now += 1;
                if let Some(batch) = c.poll(now) {
                    let started: u64 = first_pending.take().unwrap();
                    prop_assert!(now - started <= max_wait);
                    released.extend(batch);
                }
            }
            if !c.is_pending() {
                first_pending = Some(now);
            }
            c.push(now, vec![i]);
        }
        if let Some(batch) = c.flush() {
            released.extend(batch);
        }

        prop_assert_eq!(released, (0..gaps.len()).collect::<Vec<_>>());
    }
}
