//! Property-based tests for the corpus-wide invariants in spec §8.

use dafl_sched::containers::{ChainedMap, DynamicSequence};
use dafl_sched::{Mode, ProxScore, Scheduler, SchedulerConfig, Seed, SeedHandle};
use proptest::prelude::*;

fn seed(id: u64, original: u64, covered: u32, length: u32, dfg: u32, location: u32) -> SeedHandle {
    Seed::new(id, length, id as u32, dfg, id as u32, ProxScore::new(original, covered), location).into_handle()
}

proptest! {
    /// P9: a `ChainedMap`'s load factor never exceeds 1/2 after any insert.
    #[test]
    fn chained_map_load_factor_never_exceeds_half(keys in prop::collection::vec(0u32..500, 0..300)) {
        let mut map: ChainedMap<u32> = ChainedMap::new(4);
        for k in keys {
            map.insert(k, k);
            prop_assert!(map.size() * 2 <= map.table_size());
        }
    }

    /// P8: `reduce()` compacts out null slots without disturbing the
    /// relative order of whatever survives.
    #[test]
    fn sequence_reduce_is_a_filtered_round_trip(
        values in prop::collection::vec(0i32..1000, 1..50),
        drop_mask in prop::collection::vec(any::<bool>(), 1..50),
    ) {
        let mut seq = DynamicSequence::from_values(values.clone());
        let mut expected = Vec::new();
        for (i, v) in values.iter().enumerate() {
            let drop = drop_mask.get(i).copied().unwrap_or(false);
            if drop {
                seq.set(i, None);
            } else {
                expected.push(*v);
            }
        }
        seq.reduce();
        let got: Vec<i32> = seq.iter().copied().collect();
        prop_assert_eq!(got, expected);
    }

    /// P2 / P4: after an arbitrary interleaving of push/next/mark_removed,
    /// `next()` returns `None` exactly when there is no live (unremoved)
    /// seed left to give out, and every seed `next()` does return is one
    /// that was actually pushed and never removed.
    #[test]
    fn next_returns_null_iff_no_live_seed(
        ops in prop::collection::vec(0u8..3, 0..40),
    ) {
        let cfg = SchedulerConfig {
            t_warm: std::time::Duration::ZERO,
            use_vertical: false,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(cfg).unwrap();
        let mut pushed: Vec<SeedHandle> = Vec::new();
        let mut removed_ids = std::collections::HashSet::new();
        let mut next_id = 1u64;

        for op in ops {
            match op {
                0 => {
                    let s = seed(next_id, (next_id % 7) + 1, (next_id % 5) as u32, 64, (next_id % 3) as u32, 0);
                    next_id += 1;
                    sched.push(s.clone());
                    pushed.push(s);
                }
                1 => {
                    if let Some(victim) = pushed.first().cloned() {
                        removed_ids.insert(victim.borrow().id);
                        sched.mark_removed(&victim);
                    }
                }
                _ => {
                    let live_exists = pushed.iter().any(|s| !removed_ids.contains(&s.borrow().id));
                    let got = sched.next();
                    if !live_exists {
                        prop_assert!(got.is_none());
                    } else if let Some(g) = got {
                        prop_assert!(!removed_ids.contains(&g.borrow().id));
                    }
                }
            }
        }
    }
}

#[test]
fn p7_disabling_vertical_pins_horizontal_forever() {
    let mut cfg = SchedulerConfig::default();
    cfg.t_warm = std::time::Duration::ZERO;
    cfg.p_vertical = 1.0;
    let mut sched = Scheduler::new(cfg).unwrap();
    sched.push(seed(1, 10, 3, 50, 1, 0));
    sched.set_vertical_enabled(false);
    for _ in 0..20 {
        sched.next();
        assert_eq!(sched.get_mode(), Mode::Horizontal);
    }
}

#[test]
fn p10_adjusted_score_is_monotone_non_increasing_in_use_count() {
    let mut cfg = SchedulerConfig::default();
    cfg.use_vertical = true;
    cfg.t_warm = std::time::Duration::ZERO;
    cfg.p_vertical = 1.0;
    cfg.p_exploration = 0.0;
    cfg.budget_base = 1;
    cfg.budget_per_cover = 0;
    let mut sched = Scheduler::new(cfg).unwrap();
    let s = seed(1, 100, 0, 50, 1, 0);
    sched.push(s.clone());
    let before = s.borrow().prox_score.adjusted;
    sched.next();
    let after = s.borrow().prox_score.adjusted;
    assert!(after <= before, "adjusted score must not increase after a vertical-entry retirement: {before} -> {after}");
}
