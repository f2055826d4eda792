//! Multi-objective (Pareto) seed scheduler: two independent rank axes, each
//! partitioned into `frontier` / `dominated` / `newly_added` / `recycled`
//! (spec §4.5).

use std::cmp::Ordering;
use std::rc::Rc;

use tracing::info;

use crate::containers::{ChainedMap, DynamicSequence};
use crate::mode::Mode;
use crate::seed::{BucketInfo, BucketStatus, Seed, SeedHandle};

/// Which of the two independent rank structures a piece of code is
/// operating on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    Moo,
    Explore,
}

fn get_info(seed: &Seed, kind: AxisKind) -> BucketInfo {
    match kind {
        AxisKind::Moo => seed.moo_info,
        AxisKind::Explore => seed.explore_info,
    }
}

fn set_info(seed: &mut Seed, kind: AxisKind, info: BucketInfo) {
    match kind {
        AxisKind::Moo => seed.moo_info = info,
        AxisKind::Explore => seed.explore_info = info,
    }
}

/// `a` dominates `b` iff `a >= b` componentwise and `a > b` on at least one
/// component. Every component is pre-normalized so "larger is better"
/// (descending objectives are used as-is, ascending ones negated).
fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_greater = false;
    for (x, y) in a.iter().zip(b) {
        if x < y {
            return false;
        }
        if x > y {
            strictly_greater = true;
        }
    }
    strictly_greater
}

/// Orders score vectors best-first (lexicographic, larger-is-better).
fn score_cmp_desc(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match y.partial_cmp(x).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

enum Origin {
    Frontier,
    NewlyAdded,
    Recycled,
}

/// One of the two rank structures (MOO or EXPLORE): four sequences holding
/// every live seed currently ranked on this axis, membership mutually
/// exclusive.
struct Axis {
    kind: AxisKind,
    frontier: DynamicSequence<SeedHandle>,
    dominated: DynamicSequence<SeedHandle>,
    newly_added: DynamicSequence<SeedHandle>,
    recycled: DynamicSequence<SeedHandle>,
}

impl Axis {
    fn new(kind: AxisKind) -> Self {
        Self {
            kind,
            frontier: DynamicSequence::new(),
            dominated: DynamicSequence::new(),
            newly_added: DynamicSequence::new(),
            recycled: DynamicSequence::new(),
        }
    }

    fn push_back_indexed(seq: &mut DynamicSequence<SeedHandle>, seed: SeedHandle, kind: AxisKind, status: BucketStatus) {
        let index = seq.size();
        seq.push_back(Rc::clone(&seed));
        set_info(&mut seed.borrow_mut(), kind, BucketInfo { status, index });
    }

    fn reindex(seq: &DynamicSequence<SeedHandle>, kind: AxisKind, status: BucketStatus) {
        for (index, seed) in seq.iter_with_index() {
            set_info(&mut seed.borrow_mut(), kind, BucketInfo { status, index });
        }
    }

    fn admit_newly_added(&mut self, seed: SeedHandle) {
        Self::push_back_indexed(&mut self.newly_added, seed, self.kind, BucketStatus::NewlyAdded);
    }

    fn frontier_live_count(&self) -> usize {
        self.frontier.live_count()
    }

    fn newly_added_live_count(&self) -> usize {
        self.newly_added.live_count()
    }

    /// Pops the next live seed off the front of `frontier`, silently
    /// discarding any holes (left behind by [`Self::clear_slot`]) it
    /// crosses along the way.
    fn pop_frontier_head(&mut self) -> Option<SeedHandle> {
        let found = loop {
            if self.frontier.is_empty() {
                break None;
            }
            if let Some(seed) = self.frontier.pop_front() {
                break Some(seed);
            }
        };
        Self::reindex(&self.frontier, self.kind, BucketStatus::Frontier);
        found
    }

    fn push_frontier_tail(&mut self, seed: SeedHandle) {
        Self::push_back_indexed(&mut self.frontier, seed, self.kind, BucketStatus::Frontier);
    }

    fn retire_to_recycled(&mut self, seed: SeedHandle) {
        Self::push_back_indexed(&mut self.recycled, seed, self.kind, BucketStatus::Recycled);
    }

    /// Nulls out whatever slot `seed` currently occupies, per its own
    /// `BucketInfo` for this axis. The hole survives until the next
    /// rebuild, which is the only place compaction happens (spec §4.5
    /// `remove`).
    fn clear_slot(&mut self, seed: &SeedHandle) {
        let info = get_info(&seed.borrow(), self.kind);
        let seq = match info.status {
            BucketStatus::Frontier => &mut self.frontier,
            BucketStatus::Dominated => &mut self.dominated,
            BucketStatus::NewlyAdded => &mut self.newly_added,
            BucketStatus::Recycled => &mut self.recycled,
            BucketStatus::Uninitialized => return,
        };
        seq.set(info.index, None);
    }

    /// Recomputes the non-dominated front over `frontier ∪ newly_added ∪
    /// recycled` (excluding removed seeds), per spec §4.5 "Rebuild". The
    /// old `dominated` bucket is never replaced, only appended to — once
    /// dominated, a seed never re-enters the candidate pool. Recycled
    /// seeds not promoted to the new frontier simply remain recycled,
    /// since exhausting the per-seed selection budget is a throttle, not
    /// the permanent demotion that losing on the frontier is.
    fn rebuild(&mut self, objective: impl Fn(&Seed) -> Vec<f64>, reason: &str) {
        let mut candidates: Vec<(SeedHandle, Vec<f64>, Origin)> = Vec::new();
        for seed in self.frontier.iter() {
            if !seed.borrow().flags.removed {
                let score = objective(&seed.borrow());
                candidates.push((Rc::clone(seed), score, Origin::Frontier));
            }
        }
        for seed in self.newly_added.iter() {
            if !seed.borrow().flags.removed {
                let score = objective(&seed.borrow());
                candidates.push((Rc::clone(seed), score, Origin::NewlyAdded));
            }
        }
        for seed in self.recycled.iter() {
            if !seed.borrow().flags.removed {
                let score = objective(&seed.borrow());
                candidates.push((Rc::clone(seed), score, Origin::Recycled));
            }
        }

        let n = candidates.len();
        let mut is_frontier = vec![true; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && dominates(&candidates[j].1, &candidates[i].1) {
                    is_frontier[i] = false;
                    break;
                }
            }
        }

        let old_frontier_len = self.frontier_live_count();

        let mut frontier_picks: Vec<(SeedHandle, Vec<f64>)> = Vec::new();
        let mut dominated_losers: Vec<SeedHandle> = Vec::new();
        let mut retained_recycled: Vec<SeedHandle> = Vec::new();

        for (i, (seed, score, origin)) in candidates.into_iter().enumerate() {
            if is_frontier[i] {
                frontier_picks.push((seed, score));
            } else {
                match origin {
                    Origin::Frontier | Origin::NewlyAdded => dominated_losers.push(seed),
                    Origin::Recycled => retained_recycled.push(seed),
                }
            }
        }
        frontier_picks.sort_by(|a, b| score_cmp_desc(&a.1, &b.1));

        self.frontier = DynamicSequence::new();
        for (seed, _) in frontier_picks {
            // A rebuild reshuffles the whole candidate pool, which is as
            // good a definition of "a new cycle started" as this axis has;
            // every seed entering the fresh frontier starts that cycle
            // unhandled.
            seed.borrow_mut().flags.handled_in_cycle = false;
            Self::push_back_indexed(&mut self.frontier, seed, self.kind, BucketStatus::Frontier);
        }

        for seed in dominated_losers {
            Self::push_back_indexed(&mut self.dominated, seed, self.kind, BucketStatus::Dominated);
        }

        self.recycled = DynamicSequence::new();
        for seed in retained_recycled {
            Self::push_back_indexed(&mut self.recycled, seed, self.kind, BucketStatus::Recycled);
        }

        self.newly_added = DynamicSequence::new();

        info!(
            target: "dafl_sched::pareto",
            axis = ?self.kind,
            reason,
            old_frontier_len,
            new_frontier_len = self.frontier_live_count(),
            "rebuilt pareto partition"
        );
    }
}

fn moo_objectives(seed: &Seed) -> Vec<f64> {
    vec![
        seed.prox_score.adjusted,
        f64::from(seed.prox_score.covered),
        -f64::from(seed.length),
        -(seed.handicap as f64),
    ]
}

/// Free function rather than a `&self` method so the closure built from it
/// in [`ParetoScheduler::rebuild_if_due`] captures only the two maps it
/// needs, leaving `self.explore` free for a simultaneous `&mut` borrow.
fn explore_objectives(seed: &Seed, novelty: &ChainedMap<u32>, count_dfg_path: &ChainedMap<u32>) -> Vec<f64> {
    let nov = f64::from(novelty.get(novelty_key(seed.id)).copied().unwrap_or(0));
    let path_count = count_dfg_path.get(seed.dfg_cksum).copied().unwrap_or(0);
    let rarity = 1.0 / (1.0 + f64::from(path_count));
    vec![nov, rarity, -f64::from(seed.length)]
}

/// Truncates a seed id down to the `u32` key space the scheduler's internal
/// maps use. Fine in practice: no real corpus approaches four billion
/// seeds.
fn novelty_key(id: u64) -> u32 {
    id as u32
}

/// Maintains the MOO and EXPLORE rank axes and the shared per-DFG-path
/// selection histogram they both read from.
pub struct ParetoScheduler {
    moo: Axis,
    explore: Axis,
    /// `count_dfg_path[dfg_cksum]`: number of times EXPLORE mode has
    /// returned a seed from this path. Backs `dfg_path_rarity`.
    count_dfg_path: ChainedMap<u32>,
    /// Highest `covered` seen among EXPLORE seeds sharing a `dfg_cksum`, as
    /// of each seed's own admission. Backs `coverage_novelty`.
    max_covered_by_path: ChainedMap<u32>,
    /// Each seed's `coverage_novelty`, frozen at the moment it was admitted
    /// to EXPLORE's `newly_added` (spec §4.5 "[ADDED/RESOLVED]").
    novelty: ChainedMap<u32>,
    selection_budget: u32,
}

impl ParetoScheduler {
    /// Builds an empty scheduler per `config`.
    pub fn new(config: &crate::config::SchedulerConfig) -> Self {
        Self {
            moo: Axis::new(AxisKind::Moo),
            explore: Axis::new(AxisKind::Explore),
            count_dfg_path: ChainedMap::new(64),
            max_covered_by_path: ChainedMap::new(64),
            novelty: ChainedMap::new(64),
            selection_budget: config.pareto_selection_budget,
        }
    }

    /// Admits `seed` into both rank axes' `newly_added` buckets (spec §4.5
    /// "Insertion").
    pub fn push(&mut self, seed: &SeedHandle) {
        self.moo.admit_newly_added(Rc::clone(seed));

        let (dfg, covered, id) = {
            let s = seed.borrow();
            (s.dfg_cksum, s.prox_score.covered, s.id)
        };
        let prior_max = self.max_covered_by_path.get(dfg).copied().unwrap_or(0);
        let novelty = covered.saturating_sub(prior_max);
        self.novelty.insert(novelty_key(id), novelty);
        if covered > prior_max {
            self.max_covered_by_path.insert(dfg, covered);
        }
        self.explore.admit_newly_added(Rc::clone(seed));
    }

    /// Marks `seed` removed and clears it out of whichever bucket it
    /// currently occupies on both axes (spec §4.5 "Removal").
    pub fn remove(&mut self, seed: &SeedHandle) {
        seed.borrow_mut().flags.removed = true;
        self.moo.clear_slot(seed);
        self.explore.clear_slot(seed);
    }

    fn rebuild_if_due(&mut self, explore: bool) {
        let axis = if explore { &mut self.explore } else { &mut self.moo };
        let threshold = (axis.frontier_live_count() / 4).max(16);
        let is_empty = axis.frontier_live_count() == 0;
        let over_threshold = axis.newly_added_live_count() >= threshold;
        if !is_empty && !over_threshold {
            return;
        }
        let reason = if is_empty { "empty" } else { "newly_added_threshold" };
        if explore {
            // Borrowing these two fields by reference up front, rather than
            // letting the closure capture `self`, leaves `self.explore`
            // free for the simultaneous `&mut` borrow below.
            let novelty = &self.novelty;
            let count_dfg_path = &self.count_dfg_path;
            let objective = |s: &Seed| explore_objectives(s, novelty, count_dfg_path);
            self.explore.rebuild(objective, reason);
        } else {
            self.moo.rebuild(moo_objectives, reason);
        }
    }

    /// Returns the next seed from `mode`'s axis (EXPLORE under
    /// `Mode::Exploration`, MOO otherwise), or `None` if that axis has no
    /// live seeds at all (spec §4.5 "Pop").
    ///
    /// Rule 3 ("if over budget, recycle and retry") fires at most once per
    /// call. A seed recycled this way immediately becomes the sole
    /// candidate for the rebuild its own recycling triggers, so a second
    /// unconditional retry would just recycle-and-rebuild it forever
    /// without ever returning (spec scenario 6 expects the *second* call to
    /// rebuild and then hand the seed back, not loop).
    pub fn next(&mut self, mode: Mode) -> Option<SeedHandle> {
        let explore = matches!(mode, Mode::Exploration);
        let mut retried = false;
        loop {
            self.rebuild_if_due(explore);
            let axis = if explore { &mut self.explore } else { &mut self.moo };
            if axis.frontier_live_count() == 0 {
                return None;
            }
            let candidate = match axis.pop_frontier_head() {
                Some(c) => c,
                None => return None,
            };
            if candidate.borrow().flags.removed {
                continue;
            }
            if !retried && candidate.borrow().selection_count >= self.selection_budget {
                let axis = if explore { &mut self.explore } else { &mut self.moo };
                axis.retire_to_recycled(candidate);
                retried = true;
                continue;
            }
            {
                let mut c = candidate.borrow_mut();
                c.selection_count += 1;
                c.flags.handled_in_cycle = true;
            }
            if explore {
                let dfg = candidate.borrow().dfg_cksum;
                let updated = self.count_dfg_path.get(dfg).copied().unwrap_or(0) + 1;
                self.count_dfg_path.insert(dfg, updated);
            }
            let axis = if explore { &mut self.explore } else { &mut self.moo };
            axis.push_frontier_tail(Rc::clone(&candidate));
            return Some(candidate);
        }
    }
}
