//! DFG-path vertical manager: groups seeds by `dfg_cksum` into entries, and
//! arbitrates between horizontal, vertical, and exploration selection
//! (spec §4.4).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, trace};

use crate::containers::{ChainedMap, DynamicSequence};
use crate::mode::Mode;
use crate::seed::SeedHandle;

/// Non-owning, shared-mutable handle to a [`VerticalEntry`]. Mirrors
/// [`SeedHandle`]'s single-threaded `Rc<RefCell<...>>` shape, since entries
/// are exactly as shared and exactly as mutable as the seeds they group.
pub type EntryHandle = Rc<RefCell<VerticalEntry>>;

/// All seeds sharing one DFG-path checksum, plus the bookkeeping the
/// manager needs to budget and retire that path.
#[derive(Debug)]
pub struct VerticalEntry {
    /// The `dfg_cksum` this entry groups.
    pub hash: u32,
    /// Number of times a seed from this entry has been returned by
    /// `select_entry`.
    pub use_count: u32,
    /// Seeds admitted to this entry, in chain order (spec §4.4's
    /// "entry's own sequence"). Index 0 is the current head.
    pub entries: DynamicSequence<SeedHandle>,
    /// Maps a seed's `valuation_hash` to the seed last admitted under it,
    /// so admission can detect "this value combination is new".
    pub value_map: ChainedMap<SeedHandle>,
    /// The seed that created this entry. Captured once, at admission of
    /// the very first seed, and never displaced by later `push_front`
    /// calls — unlike `entries.get(0)`, which can change. `budget()` reads
    /// coverage from here rather than from the current head, since the
    /// budget is meant to track what originally justified tracking this
    /// path, not whichever seed happens to be frontmost today.
    pub founding: Option<SeedHandle>,
}

impl VerticalEntry {
    fn new(hash: u32) -> Self {
        Self {
            hash,
            use_count: 0,
            entries: DynamicSequence::new(),
            value_map: ChainedMap::new(8),
            founding: None,
        }
    }
}

/// Groups seeds by DFG path, budgets each path's selection allowance, and
/// arbitrates the `HORIZONTAL` / `VERTICAL` / `EXPLORATION` mode split.
pub struct VerticalManager {
    path_map: ChainedMap<EntryHandle>,
    /// Entries still within budget, most-recently-touched first.
    active: VecDeque<EntryHandle>,
    /// Entries that have exhausted their budget. Once here, an entry is
    /// never moved back: per `original_source/afl-fuzz.h`'s
    /// `vertical_entry_add`, a later seed arriving for an already-retired
    /// path's `dfg_cksum` still gets recorded against the entry (the map
    /// lookup finds it regardless), but the "splice this entry to the
    /// front of the active chain" step silently no-ops when the entry
    /// isn't found walking the active chain. Reproduced faithfully here
    /// rather than "fixed", since nothing in the spec calls this out as
    /// a bug to correct.
    retired: Vec<EntryHandle>,
    tree: crate::interval_tree::IntervalTree,
    start_time: Instant,
    current_mode: Mode,
    dynamic_mode: bool,
    use_vertical: bool,
    budget_base: u32,
    budget_per_cover: u32,
    alpha: f64,
    p_vertical: f64,
    p_exploration: f64,
    t_warm: Duration,
}

impl VerticalManager {
    /// Builds a manager over `interval_size` quantization buckets, per
    /// `config`.
    pub fn new(config: &crate::config::SchedulerConfig) -> Self {
        Self {
            path_map: ChainedMap::new(64),
            active: VecDeque::new(),
            retired: Vec::new(),
            tree: crate::interval_tree::IntervalTree::new(config.interval_size, config.split_ratio),
            start_time: Instant::now(),
            current_mode: Mode::Horizontal,
            dynamic_mode: config.dynamic_mode,
            use_vertical: config.use_vertical,
            budget_base: config.budget_base,
            budget_per_cover: config.budget_per_cover,
            alpha: config.alpha,
            p_vertical: config.p_vertical,
            p_exploration: config.p_exploration,
            t_warm: config.t_warm,
        }
    }

    fn budget(&self, entry: &VerticalEntry) -> u32 {
        let covered = entry
            .founding
            .as_ref()
            .map(|f| f.borrow().prox_score.covered)
            .unwrap_or(0);
        self.budget_base + covered * self.budget_per_cover
    }

    /// Admits `seed` into the entry for its `dfg_cksum`, creating that
    /// entry on first sight, and records an observation in the interval
    /// tree keyed by the seed's quantized location (spec §4.4 step
    /// "admission").
    pub fn push(&mut self, seed: SeedHandle) {
        let (dfg, valuation, location, original) = {
            let s = seed.borrow();
            (s.dfg_cksum, s.valuation_hash, s.location, s.prox_score.original)
        };

        let entry_handle = match self.path_map.get(dfg) {
            Some(existing) => Rc::clone(existing),
            None => {
                let fresh = Rc::new(RefCell::new(VerticalEntry::new(dfg)));
                self.path_map.insert(dfg, Rc::clone(&fresh));
                fresh
            }
        };

        let (is_first_seed, kvp_is_novel) = {
            let mut entry = entry_handle.borrow_mut();
            let kvp = entry.value_map.get(valuation).cloned();
            let is_first_seed = entry.entries.is_empty();
            let kvp_is_novel = kvp.is_none();

            if is_first_seed {
                entry.founding = Some(Rc::clone(&seed));
                entry.entries.push_back(Rc::clone(&seed));
            } else if kvp_is_novel {
                entry.entries.push_front(Rc::clone(&seed));
            } else {
                entry.entries.push_back(Rc::clone(&seed));
            }
            entry.value_map.insert(valuation, Rc::clone(&seed));
            (is_first_seed, kvp_is_novel)
        };

        if is_first_seed {
            if self.active.is_empty() || kvp_is_novel {
                self.active.push_front(Rc::clone(&entry_handle));
            } else {
                self.active.push_back(entry_handle);
            }
        } else if kvp_is_novel {
            if let Some(pos) = self.active.iter().position(|e| Rc::ptr_eq(e, &entry_handle)) {
                self.active.remove(pos);
                self.active.push_front(entry_handle);
                debug!(target: "dafl_sched::vertical", dfg_cksum = dfg, "spliced entry to active chain head");
            }
        }

        self.tree.insert(location, original);
    }

    /// Drops any removed seed sitting at the front of `entry`'s sequence,
    /// so the head is always either live or absent. A seed is never
    /// un-removed, so this is safe to discard permanently rather than
    /// re-check on every call.
    fn prune_dead_head(entry: &mut VerticalEntry) {
        while let Some(true) = entry.entries.get(0).map(|s| s.borrow().flags.removed) {
            entry.entries.pop_front();
        }
    }

    /// Prunes removed seeds off the front of every active entry, dropping
    /// an entry from the active chain entirely once every seed it held
    /// has been removed. Must run before any head lookup in
    /// [`Self::select_entry`], since a seed marked removed by the Pareto
    /// scheduler shares its handle with the vertical manager and neither
    /// structure clears the other's bookkeeping on its own.
    fn prune_active_chain(&mut self) {
        let mut i = 0;
        while i < self.active.len() {
            let emptied = {
                let mut entry = self.active[i].borrow_mut();
                Self::prune_dead_head(&mut entry);
                entry.entries.is_empty()
            };
            if emptied {
                let removed = self.active.remove(i).unwrap();
                debug!(target: "dafl_sched::vertical", dfg_cksum = removed.borrow().hash, "dropped fully-removed entry from active chain");
            } else {
                i += 1;
            }
        }
    }

    /// Selects a seed via the vertical axis: picks a bucket from the
    /// interval tree, walks the active chain for an entry whose head seed
    /// quantizes to that bucket and is still within budget, falling back
    /// to the active chain's own head on a miss. Retires the chosen entry
    /// once its budget is exhausted (spec §4.4 "select_entry"). Entries
    /// (and individual removed seeds within them) are pruned first, so a
    /// seed flagged `removed` — whether by the Pareto scheduler or
    /// directly — is never handed back out (spec §6 "mark_removed",
    /// §7 P4).
    pub fn select_entry(&mut self) -> Option<SeedHandle> {
        self.prune_active_chain();
        if self.active.is_empty() {
            return None;
        }
        let bucket = self.tree.select(&mut rand::thread_rng());

        let hit = self.active.iter().position(|entry| {
            let e = entry.borrow();
            match e.entries.get(0) {
                Some(head) => head.borrow().location == bucket && e.use_count < self.budget(&e),
                None => false,
            }
        });
        let idx = hit.unwrap_or(0);
        let entry_handle = Rc::clone(&self.active[idx]);

        let head_seed = {
            let mut entry = entry_handle.borrow_mut();
            entry.use_count += 1;
            entry.entries.get(0).cloned()
        };

        let (use_count, budget) = {
            let entry = entry_handle.borrow();
            (entry.use_count, self.budget(&entry))
        };
        if use_count >= budget {
            self.active.remove(idx);
            debug!(
                target: "dafl_sched::vertical",
                dfg_cksum = entry_handle.borrow().hash,
                use_count,
                budget,
                "retired vertical entry"
            );
            let decay = self.alpha.powi(use_count as i32);
            for s in entry_handle.borrow().entries.iter() {
                let mut s = s.borrow_mut();
                s.prox_score.adjusted = s.prox_score.original as f64 * decay;
            }
            self.retired.push(entry_handle);
        }

        head_seed
    }

    /// Decides which mode the scheduler should draw from next, and
    /// remembers the decision for [`Self::get_mode`]. Always `HORIZONTAL`
    /// during warm-up or while the vertical manager is disabled (spec
    /// §4.4 "Mode arbitration").
    pub fn select_mode(&mut self) -> Mode {
        if !self.use_vertical {
            self.current_mode = Mode::Horizontal;
            return Mode::Horizontal;
        }
        if self.start_time.elapsed() < self.t_warm {
            self.current_mode = Mode::Horizontal;
            return Mode::Horizontal;
        }

        let mut p_vertical = self.p_vertical;
        if self.dynamic_mode {
            let total = self.active.len() + self.retired.len();
            let retired_fraction = if total == 0 {
                0.0
            } else {
                self.retired.len() as f64 / total as f64
            };
            p_vertical *= (1.0 - retired_fraction).max(0.0);
        }

        let roll: f64 = rand::thread_rng().gen();
        let mode = if roll < p_vertical {
            Mode::Vertical
        } else if roll < p_vertical + self.p_exploration {
            Mode::Exploration
        } else {
            Mode::Horizontal
        };
        trace!(target: "dafl_sched::vertical", roll, p_vertical, mode = ?mode, "selected mode");
        self.current_mode = mode;
        mode
    }

    /// The mode last decided by [`Self::select_mode`]. Forced to
    /// `HORIZONTAL` whenever the vertical manager is disabled, regardless
    /// of whether `select_mode` has run since (spec §8 P7).
    pub fn get_mode(&self) -> Mode {
        if !self.use_vertical {
            Mode::Horizontal
        } else {
            self.current_mode
        }
    }

    /// Enables or disables the vertical manager. Disabling does not clear
    /// any entry state; it only forces [`Self::get_mode`] to `HORIZONTAL`
    /// and [`Self::select_mode`] to stop rolling dice.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.use_vertical = enabled;
        if !enabled {
            self.current_mode = Mode::Horizontal;
        }
    }

    /// Number of entries still within budget.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of entries that have exhausted their budget.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::seed::{ProxScore, Seed};

    fn seed(id: u64, dfg: u32, valuation: u32, location: u32, covered: u32) -> SeedHandle {
        Seed::new(id, 100, id as u32, dfg, valuation, ProxScore::new(10, covered), location)
            .into_handle()
    }

    #[test]
    fn first_seed_with_empty_active_chain_leads() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        mgr.push(seed(1, 42, 7, 0, 0));
        assert_eq!(mgr.active_count(), 1);
    }

    #[test]
    fn novel_valuation_promotes_entry_to_head() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        mgr.push(seed(1, 1, 1, 0, 0));
        mgr.push(seed(2, 2, 1, 0, 0));
        // Entry 2 is at the head (pushed with empty chain, kvp absent for
        // a fresh entry counts as "novel" too). A novel-valuation seed on
        // entry 1 must bring it back to the head.
        mgr.push(seed(3, 1, 99, 0, 0));
        let first = mgr.select_entry().unwrap();
        assert_eq!(first.borrow().dfg_cksum, 1);
    }

    #[test]
    fn entry_retires_once_budget_exhausted() {
        let mut cfg = SchedulerConfig::default();
        cfg.budget_base = 1;
        cfg.budget_per_cover = 0;
        let mut mgr = VerticalManager::new(&cfg);
        mgr.push(seed(1, 5, 1, 0, 0));
        assert_eq!(mgr.active_count(), 1);
        mgr.select_entry();
        assert_eq!(mgr.active_count(), 0);
        assert_eq!(mgr.retired_count(), 1);
    }

    #[test]
    fn disabling_forces_horizontal_mode_regardless_of_prior_state() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        mgr.set_enabled(false);
        assert_eq!(mgr.get_mode(), Mode::Horizontal);
        assert_eq!(mgr.select_mode(), Mode::Horizontal);
    }

    #[test]
    fn warm_up_forces_horizontal_mode() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        assert_eq!(mgr.select_mode(), Mode::Horizontal);
    }

    #[test]
    fn removed_head_is_pruned_and_never_selected() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        let only = seed(1, 7, 1, 0, 0);
        mgr.push(only.clone());
        only.borrow_mut().flags.removed = true;
        assert!(mgr.select_entry().is_none());
        assert_eq!(mgr.active_count(), 0);
    }

    #[test]
    fn removed_head_falls_through_to_a_live_seed_in_the_same_entry() {
        let cfg = SchedulerConfig::default();
        let mut mgr = VerticalManager::new(&cfg);
        let founder = seed(1, 9, 1, 0, 0);
        mgr.push(founder.clone());
        // A non-novel valuation lands behind the founder, not in front of
        // it, so marking the founder removed leaves this one as the only
        // live candidate at the front after pruning.
        let trailing = seed(2, 9, 1, 0, 0);
        mgr.push(trailing.clone());
        founder.borrow_mut().flags.removed = true;
        let picked = mgr.select_entry().unwrap();
        assert_eq!(picked.borrow().id, trailing.borrow().id);
    }
}
