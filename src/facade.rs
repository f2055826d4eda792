//! The externally visible `push`/`next`/`mode` surface (spec §4.6).
//!
//! [`Scheduler`] is the only type most callers ever touch: it owns a
//! [`ParetoScheduler`] and a [`VerticalManager`] and routes each call to
//! whichever one the current [`Mode`] calls for, the way `sombra::GraphDB`
//! is the single entry point fronting its pager, WAL, and index layers.

use std::collections::HashSet;

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::mode::Mode;
use crate::pareto::ParetoScheduler;
use crate::seed::SeedHandle;
use crate::vertical::VerticalManager;

/// The seed-scheduling core: admits seeds, hands them back out for
/// mutation, and arbitrates between the Pareto scheduler and the vertical
/// manager (spec §4.6).
pub struct Scheduler {
    pareto: ParetoScheduler,
    vertical: VerticalManager,
    /// Ids already admitted, so a re-push of the same seed is a silent
    /// no-op (spec §6 `push`, §7 "Duplicate push"). Not one of the
    /// spec-mandated containers (§4.1/§4.2) since this is purely façade
    /// bookkeeping, not a contract either scheduler depends on.
    seen_ids: HashSet<u64>,
}

impl Scheduler {
    /// Builds an empty scheduler from `config`, validating it first
    /// (spec §4.6 "[ADDED] Ambient: configuration").
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pareto: ParetoScheduler::new(&config),
            vertical: VerticalManager::new(&config),
            seen_ids: HashSet::new(),
        })
    }

    /// Admits `seed` into both the Pareto scheduler and the vertical
    /// manager. A re-push of an id already seen is a silent no-op (spec §6,
    /// §7 "Duplicate push").
    pub fn push(&mut self, seed: SeedHandle) {
        let id = seed.borrow().id;
        if !self.seen_ids.insert(id) {
            return;
        }
        self.pareto.push(&seed);
        self.vertical.push(seed);
    }

    /// Returns the next seed to mutate, or `None` if the active axis has no
    /// live seeds (spec §6 `next`).
    ///
    /// First decides the mode via [`VerticalManager::select_mode`]. Under
    /// `Horizontal` or `Exploration` this is just `pareto.next()`; under
    /// `Vertical` it is the vertical manager's current entry, falling back
    /// to `pareto.next()` on a miss (an empty active chain, or every active
    /// entry retiring mid-call) so that enabling the vertical manager never
    /// starves the corpus of work the Pareto axis could still serve.
    pub fn next(&mut self) -> Option<SeedHandle> {
        let mode = self.vertical.select_mode();
        match mode {
            Mode::Vertical => self.vertical.select_entry().or_else(|| self.pareto.next(mode)),
            Mode::Horizontal | Mode::Exploration => self.pareto.next(mode),
        }
    }

    /// Flags `seed` removed in both structures (spec §6 `mark_removed`).
    /// The Pareto scheduler clears the seed out of its current bucket
    /// immediately; the vertical manager shares the same seed handle, so
    /// setting `flags.removed` is instantly visible there too —
    /// [`VerticalManager::select_entry`] prunes removed heads (and drops
    /// any entry left with none) before every selection, so a removed
    /// seed can never be handed back out through either axis.
    pub fn mark_removed(&mut self, seed: &SeedHandle) {
        self.pareto.remove(seed);
    }

    /// The mode the scheduler is currently operating in (spec §6
    /// `get_mode`). Side-effect free: reads back whatever
    /// [`Self::next`]'s last `select_mode()` call decided.
    pub fn get_mode(&self) -> Mode {
        self.vertical.get_mode()
    }

    /// Enables or disables the vertical manager (spec §6
    /// `set_vertical_enabled`). Disabling pins [`Self::get_mode`] to
    /// `Horizontal` forever after, regardless of prior state (spec §8 P7).
    pub fn set_vertical_enabled(&mut self, enabled: bool) {
        self.vertical.set_enabled(enabled);
    }
}
