//! The corpus data model (spec §3): one [`Seed`] per admitted test case.
//!
//! Seeds are owned by an external registry (the fuzzer's upstream queue);
//! the scheduling core only ever holds non-owning, shared-mutable handles
//! into that registry (spec §5). Because scheduling runs on a single
//! cooperative thread (no concurrent callers, ever), `Rc<RefCell<Seed>>` is
//! the idiomatic handle — the single-threaded analogue of the `Arc<...>`
//! page handles `sombra`'s pager hands out.

use std::cell::RefCell;
use std::rc::Rc;

/// Non-owning, shared-mutable handle to a [`Seed`].
pub type SeedHandle = Rc<RefCell<Seed>>;

/// Which of the four per-axis buckets a seed currently sits in.
///
/// A freshly pushed seed starts at `Uninitialized` only in the instant
/// between allocation and the first `push`; every live seed reachable
/// through the scheduler has already moved past it (spec §3 invariants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketStatus {
    /// Not yet observed by this rank axis.
    #[default]
    Uninitialized,
    /// Member of the non-dominated front.
    Frontier,
    /// Dominated by at least one frontier member.
    Dominated,
    /// Awaiting the next rebuild.
    NewlyAdded,
    /// Exhausted its selection budget; awaiting the next rebuild.
    Recycled,
}

/// A seed's position within one rank axis: which bucket, and at what index
/// inside that bucket's [`crate::containers::DynamicSequence`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketInfo {
    /// The bucket this seed currently occupies.
    pub status: BucketStatus,
    /// Index inside that bucket's sequence. Meaningless when
    /// `status == Uninitialized`.
    pub index: usize,
}

/// Proximity score attached to a seed by the execution collaborator.
#[derive(Debug, Clone, Default)]
pub struct ProxScore {
    /// Unadjusted sum of per-node proximity contributions.
    pub original: u64,
    /// Value actually used for MOO ranking; discounted by the vertical
    /// manager as the owning entry's `use_count` grows (spec §4.4).
    pub adjusted: f64,
    /// Number of distinct DFG nodes this seed's execution touched.
    pub covered: u32,
    /// Sparse per-node hit counts: `(dfg_node_index, hit_count)`.
    pub dfg_count_map: Vec<(u32, u32)>,
    /// Dense per-node hit counts, indexed directly by DFG node index.
    pub dfg_dense_map: Vec<u32>,
}

impl ProxScore {
    /// Builds a score with `original` and `adjusted` both set to the same
    /// starting value, as a freshly observed seed has not yet passed
    /// through any vertical entry's decay.
    pub fn new(original: u64, covered: u32) -> Self {
        Self {
            original,
            adjusted: original as f64,
            covered,
            dfg_count_map: Vec::new(),
            dfg_dense_map: Vec::new(),
        }
    }
}

/// Bookkeeping flags attached to a seed (spec §3's flag row). Most of these
/// are caller-supplied and never touched by the scheduler; they are carried
/// so that downstream collaborators (trimming, deterministic-stage
/// skipping, crash triage) can round-trip state through the same seed
/// handle. `handled_in_cycle` is the one exception: the scheduler owns it
/// (spec §5), setting it on every `next()` return and clearing it on the
/// next Pareto rebuild.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedFlags {
    /// At least one mutation stage has run against this seed.
    pub was_fuzzed: bool,
    /// Currently preferred by the favored-seed heuristic upstream.
    pub favored: bool,
    /// Logically removed; never physically freed (spec §3 "Lifecycle").
    pub removed: bool,
    /// Triggers coverage no prior seed reached.
    pub has_new_cov: bool,
    /// Already returned by `next()` since this seed's axis last rebuilt.
    /// Scheduler-owned, unlike the other flags in this struct.
    pub handled_in_cycle: bool,
    /// Derived from a crash-triggering base input.
    pub base_crash_seed: bool,
    /// Input-size trimming has already run on this seed.
    pub trim_done: bool,
    /// Deterministic mutation stages have already run.
    pub passed_det: bool,
    /// Re-execution showed nondeterministic behavior.
    pub var_behavior: bool,
    /// Marked redundant against the minimized file-system corpus.
    pub fs_redundant: bool,
}

/// One mutable record per admitted test case (spec §3).
#[derive(Debug, Clone)]
pub struct Seed {
    /// Monotonically assigned identifier, stable for the seed's lifetime.
    pub id: u64,
    /// Input size in bytes.
    pub length: u32,
    /// Checksum of the execution trace (uniqueness of control-flow).
    pub exec_cksum: u32,
    /// Checksum over the set of reached DFG nodes (the DFG-path hash).
    pub dfg_cksum: u32,
    /// Checksum over the dynamic values observed along the DFG path;
    /// consumed by the vertical manager's per-entry `value_map`.
    pub valuation_hash: u32,
    /// Proximity score.
    pub prox_score: ProxScore,
    /// Quantized location in `[0, B)`, derived from a real in `[0, 1)`.
    pub location: u32,
    /// Current Pareto rank on the MOO axis. `None` means not yet ranked.
    pub rank_moo: Option<i64>,
    /// Current Pareto rank on the EXPLORE axis. `None` means not yet ranked.
    pub rank_explore: Option<i64>,
    /// Number of times this seed has been returned by `next()`.
    pub selection_count: u32,
    /// Number of queue cycles this seed has fallen behind.
    pub handicap: u64,
    /// Path depth at which this seed was discovered.
    pub depth: u64,
    /// Execution time in microseconds.
    pub exec_us: u64,
    /// Caller-supplied bookkeeping flags.
    pub flags: SeedFlags,
    /// Position within the MOO rank axis.
    pub moo_info: BucketInfo,
    /// Position within the EXPLORE rank axis.
    pub explore_info: BucketInfo,
}

impl Seed {
    /// Builds a new seed with every scheduler-owned field at its initial
    /// state. Fields owned by the external registry (`id`, `length`,
    /// checksums, `location`) are supplied by the caller and never mutated
    /// by the scheduler afterward (spec §5).
    pub fn new(
        id: u64,
        length: u32,
        exec_cksum: u32,
        dfg_cksum: u32,
        valuation_hash: u32,
        prox_score: ProxScore,
        location: u32,
    ) -> Self {
        Self {
            id,
            length,
            exec_cksum,
            dfg_cksum,
            valuation_hash,
            prox_score,
            location,
            rank_moo: None,
            rank_explore: None,
            selection_count: 0,
            handicap: 0,
            depth: 0,
            exec_us: 0,
            flags: SeedFlags::default(),
            moo_info: BucketInfo::default(),
            explore_info: BucketInfo::default(),
        }
    }

    /// Builds a seed from a raw source location in `[0, 1)` rather than an
    /// already-quantized bucket, running it through [`crate::quantize`]
    /// with `interval_size` buckets (spec §2 "Quantizer"). For collaborators
    /// that observe locations as reals and have no reason to quantize them
    /// themselves before admission.
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw_location(
        id: u64,
        length: u32,
        exec_cksum: u32,
        dfg_cksum: u32,
        valuation_hash: u32,
        prox_score: ProxScore,
        raw_location: f64,
        interval_size: u32,
    ) -> Self {
        let location = crate::quantize::quantize(raw_location, interval_size);
        Self::new(id, length, exec_cksum, dfg_cksum, valuation_hash, prox_score, location)
    }

    /// Wraps the seed in the shared handle the scheduler expects.
    pub fn into_handle(self) -> SeedHandle {
        Rc::new(RefCell::new(self))
    }
}
