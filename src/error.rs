//! Error types for the scheduling core.
//!
//! Per the scheduling core's error model, the hot path (`push`/`next`/
//! `mark_removed`) never returns a [`Result`]: exhaustion is `None`,
//! duplicate pushes are silent no-ops, and an out-of-range quantized
//! location is a dropped observation. The only fallible boundary is
//! configuration validation at construction time.

use thiserror::Error;

/// Errors surfaced while constructing a [`crate::Scheduler`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedError {
    /// `interval_size` must be a nonzero power of two.
    #[error("interval_size must be a nonzero power of two, got {0}")]
    IntervalSizeNotPowerOfTwo(u32),
    /// `alpha` (the per-use proximity decay) must lie in `(0.0, 1.0)`.
    #[error("alpha must lie in (0.0, 1.0), got {0}")]
    AlphaOutOfRange(f64),
    /// `split_ratio` must exceed 1.0, otherwise every insert would split.
    #[error("split_ratio must be > 1.0, got {0}")]
    SplitRatioTooSmall(f64),
    /// `p_vertical + p_exploration` must not exceed 1.0 (the remainder is
    /// the horizontal probability).
    #[error("p_vertical + p_exploration must be <= 1.0, got {0}")]
    ModeProbabilitiesOverflow(f64),
}

/// Result alias used only at the configuration boundary.
pub type Result<T> = std::result::Result<T, SchedError>;
