//! The operating mode the vertical manager arbitrates between (spec §4.4).

/// Which rank axis / selection strategy `next()` should draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Draw from the Pareto scheduler's MOO axis (the default, and the
    /// only mode reachable when the vertical manager is disabled).
    #[default]
    Horizontal,
    /// Draw from the current vertical entry.
    Vertical,
    /// Draw from the Pareto scheduler's EXPLORE axis.
    Exploration,
}
