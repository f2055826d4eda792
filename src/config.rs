//! Tunables for the scheduling core (spec §6).
//!
//! Every constant the distilled specification enumerates — `INTERVAL_SIZE`,
//! `SPLIT_RATIO`, `BUDGET_BASE`, `BUDGET_PER_COVER`, `ALPHA`, `P_VERTICAL`,
//! `P_EXPLORATION`, `T_WARM` — lives here as a field of [`SchedulerConfig`],
//! validated once at construction rather than re-checked on every call, the
//! way `sombra::db::Config` is validated once when a `GraphDB` is opened.

use std::time::Duration;

use crate::error::{Result, SchedError};

/// Construction-time configuration for a [`crate::Scheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// `B`: number of quantization buckets covering `[0, 1)`. Must be a
    /// nonzero power of two.
    pub interval_size: u32,
    /// Sibling score/count ratio imbalance that triggers an interval-tree
    /// node split (spec §4.3). Must be `> 1.0`.
    pub split_ratio: f64,
    /// Flat component of a vertical entry's selection budget.
    pub budget_base: u32,
    /// Per-covered-DFG-node component of a vertical entry's selection
    /// budget: `budget(entry) = budget_base + covered * budget_per_cover`.
    pub budget_per_cover: u32,
    /// Number of times a Pareto frontier seed may be returned by `next()`
    /// before it is recycled (spec §4.5 step 3).
    pub pareto_selection_budget: u32,
    /// Per-use decay applied to a retired vertical entry's proximity score:
    /// `adjusted = original * alpha.powi(use_count)`. Must lie in `(0, 1)`.
    pub alpha: f64,
    /// Probability of entering `VERTICAL` mode once warm-up has elapsed.
    pub p_vertical: f64,
    /// Probability of entering `EXPLORATION` mode once warm-up has
    /// elapsed. `1 - p_vertical - p_exploration` is the `HORIZONTAL`
    /// probability.
    pub p_exploration: f64,
    /// Wall-clock warm-up duration during which mode arbitration always
    /// returns `HORIZONTAL`.
    pub t_warm: Duration,
    /// When set, `p_vertical` is scaled down as the fraction of retired
    /// vertical entries grows (spec §4.4 "Mode arbitration").
    pub dynamic_mode: bool,
    /// Initial state of the vertical manager's enable flag; can be changed
    /// later via [`crate::Scheduler::set_vertical_enabled`].
    pub use_vertical: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_size: 1024,
            split_ratio: 1.5,
            budget_base: 4,
            budget_per_cover: 1,
            pareto_selection_budget: 1,
            alpha: 0.9,
            p_vertical: 0.6,
            p_exploration: 0.2,
            t_warm: Duration::from_secs(30),
            dynamic_mode: true,
            use_vertical: true,
        }
    }
}

impl SchedulerConfig {
    /// A configuration with the vertical manager disabled from the start,
    /// for A/B comparison against the pure Pareto scheduler.
    pub fn horizontal_only() -> Self {
        Self {
            use_vertical: false,
            ..Self::default()
        }
    }

    /// Validates the configuration, matching the constraints documented on
    /// each field and in spec §6.
    pub fn validate(&self) -> Result<()> {
        if self.interval_size == 0 || !self.interval_size.is_power_of_two() {
            return Err(SchedError::IntervalSizeNotPowerOfTwo(self.interval_size));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SchedError::AlphaOutOfRange(self.alpha));
        }
        if self.split_ratio <= 1.0 {
            return Err(SchedError::SplitRatioTooSmall(self.split_ratio));
        }
        if self.p_vertical + self.p_exploration > 1.0 {
            return Err(SchedError::ModeProbabilitiesOverflow(
                self.p_vertical + self.p_exploration,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        SchedulerConfig::default().validate().expect("default config is valid");
    }

    #[test]
    fn rejects_non_power_of_two_interval_size() {
        let cfg = SchedulerConfig {
            interval_size: 1000,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(SchedError::IntervalSizeNotPowerOfTwo(1000))
        );
    }

    #[test]
    fn rejects_alpha_out_of_range() {
        let cfg = SchedulerConfig {
            alpha: 1.0,
            ..SchedulerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_overflowing_mode_probabilities() {
        let cfg = SchedulerConfig {
            p_vertical: 0.7,
            p_exploration: 0.5,
            ..SchedulerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
