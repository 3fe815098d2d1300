//! Reward updates and retraining triggers.
//!
//! Triggers reset an arm to the neutral prior; they never deactivate it.
//! Deactivation is a separate, pull-gated decision ([`deactivation_due`]).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Arm, ArmKey, BanditConfig, DriftConfig, RetrainTrigger, DEACTIVATION_PULL_FLOOR};

/// Relative change of the recent mean versus the baseline mean, if enough
/// history exists and the baseline is nonzero.
///
/// Negative values are regressions.
pub fn drift_pct_change(arm: &Arm, cfg: &DriftConfig) -> Option<f64> {
    let h = arm.history();
    let recent = h.mean_newest(cfg.n_recent)?;
    let baseline = h.mean_before(cfg.n_recent, cfg.n_baseline)?;
    if baseline == 0.0 {
        return None;
    }
    Some((recent - baseline) / baseline.abs())
}

/// Recent mean more than `threshold` below the baseline mean.
pub fn drift_detected(arm: &Arm, cfg: &DriftConfig) -> bool {
    drift_pct_change(arm, cfg).is_some_and(|pct| pct < -cfg.threshold)
}

/// Active, pulled at least once, and untouched for `staleness_days` or more.
pub fn is_stale(arm: &Arm, staleness_days: u32, now: DateTime<Utc>) -> bool {
    if !arm.is_active() || arm.pulls() == 0 {
        return false;
    }
    arm.last_pull()
        .is_some_and(|t| now - t >= Duration::days(i64::from(staleness_days)))
}

/// Active arm past the pull floor whose average fell below the low threshold.
///
/// The floor is never lower than [`DEACTIVATION_PULL_FLOOR`], even for a
/// config that skipped validation.
pub fn deactivation_due(arm: &Arm, cfg: &BanditConfig) -> bool {
    arm.is_active()
        && arm.pulls() >= cfg.min_pulls_for_deactivation.max(DEACTIVATION_PULL_FLOOR)
        && arm
            .avg_reward()
            .is_some_and(|avg| avg < cfg.low_reward_threshold)
}

/// What `apply_reward` did to the arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub key: ArmKey,
    /// Pull count right after the reward was folded in (before any reset).
    pub pulls: u64,
    /// Running mean right after the reward was folded in (before any reset).
    pub avg_reward: f64,
    pub normalized_reward: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset: Option<RetrainTrigger>,
    pub deactivated: bool,
}

/// Housekeeping performed by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub stale_resets: Vec<ArmKey>,
    pub deactivated: Vec<ArmKey>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.stale_resets.is_empty() && self.deactivated.is_empty()
    }
}
