//! Thompson sampling over a channel's active arms.
//!
//! Each arm's running mean and pull count define a Beta posterior:
//! `alpha = avg * pulls + 1`, `beta = (1 - avg) * pulls + 1`. One draw per arm,
//! highest draw wins. Heavily-pulled arms concentrate near their mean; arms with
//! few pulls draw from a wide posterior and keep winning occasionally.
//!
//! Notes:
//! - The RNG is caller-owned and seedable, so selection is reproducible in tests.
//! - Exact ties go to the arm with fewer pulls, then to the smaller key.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand_distr::{Beta, Distribution};

use crate::{Arm, ArmType, BanditConfig, Candidate, Decision, DecisionNote, Error, Result};

/// Draw from `Beta(alpha, beta)`.
///
/// Invalid shapes (non-finite or non-positive) fall back to the prior mean 0.5.
pub fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    if !(alpha.is_finite() && beta.is_finite()) || alpha <= 0.0 || beta <= 0.0 {
        return 0.5;
    }
    match Beta::new(alpha, beta) {
        Ok(dist) => dist.sample(rng),
        Err(_) => 0.5,
    }
}

/// Whether `a` beats `b`: higher sample, then fewer pulls, then smaller key.
fn outranks(a: &Candidate, b: &Candidate) -> bool {
    if a.sampled_value != b.sampled_value {
        return a.sampled_value > b.sampled_value;
    }
    if a.pulls != b.pulls {
        return a.pulls < b.pulls;
    }
    a.key < b.key
}

fn in_incident_window(arm: &Arm, window: Duration, now: DateTime<Utc>) -> bool {
    arm.last_incident()
        .is_some_and(|at| at <= now && now - at < window)
}

/// Choose one of `channel`'s active arms of `arm_type`.
///
/// `arms` may contain arms of other channels, other types or inactive arms;
/// all are skipped.
pub(crate) fn select_from<R: Rng + ?Sized>(
    channel: &str,
    arm_type: ArmType,
    arms: &[Arm],
    rng: &mut R,
    cfg: &BanditConfig,
    now: DateTime<Utc>,
) -> Result<Decision> {
    let mut eligible: Vec<&Arm> = arms
        .iter()
        .filter(|a| a.is_active() && a.arm_type() == arm_type && a.key().channel == channel)
        .collect();
    if eligible.is_empty() {
        return Err(Error::NoArmsAvailable {
            channel: channel.to_string(),
            arm_type,
        });
    }
    eligible.sort_by(|a, b| a.key().cmp(b.key()));

    let window = Duration::days(i64::from(cfg.incident_window_days));
    let mut downweighted = Vec::new();
    let mut candidates = Vec::with_capacity(eligible.len());
    for arm in &eligible {
        let (alpha, beta) = (arm.alpha(), arm.beta());
        let mut x = sample_beta(rng, alpha, beta);
        if in_incident_window(arm, window, now) {
            x *= cfg.incident_sample_weight;
            downweighted.push(arm.key().clone());
        }
        candidates.push(Candidate {
            key: arm.key().clone(),
            pulls: arm.pulls(),
            avg_reward: arm.avg_or_prior(),
            alpha,
            beta,
            sampled_value: x,
        });
    }

    let mut best = 0usize;
    for (i, c) in candidates.iter().enumerate().skip(1) {
        if outranks(c, &candidates[best]) {
            best = i;
        }
    }
    let winner = candidates[best].clone();

    let mut notes = vec![DecisionNote::SampledPosteriorMax];
    let tied_with: Vec<_> = candidates
        .iter()
        .enumerate()
        .filter(|(i, c)| *i != best && c.sampled_value == winner.sampled_value)
        .map(|(_, c)| c.key.clone())
        .collect();
    if !tied_with.is_empty() {
        notes.push(DecisionNote::TieBroken { tied_with });
    }
    if !downweighted.is_empty() {
        notes.push(DecisionNote::IncidentDownweighted {
            arms: downweighted,
            weight: cfg.incident_sample_weight,
        });
    }

    let exploring = candidates
        .iter()
        .filter(|c| c.pulls < cfg.exploration_pull_floor)
        .count();
    let exploration_rate = exploring as f64 / candidates.len() as f64;

    Ok(Decision {
        channel: channel.to_string(),
        arm_type,
        chosen: winner.key,
        config: eligible[best].config().clone(),
        sampled_value: winner.sampled_value,
        candidates,
        exploration_rate,
        notes,
        at: now,
    })
}
