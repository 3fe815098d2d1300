//! Arm identity and per-arm posterior state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::{ArmConfig, ArmType, Error};

/// Average reward assumed for an arm that has never been observed.
pub const NEUTRAL_PRIOR: f64 = 0.5;

const KEY_SEP: &str = "__";

/// Composite arm identity.
///
/// Packaging arms are `(channel, voice, format, thumbnail)`; the three packaging
/// parts are joined into `variant`. Arms of the other families are
/// `(channel, arm_type, variant)`. Ordering is lexicographic over the fields;
/// the selector uses it as the final deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArmKey {
    pub channel: String,
    pub arm_type: ArmType,
    pub variant: String,
}

fn valid_part(p: &str) -> bool {
    !p.is_empty() && !p.contains(KEY_SEP)
}

impl ArmKey {
    /// Packaging key, rejecting empty parts and parts containing the `__` separator.
    pub fn new(
        channel: impl Into<String>,
        voice: impl Into<String>,
        format: impl Into<String>,
        thumbnail: impl Into<String>,
    ) -> Result<Self, Error> {
        let (channel, voice, format, thumbnail) =
            (channel.into(), voice.into(), format.into(), thumbnail.into());
        let key = Self {
            variant: format!("{voice}{KEY_SEP}{format}{KEY_SEP}{thumbnail}"),
            channel,
            arm_type: ArmType::Packaging,
        };
        if ![&key.channel, &voice, &format, &thumbnail].iter().all(|p| valid_part(p)) {
            return Err(Error::InvalidArmKey(key.to_string()));
        }
        Ok(key)
    }

    /// Key of a preset-family arm. Packaging keys go through [`ArmKey::new`].
    pub fn typed(
        channel: impl Into<String>,
        arm_type: ArmType,
        variant: impl Into<String>,
    ) -> Result<Self, Error> {
        let key = Self {
            channel: channel.into(),
            arm_type,
            variant: variant.into(),
        };
        let parts_ok = valid_part(&key.channel) && valid_part(&key.variant);
        if arm_type == ArmType::Packaging || !parts_ok {
            return Err(Error::InvalidArmKey(key.to_string()));
        }
        Ok(key)
    }

    /// `(voice, format, thumbnail)` of a packaging key.
    pub fn packaging_parts(&self) -> Option<(&str, &str, &str)> {
        if self.arm_type != ArmType::Packaging {
            return None;
        }
        let mut it = self.variant.splitn(3, KEY_SEP);
        match (it.next(), it.next(), it.next()) {
            (Some(v), Some(f), Some(t)) => Some((v, f, t)),
            _ => None,
        }
    }

    pub fn voice(&self) -> Option<&str> {
        self.packaging_parts().map(|(v, _, _)| v)
    }

    pub fn format(&self) -> Option<&str> {
        self.packaging_parts().map(|(_, f, _)| f)
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.packaging_parts().map(|(_, _, t)| t)
    }
}

impl fmt::Display for ArmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.arm_type {
            ArmType::Packaging => write!(f, "{}{KEY_SEP}{}", self.channel, self.variant),
            t => write!(f, "{}{KEY_SEP}{t}{KEY_SEP}{}", self.channel, self.variant),
        }
    }
}

impl FromStr for ArmKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidArmKey(s.to_string());
        let parts: Vec<&str> = s.split(KEY_SEP).collect();
        match parts.as_slice() {
            [c, v, f, t] => ArmKey::new(*c, *v, *f, *t).map_err(|_| invalid()),
            [c, ty, variant] => {
                let arm_type: ArmType = ty.parse().map_err(|_| invalid())?;
                ArmKey::typed(*c, arm_type, *variant).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

/// Bounded FIFO of the most recent normalized rewards (oldest first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardHistory {
    cap: usize,
    buf: VecDeque<f64>,
}

impl RewardHistory {
    /// Create an empty history retaining at most `cap` rewards (minimum 1).
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            buf: VecDeque::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.buf.iter().copied()
    }

    pub(crate) fn push(&mut self, r: f64) {
        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(r);
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    /// Mean of the newest `n` rewards, or `None` if fewer are retained.
    pub fn mean_newest(&self, n: usize) -> Option<f64> {
        if n == 0 || self.buf.len() < n {
            return None;
        }
        let sum: f64 = self.buf.iter().rev().take(n).sum();
        Some(sum / n as f64)
    }

    /// Mean of the `n` rewards that precede the newest `skip`, or `None` if the
    /// history does not reach that far back.
    pub fn mean_before(&self, skip: usize, n: usize) -> Option<f64> {
        if n == 0 || self.buf.len() < skip + n {
            return None;
        }
        let sum: f64 = self.buf.iter().rev().skip(skip).take(n).sum();
        Some(sum / n as f64)
    }
}

/// One bandit arm: identity plus the statistics its Beta posterior is built from.
///
/// There are no public mutators. State only changes through observed rewards,
/// retraining resets, incidents and deactivation, all driven by
/// [`crate::PackagingBandit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    key: ArmKey,
    config: ArmConfig,
    pulls: u64,
    avg_reward: Option<f64>,
    last_pull: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    active: bool,
    history: RewardHistory,
    incidents: u32,
    last_incident: Option<DateTime<Utc>>,
    resets: u32,
}

impl Arm {
    pub(crate) fn new(
        key: ArmKey,
        config: ArmConfig,
        history_cap: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            config,
            pulls: 0,
            avg_reward: None,
            last_pull: None,
            created_at: now,
            active: true,
            history: RewardHistory::new(history_cap),
            incidents: 0,
            last_incident: None,
            resets: 0,
        }
    }

    pub fn key(&self) -> &ArmKey {
        &self.key
    }

    /// What production should use when this arm is chosen.
    pub fn config(&self) -> &ArmConfig {
        &self.config
    }

    pub fn arm_type(&self) -> ArmType {
        self.key.arm_type
    }

    pub fn pulls(&self) -> u64 {
        self.pulls
    }

    /// Running mean of normalized rewards; `None` until the first observation.
    pub fn avg_reward(&self) -> Option<f64> {
        self.avg_reward
    }

    /// Average reward with the neutral prior substituted when undefined.
    pub fn avg_or_prior(&self) -> f64 {
        self.avg_reward.unwrap_or(NEUTRAL_PRIOR)
    }

    pub fn last_pull(&self) -> Option<DateTime<Utc>> {
        self.last_pull
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn history(&self) -> &RewardHistory {
        &self.history
    }

    pub fn incidents(&self) -> u32 {
        self.incidents
    }

    pub fn last_incident(&self) -> Option<DateTime<Utc>> {
        self.last_incident
    }

    /// Number of retraining resets applied to this arm.
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Beta `alpha` shape: `avg * pulls + 1`.
    pub fn alpha(&self) -> f64 {
        self.avg_or_prior() * self.pulls as f64 + 1.0
    }

    /// Beta `beta` shape: `(1 - avg) * pulls + 1`.
    pub fn beta(&self) -> f64 {
        (1.0 - self.avg_or_prior()) * self.pulls as f64 + 1.0
    }

    /// Posterior mean `alpha / (alpha + beta)`.
    pub fn expected_value(&self) -> f64 {
        let (a, b) = (self.alpha(), self.beta());
        let denom = a + b;
        if denom <= 0.0 {
            NEUTRAL_PRIOR
        } else {
            a / denom
        }
    }

    /// Fold one normalized reward into the running mean.
    pub(crate) fn observe(&mut self, reward01: f64, now: DateTime<Utc>) {
        let prev = self.avg_or_prior();
        self.pulls = self.pulls.saturating_add(1);
        self.avg_reward = Some(prev + (reward01 - prev) / self.pulls as f64);
        self.last_pull = Some(now);
        self.history.push(reward01);
    }

    /// Back to the neutral prior. `last_pull`, incident counters and the active
    /// flag survive.
    pub(crate) fn reset(&mut self) {
        self.pulls = 0;
        self.avg_reward = None;
        self.history.clear();
        self.resets = self.resets.saturating_add(1);
    }

    /// Count a compliance incident as one zero-reward pull.
    ///
    /// `alpha` is unchanged and `beta` grows by one, so the arm's posterior only
    /// moves down. The drift history and `last_pull` are left alone: no video
    /// was published.
    pub(crate) fn note_incident(&mut self, at: DateTime<Utc>) {
        let prev = self.avg_or_prior();
        self.pulls = self.pulls.saturating_add(1);
        self.avg_reward = Some(prev - prev / self.pulls as f64);
        self.incidents = self.incidents.saturating_add(1);
        self.last_incident = Some(match self.last_incident {
            Some(prev) if prev > at => prev,
            _ => at,
        });
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }
}
