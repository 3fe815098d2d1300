//! Arm registry: creation, family initialization, deactivation and reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Arm, ArmConfig, ArmKey, ArmStore, ArmType, ChannelConfig, Error, Result, ThumbnailStyle,
    DEACTIVATION_PULL_FLOOR,
};

/// Return the registered arm or register a fresh one (neutral prior).
///
/// `config` is only used when the arm is created.
pub(crate) fn get_or_create<S: ArmStore + ?Sized>(
    store: &S,
    key: ArmKey,
    config: ArmConfig,
    history_cap: usize,
    now: DateTime<Utc>,
) -> Result<Arm> {
    if let Some(existing) = store.get(&key)? {
        return Ok(existing);
    }
    store.insert_if_absent(Arm::new(key, config, history_cap, now))
}

/// Register one packaging arm per `format x thumbnail` for the channel's voice
/// profile.
///
/// Idempotent: existing arms are returned as-is.
pub(crate) fn initialize_channel<S: ArmStore + ?Sized>(
    store: &S,
    channel: &str,
    cfg: &ChannelConfig,
    thumbnails: &[ThumbnailStyle],
    history_cap: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Arm>> {
    let mut out = Vec::with_capacity(cfg.formats.len() * thumbnails.len());
    for format in &cfg.formats {
        for thumb in thumbnails {
            let key = ArmKey::new(channel, &cfg.voice_profile, format, &thumb.name)?;
            let config = ArmConfig::packaging(&cfg.voice_profile, format, thumb.clone());
            out.push(get_or_create(store, key, config, history_cap, now)?);
        }
    }
    Ok(out)
}

/// Register every preset of a non-packaging family for `channel`.
///
/// Idempotent. Packaging has no presets and yields nothing.
pub(crate) fn initialize_family<S: ArmStore + ?Sized>(
    store: &S,
    channel: &str,
    arm_type: ArmType,
    history_cap: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Arm>> {
    arm_type
        .presets()
        .into_iter()
        .map(|(variant, config)| {
            let key = ArmKey::typed(channel, arm_type, variant)?;
            get_or_create(store, key, config, history_cap, now)
        })
        .collect()
}

/// Outcome of a deactivation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deactivation {
    Deactivated,
    AlreadyInactive,
}

/// Soft-delete `key`, refusing below `min_pulls` (never less than
/// [`DEACTIVATION_PULL_FLOOR`]).
///
/// The check and the flag flip happen in one store transaction.
pub(crate) fn deactivate<S: ArmStore + ?Sized>(
    store: &S,
    key: &ArmKey,
    min_pulls: u64,
) -> Result<(Deactivation, Arm)> {
    let min_pulls = min_pulls.max(DEACTIVATION_PULL_FLOOR);
    let mut outcome: Result<Deactivation> = Ok(Deactivation::AlreadyInactive);
    let arm = store.modify(key, &mut |arm| {
        outcome = if !arm.is_active() {
            Ok(Deactivation::AlreadyInactive)
        } else if arm.pulls() < min_pulls {
            Err(Error::PrecondViolation {
                key: key.to_string(),
                reason: format!("insufficient pulls ({} < {min_pulls})", arm.pulls()),
            })
        } else {
            arm.deactivate();
            Ok(Deactivation::Deactivated)
        };
    })?;
    Ok((outcome?, arm))
}

/// One row of the arm performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmReport {
    pub key: ArmKey,
    pub arm_name: String,
    pub arm_type: ArmType,
    pub config: ArmConfig,
    pub pulls: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_reward: Option<f64>,
    pub expected_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pull: Option<DateTime<Utc>>,
    pub active: bool,
    pub incidents: u32,
    pub resets: u32,
}

impl From<&Arm> for ArmReport {
    fn from(a: &Arm) -> Self {
        Self {
            key: a.key().clone(),
            arm_name: a.key().to_string(),
            arm_type: a.arm_type(),
            config: a.config().clone(),
            pulls: a.pulls(),
            avg_reward: a.avg_reward(),
            expected_value: a.expected_value(),
            last_pull: a.last_pull(),
            active: a.is_active(),
            incidents: a.incidents(),
            resets: a.resets(),
        }
    }
}

/// All arms of every family (inactive included), best average first;
/// unobserved arms last, ties in key order.
pub(crate) fn report<S: ArmStore + ?Sized>(
    store: &S,
    channel: Option<&str>,
) -> Result<Vec<ArmReport>> {
    let mut rows: Vec<ArmReport> = store.list(channel)?.iter().map(ArmReport::from).collect();
    rows.sort_by(|a, b| {
        let (x, y) = (a.avg_reward.unwrap_or(-1.0), b.avg_reward.unwrap_or(-1.0));
        y.total_cmp(&x).then_with(|| a.key.cmp(&b.key))
    });
    Ok(rows)
}
