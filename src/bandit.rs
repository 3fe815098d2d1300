//! Stateful bandit session: the front door for production and analytics jobs.
//!
//! [`PackagingBandit`] owns the arm store, the selector RNG and the audit log,
//! and exposes the full lifecycle:
//!
//! ```text
//! let d = bandit.select_arm("rich_tech")?;          // before producing a video
//! produce(&d.chosen);                               // your code
//! bandit.apply_observation(&video, &sample, p)?;    // once analytics return
//! bandit.sweep(Utc::now())?;                        // nightly housekeeping
//! ```
//!
//! Packaging arms are selected with [`PackagingBandit::select_arm`]; the preset
//! families (titles, hooks, Shorts layout, voice parameters, posting slots)
//! with [`PackagingBandit::select_arm_by_type`].
//!
//! There is no way to set an arm's score directly. Outcomes change only through
//! observed rewards, incidents and the pull-gated [`PackagingBandit::deactivate`].
//!
//! All methods take `&self`; the bandit can be shared across threads behind an
//! `Arc`. Per-arm read-modify-write goes through [`ArmStore::modify`].

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::registry::{self, Deactivation};
use crate::retrain::{deactivation_due, drift_detected, is_stale};
use crate::thompson::select_from;
use crate::{
    score_sample, AnalyticsSample, ApplyReport, Arm, ArmConfig, ArmKey, ArmReport, ArmStore,
    ArmType, AuditEntry, AuditEvent, BanditConfig, ChannelsConfig, Decision, DecisionLog, Error,
    MemoryStore, MetricsWindow, Result, RetrainTrigger, RewardBounds, RewardBreakdown,
    RewardProfile, SweepReport,
};

/// A produced video and the arm that packaged it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub video_id: String,
    pub arm: ArmKey,
}

/// `(video, arm family, window)` whose reward has been applied.
///
/// A video is attributed to at most one arm per family, so each family's arm
/// receives each window once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppliedWindow {
    pub video_id: String,
    #[serde(default)]
    pub arm_type: ArmType,
    pub window: MetricsWindow,
}

/// Result of [`PackagingBandit::apply_observation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied {
        reward: RewardBreakdown,
        report: ApplyReport,
    },
    /// This video's window was already applied; the arm was not touched.
    Duplicate,
}

/// Serializable state of a [`PackagingBandit`].
///
/// The RNG stream is not captured; a restored bandit reseeds from `config.seed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanditSnapshot {
    /// `reelmux` version that wrote the snapshot.
    #[serde(default)]
    pub version: String,
    pub config: BanditConfig,
    pub channels: ChannelsConfig,
    pub arms: Vec<Arm>,
    pub applied: Vec<AppliedWindow>,
    pub decisions: Vec<AuditEntry>,
}

/// Thompson-sampling bandit over video packaging arms.
#[derive(Debug)]
pub struct PackagingBandit<S: ArmStore = MemoryStore> {
    store: S,
    cfg: BanditConfig,
    channels: ChannelsConfig,
    rng: Mutex<StdRng>,
    log: Mutex<DecisionLog>,
    applied: Mutex<BTreeSet<AppliedWindow>>,
}

impl PackagingBandit<MemoryStore> {
    /// In-memory bandit.
    pub fn new(cfg: BanditConfig) -> Result<Self> {
        Self::with_store(MemoryStore::new(), cfg)
    }

    /// Rebuild an in-memory bandit from a snapshot.
    pub fn from_snapshot(snap: BanditSnapshot) -> Result<Self> {
        let bandit = Self::with_store(MemoryStore::from_arms(snap.arms), snap.config)?
            .with_channels(snap.channels);
        {
            let mut log = bandit.log.lock()?;
            for e in snap.decisions {
                log.push(e.at, e.event);
            }
        }
        bandit.applied.lock()?.extend(snap.applied);
        Ok(bandit)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_snapshot(serde_json::from_str(&raw)?)
    }
}

impl<S: ArmStore> PackagingBandit<S> {
    /// Bandit over a caller-provided store. Fails if `cfg` does not validate.
    pub fn with_store(store: S, cfg: BanditConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            store,
            rng: Mutex::new(StdRng::seed_from_u64(cfg.seed)),
            log: Mutex::new(DecisionLog::new(cfg.decision_log_cap)),
            applied: Mutex::new(BTreeSet::new()),
            channels: ChannelsConfig::default(),
            cfg,
        })
    }

    /// Channel definitions used by [`Self::initialize_channel`].
    pub fn with_channels(mut self, channels: ChannelsConfig) -> Self {
        self.channels = channels;
        self
    }

    pub fn config(&self) -> &BanditConfig {
        &self.cfg
    }

    pub fn channels(&self) -> &ChannelsConfig {
        &self.channels
    }

    fn audit(&self, at: DateTime<Utc>, event: AuditEvent) -> Result<()> {
        self.log.lock()?.push(at, event);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Existing packaging arm for the combination, or a new one at the neutral
    /// prior. The thumbnail config comes from the channels config.
    pub fn get_or_create(
        &self,
        channel: &str,
        voice: &str,
        format: &str,
        thumbnail: &str,
    ) -> Result<Arm> {
        let key = ArmKey::new(channel, voice, format, thumbnail)?;
        let config = ArmConfig::packaging(voice, format, self.channels.thumbnail(thumbnail));
        let cap = self.cfg.drift.history_cap();
        registry::get_or_create(&self.store, key, config, cap, Utc::now())
    }

    pub fn get(&self, key: &ArmKey) -> Result<Option<Arm>> {
        self.store.get(key)
    }

    /// Register every format x thumbnail arm for `channel` (idempotent).
    ///
    /// Channels missing from the channels config use [`crate::ChannelConfig::default`].
    pub fn initialize_channel(&self, channel: &str) -> Result<Vec<Arm>> {
        let ch = self.channels.channel(channel);
        let arms = registry::initialize_channel(
            &self.store,
            channel,
            &ch,
            &self.channels.thumbnail_styles,
            self.cfg.drift.history_cap(),
            Utc::now(),
        )?;
        debug!(channel, arms = arms.len(), "initialized channel arms");
        Ok(arms)
    }

    /// Register every arm of `arm_type` for `channel` (idempotent). Packaging
    /// delegates to [`Self::initialize_channel`].
    pub fn initialize_family(&self, channel: &str, arm_type: ArmType) -> Result<Vec<Arm>> {
        if arm_type == ArmType::Packaging {
            return self.initialize_channel(channel);
        }
        let cap = self.cfg.drift.history_cap();
        let arms = registry::initialize_family(&self.store, channel, arm_type, cap, Utc::now())?;
        debug!(channel, %arm_type, arms = arms.len(), "initialized arm family");
        Ok(arms)
    }

    /// Soft-delete an arm. Rejected with [`Error::PrecondViolation`] below
    /// `min_pulls_for_deactivation`; a no-op on an already inactive arm.
    pub fn deactivate(&self, key: &ArmKey) -> Result<Arm> {
        let (outcome, arm) =
            registry::deactivate(&self.store, key, self.cfg.min_pulls_for_deactivation)?;
        if outcome == Deactivation::Deactivated {
            info!(
                arm = %key,
                pulls = arm.pulls(),
                avg_reward = arm.avg_or_prior(),
                "arm deactivated"
            );
            self.audit(
                Utc::now(),
                AuditEvent::Deactivated {
                    key: key.clone(),
                    pulls: arm.pulls(),
                    avg_reward: arm.avg_or_prior(),
                    automatic: false,
                },
            )?;
        }
        Ok(arm)
    }

    /// Performance report over every family, best average first. Inactive arms
    /// are included.
    pub fn report(&self, channel: Option<&str>) -> Result<Vec<ArmReport>> {
        registry::report(&self.store, channel)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Thompson-sample `channel`'s active packaging arms and return the decision.
    pub fn select_arm(&self, channel: &str) -> Result<Decision> {
        self.select_arm_at(channel, Utc::now())
    }

    /// [`Self::select_arm`] with an explicit clock (incident windows are
    /// evaluated against `now`).
    pub fn select_arm_at(&self, channel: &str, now: DateTime<Utc>) -> Result<Decision> {
        self.select_inner(channel, ArmType::Packaging, now)
    }

    /// Thompson-sample `channel`'s active arms of one family.
    ///
    /// Preset families are registered on first use; packaging arms must
    /// already exist, as for [`Self::select_arm`].
    pub fn select_arm_by_type(&self, channel: &str, arm_type: ArmType) -> Result<Decision> {
        self.select_arm_by_type_at(channel, arm_type, Utc::now())
    }

    pub fn select_arm_by_type_at(
        &self,
        channel: &str,
        arm_type: ArmType,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        if arm_type != ArmType::Packaging {
            let known = self.store.list(Some(channel))?;
            if !known.iter().any(|a| a.arm_type() == arm_type) {
                self.initialize_family(channel, arm_type)?;
            }
        }
        self.select_inner(channel, arm_type, now)
    }

    fn select_inner(
        &self,
        channel: &str,
        arm_type: ArmType,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let arms = self.store.list(Some(channel))?;
        let decision = {
            let mut rng = self.rng.lock()?;
            select_from(channel, arm_type, &arms, &mut *rng, &self.cfg, now)?
        };
        debug!(
            channel,
            %arm_type,
            arm = %decision.chosen,
            sampled_value = decision.sampled_value,
            candidates = decision.total_candidates(),
            exploration_rate = decision.exploration_rate,
            "arm selected"
        );
        self.audit(now, AuditEvent::Selected(decision.clone()))?;
        Ok(decision)
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Fold a normalized reward into the arm and evaluate retraining triggers.
    pub fn apply_reward(&self, key: &ArmKey, normalized_reward: f64) -> Result<ApplyReport> {
        self.apply_reward_at(key, normalized_reward, Utc::now())
    }

    pub fn apply_reward_at(
        &self,
        key: &ArmKey,
        normalized_reward: f64,
        now: DateTime<Utc>,
    ) -> Result<ApplyReport> {
        self.apply_inner(key, normalized_reward, None, None, now)
    }

    fn apply_inner(
        &self,
        key: &ArmKey,
        normalized_reward: f64,
        raw: Option<f64>,
        video_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApplyReport> {
        if !normalized_reward.is_finite() {
            return Err(Error::InvalidSample(format!(
                "reward is not finite ({normalized_reward})"
            )));
        }
        let r = normalized_reward.clamp(0.0, 1.0);
        let cfg = &self.cfg;

        let mut report = None;
        self.store.modify(key, &mut |arm| {
            arm.observe(r, now);
            let (pulls, avg_reward) = (arm.pulls(), arm.avg_or_prior());
            let mut reset = None;
            let mut deactivated = false;
            if drift_detected(arm, &cfg.drift) {
                arm.reset();
                reset = Some(RetrainTrigger::PerformanceDrift);
            } else if cfg.auto_deactivate && deactivation_due(arm, cfg) {
                arm.deactivate();
                deactivated = true;
            }
            report = Some(ApplyReport {
                key: key.clone(),
                pulls,
                avg_reward,
                normalized_reward: r,
                reset,
                deactivated,
            });
        })?;
        let report = report.ok_or_else(|| Error::UnknownArm(key.to_string()))?;

        info!(
            arm = %key,
            reward = r,
            pulls = report.pulls,
            avg_reward = report.avg_reward,
            "reward applied"
        );
        self.audit(
            now,
            AuditEvent::RewardApplied {
                key: key.clone(),
                video_id: video_id.map(str::to_string),
                raw,
                normalized: r,
                pulls: report.pulls,
                avg_reward: report.avg_reward,
            },
        )?;
        if let Some(trigger) = report.reset {
            info!(arm = %key, ?trigger, pulls_before = report.pulls, "arm reset to prior");
            self.audit(
                now,
                AuditEvent::Reset {
                    key: key.clone(),
                    trigger,
                    pulls_before: report.pulls,
                },
            )?;
        }
        if report.deactivated {
            info!(
                arm = %key,
                pulls = report.pulls,
                avg_reward = report.avg_reward,
                "arm auto-deactivated"
            );
            self.audit(
                now,
                AuditEvent::Deactivated {
                    key: key.clone(),
                    pulls: report.pulls,
                    avg_reward: report.avg_reward,
                    automatic: true,
                },
            )?;
        }
        Ok(report)
    }

    /// Score one analytics window for a video and apply it to the video's arm,
    /// at most once per `(video, arm family, window)`.
    pub fn apply_observation(
        &self,
        video: &VideoRef,
        sample: &AnalyticsSample,
        profile: RewardProfile,
    ) -> Result<ApplyOutcome> {
        self.apply_observation_at(video, sample, profile, Utc::now())
    }

    pub fn apply_observation_at(
        &self,
        video: &VideoRef,
        sample: &AnalyticsSample,
        profile: RewardProfile,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome> {
        let slot = AppliedWindow {
            video_id: video.video_id.clone(),
            arm_type: video.arm.arm_type,
            window: sample.window,
        };
        // Held across the update so a concurrent duplicate cannot slip through.
        let mut applied = self.applied.lock()?;
        if applied.contains(&slot) {
            debug!(video = %video.video_id, window = ?sample.window, "window already applied");
            return Ok(ApplyOutcome::Duplicate);
        }
        let bounds = match profile {
            RewardProfile::LongForm => self.cfg.reward_bounds,
            RewardProfile::Shorts => RewardBounds::SHORTS,
        };
        let reward = score_sample(sample, profile, bounds)?;
        let report = self.apply_inner(
            &video.arm,
            reward.normalized,
            Some(reward.raw),
            Some(&video.video_id),
            now,
        )?;
        applied.insert(slot);
        Ok(ApplyOutcome::Applied { reward, report })
    }

    // -----------------------------------------------------------------------
    // Retraining
    // -----------------------------------------------------------------------

    /// Record a copyright/compliance incident against an arm.
    ///
    /// The incident counts as one zero-reward pull, which can only lower the
    /// arm's posterior, and its samples are down-weighted for
    /// `incident_window_days` so incident-free arms are preferred meanwhile.
    /// The arm may be deactivated on the spot if the penalty pushes it under
    /// the low-reward threshold.
    pub fn record_incident(&self, key: &ArmKey, video_id: Option<&str>) -> Result<Arm> {
        self.record_incident_at(key, video_id, Utc::now())
    }

    pub fn record_incident_at(
        &self,
        key: &ArmKey,
        video_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Arm> {
        let cfg = &self.cfg;
        let mut deactivated = false;
        let arm = self.store.modify(key, &mut |arm| {
            arm.note_incident(at);
            deactivated = cfg.auto_deactivate && deactivation_due(arm, cfg);
            if deactivated {
                arm.deactivate();
            }
        })?;
        let (pulls, avg_reward) = (arm.pulls(), arm.avg_or_prior());
        warn!(
            arm = %key,
            video = video_id.unwrap_or("-"),
            incidents = arm.incidents(),
            pulls,
            avg_reward,
            "compliance incident recorded"
        );
        self.audit(
            at,
            AuditEvent::Incident {
                key: key.clone(),
                video_id: video_id.map(str::to_string),
                pulls,
                avg_reward,
            },
        )?;
        if deactivated {
            info!(arm = %key, pulls, avg_reward, "arm auto-deactivated");
            self.audit(
                at,
                AuditEvent::Deactivated {
                    key: key.clone(),
                    pulls,
                    avg_reward,
                    automatic: true,
                },
            )?;
        }
        Ok(arm)
    }

    /// Periodic housekeeping: reset stale arms and deactivate low performers.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let cfg = &self.cfg;
        let arms = self.store.list(None)?;
        let mut out = SweepReport {
            examined: arms.len(),
            ..SweepReport::default()
        };
        for arm in arms {
            let key = arm.key();
            if is_stale(&arm, cfg.staleness_days, now) {
                let mut pulls_before = None;
                self.store.modify(key, &mut |a| {
                    if is_stale(a, cfg.staleness_days, now) {
                        pulls_before = Some(a.pulls());
                        a.reset();
                    }
                })?;
                if let Some(pulls_before) = pulls_before {
                    info!(arm = %key, pulls_before, trigger = "staleness", "arm reset to prior");
                    self.audit(
                        now,
                        AuditEvent::Reset {
                            key: key.clone(),
                            trigger: RetrainTrigger::Staleness,
                            pulls_before,
                        },
                    )?;
                    out.stale_resets.push(key.clone());
                }
            } else if cfg.auto_deactivate && deactivation_due(&arm, cfg) {
                let mut done = None;
                self.store.modify(key, &mut |a| {
                    if deactivation_due(a, cfg) {
                        a.deactivate();
                        done = Some((a.pulls(), a.avg_or_prior()));
                    }
                })?;
                if let Some((pulls, avg_reward)) = done {
                    info!(arm = %key, pulls, avg_reward, "arm auto-deactivated");
                    self.audit(
                        now,
                        AuditEvent::Deactivated {
                            key: key.clone(),
                            pulls,
                            avg_reward,
                            automatic: true,
                        },
                    )?;
                    out.deactivated.push(key.clone());
                }
            }
        }
        if !out.is_noop() {
            info!(
                examined = out.examined,
                stale_resets = out.stale_resets.len(),
                deactivated = out.deactivated.len(),
                "sweep complete"
            );
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Audit / persistence
    // -----------------------------------------------------------------------

    /// Audit entries, oldest first.
    pub fn decisions(&self) -> Result<Vec<AuditEntry>> {
        Ok(self.log.lock()?.to_vec())
    }

    pub fn snapshot(&self) -> Result<BanditSnapshot> {
        Ok(BanditSnapshot {
            version: crate::REELMUX_VERSION.to_string(),
            config: self.cfg.clone(),
            channels: self.channels.clone(),
            arms: self.store.list(None)?,
            applied: self.applied.lock()?.iter().cloned().collect(),
            decisions: self.decisions()?,
        })
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
