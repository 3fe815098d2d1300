//! `reelmux`: Thompson-sampling selection of video packaging templates.
//!
//! Designed for the "which packaging do we ship next?" problem of a faceless
//! video pipeline. Each channel has a small set of arms, one per
//! (voice profile, script format, thumbnail style) combination. Before a video
//! is produced the bandit picks an arm; once windowed analytics come back, a
//! composite reward is computed and folded into that arm's statistics.
//!
//! An arm's statistics are just a pull count and a running mean reward in
//! `[0, 1]`. They define a Beta posterior:
//!
//! ```text
//!   alpha = avg_reward * pulls + 1
//!   beta  = (1 - avg_reward) * pulls + 1
//! ```
//!
//! so an unobserved arm (average taken as 0.5, zero pulls) starts at the uniform
//! `Beta(1, 1)`.
//!
//! **Lifecycle:**
//! - [`PackagingBandit::select_arm`]: one Beta draw per active arm, max wins
//!   (ties: fewer pulls, then key order). Fails with [`Error::NoArmsAvailable`].
//! - [`compute_reward`] / [`score_sample`]: bounded composite reward from an
//!   [`AnalyticsSample`], normalized with [`RewardBounds`].
//! - [`PackagingBandit::apply_reward`] / [`PackagingBandit::apply_observation`]:
//!   running-mean update, then the drift check.
//! - [`PackagingBandit::sweep`]: staleness resets and low-reward deactivation.
//! - [`PackagingBandit::select_arm_by_type`]: the same draw over one preset
//!   family ([`ArmType`]: title formula, hook, Shorts layout, voice parameters,
//!   posting slot), registered on first use.
//! - [`PackagingBandit::record_incident`]: the incident counts as a zero-reward
//!   pull, and the arm's samples are down-weighted for a while.
//! - [`PackagingBandit::deactivate`]: manual soft-delete, refused below the
//!   pull floor.
//!
//! **Retraining triggers** reset an arm to the neutral prior; neither
//! deactivates it:
//!
//! | trigger     | condition (defaults)                                         |
//! |-------------|--------------------------------------------------------------|
//! | drift       | mean of last 5 rewards > 15% below mean of the 20 before     |
//! | staleness   | active, pulled before, no pull for >= 14 days                |
//!
//! A compliance incident keeps the arm's evidence instead: it is folded in as a
//! zero-reward pull and the arm's draws are halved for 7 days.
//!
//! No arm is deactivated below [`DEACTIVATION_PULL_FLOOR`] pulls.
//!
//! **Non-goals:**
//! - Fetching analytics, uploading videos, scheduling jobs.
//! - A SQL backend: storage is the [`ArmStore`] trait; [`MemoryStore`] plus
//!   JSON snapshots ship with the crate.
//!
//! # Example
//!
//! ```rust
//! use reelmux::{AnalyticsSample, BanditConfig, MetricsWindow, PackagingBandit,
//!               RewardProfile, VideoRef};
//!
//! let bandit = PackagingBandit::new(BanditConfig::default()).unwrap();
//! bandit.initialize_channel("rich_tech").unwrap();
//!
//! let decision = bandit.select_arm("rich_tech").unwrap();
//! let video = VideoRef { video_id: "v1".into(), arm: decision.chosen.clone() };
//!
//! let sample = AnalyticsSample {
//!     estimated_minutes_watched: 120.0,
//!     average_view_percentage: 42.0,
//!     views: Some(800),
//!     ..AnalyticsSample::empty(MetricsWindow::SevenDay)
//! };
//! bandit.apply_observation(&video, &sample, RewardProfile::LongForm).unwrap();
//! assert_eq!(bandit.get(&decision.chosen).unwrap().unwrap().pulls(), 1);
//!
//! // The chosen arm says how to render the thumbnail.
//! let style = decision.config.thumbnail().unwrap();
//! assert!(!style.layout.is_empty());
//! ```

mod error;
pub use error::{Error, Result};

mod family;
pub use family::*;

mod arm;
pub use arm::*;

mod config;
pub use config::*;

mod store;
pub use store::*;

mod decision;
pub use decision::*;

mod reward;
pub use reward::*;

mod thompson;
pub use thompson::sample_beta;

pub mod retrain;
pub use retrain::{ApplyReport, SweepReport};

mod registry;
pub use registry::ArmReport;

mod bandit;
pub use bandit::*;

/// Crate version, recorded alongside exported snapshots.
pub const REELMUX_VERSION: &str = env!("CARGO_PKG_VERSION");
