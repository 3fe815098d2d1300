//! Bandit tunables and channel/arm configuration.
//!
//! Both types are plain serde structs. `ChannelsConfig` reads the
//! `channels_config.json` shape:
//!
//! ```json
//! { "channels": { "rich_tech": { "voice_profile": "neutral_male",
//!                                "formats": ["listicle", "explainer"] } } }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{Error, Result};

/// No arm is ever deactivated with fewer pulls than this; configuration may
/// only raise it.
pub const DEACTIVATION_PULL_FLOOR: u64 = 10;

/// Theoretical raw-reward range used for normalization to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBounds {
    pub min: f64,
    pub max: f64,
}

impl RewardBounds {
    /// Long-form video bounds.
    pub const LONG_FORM: RewardBounds = RewardBounds { min: -20.0, max: 80.0 };
    /// Shorts bounds.
    pub const SHORTS: RewardBounds = RewardBounds { min: -25.0, max: 75.0 };

    /// `clamp((raw - min) / (max - min), 0, 1)`.
    pub fn normalize(&self, raw: f64) -> f64 {
        let span = self.max - self.min;
        if !(span.is_finite() && span > 0.0) || !raw.is_finite() {
            return 0.0;
        }
        ((raw - self.min) / span).clamp(0.0, 1.0)
    }
}

impl Default for RewardBounds {
    fn default() -> Self {
        Self::LONG_FORM
    }
}

/// Performance-drift trigger: compare the newest `n_recent` rewards with the
/// `n_baseline` rewards before them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    pub n_recent: usize,
    pub n_baseline: usize,
    /// Relative drop (fraction of the baseline mean) that triggers a reset.
    pub threshold: f64,
}

impl DriftConfig {
    /// History length needed before drift can be evaluated.
    pub fn history_cap(&self) -> usize {
        self.n_recent + self.n_baseline
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            n_recent: 5,
            n_baseline: 20,
            threshold: 0.15,
        }
    }
}

/// Configuration knobs for [`crate::PackagingBandit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    /// Normalization range for long-form rewards. Shorts always use
    /// [`RewardBounds::SHORTS`].
    pub reward_bounds: RewardBounds,
    /// Pull floor below which an arm can never be deactivated. At least
    /// [`DEACTIVATION_PULL_FLOOR`].
    pub min_pulls_for_deactivation: u64,
    /// Average reward below which a sufficiently-pulled arm is deactivated.
    pub low_reward_threshold: f64,
    /// Deactivate low performers automatically after updates and during sweeps.
    pub auto_deactivate: bool,
    pub drift: DriftConfig,
    /// Days without a pull after which an active arm is reset to the prior.
    pub staleness_days: u32,
    /// Days after an incident during which the arm's samples are down-weighted.
    pub incident_window_days: u32,
    /// Multiplier applied to the Beta sample of an arm inside its incident window.
    pub incident_sample_weight: f64,
    /// Arms with fewer pulls than this count as "exploring" in decision reports.
    pub exploration_pull_floor: u64,
    /// Maximum retained audit entries (oldest evicted first).
    pub decision_log_cap: usize,
    /// RNG seed for the selector.
    pub seed: u64,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            reward_bounds: RewardBounds::LONG_FORM,
            min_pulls_for_deactivation: DEACTIVATION_PULL_FLOOR,
            low_reward_threshold: 0.05,
            auto_deactivate: true,
            drift: DriftConfig::default(),
            staleness_days: 14,
            incident_window_days: 7,
            incident_sample_weight: 0.5,
            exploration_pull_floor: 3,
            decision_log_cap: 1000,
            seed: 0,
        }
    }
}

impl BanditConfig {
    /// Reject settings the bandit cannot run with.
    pub fn validate(&self) -> Result<()> {
        let b = self.reward_bounds;
        if !(b.min.is_finite() && b.max.is_finite() && b.max > b.min) {
            return Err(Error::InvalidConfig(format!(
                "reward_bounds must satisfy min < max (got {} .. {})",
                b.min, b.max
            )));
        }
        if self.min_pulls_for_deactivation < DEACTIVATION_PULL_FLOOR {
            return Err(Error::InvalidConfig(format!(
                "min_pulls_for_deactivation must be >= {DEACTIVATION_PULL_FLOOR} (got {})",
                self.min_pulls_for_deactivation
            )));
        }
        if !(0.0..=1.0).contains(&self.low_reward_threshold) {
            return Err(Error::InvalidConfig(format!(
                "low_reward_threshold must be in [0, 1] (got {})",
                self.low_reward_threshold
            )));
        }
        if self.drift.n_recent == 0 || self.drift.n_baseline == 0 {
            return Err(Error::InvalidConfig("drift windows must be non-empty".to_string()));
        }
        if !(self.drift.threshold.is_finite() && self.drift.threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "drift.threshold must be finite and >= 0 (got {})",
                self.drift.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.incident_sample_weight) {
            return Err(Error::InvalidConfig(format!(
                "incident_sample_weight must be in [0, 1] (got {})",
                self.incident_sample_weight
            )));
        }
        if self.staleness_days == 0 {
            return Err(Error::InvalidConfig("staleness_days must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Per-channel packaging options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub voice_profile: String,
    pub formats: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            voice_profile: "neutral_male".to_string(),
            formats: vec!["listicle".to_string(), "explainer".to_string()],
        }
    }
}

/// Visual parameters for a thumbnail style arm dimension. Carried on packaging
/// arms so production can render the chosen thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailStyle {
    pub name: String,
    pub layout: String,
    pub font_size: String,
    pub contrast: String,
    pub emoji: bool,
}

impl ThumbnailStyle {
    fn preset(name: &str, layout: &str, font_size: &str, contrast: &str, emoji: bool) -> Self {
        Self {
            name: name.to_string(),
            layout: layout.to_string(),
            font_size: font_size.to_string(),
            contrast: contrast.to_string(),
            emoji,
        }
    }

    /// Built-in style called `name`, or a style with only a name when there is
    /// no such preset.
    pub fn named(name: &str) -> Self {
        Self::defaults()
            .into_iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| Self::preset(name, "", "", "", false))
    }

    /// `bold_text`, `clean_minimal`, `curiosity_gap`.
    pub fn defaults() -> Vec<ThumbnailStyle> {
        vec![
            Self::preset("bold_text", "text_dominant", "large", "high", false),
            Self::preset("clean_minimal", "image_focus", "medium", "medium", false),
            Self::preset("curiosity_gap", "split", "large", "high", true),
        ]
    }
}

fn default_thumbnails() -> Vec<ThumbnailStyle> {
    ThumbnailStyle::defaults()
}

/// All channels known to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelConfig>,
    #[serde(default = "default_thumbnails")]
    pub thumbnail_styles: Vec<ThumbnailStyle>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            channels: BTreeMap::new(),
            thumbnail_styles: ThumbnailStyle::defaults(),
        }
    }
}

impl ChannelsConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: ChannelsConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Config for `channel`, falling back to [`ChannelConfig::default`].
    pub fn channel(&self, channel: &str) -> ChannelConfig {
        self.channels.get(channel).cloned().unwrap_or_default()
    }

    /// Configured thumbnail style called `name`, falling back to
    /// [`ThumbnailStyle::named`].
    pub fn thumbnail(&self, name: &str) -> ThumbnailStyle {
        self.thumbnail_styles
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap_or_else(|| ThumbnailStyle::named(name))
    }

    fn validate(&self) -> Result<()> {
        if self.thumbnail_styles.is_empty() {
            return Err(Error::InvalidConfig("thumbnail_styles must be non-empty".to_string()));
        }
        for (id, ch) in &self.channels {
            if ch.formats.is_empty() {
                return Err(Error::InvalidConfig(format!("channel `{id}` has no formats")));
            }
        }
        Ok(())
    }
}
