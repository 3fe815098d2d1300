//! Arm families.
//!
//! Packaging arms combine voice, format and thumbnail per channel and are built
//! from the channels config. The other families each optimize one production
//! knob and come from fixed preset tables, so they can be created on demand the
//! first time a channel asks for them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, ThumbnailStyle};

/// Which production decision an arm optimizes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ArmType {
    #[default]
    Packaging,
    TitleFormula,
    HookCategory,
    ShortsConfig,
    VoiceParams,
    PostingSchedule,
}

impl ArmType {
    pub const ALL: [ArmType; 6] = [
        ArmType::Packaging,
        ArmType::TitleFormula,
        ArmType::HookCategory,
        ArmType::ShortsConfig,
        ArmType::VoiceParams,
        ArmType::PostingSchedule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArmType::Packaging => "packaging",
            ArmType::TitleFormula => "title_formula",
            ArmType::HookCategory => "hook_category",
            ArmType::ShortsConfig => "shorts_config",
            ArmType::VoiceParams => "voice_params",
            ArmType::PostingSchedule => "posting_schedule",
        }
    }

    /// `(variant, config)` pairs for a preset family; empty for packaging,
    /// whose arms depend on the channel.
    pub fn presets(self) -> Vec<(String, ArmConfig)> {
        match self {
            ArmType::Packaging => Vec::new(),
            ArmType::TitleFormula => TITLE_FORMULAS
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let config = ArmConfig::TitleFormula {
                        formula_index: i,
                        formula: f.to_string(),
                    };
                    (i.to_string(), config)
                })
                .collect(),
            ArmType::HookCategory => HOOK_CATEGORIES
                .iter()
                .map(|c| {
                    let config = ArmConfig::HookCategory {
                        hook_category: c.to_string(),
                    };
                    (c.to_string(), config)
                })
                .collect(),
            ArmType::ShortsConfig => {
                let mut out = Vec::new();
                for crop in SHORTS_CROP_STRATEGIES {
                    for style in SHORTS_CAPTION_STYLES {
                        for pos in SHORTS_CAPTION_POSITIONS {
                            let config = ArmConfig::ShortsConfig {
                                crop_strategy: crop.to_string(),
                                caption_style: style.to_string(),
                                caption_position: pos.to_string(),
                            };
                            out.push((format!("{crop}_{style}_{pos}"), config));
                        }
                    }
                }
                out
            }
            ArmType::VoiceParams => VOICE_PARAM_PRESETS
                .iter()
                .map(|&(name, stability, speed, style)| {
                    let config = ArmConfig::VoiceParams {
                        preset: name.to_string(),
                        stability,
                        speed,
                        style,
                    };
                    (name.to_string(), config)
                })
                .collect(),
            ArmType::PostingSchedule => POSTING_SLOTS
                .iter()
                .map(|s| {
                    let config = ArmConfig::PostingSchedule {
                        posting_slot: s.to_string(),
                    };
                    (s.to_string(), config)
                })
                .collect(),
        }
    }
}

impl fmt::Display for ArmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArmType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArmType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownArmType(s.to_string()))
    }
}

/// `{topic}`, `{year}` and `{number}` are filled in by the script stage.
pub const TITLE_FORMULAS: [&str; 12] = [
    "I Tried {topic} for 30 Days...",
    "{topic}: The Complete Beginner's Guide ({year})",
    "Stop Making This {topic} Mistake...",
    "{number} {topic} Tips That Actually Work",
    "Why {topic} Is Not What You Think",
    "The Truth About {topic} Nobody Tells You",
    "How I {topic} (Step by Step)",
    "{topic} in {year}: Everything Changed",
    "Watch This Before You {topic}",
    "I Was Wrong About {topic}",
    "{number} {topic} Hacks You Need to Know",
    "The Ultimate {topic} Guide for Beginners",
];

pub const HOOK_CATEGORIES: [&str; 7] = [
    "curiosity_gap",
    "pattern_interrupt",
    "bold_claim",
    "personal_story",
    "social_proof",
    "controversy",
    "value_promise",
];

pub const SHORTS_CROP_STRATEGIES: [&str; 3] = ["center", "left_third", "right_third"];
pub const SHORTS_CAPTION_STYLES: [&str; 3] = ["capcut", "minimal", "karaoke"];
pub const SHORTS_CAPTION_POSITIONS: [&str; 3] = ["center", "bottom", "top"];

/// `(name, stability, speed, style)`.
pub const VOICE_PARAM_PRESETS: [(&str, f64, f64, f64); 5] = [
    ("default", 0.55, 1.0, 0.25),
    ("high_energy", 0.25, 1.1, 0.55),
    ("calm_authority", 0.65, 0.95, 0.15),
    ("conversational", 0.40, 1.0, 0.35),
    ("dramatic", 0.35, 0.95, 0.45),
];

pub const POSTING_SLOTS: [&str; 7] = [
    "weekday_morning",
    "weekday_noon",
    "weekday_afternoon",
    "weekday_evening",
    "weekend_morning",
    "weekend_afternoon",
    "weekend_evening",
];

/// What production should do when an arm is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arm_type", rename_all = "snake_case")]
pub enum ArmConfig {
    Packaging {
        voice_profile: String,
        format: String,
        thumbnail: ThumbnailStyle,
    },
    TitleFormula {
        formula_index: usize,
        formula: String,
    },
    HookCategory {
        hook_category: String,
    },
    ShortsConfig {
        crop_strategy: String,
        caption_style: String,
        caption_position: String,
    },
    VoiceParams {
        preset: String,
        stability: f64,
        speed: f64,
        style: f64,
    },
    PostingSchedule {
        posting_slot: String,
    },
}

impl ArmConfig {
    pub fn packaging(
        voice_profile: impl Into<String>,
        format: impl Into<String>,
        thumbnail: ThumbnailStyle,
    ) -> Self {
        ArmConfig::Packaging {
            voice_profile: voice_profile.into(),
            format: format.into(),
            thumbnail,
        }
    }

    pub fn arm_type(&self) -> ArmType {
        match self {
            ArmConfig::Packaging { .. } => ArmType::Packaging,
            ArmConfig::TitleFormula { .. } => ArmType::TitleFormula,
            ArmConfig::HookCategory { .. } => ArmType::HookCategory,
            ArmConfig::ShortsConfig { .. } => ArmType::ShortsConfig,
            ArmConfig::VoiceParams { .. } => ArmType::VoiceParams,
            ArmConfig::PostingSchedule { .. } => ArmType::PostingSchedule,
        }
    }

    /// Thumbnail to render, for packaging arms.
    pub fn thumbnail(&self) -> Option<&ThumbnailStyle> {
        match self {
            ArmConfig::Packaging { thumbnail, .. } => Some(thumbnail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for t in ArmType::ALL {
            assert_eq!(t.as_str().parse::<ArmType>().unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{t}\""));
        }
        assert!(matches!(
            "thumbnails".parse::<ArmType>(),
            Err(Error::UnknownArmType(_))
        ));
    }

    #[test]
    fn preset_families_have_expected_sizes() {
        assert!(ArmType::Packaging.presets().is_empty());
        assert_eq!(ArmType::TitleFormula.presets().len(), 12);
        assert_eq!(ArmType::HookCategory.presets().len(), 7);
        assert_eq!(ArmType::ShortsConfig.presets().len(), 27);
        assert_eq!(ArmType::VoiceParams.presets().len(), 5);
        assert_eq!(ArmType::PostingSchedule.presets().len(), 7);
        for t in ArmType::ALL {
            for (variant, config) in t.presets() {
                assert_eq!(config.arm_type(), t);
                assert!(!variant.is_empty() && !variant.contains("__"), "{variant}");
            }
        }
    }

    #[test]
    fn config_serializes_with_type_tag() {
        let (_, config) = ArmType::VoiceParams.presets().remove(1);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["arm_type"], "voice_params");
        assert_eq!(json["preset"], "high_energy");
        let back: ArmConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
