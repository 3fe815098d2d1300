//! Audit trail for bandit decisions.
//!
//! Every selection, reward update, retraining reset, incident and deactivation
//! is recorded as an [`AuditEntry`] so that past choices can be:
//! - inspected (why did this channel keep getting `curiosity_gap` thumbnails?)
//! - replayed offline against a different prior or config
//! - exported alongside a [`crate::BanditSnapshot`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::{ArmConfig, ArmKey, ArmType};

/// One arm's contribution to a selection round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub key: ArmKey,
    pub pulls: u64,
    /// Average reward at selection time (prior substituted when undefined).
    pub avg_reward: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Beta draw after any incident down-weighting.
    pub sampled_value: f64,
}

/// Typed notes explaining a selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionNote {
    /// Sampled each arm's Beta posterior and chose the max.
    SampledPosteriorMax,

    /// The winning sample tied exactly with another arm; resolved by lower pull
    /// count, then key order.
    TieBroken { tied_with: Vec<ArmKey> },

    /// These arms had an incident inside the incident window and their samples
    /// were scaled by `weight`.
    IncidentDownweighted { arms: Vec<ArmKey>, weight: f64 },
}

/// Result of one selection round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub channel: String,
    #[serde(default)]
    pub arm_type: ArmType,
    pub chosen: ArmKey,
    /// The chosen arm's production config (thumbnail style, preset, slot, ...).
    pub config: ArmConfig,
    pub sampled_value: f64,
    /// All candidates in key order.
    pub candidates: Vec<Candidate>,
    /// Fraction of candidates still under the exploration pull floor.
    pub exploration_rate: f64,
    pub notes: Vec<DecisionNote>,
    pub at: DateTime<Utc>,
}

impl Decision {
    pub fn total_candidates(&self) -> usize {
        self.candidates.len()
    }
}

/// Why an arm was reset to its prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrainTrigger {
    PerformanceDrift,
    Staleness,
}

/// What happened, for the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditEvent {
    Selected(Decision),
    RewardApplied {
        key: ArmKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<f64>,
        normalized: f64,
        pulls: u64,
        avg_reward: f64,
    },
    Reset {
        key: ArmKey,
        trigger: RetrainTrigger,
        pulls_before: u64,
    },
    /// Compliance incident, folded in as a zero-reward pull.
    Incident {
        key: ArmKey,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        video_id: Option<String>,
        pulls: u64,
        avg_reward: f64,
    },
    Deactivated {
        key: ArmKey,
        pulls: u64,
        avg_reward: f64,
        automatic: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Bounded audit log (oldest entries evicted first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLog {
    cap: usize,
    entries: VecDeque<AuditEntry>,
}

impl DecisionLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, at: DateTime<Utc>, event: AuditEvent) {
        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(AuditEntry { at, event });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &AuditEntry> + '_ {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<AuditEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_evicts_oldest_at_capacity() {
        let key = ArmKey::new("c", "v", "f", "t").unwrap();
        let mut log = DecisionLog::new(2);
        for pulls in 1..=3 {
            log.push(
                Utc::now(),
                AuditEvent::Reset {
                    key: key.clone(),
                    trigger: RetrainTrigger::Staleness,
                    pulls_before: pulls,
                },
            );
        }
        assert_eq!(log.len(), 2);
        let first = log.iter().next().unwrap();
        assert!(matches!(first.event, AuditEvent::Reset { pulls_before: 2, .. }));
    }

    #[test]
    fn audit_entries_serialize() {
        let key = ArmKey::new("c", "v", "f", "t").unwrap();
        let entry = AuditEntry {
            at: Utc::now(),
            event: AuditEvent::Incident {
                key,
                video_id: None,
                pulls: 3,
                avg_reward: 0.2,
            },
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("video_id"));
        let back: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
