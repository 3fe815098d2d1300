//! Composite reward from windowed post-publication analytics.
//!
//! Each positive component saturates at its own cap and each penalty is bounded,
//! so the raw reward stays inside the profile's [`RewardBounds`] range (modulo the
//! combined worst-case penalty, which normalization clamps to 0).

use serde::{Deserialize, Serialize};

use crate::{Error, Result, RewardBounds};

/// Analytics window a sample was aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricsWindow {
    #[serde(rename = "7d")]
    SevenDay,
    #[serde(rename = "28d")]
    TwentyEightDay,
}

impl MetricsWindow {
    pub fn days(self) -> u32 {
        match self {
            MetricsWindow::SevenDay => 7,
            MetricsWindow::TwentyEightDay => 28,
        }
    }
}

/// Which reward function to score a sample with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RewardProfile {
    #[default]
    LongForm,
    Shorts,
}

/// Immutable per-video, per-window analytics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSample {
    pub window: MetricsWindow,
    pub estimated_minutes_watched: f64,
    /// Average percentage of the video viewed, `0..=100`.
    pub average_view_percentage: f64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    /// `None` when the reporting API did not return a view count.
    pub views: Option<u64>,
    /// Shorts only: views that counted as engaged.
    #[serde(default)]
    pub engaged_views: u64,
    /// Impressions click-through rate in percent; `None` when unreported.
    pub click_through_rate: Option<f64>,
    pub subscribers_gained: u64,
    pub subscribers_lost: u64,
    pub cost_usd: f64,
    /// Highest compliance/copyright risk score for the video, `0..=1`.
    pub compliance_risk_score: f64,
}

impl AnalyticsSample {
    /// A sample with every metric at zero.
    pub fn empty(window: MetricsWindow) -> Self {
        Self {
            window,
            estimated_minutes_watched: 0.0,
            average_view_percentage: 0.0,
            likes: 0,
            comments: 0,
            shares: 0,
            views: Some(0),
            engaged_views: 0,
            click_through_rate: None,
            subscribers_gained: 0,
            subscribers_lost: 0,
            cost_usd: 0.0,
            compliance_risk_score: 0.0,
        }
    }

    /// `subscribers_gained - subscribers_lost`.
    pub fn net_subscriber_delta(&self) -> i64 {
        let gained = i64::try_from(self.subscribers_gained).unwrap_or(i64::MAX);
        let lost = i64::try_from(self.subscribers_lost).unwrap_or(i64::MAX);
        gained.saturating_sub(lost)
    }

    fn engagement_numerator(&self) -> f64 {
        self.likes as f64 + 2.0 * self.comments as f64 + 3.0 * self.shares as f64
    }

    fn check_finite(&self) -> Result<()> {
        let fields = [
            ("estimated_minutes_watched", self.estimated_minutes_watched),
            ("average_view_percentage", self.average_view_percentage),
            ("cost_usd", self.cost_usd),
            ("compliance_risk_score", self.compliance_risk_score),
            ("click_through_rate", self.click_through_rate.unwrap_or(0.0)),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(Error::InvalidSample(format!("{name} is not finite ({v})")));
            }
        }
        Ok(())
    }

    /// Views usable as a rate denominator. `Some(0)` yields `None` (the rate
    /// contributes nothing); a missing count is only an error when a
    /// numerator would need it.
    fn rate_denominator(&self, numerator: f64, what: &str) -> Result<Option<f64>> {
        match self.views {
            Some(0) => Ok(None),
            Some(v) => Ok(Some(v as f64)),
            None if numerator > 0.0 => Err(Error::InvalidSample(format!(
                "views missing with nonzero {what}"
            ))),
            None => Ok(None),
        }
    }
}

/// Reliability of a reward, bucketed by view count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    VeryLow,
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_views(views: u64) -> Self {
        match views {
            0..=9 => Confidence::VeryLow,
            10..=99 => Confidence::Low,
            100..=999 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

/// Per-component scores. Components not used by a profile stay at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardComponents {
    pub watch_time: f64,
    pub retention: f64,
    pub engagement: f64,
    pub engaged_view_rate: f64,
    pub shares: f64,
    pub ctr: f64,
    pub subscriber_growth: f64,
    pub cost_penalty: f64,
    pub risk_penalty: f64,
}

impl RewardComponents {
    pub fn total(&self) -> f64 {
        self.watch_time
            + self.retention
            + self.engagement
            + self.engaged_view_rate
            + self.shares
            + self.ctr
            + self.subscriber_growth
            + self.cost_penalty
            + self.risk_penalty
    }
}

/// Scored sample: raw reward, its normalization and the breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    pub profile: RewardProfile,
    pub raw: f64,
    pub normalized: f64,
    pub components: RewardComponents,
    pub confidence: Confidence,
}

fn capped(x: f64, scale: f64, weight: f64) -> f64 {
    (x.max(0.0) / scale).min(1.0) * weight
}

/// Long-form raw reward, in `[-30, 80]`.
///
/// Errors with [`Error::InvalidSample`] on non-finite fields or when views are
/// missing but engagement was recorded.
pub fn compute_reward(sample: &AnalyticsSample) -> Result<RewardComponents> {
    sample.check_finite()?;
    let numerator = sample.engagement_numerator();
    let engagement = match sample.rate_denominator(numerator, "engagement")? {
        Some(views) => capped(numerator / views, 0.1, 15.0),
        None => 0.0,
    };
    let net = sample.net_subscriber_delta().max(0) as f64;
    Ok(RewardComponents {
        watch_time: capped(sample.estimated_minutes_watched, 100.0, 20.0),
        retention: capped(sample.average_view_percentage, 50.0, 20.0),
        engagement,
        ctr: capped(sample.click_through_rate.unwrap_or(0.0), 10.0, 10.0),
        subscriber_growth: capped(net, 10.0, 15.0),
        cost_penalty: -capped(sample.cost_usd, 5.0, 10.0),
        risk_penalty: -sample.compliance_risk_score.clamp(0.0, 1.0) * 20.0,
        ..RewardComponents::default()
    })
}

/// Shorts raw reward, in `[-25, 75]`: retention and virality over watch time.
pub fn compute_shorts_reward(sample: &AnalyticsSample) -> Result<RewardComponents> {
    sample.check_finite()?;
    let engaged = sample.engaged_views as f64;
    let shares = sample.shares as f64;
    let denom = sample.rate_denominator(engaged + shares, "engaged views or shares")?;
    let (engaged_view_rate, share_score) = match denom {
        Some(views) => (
            capped(engaged / views, 0.5, 20.0),
            capped(shares / views, 0.02, 15.0),
        ),
        None => (0.0, 0.0),
    };
    let net = sample.net_subscriber_delta().max(0) as f64;
    Ok(RewardComponents {
        retention: capped(sample.average_view_percentage, 70.0, 30.0),
        engaged_view_rate,
        shares: share_score,
        subscriber_growth: capped(net, 5.0, 10.0),
        cost_penalty: -capped(sample.cost_usd, 2.0, 5.0),
        risk_penalty: -sample.compliance_risk_score.clamp(0.0, 1.0) * 20.0,
        ..RewardComponents::default()
    })
}

/// Score `sample` under `profile` and normalize against `bounds`.
pub fn score_sample(
    sample: &AnalyticsSample,
    profile: RewardProfile,
    bounds: RewardBounds,
) -> Result<RewardBreakdown> {
    let components = match profile {
        RewardProfile::LongForm => compute_reward(sample)?,
        RewardProfile::Shorts => compute_shorts_reward(sample)?,
    };
    let raw = components.total();
    Ok(RewardBreakdown {
        profile,
        raw,
        normalized: bounds.normalize(raw),
        components,
        confidence: Confidence::from_views(sample.views.unwrap_or(0)),
    })
}
