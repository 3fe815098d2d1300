//! Packaging quickstart: the select -> publish -> observe -> sweep loop.
//!
//! Shows:
//! 1. Registering a channel's packaging arms from a channels config.
//! 2. Selecting an arm per video and reading the thumbnail to render.
//! 3. Feeding 7-day analytics back (each window counts once).
//! 4. The performance report and a nightly sweep.
//!
//! Run with:
//!   cargo run --example packaging_quickstart

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reelmux::{
    AnalyticsSample, ApplyOutcome, BanditConfig, ChannelsConfig, MetricsWindow, PackagingBandit,
    RewardProfile, VideoRef,
};

/// Synthetic audience: how well each thumbnail style converts.
fn appeal(thumbnail: &str) -> f64 {
    match thumbnail {
        "curiosity_gap" => 0.8,
        "bold_text" => 0.55,
        _ => 0.3,
    }
}

fn seven_day_sample(rng: &mut StdRng, appeal: f64) -> AnalyticsSample {
    let views = (200.0 + 1_500.0 * appeal * rng.random::<f64>()) as u64;
    AnalyticsSample {
        estimated_minutes_watched: views as f64 * 0.12 * appeal,
        average_view_percentage: 25.0 + 30.0 * appeal,
        likes: (views as f64 * 0.04 * appeal) as u64,
        comments: (views as f64 * 0.005) as u64,
        shares: (views as f64 * 0.003 * appeal) as u64,
        views: Some(views),
        click_through_rate: Some(2.0 + 8.0 * appeal),
        subscribers_gained: (12.0 * appeal) as u64,
        subscribers_lost: 1,
        cost_usd: 1.2,
        compliance_risk_score: 0.05,
        ..AnalyticsSample::empty(MetricsWindow::SevenDay)
    }
}

fn main() {
    // -----------------------------------------------------------------------
    // 1. Channel setup
    // -----------------------------------------------------------------------
    println!("=== 1. Channel setup ===");

    let channels = ChannelsConfig::from_json_str(
        r#"{"channels": {
            "rich_tech": {"voice_profile": "neutral_male", "formats": ["listicle", "explainer"]}
        }}"#,
    )
    .unwrap();
    let bandit = PackagingBandit::new(BanditConfig {
        seed: 7,
        ..BanditConfig::default()
    })
    .unwrap()
    .with_channels(channels);
    let arms = bandit.initialize_channel("rich_tech").unwrap();
    println!("  registered {} packaging arms", arms.len());

    // -----------------------------------------------------------------------
    // 2. Produce, publish, observe
    // -----------------------------------------------------------------------
    println!("\n=== 2. Produce and observe ===");

    let mut audience = StdRng::seed_from_u64(99);
    let start = Utc::now();
    for i in 0..60 {
        let at = start + Duration::hours(12 * i);
        let d = bandit.select_arm_at("rich_tech", at).unwrap();
        let thumb = d.config.thumbnail().unwrap();
        if i < 5 {
            println!(
                "  video {i}: {}  (layout={}, emoji={}, explore={:.2})",
                d.chosen, thumb.layout, thumb.emoji, d.exploration_rate
            );
        }

        let video = VideoRef {
            video_id: format!("vid-{i}"),
            arm: d.chosen.clone(),
        };
        let sample = seven_day_sample(&mut audience, appeal(&thumb.name));
        let outcome = bandit
            .apply_observation_at(&video, &sample, RewardProfile::LongForm, at)
            .unwrap();
        if let ApplyOutcome::Applied { reward, .. } = &outcome {
            if i < 5 {
                println!(
                    "           raw={:.1} normalized={:.3} confidence={:?}",
                    reward.raw, reward.normalized, reward.confidence
                );
            }
        }

        // Re-running the analytics job is harmless.
        let again = bandit
            .apply_observation_at(&video, &sample, RewardProfile::LongForm, at)
            .unwrap();
        assert_eq!(again, ApplyOutcome::Duplicate);
    }

    // -----------------------------------------------------------------------
    // 3. Report and housekeeping
    // -----------------------------------------------------------------------
    println!("\n=== 3. Report ===");
    let report = bandit.report(Some("rich_tech")).unwrap();
    for row in &report {
        println!(
            "  {:<45} pulls={:>3} avg={:.3} ev={:.3}",
            row.arm_name,
            row.pulls,
            row.avg_reward.unwrap_or(f64::NAN),
            row.expected_value
        );
    }
    let best = report[0].config.thumbnail().unwrap();
    println!("  best so far: {} ({} layout)", best.name, best.layout);
    assert!(report.iter().all(|r| r.pulls <= 60));

    println!("\n=== 4. Sweep three weeks later ===");
    let sweep = bandit.sweep(start + Duration::days(51)).unwrap();
    println!(
        "  examined={} stale_resets={} deactivated={}",
        sweep.examined,
        sweep.stale_resets.len(),
        sweep.deactivated.len()
    );
}
