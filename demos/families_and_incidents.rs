//! Arm families and compliance incidents.
//!
//! Shows:
//! 1. Preset families (hooks, posting slots) registered on first selection.
//! 2. A copyright incident: the flagged arm loses ground and is down-weighted
//!    for the incident window.
//! 3. The audit trail and a JSON snapshot.
//!
//! Run with:
//!   cargo run --example families_and_incidents

use chrono::{Duration, Utc};
use reelmux::{ArmConfig, ArmType, AuditEvent, BanditConfig, PackagingBandit};

fn main() {
    let bandit = PackagingBandit::new(BanditConfig {
        seed: 3,
        ..BanditConfig::default()
    })
    .unwrap();
    let now = Utc::now();

    // -----------------------------------------------------------------------
    // 1. Preset families
    // -----------------------------------------------------------------------
    println!("=== 1. Preset families ===");

    for arm_type in [ArmType::HookCategory, ArmType::PostingSchedule] {
        let d = bandit.select_arm_by_type_at("rich_horror", arm_type, now).unwrap();
        println!(
            "  {arm_type}: {} of {} candidates -> {:?}",
            d.chosen.variant,
            d.total_candidates(),
            d.config
        );
    }

    let hooks = bandit.initialize_family("rich_horror", ArmType::HookCategory).unwrap();
    for hook in &hooks {
        let r = match hook.config() {
            ArmConfig::HookCategory { hook_category } if hook_category == "personal_story" => 0.8,
            _ => 0.35,
        };
        for _ in 0..20 {
            bandit.apply_reward_at(hook.key(), r, now).unwrap();
        }
    }
    let d = bandit.select_arm_by_type_at("rich_horror", ArmType::HookCategory, now).unwrap();
    println!("  after 20 videos per hook: {}", d.chosen);

    // -----------------------------------------------------------------------
    // 2. Compliance incident
    // -----------------------------------------------------------------------
    println!("\n=== 2. Compliance incident ===");

    let risky = d.chosen.clone();
    let before = bandit.get(&risky).unwrap().unwrap();
    let after = bandit
        .record_incident_at(&risky, Some("vid-131"), now)
        .unwrap();
    println!(
        "  {}: ev {:.3} -> {:.3} (pulls {} -> {})",
        risky,
        before.expected_value(),
        after.expected_value(),
        before.pulls(),
        after.pulls()
    );
    assert!(after.expected_value() < before.expected_value());

    let share = |at| {
        let wins = (0..500)
            .filter(|_| {
                let d = bandit
                    .select_arm_by_type_at("rich_horror", ArmType::HookCategory, at)
                    .unwrap();
                d.chosen == risky
            })
            .count();
        wins as f64 / 500.0
    };
    println!("  share inside window: {:.2}", share(now + Duration::days(1)));
    println!("  share after window:  {:.2}", share(now + Duration::days(8)));

    // -----------------------------------------------------------------------
    // 3. Audit and snapshot
    // -----------------------------------------------------------------------
    println!("\n=== 3. Audit and snapshot ===");

    let log = bandit.decisions().unwrap();
    let incidents = log
        .iter()
        .filter(|e| matches!(e.event, AuditEvent::Incident { .. }))
        .count();
    println!("  {} audit entries, {incidents} incident(s)", log.len());

    let snap = bandit.snapshot().unwrap();
    let json = serde_json::to_string(&snap).unwrap();
    println!("  snapshot: {} arms, {} bytes of JSON", snap.arms.len(), json.len());
}
