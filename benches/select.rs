use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use reelmux::{
    score_sample, AnalyticsSample, BanditConfig, ChannelConfig, ChannelsConfig, MetricsWindow,
    PackagingBandit, RewardBounds, RewardProfile,
};
use std::hint::black_box;

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_arm");
    for &n_formats in &[2usize, 8usize, 32usize] {
        let mut channels = ChannelsConfig::default();
        channels.channels.insert(
            "bench".to_string(),
            ChannelConfig {
                voice_profile: "neutral_male".to_string(),
                formats: (0..n_formats).map(|i| format!("fmt{i}")).collect(),
            },
        );
        let bandit = PackagingBandit::new(BanditConfig::default())
            .unwrap()
            .with_channels(channels);
        let arms = bandit.initialize_channel("bench").unwrap();

        // A deterministic, slightly-non-uniform reward history.
        for (i, arm) in arms.iter().enumerate() {
            for j in 0..(i % 7) {
                let r = ((i * 31 + j * 17) % 100) as f64 / 100.0;
                bandit.apply_reward(arm.key(), r).unwrap();
            }
        }

        group.bench_with_input(BenchmarkId::new("arms", arms.len()), &arms.len(), |b, &_n| {
            b.iter(|| black_box(bandit.select_arm("bench").unwrap()))
        });
    }
    group.finish();
}

fn bench_reward(c: &mut Criterion) {
    let sample = AnalyticsSample {
        estimated_minutes_watched: 180.0,
        average_view_percentage: 37.5,
        likes: 42,
        comments: 7,
        shares: 3,
        views: Some(1_250),
        click_through_rate: Some(4.2),
        subscribers_gained: 6,
        subscribers_lost: 1,
        cost_usd: 1.35,
        compliance_risk_score: 0.1,
        ..AnalyticsSample::empty(MetricsWindow::SevenDay)
    };
    c.bench_function("score_sample/long_form", |b| {
        b.iter(|| {
            black_box(
                score_sample(
                    black_box(&sample),
                    RewardProfile::LongForm,
                    RewardBounds::LONG_FORM,
                )
                .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_select, bench_reward);
criterion_main!(benches);
