use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use proctor_core::budget::break_budget;
use proctor_core::integrity::{record_violation, IntegrityPolicy, ViolationReport};
use proctor_core::lifecycle;
use proctor_core::model::{NewSession, Session, ViolationKind};

fn started_session() -> Session {
    let now = Utc::now();
    let mut session = NewSession {
        candidate_id: 1,
        access_token: "bench".into(),
        duration_hours: 4,
        allowed_break_seconds: 1800,
        max_single_break_seconds: 900,
        created_at: now,
        questions: Default::default(),
    }
    .into_session(1);
    lifecycle::start(&mut session, now).unwrap();
    session
}

fn bench_break_budget(c: &mut Criterion) {
    let mut group = c.benchmark_group("break_budget");

    group.bench_function("anchor 8h", |b| b.iter(|| break_budget(black_box(8.0))));

    group.bench_function("interpolated 5.5h", |b| {
        b.iter(|| break_budget(black_box(5.5)))
    });

    group.bench_function("sweep 0..12h", |b| {
        b.iter(|| {
            (0..=48)
                .map(|quarter| break_budget(black_box(f64::from(quarter) / 4.0)).total_seconds)
                .sum::<u64>()
        })
    });

    group.finish();
}

fn bench_violation_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("violation_scoring");
    // A high threshold keeps every event on the scoring path.
    let policy = IntegrityPolicy {
        disqualification_threshold: 1.0e9,
        warning_threshold: 3.0,
    };

    group.bench_function("single focus_loss", |b| {
        b.iter_batched(
            started_session,
            |mut session| {
                let now = Utc::now();
                record_violation(
                    &mut session,
                    ViolationReport::new(black_box(ViolationKind::FocusLoss)),
                    &policy,
                    now,
                )
                .unwrap()
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("100 mixed events", |b| {
        b.iter_batched(
            started_session,
            |mut session| {
                let now = Utc::now();
                for kind in ViolationKind::ALL.iter().cycle().take(100) {
                    record_violation(&mut session, ViolationReport::new(*kind), &policy, now)
                        .unwrap();
                }
                session.integrity.violation_score
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_break_budget, bench_violation_scoring);
criterion_main!(benches);
