use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use chrono::Utc;
use gurukul_core::PrincipalId;
use gurukul_identity::Role;
use gurukul_sessions::{InMemorySessionStore, SessionRegistry, TokenConfig};

/// The validity rule runs on every authenticated request; issuance only at
/// login/refresh. Both should stay comfortably sub-millisecond.
fn bench_token_path(c: &mut Criterion) {
    let registry = SessionRegistry::new(
        TokenConfig::new("bench-secret"),
        InMemorySessionStore::new(),
    );
    let principal = PrincipalId::new();
    let now = Utc::now();
    let pair = registry.issue_session(principal, Role::Guru, now).unwrap();

    let mut group = c.benchmark_group("token_path");
    group.throughput(Throughput::Elements(1));

    group.bench_function("issue_session", |b| {
        b.iter(|| {
            registry
                .issue_session(black_box(principal), Role::Guru, now)
                .unwrap()
        })
    });

    group.bench_function("check_access", |b| {
        b.iter(|| {
            registry
                .check_access(black_box(&pair.access_token), chrono::DateTime::UNIX_EPOCH, now)
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_token_path);
criterion_main!(benches);
