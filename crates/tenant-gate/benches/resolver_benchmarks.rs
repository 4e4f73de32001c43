//! Benchmarks for identity resolution and claim mapping
//!
//! Compares the read-through cache against store-only resolution and
//! measures the pure claims-to-principal step.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use tenant_gate::auth::{CredentialConfig, JwtClaims, principal_from_claims};
use tenant_gate::cache::{CacheProvider, InMemoryCache, TracedCache};
use tenant_gate::identity::{IdentityMapping, IdentityResolver, UserId};
use tenant_gate::store::InMemoryStore;
use tokio::runtime::Runtime;

const PROVIDER: &str = "keycloak";

fn seeded_store(count: usize) -> InMemoryStore {
    let store = InMemoryStore::new();
    for i in 0..count {
        store
            .add_mapping(IdentityMapping::new(
                UserId::new_random(),
                PROVIDER,
                format!("subject-{i}"),
            ))
            .unwrap();
    }
    store
}

fn resolver(store: &InMemoryStore, cache: Arc<dyn CacheProvider>) -> IdentityResolver {
    IdentityResolver::new(Arc::new(store.clone()), cache)
}

fn bench_resolve(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolve");
    let store = seeded_store(1_000);

    let cached = resolver(&store, Arc::new(InMemoryCache::new()));
    rt.block_on(async {
        cached.resolve(PROVIDER, "subject-0").await.unwrap();
    });

    group.bench_function("cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(cached.resolve(PROVIDER, "subject-0").await);
        });
    });

    let traced = resolver(&store, Arc::new(TracedCache::new(InMemoryCache::new(), "bench")));
    rt.block_on(async {
        traced.resolve(PROVIDER, "subject-0").await.unwrap();
    });

    group.bench_function("traced_cache_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(traced.resolve(PROVIDER, "subject-0").await);
        });
    });

    let uncached = resolver(&store, Arc::new(InMemoryCache::disabled()));
    group.bench_function("store_only", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(uncached.resolve(PROVIDER, "subject-0").await);
        });
    });

    // Unknown subjects are never cached
    group.bench_function("not_found", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = black_box(cached.resolve(PROVIDER, "nobody").await);
        });
    });

    group.finish();
}

fn bench_resolve_store_size(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("resolve_store_size");

    for size in [100, 1_000, 10_000] {
        let store = seeded_store(size);
        let uncached = resolver(&store, Arc::new(InMemoryCache::disabled()));
        let subject = format!("subject-{}", size - 1);

        group.bench_with_input(BenchmarkId::new("store_only", size), &subject, |b, s| {
            b.to_async(&rt).iter(|| async {
                let _ = black_box(uncached.resolve(PROVIDER, s).await);
            });
        });
    }

    group.finish();
}

fn bench_principal_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("principal_from_claims");
    let config = CredentialConfig::default();

    let claims: JwtClaims = serde_json::from_value(json!({
        "sub": "abc",
        "iss": "https://auth.example.com/realms/fleet",
        "exp": 4_102_444_800_u64,
        "tenant_id": "550e8400-e29b-41d4-a716-446655440000",
        "realm_access": { "roles": ["MANAGER", "DISPATCHER", "VIEWER"] }
    }))
    .unwrap();

    group.bench_function("nested_roles", |b| {
        b.iter(|| black_box(principal_from_claims(black_box(&claims), &config)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_resolve_store_size,
    bench_principal_mapping
);
criterion_main!(benches);
