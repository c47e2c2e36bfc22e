use admin_service::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerService};
use admin_service::registry::{ServiceName, ServiceRegistry};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn benchmark_registry_get(c: &mut Criterion) {
    let registry = ServiceRegistry::new(|name| format!("{}-core-service:8080", name));

    c.bench_function("registry_get", |b| {
        b.iter(|| registry.get(black_box("database_core_service")))
    });
}

fn benchmark_registry_update(c: &mut Criterion) {
    let registry = ServiceRegistry::new(|name| format!("{}-core-service:8080", name));

    c.bench_function("registry_update", |b| {
        b.iter(|| registry.update(black_box("ecostreet"), black_box("10.0.0.5")))
    });
}

fn benchmark_registry_listing(c: &mut Criterion) {
    let registry = ServiceRegistry::new(|name| format!("{}-core-service:8080", name));
    registry.set(ServiceName::Play, "10.0.0.7");

    c.bench_function("registry_listing", |b| b.iter(|| registry.listing()));
}

fn benchmark_breaker_gate(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("breaker_gate");

    for sites in [1usize, 10, 100].iter() {
        let service = CircuitBreakerService::new(CircuitBreakerConfig::default());
        let names: Vec<String> = (0..*sites).map(|i| format!("site-{}", i)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(sites), sites, |b, _| {
            b.to_async(&runtime).iter(|| async {
                for name in &names {
                    if service.can_proceed(name).await {
                        service.record_success(name).await;
                    }
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_registry_get,
    benchmark_registry_update,
    benchmark_registry_listing,
    benchmark_breaker_gate
);
criterion_main!(benches);
