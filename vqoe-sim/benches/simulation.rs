use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use vqoe_core::{AbrAlgorithm, BatchConfig, RunSettings, SimulationConfig};
use vqoe_sim::{BatchOrchestrator, BatchRow, TraceScenario, run_single};

const LADDER: [u64; 5] = [400_000, 1_000_000, 2_500_000, 5_000_000, 8_000_000];

fn bench_single_run(c: &mut Criterion) {
    let scenario = TraceScenario::default();
    let manifest = scenario.manifest(LADDER.to_vec()).unwrap();
    let trace = scenario.generate(1);

    let mut group = c.benchmark_group("single_run");
    for algorithm in AbrAlgorithm::ALL {
        let config = SimulationConfig {
            abr: algorithm,
            bandwidth_cap_mbps: Some(25.0),
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(algorithm), &config, |b, config| {
            b.iter(|| run_single(black_box(&manifest), black_box(&trace), config).unwrap());
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let scenario = TraceScenario::cold_cache(60);
    let manifest = Arc::new(scenario.manifest(LADDER.to_vec()).unwrap());
    let rows = (0..200)
        .map(|seed| BatchRow {
            manifest: Arc::clone(&manifest),
            trace: scenario.generate(seed),
            settings: RunSettings::default(),
        })
        .collect::<Vec<_>>();
    let orchestrator = BatchOrchestrator::new(BatchConfig::default()).unwrap();

    c.bench_function("batch_200_rows", |b| {
        b.iter(|| {
            runtime
                .block_on(orchestrator.run(rows.clone()))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_single_run, bench_batch);
criterion_main!(benches);
