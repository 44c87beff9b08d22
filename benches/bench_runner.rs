use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sqlitebench::config::RunConfig;
use sqlitebench::engine::open_in_memory;
use sqlitebench::entries::{FILL_SEED, MEASURE_SEED, seeded_rng};
use sqlitebench::schema::{CREATE_BLOCK_TABLE, PRAGMA_PROGRAM_INDEXES, block_tables};
use sqlitebench::workloads::pragmas::{fill, measure_insert, measure_select};

const SAMPLE_SIZE: usize = 10;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(1_000);

fn bench_scales() -> &'static [u64] {
    #[cfg(feature = "bench-ci")]
    {
        &[1_000]
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        &[1_000, 10_000]
    }
}

fn bench_measures(c: &mut Criterion) {
    let mut group = c.benchmark_group("pragma_measures");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    for &num_entries in bench_scales() {
        let conn = open_in_memory(&block_tables(CREATE_BLOCK_TABLE)).expect("open");
        for index in PRAGMA_PROGRAM_INDEXES {
            conn.execute_batch(index).expect("index");
        }
        let entries = fill(&conn, &mut seeded_rng(FILL_SEED), num_entries).expect("fill");
        let config = RunConfig {
            num_entries,
            num_warmup: 10,
            num_repetitions: 100,
        };
        group.bench_function(BenchmarkId::new("insert", num_entries), |b| {
            let mut rng = seeded_rng(MEASURE_SEED);
            b.iter(|| measure_insert(&conn, &config, &mut rng, &entries).expect("insert"));
        });
        group.bench_function(BenchmarkId::new("select", num_entries), |b| {
            let mut rng = seeded_rng(MEASURE_SEED);
            b.iter(|| measure_select(&conn, &config, &mut rng, &entries).expect("select"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_measures);
criterion_main!(benches);
