//! Criterion benchmarks for ossim.
//!
//! Measures end-to-end simulation throughput for the sample workload under
//! each scheduling policy, and for CPU-bound contention at growing process
//! counts. Run with:
//!
//!     cargo bench -p ossim

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ossim::*;

// ---------------------------------------------------------------------------
// Scenario builders
// ---------------------------------------------------------------------------

fn sample_scenario(policy: SchedPolicy) -> Scenario {
    Scenario::builder()
        .policy(policy)
        .frames(3)
        .replacement(ReplacementPolicy::Lru)
        .processes(workloads::sample_workload())
        .max_ticks(200)
        .seed(42)
        .build()
        .unwrap()
}

/// N CPU-bound processes with 4 pages each, thrashing over 8 frames.
fn contention_scenario(nr_procs: i32) -> Scenario {
    Scenario::builder()
        .round_robin(2)
        .frames(8)
        .replacement(ReplacementPolicy::Lru)
        .processes((1..=nr_procs).map(|i| workloads::cpu_bound(i, 0, 50).pages(4)))
        .max_ticks(100_000)
        .seed(42)
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_sample_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_workload");
    for policy in [
        SchedPolicy::RoundRobin { quantum: 2 },
        SchedPolicy::Sjf { preemptive: false },
        SchedPolicy::Priority {
            higher_is_urgent: false,
        },
    ] {
        let scenario = sample_scenario(policy);
        group.bench_with_input(
            BenchmarkId::from_parameter(policy),
            &scenario,
            |b, scenario| {
                b.iter(|| scenario.run().unwrap());
            },
        );
    }
    group.finish();
}

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("rr_contention");
    for nr_procs in [4, 16, 64] {
        let scenario = contention_scenario(nr_procs);
        group.bench_with_input(
            BenchmarkId::from_parameter(nr_procs),
            &scenario,
            |b, scenario| {
                b.iter(|| scenario.run().unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_sample_policies, bench_contention);
criterion_main!(benches);
