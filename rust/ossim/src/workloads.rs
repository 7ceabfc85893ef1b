//! Workload builder helpers for common process patterns.
//!
//! Each function returns [`ProcessDef`]s for a well-known archetype. They
//! are composed into scenarios for the binary, the tests and the benches.

use crate::memory::ReplacementPolicy;
use crate::process::{IoOp, ProcessDef};
use crate::scenario::Scenario;
use crate::scheduler::SchedPolicy;
use crate::types::Tick;

/// Pure CPU-bound process: one page, no I/O.
pub fn cpu_bound(pid: i32, arrival: Tick, cpu: i64) -> ProcessDef {
    ProcessDef::new(pid, arrival, cpu)
}

/// Process that touches `file` once at `io_tick` for `io_duration` ticks.
pub fn io_burst(
    pid: i32,
    arrival: Tick,
    cpu: i64,
    io_tick: Tick,
    file: &str,
    io_duration: Tick,
) -> ProcessDef {
    ProcessDef::new(pid, arrival, cpu).io(IoOp::write(io_tick, file, io_duration))
}

/// The four-process workload used by the demo:
///
/// | pid | arrival | cpu | prio | pages | I/O                   |
/// |-----|---------|-----|------|-------|-----------------------|
/// | 1   | 0       | 10  | 2    | 3     | read `fileA` @3 for 2 |
/// | 2   | 1       | 6   | 5    | 2     | write `fileA` @2 for 2|
/// | 3   | 2       | 8   | 1    | 4     |                       |
/// | 4   | 3       | 4   | 3    | 1     | read `fileB` @4 for 1 |
pub fn sample_workload() -> Vec<ProcessDef> {
    vec![
        ProcessDef::new(1, 0, 10)
            .priority(2)
            .pages(3)
            .io(IoOp::read(3, "fileA", 2)),
        ProcessDef::new(2, 1, 6)
            .priority(5)
            .pages(2)
            .io(IoOp::write(2, "fileA", 2)),
        ProcessDef::new(3, 2, 8).priority(1).pages(4),
        ProcessDef::new(4, 3, 4)
            .priority(3)
            .pages(1)
            .io(IoOp::read(4, "fileB", 1)),
    ]
}

/// Round-robin (quantum 2) over the sample workload with 3 LRU frames and a
/// 200 tick budget.
pub fn demo_scenario() -> Scenario {
    Scenario {
        policy: SchedPolicy::RoundRobin { quantum: 2 },
        replacement: ReplacementPolicy::Lru,
        frames: 3,
        max_ticks: 200,
        seed: crate::scenario::DEFAULT_SEED,
        processes: sample_workload(),
    }
}
