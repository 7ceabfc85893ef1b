//! ossim - Deterministic tick-driven simulator of OS resource contention.
//!
//! Processes compete for one CPU, a fixed pool of physical page frames and
//! exclusive per-file locks. Every run is reproducible from its scenario
//! and PRNG seed.
//!
//! # Architecture
//!
//! - **Engine**: tick loop that admits, dispatches, pages, locks and executes
//! - **Scheduler**: Round-Robin, Shortest-Job-First and static Priority
//! - **Memory**: demand paging over a fixed frame table with FIFO or LRU
//!   replacement
//! - **Files**: exclusive locks with FIFO waiting queues and a lock log
//! - **Trace**: every engine decision, stamped with its tick
//!
//! # Usage
//!
//! ```rust,no_run
//! use ossim::*;
//!
//! let scenario = Scenario::builder()
//!     .round_robin(2)
//!     .frames(3)
//!     .replacement(ReplacementPolicy::Lru)
//!     .processes(workloads::sample_workload())
//!     .max_ticks(200)
//!     .build()?;
//!
//! let result = Simulator::from_scenario(&scenario)?.run(scenario.max_ticks);
//! result.trace.dump();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod engine;
pub mod files;
pub mod fmt;
pub mod memory;
pub mod process;
pub mod scenario;
pub mod scheduler;
pub mod trace;
pub mod types;
pub mod workloads;

// Re-export the main public types for convenience.
pub use engine::{ExitKind, SimulationResult, Simulator};
pub use files::{FileLockManager, FileStats, LockEvent, LockOutcome, LockResponse};
pub use fmt::SimFormat;
pub use memory::{FrameSlot, MemoryManager, MemoryStats, PageAccess, ReplacementPolicy};
pub use process::{IoKind, IoOp, ProcessDef, ProcessStats, SimProcess};
pub use scenario::{parse_seed, Scenario, ScenarioBuilder};
pub use scheduler::{AnyScheduler, Priority, RoundRobin, SchedPolicy, Scheduler, Sjf};
pub use trace::{Trace, TraceEvent, TraceKind};
pub use types::{PageKey, Pid, Tick};
