//! Process model for the simulator.
//!
//! A [`ProcessDef`] is the immutable description a caller hands to the
//! engine. At admission the engine turns it into a [`SimProcess`], which adds
//! the mutable run-time state (remaining demand, start/finish ticks, waiting
//! time and the informational page table).

use std::fmt;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::types::{Pid, Tick};

/// Longest I/O the engine accepts. Granted I/O is charged against the
/// signed CPU demand, so it must fit an `i64`.
pub const MAX_IO_DURATION: Tick = i64::MAX as Tick;

/// Kind of file operation attempted by a scheduled I/O event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoKind {
    #[serde(alias = "r")]
    Read,
    #[serde(alias = "w")]
    Write,
}

impl fmt::Display for IoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoKind::Read => f.write_str("r"),
            IoKind::Write => f.write_str("w"),
        }
    }
}

/// A file operation the process attempts when the clock reads `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoOp {
    /// Tick at which the request is attempted.
    pub time: Tick,
    /// Target file name.
    pub file: String,
    pub kind: IoKind,
    /// Ticks the exclusive lock is held once granted.
    #[serde(default = "default_io_duration")]
    pub duration: Tick,
}

fn default_io_duration() -> Tick {
    1
}

impl IoOp {
    pub fn read(time: Tick, file: &str, duration: Tick) -> Self {
        IoOp {
            time,
            file: file.to_string(),
            kind: IoKind::Read,
            duration,
        }
    }

    pub fn write(time: Tick, file: &str, duration: Tick) -> Self {
        IoOp {
            time,
            file: file.to_string(),
            kind: IoKind::Write,
            duration,
        }
    }
}

/// Definition of a process for scenario creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDef {
    pub pid: Pid,
    /// Tick at which the process becomes eligible for scheduling.
    #[serde(default)]
    pub arrival: Tick,
    /// Initial CPU demand. Non-positive demand completes on first dispatch.
    pub total_cpu: i64,
    #[serde(default)]
    pub priority: i32,
    /// Number of pages, indexed `0..pages`.
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default)]
    pub io_ops: Vec<IoOp>,
}

fn default_pages() -> u32 {
    1
}

impl ProcessDef {
    /// A process with priority 0, one page and no I/O.
    pub fn new(pid: i32, arrival: Tick, total_cpu: i64) -> Self {
        ProcessDef {
            pid: Pid(pid),
            arrival,
            total_cpu,
            priority: 0,
            pages: 1,
            io_ops: Vec::new(),
        }
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn io(mut self, op: IoOp) -> Self {
        self.io_ops.push(op);
        self
    }

    /// Reject definitions the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.pages > 0,
            "pid {}: a process needs at least one page",
            self.pid
        );
        for op in &self.io_ops {
            ensure!(
                op.duration <= MAX_IO_DURATION,
                "pid {}: I/O on {} at tick {} lasts {} ticks, limit is {}",
                self.pid,
                op.file,
                op.time,
                op.duration,
                MAX_IO_DURATION
            );
        }
        Ok(())
    }
}

/// A simulated process at runtime.
#[derive(Debug, Clone)]
pub struct SimProcess {
    pub def: ProcessDef,
    /// Remaining CPU demand. Only decreases; `<= 0` means done.
    pub remaining: i64,
    /// Set once, on first dispatch.
    pub start_time: Option<Tick>,
    /// Set once, on completion.
    pub finish_time: Option<Tick>,
    /// Blocked ticks while running; replaced by the final
    /// `max(0, turnaround - total_cpu)` at completion.
    pub waiting_time: u64,
    /// Number of times a file-lock request left this process blocked.
    pub blocked_count: u64,
    /// Tick whose I/O batch most recently ended in a block, if any.
    pub blocked_at: Option<Tick>,
    /// Page index -> believed present. Informational only; residency truth
    /// lives in the memory manager.
    pub page_table: Vec<bool>,
}

impl SimProcess {
    pub fn new(def: ProcessDef) -> Self {
        let pages = def.pages as usize;
        SimProcess {
            remaining: def.total_cpu,
            start_time: None,
            finish_time: None,
            waiting_time: 0,
            blocked_count: 0,
            blocked_at: None,
            page_table: vec![false; pages],
            def,
        }
    }

    pub fn pid(&self) -> Pid {
        self.def.pid
    }

    pub fn arrival(&self) -> Tick {
        self.def.arrival
    }

    pub fn is_done(&self) -> bool {
        self.remaining <= 0
    }

    /// I/O events scheduled for exactly `tick`, in definition order.
    pub fn io_due(&self, tick: Tick) -> Vec<IoOp> {
        self.def
            .io_ops
            .iter()
            .filter(|op| op.time == tick)
            .cloned()
            .collect()
    }

    /// Record completion at `tick` and finalize waiting time.
    pub fn finish(&mut self, tick: Tick) {
        debug_assert!(self.finish_time.is_none(), "process finished twice");
        self.finish_time = Some(tick);
        self.waiting_time = self.final_waiting_time().unwrap_or(0);
    }

    /// `finish_time - arrival`, once finished.
    pub fn turnaround(&self) -> Option<Tick> {
        self.finish_time
            .map(|finish| finish.saturating_sub(self.def.arrival))
    }

    fn final_waiting_time(&self) -> Option<u64> {
        let waiting = i128::from(self.turnaround()?) - i128::from(self.def.total_cpu);
        Some(u64::try_from(waiting.max(0)).unwrap_or(u64::MAX))
    }
}

/// Per-process result row for a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub pid: Pid,
    pub arrival: Tick,
    pub total_cpu: i64,
    pub start_time: Tick,
    pub finish_time: Tick,
    pub turnaround: Tick,
    pub waiting_time: u64,
    pub blocked_count: u64,
    pub page_faults: u64,
}
