//! Ready-queue scheduling policies.
//!
//! A scheduler only holds PIDs of processes the engine handed it, each with
//! the ordering key captured at admission. Three variants exist:
//!
//! - [`RoundRobin`]: plain FIFO; the engine enforces the quantum and
//!   requeues the running process when it runs out.
//! - [`Sjf`]: ordered by `(remaining, arrival, pid)`.
//! - [`Priority`]: ordered by `(priority key, arrival, pid)`, where the key is
//!   the raw priority or its negation when larger numbers are more urgent.
//!
//! The arrival and pid components make every ordering total, so dispatch
//! order never depends on container iteration order.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::process::SimProcess;
use crate::types::{Pid, Tick};

/// The contract every scheduling policy implements.
pub trait Scheduler {
    /// Short policy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Enqueue a ready process.
    fn add_process(&mut self, proc: &SimProcess);

    /// Remove and return the next process to dispatch.
    fn tick(&mut self, now: Tick) -> Option<Pid>;

    /// Number of queued processes.
    fn nr_ready(&self) -> usize;

    fn has_ready(&self) -> bool {
        self.nr_ready() > 0
    }

    /// Ticks a dispatched process may run before the engine requeues it.
    /// `None` means it runs until it finishes or blocks.
    fn quantum(&self) -> Option<u32> {
        None
    }
}

/// FIFO ready queue with an engine-enforced quantum.
#[derive(Debug)]
pub struct RoundRobin {
    quantum: u32,
    queue: VecDeque<Pid>,
}

impl RoundRobin {
    /// A quantum of zero is treated as one tick.
    pub fn new(quantum: u32) -> Self {
        RoundRobin {
            quantum: quantum.max(1),
            queue: VecDeque::new(),
        }
    }
}

impl Scheduler for RoundRobin {
    fn name(&self) -> &'static str {
        "RR"
    }

    fn add_process(&mut self, proc: &SimProcess) {
        self.queue.push_back(proc.pid());
    }

    fn tick(&mut self, _now: Tick) -> Option<Pid> {
        self.queue.pop_front()
    }

    fn nr_ready(&self) -> usize {
        self.queue.len()
    }

    fn quantum(&self) -> Option<u32> {
        Some(self.quantum)
    }
}

/// Shortest job first, keyed on remaining demand at admission time.
#[derive(Debug)]
pub struct Sjf {
    /// Accepted for configuration compatibility; dispatch is the same either
    /// way.
    preemptive: bool,
    ready: BTreeSet<(i64, Tick, Pid)>,
}

impl Sjf {
    pub fn new(preemptive: bool) -> Self {
        Sjf {
            preemptive,
            ready: BTreeSet::new(),
        }
    }

    pub fn is_preemptive(&self) -> bool {
        self.preemptive
    }
}

impl Scheduler for Sjf {
    fn name(&self) -> &'static str {
        "SJF"
    }

    fn add_process(&mut self, proc: &SimProcess) {
        self.ready
            .insert((proc.remaining, proc.arrival(), proc.pid()));
    }

    fn tick(&mut self, _now: Tick) -> Option<Pid> {
        self.ready.pop_first().map(|(_, _, pid)| pid)
    }

    fn nr_ready(&self) -> usize {
        self.ready.len()
    }
}

/// Static priority ordering.
#[derive(Debug)]
pub struct Priority {
    higher_is_urgent: bool,
    ready: BTreeSet<(i64, Tick, Pid)>,
}

impl Priority {
    /// With `higher_is_urgent`, larger priority values dispatch first;
    /// otherwise smaller values do.
    pub fn new(higher_is_urgent: bool) -> Self {
        Priority {
            higher_is_urgent,
            ready: BTreeSet::new(),
        }
    }

    fn key(&self, priority: i32) -> i64 {
        let priority = i64::from(priority);
        if self.higher_is_urgent {
            -priority
        } else {
            priority
        }
    }
}

impl Scheduler for Priority {
    fn name(&self) -> &'static str {
        "PRIO"
    }

    fn add_process(&mut self, proc: &SimProcess) {
        let key = self.key(proc.def.priority);
        self.ready.insert((key, proc.arrival(), proc.pid()));
    }

    fn tick(&mut self, _now: Tick) -> Option<Pid> {
        self.ready.pop_first().map(|(_, _, pid)| pid)
    }

    fn nr_ready(&self) -> usize {
        self.ready.len()
    }
}

/// The closed set of scheduling policies, dispatched by tag.
#[derive(Debug)]
pub enum AnyScheduler {
    RoundRobin(RoundRobin),
    Sjf(Sjf),
    Priority(Priority),
}

impl Scheduler for AnyScheduler {
    fn name(&self) -> &'static str {
        match self {
            AnyScheduler::RoundRobin(s) => s.name(),
            AnyScheduler::Sjf(s) => s.name(),
            AnyScheduler::Priority(s) => s.name(),
        }
    }

    fn add_process(&mut self, proc: &SimProcess) {
        match self {
            AnyScheduler::RoundRobin(s) => s.add_process(proc),
            AnyScheduler::Sjf(s) => s.add_process(proc),
            AnyScheduler::Priority(s) => s.add_process(proc),
        }
    }

    fn tick(&mut self, now: Tick) -> Option<Pid> {
        match self {
            AnyScheduler::RoundRobin(s) => s.tick(now),
            AnyScheduler::Sjf(s) => s.tick(now),
            AnyScheduler::Priority(s) => s.tick(now),
        }
    }

    fn nr_ready(&self) -> usize {
        match self {
            AnyScheduler::RoundRobin(s) => s.nr_ready(),
            AnyScheduler::Sjf(s) => s.nr_ready(),
            AnyScheduler::Priority(s) => s.nr_ready(),
        }
    }

    fn quantum(&self) -> Option<u32> {
        match self {
            AnyScheduler::RoundRobin(s) => s.quantum(),
            AnyScheduler::Sjf(s) => s.quantum(),
            AnyScheduler::Priority(s) => s.quantum(),
        }
    }
}

/// Scheduling policy as it appears in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchedPolicy {
    RoundRobin {
        #[serde(default = "default_quantum")]
        quantum: u32,
    },
    Sjf {
        #[serde(default)]
        preemptive: bool,
    },
    Priority {
        #[serde(default)]
        higher_is_urgent: bool,
    },
}

fn default_quantum() -> u32 {
    2
}

impl Default for SchedPolicy {
    fn default() -> Self {
        SchedPolicy::RoundRobin {
            quantum: default_quantum(),
        }
    }
}

impl SchedPolicy {
    pub fn build(&self) -> AnyScheduler {
        match *self {
            SchedPolicy::RoundRobin { quantum } => AnyScheduler::RoundRobin(RoundRobin::new(quantum)),
            SchedPolicy::Sjf { preemptive } => AnyScheduler::Sjf(Sjf::new(preemptive)),
            SchedPolicy::Priority { higher_is_urgent } => {
                AnyScheduler::Priority(Priority::new(higher_is_urgent))
            }
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedPolicy::RoundRobin { quantum } => write!(f, "RR(quantum={quantum})"),
            SchedPolicy::Sjf { preemptive } => write!(f, "SJF(preemptive={preemptive})"),
            SchedPolicy::Priority { higher_is_urgent } => {
                write!(f, "PRIO(higher_is_urgent={higher_is_urgent})")
            }
        }
    }
}
