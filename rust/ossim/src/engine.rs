//! Tick-driven simulation engine.
//!
//! This is the core of the simulator. It owns the scheduler, the memory
//! manager, the file lock manager and every process record, and advances the
//! simulated clock one loop iteration at a time:
//!
//! 1. admit processes whose arrival tick has been reached,
//! 2. expire file locks and promote waiters,
//! 3. dispatch a process if none is running,
//! 4. touch one random page of the running process (a fault costs the tick),
//! 5. issue the file requests scheduled for this tick (a denied request
//!    blocks the process and sends it back to the scheduler),
//! 6. execute one unit of CPU work,
//! 7. complete the process or, under round-robin, requeue it when its
//!    quantum runs out.
//!
//! With nothing to dispatch the tick is idle. The loop stops when the tick
//! budget is spent or no work is left.
//!
//! A blocked process whose requests for tick `t` are queued is not sent
//! through step 5 again for `t`. If the scheduler hands it straight back
//! while the clock still reads `t` (SJF and Priority always do when it is
//! the most urgent process), it goes on to CPU work in that same tick.
//! Re-issuing the batch would only queue it again without the clock moving.
//! A block that lands on a later tick, after earlier grants in the batch
//! advanced the clock, does not suppress that later tick's own requests.

use std::collections::{BTreeMap, VecDeque};

use anyhow::{bail, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::files::{FileLockManager, LockResponse};
use crate::fmt::set_sim_tick;
use crate::memory::{FrameSlot, MemoryManager, PageAccess};
use crate::process::{ProcessDef, ProcessStats, SimProcess};
use crate::scenario::Scenario;
use crate::scheduler::{AnyScheduler, SchedPolicy, Scheduler};
use crate::trace::{Trace, TraceKind};
use crate::types::{Pid, Tick};

/// Why the simulation loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitKind {
    /// No pending, ready or running process was left.
    Completed,
    /// The tick budget ran out with work remaining.
    TickBudgetExhausted,
}

/// Aggregate metrics of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub finished_count: usize,
    pub avg_waiting_time: f64,
    pub avg_turnaround_time: f64,
    pub cpu_utilization_percent: f64,
    pub page_faults: BTreeMap<Pid, u64>,
    pub mem_frames: Vec<FrameSlot>,
    pub file_conflicts: u64,
    /// Final simulated clock.
    pub time_elapsed: Tick,
    pub cpu_busy_ticks: u64,
    pub total_ticks: u64,
    pub exit_kind: ExitKind,
    /// Finished processes in completion order.
    pub processes: Vec<ProcessStats>,
    #[serde(skip)]
    pub trace: Trace,
}

enum Dispatch {
    Running(Pid),
    /// The dispatched process had no demand left and finished on the spot.
    Finished,
    Empty,
}

/// The main simulator.
pub struct Simulator<S: Scheduler = AnyScheduler, R: Rng = SmallRng> {
    scheduler: S,
    memory: MemoryManager,
    files: FileLockManager,
    /// Page-selection source.
    rng: R,
    clock: Tick,
    processes: BTreeMap<Pid, SimProcess>,
    /// Not yet arrived, in non-decreasing arrival order.
    pending: VecDeque<Pid>,
    running: Option<Pid>,
    quantum_left: u32,
    finished: Vec<Pid>,
    cpu_busy_ticks: u64,
    total_ticks: u64,
    trace: Trace,
}

impl Simulator<AnyScheduler, SmallRng> {
    /// Build a simulator from a scenario and admit its processes.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self> {
        scenario.validate()?;
        if let SchedPolicy::Sjf { preemptive: true } = scenario.policy {
            warn!("SJF preemptive flag is accepted but does not change dispatch");
        }
        let memory = MemoryManager::new(scenario.frames, scenario.replacement)?;
        let mut sim = Simulator::new(
            scenario.policy.build(),
            memory,
            FileLockManager::new(),
            SmallRng::seed_from_u64(scenario.seed),
        );
        for def in &scenario.processes {
            sim.add_process(def.clone())?;
        }
        Ok(sim)
    }
}

impl<S: Scheduler, R: Rng> Simulator<S, R> {
    pub fn new(scheduler: S, memory: MemoryManager, files: FileLockManager, rng: R) -> Self {
        Simulator {
            scheduler,
            memory,
            files,
            rng,
            clock: 0,
            processes: BTreeMap::new(),
            pending: VecDeque::new(),
            running: None,
            quantum_left: 0,
            finished: Vec::new(),
            cpu_busy_ticks: 0,
            total_ticks: 0,
            trace: Trace::new(),
        }
    }

    /// Queue a process for admission at its arrival tick.
    ///
    /// Processes with equal arrival ticks are admitted in the order they
    /// were added.
    pub fn add_process(&mut self, def: ProcessDef) -> Result<()> {
        def.validate()?;
        if self.processes.contains_key(&def.pid) {
            bail!("pid {} admitted twice", def.pid);
        }

        let pid = def.pid;
        let arrival = def.arrival;
        let pos = self
            .pending
            .partition_point(|p| self.processes.get(p).map_or(0, |q| q.arrival()) <= arrival);
        self.pending.insert(pos, pid);
        self.processes.insert(pid, SimProcess::new(def));
        debug!(pid = pid.0, arrival, "process queued for admission");
        Ok(())
    }

    /// Run until `max_ticks` is reached or all work is done.
    ///
    /// Calling `run` again continues from the current clock.
    pub fn run(&mut self, max_ticks: Tick) -> SimulationResult {
        info!(
            scheduler = self.scheduler.name(),
            frames = self.memory.num_frames(),
            replacement = self.memory.policy().name(),
            processes = self.processes.len(),
            max_ticks,
            "simulation start"
        );

        while self.clock < max_ticks && self.has_work() {
            set_sim_tick(self.clock);
            self.step();
        }
        set_sim_tick(self.clock);

        let exit_kind = if self.has_work() {
            ExitKind::TickBudgetExhausted
        } else {
            ExitKind::Completed
        };
        let result = self.result(exit_kind);
        info!(
            finished = result.finished_count,
            elapsed = result.time_elapsed,
            cpu_util = result.cpu_utilization_percent,
            conflicts = result.file_conflicts,
            exit = ?exit_kind,
            "simulation done"
        );
        result
    }

    fn has_work(&self) -> bool {
        !self.pending.is_empty() || self.scheduler.has_ready() || self.running.is_some()
    }

    /// One loop iteration.
    fn step(&mut self) {
        self.admit_arrivals();
        self.files.release_expired(self.clock);

        let pid = match self.running {
            Some(pid) => pid,
            None => match self.dispatch() {
                Dispatch::Running(pid) => pid,
                Dispatch::Finished => return,
                Dispatch::Empty => {
                    self.idle();
                    return;
                }
            },
        };

        if !self.touch_memory(pid) {
            return;
        }
        if !self.perform_io(pid) {
            return;
        }
        self.execute(pid);
    }

    fn admit_arrivals(&mut self) {
        while let Some(&pid) = self.pending.front() {
            let Some(proc) = self.processes.get(&pid) else {
                self.pending.pop_front();
                continue;
            };
            if proc.arrival() > self.clock {
                break;
            }
            self.pending.pop_front();
            self.scheduler.add_process(proc);
            self.trace.record(self.clock, TraceKind::Admitted { pid });
            debug!(pid = pid.0, "admitted");
        }
    }

    fn dispatch(&mut self) -> Dispatch {
        let clock = self.clock;
        let Some(pid) = self.scheduler.tick(clock) else {
            return Dispatch::Empty;
        };
        let Some(proc) = self.processes.get_mut(&pid) else {
            return Dispatch::Finished;
        };

        if proc.start_time.is_none() {
            proc.start_time = Some(clock);
        }
        self.trace.record(clock, TraceKind::Dispatched { pid });
        debug!(pid = pid.0, remaining = proc.remaining, "dispatch");

        if proc.is_done() {
            proc.finish(clock);
            self.finished.push(pid);
            self.trace.record(clock, TraceKind::Completed { pid });
            info!(pid = pid.0, "COMPLETED without CPU demand");
            return Dispatch::Finished;
        }

        self.running = Some(pid);
        self.quantum_left = self.scheduler.quantum().unwrap_or(0);
        Dispatch::Running(pid)
    }

    /// Access one random page of `pid`. Returns false when the access
    /// faulted, which consumes the tick.
    fn touch_memory(&mut self, pid: Pid) -> bool {
        let clock = self.clock;
        let Some(pages) = self.processes.get(&pid).map(|p| p.def.pages) else {
            return false;
        };
        let page = self.rng.gen_range(0..pages);
        let access = self.memory.access(pid, page, clock);

        if let PageAccess::Fault {
            evicted: Some(victim),
            ..
        } = access
        {
            if let Some(slot) = self
                .processes
                .get_mut(&victim.pid)
                .and_then(|p| p.page_table.get_mut(victim.page as usize))
            {
                *slot = false;
            }
        }
        if let Some(slot) = self
            .processes
            .get_mut(&pid)
            .and_then(|p| p.page_table.get_mut(page as usize))
        {
            *slot = true;
        }

        match access {
            PageAccess::Hit { .. } => true,
            PageAccess::Fault { evicted, .. } => {
                self.trace
                    .record(clock, TraceKind::PageFault { pid, page, evicted });
                self.clock += 1;
                self.total_ticks += 1;
                false
            }
        }
    }

    /// Issue the file requests `pid` has scheduled for this tick. Returns
    /// false when a request was queued and the process got blocked.
    fn perform_io(&mut self, pid: Pid) -> bool {
        let tick = self.clock;
        let Some(proc) = self.processes.get_mut(&pid) else {
            return false;
        };
        // This tick's batch already ended in a block; its requests are queued.
        if proc.blocked_at == Some(tick) {
            return true;
        }

        for op in proc.io_due(tick) {
            match self
                .files
                .request(pid, &op.file, op.kind, self.clock, op.duration)
            {
                LockResponse::Granted { .. } => {
                    let charge = i64::try_from(op.duration).unwrap_or(i64::MAX);
                    proc.remaining = proc.remaining.saturating_sub(charge);
                    self.trace.record(
                        self.clock,
                        TraceKind::IoGranted {
                            pid,
                            file: op.file,
                            duration: op.duration,
                        },
                    );
                    self.clock = self.clock.saturating_add(op.duration);
                }
                LockResponse::Queued => {
                    proc.waiting_time += 1;
                    proc.blocked_count += 1;
                    proc.blocked_at = Some(tick);
                    self.scheduler.add_process(proc);
                    self.running = None;
                    debug!(pid = pid.0, file = op.file.as_str(), "blocked on file lock");
                    self.trace
                        .record(self.clock, TraceKind::Blocked { pid, file: op.file });
                    return false;
                }
            }
        }
        true
    }

    /// One unit of CPU work, then completion or quantum accounting.
    fn execute(&mut self, pid: Pid) {
        let Some(proc) = self.processes.get_mut(&pid) else {
            return;
        };
        // Granted I/O may have pushed both to their limits.
        proc.remaining = proc.remaining.saturating_sub(1);
        self.cpu_busy_ticks += 1;
        self.total_ticks += 1;
        self.clock = self.clock.saturating_add(1);

        if proc.is_done() {
            proc.finish(self.clock);
            self.finished.push(pid);
            self.running = None;
            self.trace.record(self.clock, TraceKind::Completed { pid });
            info!(
                pid = pid.0,
                turnaround = proc.turnaround().unwrap_or(0),
                waiting = proc.waiting_time,
                "COMPLETED"
            );
            return;
        }

        if self.scheduler.quantum().is_some() {
            self.quantum_left = self.quantum_left.saturating_sub(1);
            if self.quantum_left == 0 {
                self.scheduler.add_process(proc);
                self.running = None;
                self.trace.record(self.clock, TraceKind::Preempted { pid });
                debug!(pid = pid.0, remaining = proc.remaining, "quantum expired");
            }
        }
    }

    fn idle(&mut self) {
        self.trace.record(self.clock, TraceKind::Idle);
        self.clock += 1;
        self.total_ticks += 1;
    }

    fn result(&self, exit_kind: ExitKind) -> SimulationResult {
        let processes: Vec<ProcessStats> = self
            .finished
            .iter()
            .filter_map(|pid| self.processes.get(pid))
            .filter_map(|p| {
                Some(ProcessStats {
                    pid: p.pid(),
                    arrival: p.arrival(),
                    total_cpu: p.def.total_cpu,
                    start_time: p.start_time?,
                    finish_time: p.finish_time?,
                    turnaround: p.turnaround()?,
                    waiting_time: p.waiting_time,
                    blocked_count: p.blocked_count,
                    page_faults: self.memory.faults_for(p.pid()),
                })
            })
            .collect();

        let n = processes.len();
        let (avg_waiting_time, avg_turnaround_time) = if n == 0 {
            (0.0, 0.0)
        } else {
            let waiting: u64 = processes.iter().map(|p| p.waiting_time).sum();
            let turnaround: u64 = processes.iter().map(|p| p.turnaround).sum();
            (waiting as f64 / n as f64, turnaround as f64 / n as f64)
        };
        let cpu_utilization_percent =
            self.cpu_busy_ticks as f64 / self.total_ticks.max(1) as f64 * 100.0;

        SimulationResult {
            finished_count: n,
            avg_waiting_time,
            avg_turnaround_time,
            cpu_utilization_percent,
            page_faults: self.memory.page_faults().clone(),
            mem_frames: self.memory.frame_slots(),
            file_conflicts: self.files.conflicts(),
            time_elapsed: self.clock,
            cpu_busy_ticks: self.cpu_busy_ticks,
            total_ticks: self.total_ticks,
            exit_kind,
            processes,
            trace: self.trace.clone(),
        }
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn files(&self) -> &FileLockManager {
        &self.files
    }

    pub fn process(&self, pid: Pid) -> Option<&SimProcess> {
        self.processes.get(&pid)
    }

    /// Finished processes in completion order.
    pub fn finished(&self) -> impl Iterator<Item = &SimProcess> {
        self.finished.iter().filter_map(|pid| self.processes.get(pid))
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }
}
