//! Trace event recording for the simulator.
//!
//! Every engine decision (admission, dispatch, page fault, I/O, block,
//! preemption, completion, idle tick) is recorded as a `TraceEvent` stamped
//! with the simulated tick at which it happened.

use crate::types::{PageKey, Pid, Tick};

/// A single trace event produced by the simulator.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    /// Simulated tick when this event occurred.
    pub tick: Tick,
    /// The kind of event.
    pub kind: TraceKind,
}

/// The type of event recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    /// A process arrived and was handed to the scheduler.
    Admitted { pid: Pid },
    /// The scheduler picked a process to run.
    Dispatched { pid: Pid },
    /// A page access missed; the tick was spent loading the page.
    PageFault {
        pid: Pid,
        page: u32,
        evicted: Option<PageKey>,
    },
    /// A file lock was granted and the I/O consumed `duration` ticks.
    IoGranted { pid: Pid, file: String, duration: Tick },
    /// A file lock request was queued; the process went back to the scheduler.
    Blocked { pid: Pid, file: String },
    /// The round-robin quantum ran out and the process was requeued.
    Preempted { pid: Pid },
    /// The process finished its CPU demand.
    Completed { pid: Pid },
    /// Nothing was ready to run.
    Idle,
}

/// A complete simulation trace, containing all events in chronological order.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    pub(crate) fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub(crate) fn record(&mut self, tick: Tick, kind: TraceKind) {
        self.events.push(TraceEvent { tick, kind });
    }

    /// Get all events in chronological order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Count the number of times a process was dispatched.
    pub fn schedule_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Dispatched { pid: p } if p == pid))
            .count()
    }

    /// Count the page faults taken while `pid` was running.
    pub fn fault_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::PageFault { pid: p, .. } if p == pid))
            .count()
    }

    /// Count the times `pid` was blocked on a file lock.
    pub fn block_count(&self, pid: Pid) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(&e.kind, TraceKind::Blocked { pid: p, .. } if *p == pid))
            .count()
    }

    /// Count idle ticks.
    pub fn idle_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.kind, TraceKind::Idle))
            .count()
    }

    /// Tick at which `pid` completed, if it did.
    pub fn completed_at(&self, pid: Pid) -> Option<Tick> {
        self.events.iter().find_map(|e| match e.kind {
            TraceKind::Completed { pid: p } if p == pid => Some(e.tick),
            _ => None,
        })
    }

    /// Pretty-print the trace for debugging.
    pub fn dump(&self) {
        for event in &self.events {
            let desc = match &event.kind {
                TraceKind::Admitted { pid } => format!("ADMIT    pid={}", pid.0),
                TraceKind::Dispatched { pid } => format!("DISPATCH pid={}", pid.0),
                TraceKind::PageFault { pid, page, evicted } => match evicted {
                    Some(victim) => format!("FAULT    pid={} page={page} evict={victim}", pid.0),
                    None => format!("FAULT    pid={} page={page}", pid.0),
                },
                TraceKind::IoGranted {
                    pid,
                    file,
                    duration,
                } => format!("IO       pid={} file={file} ticks={duration}", pid.0),
                TraceKind::Blocked { pid, file } => format!("BLOCK    pid={} file={file}", pid.0),
                TraceKind::Preempted { pid } => format!("PREEMPT  pid={}", pid.0),
                TraceKind::Completed { pid } => format!("COMPLETE pid={}", pid.0),
                TraceKind::Idle => "IDLE".to_string(),
            };
            eprintln!("[{:>8}] {}", event.tick, desc);
        }
    }
}
