//! Exclusive file locks with FIFO waiting queues.
//!
//! A file has at most one holder. Requests against a held file are queued in
//! arrival order and counted as conflicts; when the holder's lease expires
//! the head of the queue is granted a fresh lease on the spot. Files are kept
//! in `BTreeMap`s so expiry is processed in file-name order.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::process::IoKind;
use crate::types::{Pid, Tick};

/// Immediate answer to a lock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockResponse {
    /// The lock is held by the requester until `release_at`.
    Granted { release_at: Tick },
    /// The file was busy; the request waits in the file's queue.
    Queued,
}

impl LockResponse {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockResponse::Granted { .. })
    }

    pub fn release_at(&self) -> Option<Tick> {
        match *self {
            LockResponse::Granted { release_at } => Some(release_at),
            LockResponse::Queued => None,
        }
    }
}

/// Outcome recorded in the lock log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockOutcome {
    Granted,
    Queued,
    GrantedFromQueue,
}

impl fmt::Display for LockOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockOutcome::Granted => f.write_str("granted"),
            LockOutcome::Queued => f.write_str("queued"),
            LockOutcome::GrantedFromQueue => f.write_str("granted_from_queue"),
        }
    }
}

/// One entry of the chronological lock log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockEvent {
    pub tick: Tick,
    pub pid: Pid,
    pub file: String,
    pub op: IoKind,
    pub outcome: LockOutcome,
}

impl fmt::Display for LockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>6}] pid={:<4} {} {:<8} {}",
            self.tick, self.pid.0, self.op, self.file, self.outcome
        )
    }
}

/// Current holder of a file lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockHolder {
    pub pid: Pid,
    pub release_at: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRequest {
    pid: Pid,
    op: IoKind,
    duration: Tick,
}

/// Snapshot of the lock manager for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub conflicts: u64,
    pub locks: BTreeMap<String, LockHolder>,
    /// Queue length for every file that has ever had a waiter.
    pub waiting: BTreeMap<String, usize>,
}

/// Exclusive per-file lock table.
#[derive(Debug, Default)]
pub struct FileLockManager {
    locks: BTreeMap<String, LockHolder>,
    waiting: BTreeMap<String, VecDeque<PendingRequest>>,
    conflicts: u64,
    log: Vec<LockEvent>,
}

impl FileLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an exclusive lock on `file` for `duration` ticks.
    pub fn request(
        &mut self,
        pid: Pid,
        file: &str,
        op: IoKind,
        tick: Tick,
        duration: Tick,
    ) -> LockResponse {
        if self.locks.contains_key(file) {
            self.waiting
                .entry(file.to_string())
                .or_default()
                .push_back(PendingRequest { pid, op, duration });
            self.conflicts += 1;
            self.record(tick, pid, file, op, LockOutcome::Queued);
            debug!(pid = pid.0, file, "lock busy, queued");
            return LockResponse::Queued;
        }

        let release_at = tick.saturating_add(duration);
        self.locks
            .insert(file.to_string(), LockHolder { pid, release_at });
        self.record(tick, pid, file, op, LockOutcome::Granted);
        debug!(pid = pid.0, file, release_at, "lock granted");
        LockResponse::Granted { release_at }
    }

    /// Release every lock whose lease ended at or before `tick`, handing each
    /// file to the head of its queue with a lease starting now.
    pub fn release_expired(&mut self, tick: Tick) {
        let expired: Vec<String> = self
            .locks
            .iter()
            .filter(|(_, holder)| holder.release_at <= tick)
            .map(|(file, _)| file.clone())
            .collect();

        for file in expired {
            if let Some(holder) = self.locks.remove(&file) {
                debug!(pid = holder.pid.0, file = file.as_str(), "lock released");
            }
            let next = self.waiting.get_mut(&file).and_then(|q| q.pop_front());
            if let Some(req) = next {
                let release_at = tick.saturating_add(req.duration);
                self.locks.insert(
                    file.clone(),
                    LockHolder {
                        pid: req.pid,
                        release_at,
                    },
                );
                self.record(tick, req.pid, &file, req.op, LockOutcome::GrantedFromQueue);
                debug!(
                    pid = req.pid.0,
                    file = file.as_str(),
                    release_at,
                    "lock granted from queue"
                );
            }
        }
    }

    fn record(&mut self, tick: Tick, pid: Pid, file: &str, op: IoKind, outcome: LockOutcome) {
        self.log.push(LockEvent {
            tick,
            pid,
            file: file.to_string(),
            op,
            outcome,
        });
    }

    pub fn holder(&self, file: &str) -> Option<LockHolder> {
        self.locks.get(file).copied()
    }

    pub fn queue_len(&self, file: &str) -> usize {
        self.waiting.get(file).map_or(0, |q| q.len())
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    /// Chronological lock log.
    pub fn log(&self) -> &[LockEvent] {
        &self.log
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            conflicts: self.conflicts,
            locks: self.locks.clone(),
            waiting: self
                .waiting
                .iter()
                .map(|(file, q)| (file.clone(), q.len()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_on_free_file() {
        let mut fs = FileLockManager::new();
        let resp = fs.request(Pid(1), "a", IoKind::Read, 3, 2);
        assert_eq!(resp, LockResponse::Granted { release_at: 5 });
        assert_eq!(
            fs.holder("a"),
            Some(LockHolder {
                pid: Pid(1),
                release_at: 5
            })
        );
        assert_eq!(fs.conflicts(), 0);
    }

    #[test]
    fn test_contention_queues_and_promotes() {
        let mut fs = FileLockManager::new();
        assert!(fs.request(Pid(1), "a", IoKind::Write, 2, 2).is_granted());
        let second = fs.request(Pid(2), "a", IoKind::Read, 2, 3);
        assert_eq!(second, LockResponse::Queued);
        assert_eq!(fs.conflicts(), 1);
        assert_eq!(fs.queue_len("a"), 1);

        // Not yet expired.
        fs.release_expired(3);
        assert_eq!(fs.holder("a").map(|h| h.pid), Some(Pid(1)));

        fs.release_expired(4);
        assert_eq!(
            fs.holder("a"),
            Some(LockHolder {
                pid: Pid(2),
                release_at: 7
            })
        );
        assert_eq!(fs.queue_len("a"), 0);

        let outcomes: Vec<(Tick, Pid, LockOutcome)> = fs
            .log()
            .iter()
            .map(|e| (e.tick, e.pid, e.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                (2, Pid(1), LockOutcome::Granted),
                (2, Pid(2), LockOutcome::Queued),
                (4, Pid(2), LockOutcome::GrantedFromQueue),
            ]
        );

        fs.release_expired(7);
        assert!(fs.holder("a").is_none());
    }

    #[test]
    fn test_waiters_served_in_request_order() {
        let mut fs = FileLockManager::new();
        fs.request(Pid(1), "f", IoKind::Write, 0, 1);
        fs.request(Pid(2), "f", IoKind::Write, 0, 1);
        fs.request(Pid(3), "f", IoKind::Read, 0, 1);
        assert_eq!(fs.conflicts(), 2);

        let mut order = Vec::new();
        for tick in 1..=3 {
            fs.release_expired(tick);
            if let Some(holder) = fs.holder("f") {
                order.push(holder.pid);
            }
        }
        assert_eq!(order, vec![Pid(2), Pid(3)]);
    }

    #[test]
    fn test_files_are_independent() {
        let mut fs = FileLockManager::new();
        assert!(fs.request(Pid(1), "a", IoKind::Read, 0, 5).is_granted());
        assert!(fs.request(Pid(2), "b", IoKind::Read, 0, 5).is_granted());
        assert_eq!(fs.conflicts(), 0);

        let stats = fs.stats();
        assert_eq!(stats.locks.len(), 2);
        assert!(stats.waiting.is_empty());
    }

    #[test]
    fn test_stats_keeps_drained_queues() {
        let mut fs = FileLockManager::new();
        fs.request(Pid(1), "a", IoKind::Read, 0, 1);
        fs.request(Pid(2), "a", IoKind::Read, 0, 1);
        fs.release_expired(1);
        let stats = fs.stats();
        assert_eq!(stats.conflicts, 1);
        assert_eq!(stats.waiting.get("a"), Some(&0));
        assert_eq!(stats.locks.get("a").map(|h| h.pid), Some(Pid(2)));
    }

    #[test]
    fn test_long_lease_saturates() {
        let mut fs = FileLockManager::new();
        let resp = fs.request(Pid(1), "f", IoKind::Write, 10, u64::MAX);
        assert_eq!(resp.release_at(), Some(u64::MAX));
        fs.request(Pid(2), "f", IoKind::Read, 11, u64::MAX);
        fs.release_expired(u64::MAX);
        assert_eq!(
            fs.holder("f"),
            Some(LockHolder {
                pid: Pid(2),
                release_at: u64::MAX
            })
        );
    }

    #[test]
    fn test_outcome_rendering() {
        assert_eq!(LockOutcome::GrantedFromQueue.to_string(), "granted_from_queue");
        assert_eq!(
            serde_json::to_string(&LockOutcome::GrantedFromQueue).unwrap(),
            "\"granted_from_queue\""
        );
    }
}
