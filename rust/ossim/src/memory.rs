//! Demand-paged memory with a fixed frame table.
//!
//! Frames are handed out in index order until the table is full; after that
//! every fault evicts a victim chosen by the [`ReplacementPolicy`]. The
//! load-order queue always holds exactly the resident pages, oldest first,
//! and doubles as the LRU tie-breaker: among pages with the same last-access
//! tick, the one loaded earliest is evicted.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::types::{PageKey, Pid, Tick};

/// Victim selection policy used once every frame is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplacementPolicy {
    /// Evict the page that was loaded first.
    #[default]
    Fifo,
    /// Evict the page with the oldest last access.
    Lru,
}

impl ReplacementPolicy {
    /// Parse a policy name, case-insensitively.
    ///
    /// Unknown names fall back to FIFO.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "FIFO" => ReplacementPolicy::Fifo,
            "LRU" => ReplacementPolicy::Lru,
            other => {
                warn!(policy = other, "unknown replacement policy, using FIFO");
                ReplacementPolicy::Fifo
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReplacementPolicy::Fifo => "FIFO",
            ReplacementPolicy::Lru => "LRU",
        }
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for ReplacementPolicy {
    fn from(name: String) -> Self {
        ReplacementPolicy::from_name(&name)
    }
}

impl From<ReplacementPolicy> for String {
    fn from(policy: ReplacementPolicy) -> Self {
        policy.name().to_string()
    }
}

/// Outcome of a single page access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAccess {
    /// The page was already resident in `frame`.
    Hit { frame: usize },
    /// The page was loaded into `frame`, evicting `evicted` if the table was
    /// full.
    Fault {
        frame: usize,
        evicted: Option<PageKey>,
    },
}

impl PageAccess {
    pub fn is_hit(&self) -> bool {
        matches!(self, PageAccess::Hit { .. })
    }

    pub fn frame(&self) -> usize {
        match *self {
            PageAccess::Hit { frame } | PageAccess::Fault { frame, .. } => frame,
        }
    }
}

/// One occupied frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSlot {
    pub frame: usize,
    pub pid: Pid,
    pub page: u32,
}

/// Snapshot of the memory manager for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    /// Occupied frames in frame-index order.
    pub frames: Vec<FrameSlot>,
    pub page_faults: BTreeMap<Pid, u64>,
    pub num_frames: usize,
    pub replacement: String,
}

/// Fixed-capacity frame table with on-demand paging.
#[derive(Debug)]
pub struct MemoryManager {
    num_frames: usize,
    policy: ReplacementPolicy,
    /// Frame index -> occupant. Grows to `num_frames`, then only changes in
    /// place.
    frames: Vec<PageKey>,
    frame_map: HashMap<PageKey, usize>,
    /// Resident pages in load order.
    load_order: VecDeque<PageKey>,
    last_used: HashMap<PageKey, Tick>,
    faults: BTreeMap<Pid, u64>,
}

impl MemoryManager {
    pub fn new(num_frames: usize, policy: ReplacementPolicy) -> Result<Self> {
        ensure!(num_frames > 0, "frame capacity must be positive");
        Ok(MemoryManager {
            num_frames,
            policy,
            frames: Vec::with_capacity(num_frames),
            frame_map: HashMap::with_capacity(num_frames),
            load_order: VecDeque::with_capacity(num_frames),
            last_used: HashMap::with_capacity(num_frames),
            faults: BTreeMap::new(),
        })
    }

    /// Access `page` of `pid` at `tick`. Returns whether the page was
    /// resident before the call; a miss loads it.
    pub fn access_page(&mut self, pid: Pid, page: u32, tick: Tick) -> bool {
        self.access(pid, page, tick).is_hit()
    }

    /// Like [`access_page`](Self::access_page), reporting the frame used and
    /// any evicted page.
    pub fn access(&mut self, pid: Pid, page: u32, tick: Tick) -> PageAccess {
        let key = PageKey::new(pid, page);
        if let Some(&frame) = self.frame_map.get(&key) {
            self.last_used.insert(key, tick);
            return PageAccess::Hit { frame };
        }

        *self.faults.entry(pid).or_insert(0) += 1;

        let victim = if self.frames.len() < self.num_frames {
            None
        } else {
            self.select_victim()
        };
        let (frame, evicted) = match victim.and_then(|v| self.evict(v).map(|f| (f, v))) {
            Some((frame, victim)) => {
                self.frames[frame] = key;
                (frame, Some(victim))
            }
            None => {
                self.frames.push(key);
                (self.frames.len() - 1, None)
            }
        };

        self.frame_map.insert(key, frame);
        self.load_order.push_back(key);
        self.last_used.insert(key, tick);

        trace!(
            page = %key,
            frame,
            evicted = ?evicted.map(|v| v.to_string()),
            "page fault"
        );
        PageAccess::Fault { frame, evicted }
    }

    fn select_victim(&self) -> Option<PageKey> {
        match self.policy {
            ReplacementPolicy::Fifo => self.load_order.front().copied(),
            // min_by_key keeps the first minimum, i.e. the earliest loaded.
            ReplacementPolicy::Lru => self
                .load_order
                .iter()
                .min_by_key(|key| self.last_used.get(key).copied().unwrap_or(0))
                .copied(),
        }
    }

    /// Drop all bookkeeping for `victim` and return the frame it vacated, or
    /// `None` if it was not resident.
    fn evict(&mut self, victim: PageKey) -> Option<usize> {
        let frame = self.frame_map.remove(&victim)?;
        if let Some(pos) = self.load_order.iter().position(|&k| k == victim) {
            self.load_order.remove(pos);
        }
        self.last_used.remove(&victim);
        Some(frame)
    }

    pub fn is_resident(&self, pid: Pid, page: u32) -> bool {
        self.frame_map.contains_key(&PageKey::new(pid, page))
    }

    pub fn resident_count(&self) -> usize {
        self.frame_map.len()
    }

    pub fn faults_for(&self, pid: Pid) -> u64 {
        self.faults.get(&pid).copied().unwrap_or(0)
    }

    pub fn page_faults(&self) -> &BTreeMap<Pid, u64> {
        &self.faults
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// Occupied frames in frame-index order.
    pub fn frame_slots(&self) -> Vec<FrameSlot> {
        self.frames
            .iter()
            .enumerate()
            .map(|(frame, key)| FrameSlot {
                frame,
                pid: key.pid,
                page: key.page,
            })
            .collect()
    }

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            frames: self.frame_slots(),
            page_faults: self.faults.clone(),
            num_frames: self.num_frames,
            replacement: self.policy.name().to_string(),
        }
    }
}
