//! Newtype wrappers and type aliases for domain concepts.
//!
//! Process identifiers get a newtype so they cannot be confused with page
//! indices or tick counts. Plain quantities (ticks) stay type aliases to keep
//! the arithmetic in the engine readable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Process identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pid(pub i32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Simulated time in ticks.
pub type Tick = u64;

/// A page of a specific process: the unit the memory manager tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageKey {
    pub pid: Pid,
    pub page: u32,
}

impl PageKey {
    pub fn new(pid: Pid, page: u32) -> Self {
        PageKey { pid, page }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pid.0, self.page)
    }
}
