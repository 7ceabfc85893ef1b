//! Scenario definition, builder API and JSON loading.

use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{SimulationResult, Simulator};
use crate::memory::ReplacementPolicy;
use crate::process::ProcessDef;
use crate::scheduler::SchedPolicy;
use crate::types::{Pid, Tick};

/// Default PRNG seed used when no seed is specified.
pub const DEFAULT_SEED: u64 = 42;

/// Default tick budget.
pub const DEFAULT_MAX_TICKS: Tick = 1000;

/// Default number of physical frames.
pub const DEFAULT_FRAMES: usize = 4;

/// A complete simulation scenario: policies, memory size, budget and
/// processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub policy: SchedPolicy,
    #[serde(default)]
    pub replacement: ReplacementPolicy,
    #[serde(default = "default_frames")]
    pub frames: usize,
    #[serde(default = "default_max_ticks")]
    pub max_ticks: Tick,
    /// Seed for page selection.
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub processes: Vec<ProcessDef>,
}

fn default_frames() -> usize {
    DEFAULT_FRAMES
}

fn default_max_ticks() -> Tick {
    DEFAULT_MAX_TICKS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// Builder for constructing scenarios.
pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder {
            scenario: Scenario {
                policy: SchedPolicy::default(),
                replacement: ReplacementPolicy::default(),
                frames: DEFAULT_FRAMES,
                max_ticks: DEFAULT_MAX_TICKS,
                seed: DEFAULT_SEED,
                processes: Vec::new(),
            },
        }
    }

    /// Parse a scenario from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Scenario =
            serde_json::from_str(json).context("failed to parse scenario JSON")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid scenario {}", path.display()))
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.frames > 0, "frame count must be positive");
        if let SchedPolicy::RoundRobin { quantum: 0 } = self.policy {
            bail!("round-robin quantum must be positive");
        }

        let mut seen = Vec::<Pid>::with_capacity(self.processes.len());
        for def in &self.processes {
            def.validate()?;
            ensure!(!seen.contains(&def.pid), "duplicate pid {}", def.pid);
            seen.push(def.pid);
        }
        Ok(())
    }

    /// Build a simulator for this scenario and run it to its tick budget.
    pub fn run(&self) -> Result<SimulationResult> {
        let mut sim = Simulator::from_scenario(self)?;
        Ok(sim.run(self.max_ticks))
    }
}

impl ScenarioBuilder {
    pub fn policy(mut self, policy: SchedPolicy) -> Self {
        self.scenario.policy = policy;
        self
    }

    /// Round-robin with the given quantum.
    pub fn round_robin(self, quantum: u32) -> Self {
        self.policy(SchedPolicy::RoundRobin { quantum })
    }

    pub fn sjf(self, preemptive: bool) -> Self {
        self.policy(SchedPolicy::Sjf { preemptive })
    }

    pub fn priority(self, higher_is_urgent: bool) -> Self {
        self.policy(SchedPolicy::Priority { higher_is_urgent })
    }

    pub fn replacement(mut self, replacement: ReplacementPolicy) -> Self {
        self.scenario.replacement = replacement;
        self
    }

    /// Set the number of physical frames.
    pub fn frames(mut self, frames: usize) -> Self {
        self.scenario.frames = frames;
        self
    }

    pub fn max_ticks(mut self, max_ticks: Tick) -> Self {
        self.scenario.max_ticks = max_ticks;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.scenario.seed = seed;
        self
    }

    /// Add a process.
    pub fn process(mut self, def: ProcessDef) -> Self {
        self.scenario.processes.push(def);
        self
    }

    /// Add several processes, keeping their order.
    pub fn processes(mut self, defs: impl IntoIterator<Item = ProcessDef>) -> Self {
        self.scenario.processes.extend(defs);
        self
    }

    /// Build the scenario.
    pub fn build(self) -> Result<Scenario> {
        self.scenario.validate()?;
        Ok(self.scenario)
    }
}

/// Parse a seed string: a `u64` integer or `"entropy"` for OS randomness.
///
/// Returns [`DEFAULT_SEED`] for `None` or empty strings.
pub fn parse_seed(s: Option<&str>) -> Result<u64> {
    match s.map(str::trim) {
        None | Some("") => Ok(DEFAULT_SEED),
        Some(s) if s.eq_ignore_ascii_case("entropy") => {
            let seed: u64 = rand::random();
            warn!(
                seed,
                "seed=entropy: seeding PRNG with OS randomness \
                 (set seed={seed} to reproduce this run)"
            );
            Ok(seed)
        }
        Some(s) => s
            .parse::<u64>()
            .with_context(|| format!("seed={s:?}: expected a u64 integer or \"entropy\"")),
    }
}
