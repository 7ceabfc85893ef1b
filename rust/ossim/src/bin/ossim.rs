//! ossim - Run OS resource-contention simulations from JSON scenarios.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use ossim::workloads::demo_scenario;
use ossim::{parse_seed, ReplacementPolicy, Scenario, SchedPolicy, SimFormat, Simulator};

/// Scheduling policy selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    /// Round-robin with a fixed quantum.
    Rr,
    /// Shortest job first.
    Sjf,
    /// Static priority.
    Priority,
}

/// Run OS resource-contention simulations.
#[derive(Parser)]
#[command(name = "ossim")]
struct Cli {
    /// Path to a JSON scenario file. Runs the built-in demo when omitted.
    scenario: Option<PathBuf>,

    /// Scheduling policy (overrides the scenario).
    #[arg(short, long, value_enum)]
    policy: Option<Policy>,

    /// Round-robin quantum in ticks.
    #[arg(short, long)]
    quantum: Option<u32>,

    /// Mark SJF as preemptive. Reported only; dispatch is unchanged.
    #[arg(long)]
    preemptive: bool,

    /// Larger priority values are more urgent.
    #[arg(long)]
    higher_is_urgent: bool,

    /// Number of physical page frames.
    #[arg(short, long)]
    frames: Option<usize>,

    /// Page replacement policy ("FIFO" or "LRU").
    #[arg(short, long)]
    replacement: Option<String>,

    /// Tick budget.
    #[arg(long)]
    max_ticks: Option<u64>,

    /// PRNG seed (u64 integer or "entropy" for OS randomness).
    ///
    /// Controls which page each running process touches per tick.
    /// Falls back to OSSIM_SEED env var, then the scenario seed.
    #[arg(long, env = "OSSIM_SEED")]
    seed: Option<String>,

    /// Print the result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Print trace events to stderr.
    #[arg(long)]
    dump_trace: bool,

    /// Print the file lock log to stderr.
    #[arg(long)]
    lock_log: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let scenario = build_scenario(&cli)?;
    let mut sim = Simulator::from_scenario(&scenario)?;
    let result = sim.run(scenario.max_ticks);

    if cli.dump_trace {
        result.trace.dump();
    }
    if cli.lock_log {
        for event in sim.files().log() {
            eprintln!("{event}");
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&result).context("failed to encode result")?;
        println!("{json}");
        return Ok(());
    }

    println!("policy:          {}", scenario.policy);
    println!(
        "memory:          {} frames, {}",
        scenario.frames, scenario.replacement
    );
    println!("exit:            {:?}", result.exit_kind);
    println!("finished:        {}", result.finished_count);
    println!("avg waiting:     {:.2}", result.avg_waiting_time);
    println!("avg turnaround:  {:.2}", result.avg_turnaround_time);
    println!("cpu utilization: {:.1}%", result.cpu_utilization_percent);
    println!("file conflicts:  {}", result.file_conflicts);
    println!("elapsed ticks:   {}", result.time_elapsed);
    println!();
    println!(
        "{:>5} {:>7} {:>5} {:>6} {:>6} {:>10} {:>7} {:>7} {:>6}",
        "pid", "arrival", "cpu", "start", "finish", "turnaround", "waiting", "blocked", "faults"
    );
    for p in &result.processes {
        println!(
            "{:>5} {:>7} {:>5} {:>6} {:>6} {:>10} {:>7} {:>7} {:>6}",
            p.pid,
            p.arrival,
            p.total_cpu,
            p.start_time,
            p.finish_time,
            p.turnaround,
            p.waiting_time,
            p.blocked_count,
            p.page_faults
        );
    }
    println!();
    for slot in &result.mem_frames {
        println!("frame {:>3}: pid {} page {}", slot.frame, slot.pid, slot.page);
    }

    Ok(())
}

fn build_scenario(cli: &Cli) -> Result<Scenario> {
    let mut scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => demo_scenario(),
    };

    // Override scenario fields from CLI flags.
    match cli.policy {
        Some(Policy::Rr) => {
            scenario.policy = SchedPolicy::RoundRobin {
                quantum: cli.quantum.unwrap_or(2),
            }
        }
        Some(Policy::Sjf) => {
            scenario.policy = SchedPolicy::Sjf {
                preemptive: cli.preemptive,
            }
        }
        Some(Policy::Priority) => {
            scenario.policy = SchedPolicy::Priority {
                higher_is_urgent: cli.higher_is_urgent,
            }
        }
        None => match &mut scenario.policy {
            SchedPolicy::RoundRobin { quantum } => {
                if let Some(q) = cli.quantum {
                    *quantum = q;
                }
            }
            SchedPolicy::Sjf { preemptive } => *preemptive |= cli.preemptive,
            SchedPolicy::Priority { higher_is_urgent } => *higher_is_urgent |= cli.higher_is_urgent,
        },
    }
    if let Some(frames) = cli.frames {
        scenario.frames = frames;
    }
    if let Some(name) = &cli.replacement {
        scenario.replacement = ReplacementPolicy::from_name(name);
    }
    if let Some(max_ticks) = cli.max_ticks {
        scenario.max_ticks = max_ticks;
    }
    if let Some(seed) = &cli.seed {
        scenario.seed = parse_seed(Some(seed)).context("--seed")?;
    }

    scenario.validate()?;
    Ok(scenario)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .with_writer(std::io::stderr)
        .try_init();
}
