mod common;

use ossim::*;

fn one_page_scenario(policy: SchedPolicy, procs: Vec<ProcessDef>) -> Scenario {
    Scenario::builder()
        .policy(policy)
        .frames(8)
        .processes(procs)
        .build()
        .unwrap()
}

fn completion_order(result: &SimulationResult) -> Vec<i32> {
    result.processes.iter().map(|p| p.pid.0).collect()
}

fn check_invariants(result: &SimulationResult, scenario: &Scenario) {
    assert!(result.cpu_busy_ticks <= result.total_ticks);
    assert!(result.cpu_utilization_percent >= 0.0);
    assert!(result.cpu_utilization_percent <= 100.0);
    assert!(result.avg_waiting_time >= 0.0);
    assert!(result.avg_turnaround_time >= 0.0);
    assert!(result.mem_frames.len() <= scenario.frames);
    assert!(result.time_elapsed >= result.total_ticks);
    for p in &result.processes {
        assert!(p.start_time >= p.arrival, "pid {} started early", p.pid);
        assert!(p.finish_time >= p.start_time, "pid {} finished early", p.pid);
        assert_eq!(p.turnaround, p.finish_time - p.arrival);
        let expected = (p.turnaround as i64 - p.total_cpu).max(0) as u64;
        assert_eq!(p.waiting_time, expected);
    }
}

#[test]
fn test_single_process_round_robin() {
    common::setup_test();
    let scenario = one_page_scenario(
        SchedPolicy::RoundRobin { quantum: 2 },
        vec![ProcessDef::new(1, 0, 5)],
    );
    let result = scenario.run().unwrap();

    // Five CPU ticks plus the cold fault on the only page.
    assert_eq!(result.exit_kind, ExitKind::Completed);
    assert_eq!(result.finished_count, 1);
    let p = &result.processes[0];
    assert_eq!(p.page_faults, 1);
    assert_eq!(p.finish_time, 5 + p.page_faults);
    assert_eq!(p.turnaround, 6);
    assert_eq!(p.waiting_time, 1);
    assert_eq!(result.cpu_busy_ticks, 5);
    assert_eq!(result.total_ticks, 6);
    assert!((result.cpu_utilization_percent - 500.0 / 6.0).abs() < 1e-9);
    // Quantum expiries at ticks 3 and 5 requeue the process behind nobody.
    assert_eq!(result.trace.schedule_count(Pid(1)), 3);
}

#[test]
fn test_sample_workload_completes() {
    common::setup_test();
    let scenario = workloads::demo_scenario();
    let result = scenario.run().unwrap();

    assert_eq!(result.exit_kind, ExitKind::Completed);
    assert_eq!(result.finished_count, 4);
    assert!(result.time_elapsed <= 200);
    assert!(result.cpu_busy_ticks > 0);
    check_invariants(&result, &scenario);

    let faults: u64 = result.page_faults.values().sum();
    let per_proc: u64 = result.processes.iter().map(|p| p.page_faults).sum();
    assert_eq!(faults, per_proc);
    // Every process touched at least one page.
    assert_eq!(result.page_faults.len(), 4);
}

#[test]
fn test_sample_workload_every_policy_and_seed() {
    common::setup_test();
    for policy in [
        SchedPolicy::RoundRobin { quantum: 2 },
        SchedPolicy::RoundRobin { quantum: 1 },
        SchedPolicy::Sjf { preemptive: false },
        SchedPolicy::Sjf { preemptive: true },
        SchedPolicy::Priority {
            higher_is_urgent: false,
        },
        SchedPolicy::Priority {
            higher_is_urgent: true,
        },
    ] {
        for replacement in [ReplacementPolicy::Fifo, ReplacementPolicy::Lru] {
            for seed in 0..20 {
                let scenario = Scenario::builder()
                    .policy(policy)
                    .replacement(replacement)
                    .frames(3)
                    .max_ticks(200)
                    .seed(seed)
                    .processes(workloads::sample_workload())
                    .build()
                    .unwrap();
                let result = scenario.run().unwrap();
                assert_eq!(
                    result.finished_count, 4,
                    "{policy} {replacement} seed={seed} did not finish"
                );
                check_invariants(&result, &scenario);
            }
        }
    }
}

#[test]
fn test_same_seed_is_deterministic() {
    common::setup_test();
    let scenario = workloads::demo_scenario();
    let a = scenario.run().unwrap();
    let b = scenario.run().unwrap();
    assert_eq!(a.processes, b.processes);
    assert_eq!(a.page_faults, b.page_faults);
    assert_eq!(a.mem_frames, b.mem_frames);
    assert_eq!(a.time_elapsed, b.time_elapsed);
    assert_eq!(a.trace.events().len(), b.trace.events().len());
}

#[test]
fn test_round_robin_interleaves() {
    common::setup_test();
    let scenario = one_page_scenario(
        SchedPolicy::RoundRobin { quantum: 2 },
        vec![ProcessDef::new(1, 0, 3), ProcessDef::new(2, 0, 2)],
    );
    let result = scenario.run().unwrap();

    // pid 1: fault, 2 ticks, preempted at 3; pid 2: fault, done at 6;
    // pid 1 back for its last tick.
    assert_eq!(completion_order(&result), vec![2, 1]);
    assert_eq!(result.trace.completed_at(Pid(2)), Some(6));
    assert_eq!(result.trace.completed_at(Pid(1)), Some(7));
    let preempted = result
        .trace
        .events()
        .iter()
        .filter(|e| e.kind == TraceKind::Preempted { pid: Pid(1) })
        .count();
    assert_eq!(preempted, 1);
}

#[test]
fn test_sjf_runs_shortest_first() {
    common::setup_test();
    let scenario = one_page_scenario(
        SchedPolicy::Sjf { preemptive: false },
        vec![
            ProcessDef::new(1, 0, 5),
            ProcessDef::new(2, 0, 2),
            ProcessDef::new(3, 0, 3),
        ],
    );
    let result = scenario.run().unwrap();

    assert_eq!(completion_order(&result), vec![2, 3, 1]);
    let finish: Vec<Tick> = result.processes.iter().map(|p| p.finish_time).collect();
    assert_eq!(finish, vec![3, 7, 13]);
    // Non-preemptive: each process is dispatched exactly once.
    for pid in 1..=3 {
        assert_eq!(result.trace.schedule_count(Pid(pid)), 1);
    }
}

#[test]
fn test_sjf_does_not_preempt_on_arrival() {
    common::setup_test();
    let scenario = one_page_scenario(
        SchedPolicy::Sjf { preemptive: true },
        vec![ProcessDef::new(1, 0, 6), ProcessDef::new(2, 1, 1)],
    );
    let result = scenario.run().unwrap();
    assert_eq!(completion_order(&result), vec![1, 2]);
}

#[test]
fn test_priority_ordering() {
    common::setup_test();
    let procs = vec![
        ProcessDef::new(1, 0, 2).priority(1),
        ProcessDef::new(2, 0, 2).priority(3),
        ProcessDef::new(3, 0, 2).priority(2),
    ];

    let low_first = one_page_scenario(
        SchedPolicy::Priority {
            higher_is_urgent: false,
        },
        procs.clone(),
    );
    assert_eq!(completion_order(&low_first.run().unwrap()), vec![1, 3, 2]);

    let high_first = one_page_scenario(
        SchedPolicy::Priority {
            higher_is_urgent: true,
        },
        procs,
    );
    assert_eq!(completion_order(&high_first.run().unwrap()), vec![2, 3, 1]);
}

#[test]
fn test_cross_process_file_contention() {
    common::setup_test();
    // pid 1 asks for "f" twice in tick 1; its second request waits and is
    // granted at tick 3, holding "f" until 6. pid 2 asks for "f" at tick 4.
    let scenario = Scenario::builder()
        .round_robin(1)
        .frames(4)
        .process(
            ProcessDef::new(1, 0, 6)
                .io(IoOp::write(1, "f", 2))
                .io(IoOp::read(1, "f", 3)),
        )
        .process(ProcessDef::new(2, 0, 2).io(IoOp::write(4, "f", 1)))
        .build()
        .unwrap();
    let mut sim = Simulator::from_scenario(&scenario).unwrap();
    let result = sim.run(scenario.max_ticks);

    assert_eq!(result.exit_kind, ExitKind::Completed);
    assert_eq!(result.file_conflicts, 2);
    assert_eq!(completion_order(&result), vec![2, 1]);
    let p2 = &result.processes[0];
    let p1 = &result.processes[1];
    assert_eq!((p2.finish_time, p2.blocked_count), (8, 1));
    assert_eq!((p1.finish_time, p1.blocked_count), (10, 1));

    let log: Vec<(Tick, i32, LockOutcome)> = sim
        .files()
        .log()
        .iter()
        .map(|e| (e.tick, e.pid.0, e.outcome))
        .collect();
    assert_eq!(
        log,
        vec![
            (1, 1, LockOutcome::Granted),
            (3, 1, LockOutcome::Queued),
            (3, 1, LockOutcome::GrantedFromQueue),
            (4, 2, LockOutcome::Queued),
            (6, 2, LockOutcome::GrantedFromQueue),
        ]
    );
    assert!(sim.files().holder("f").is_none());
}

#[test]
fn test_zero_demand_process() {
    common::setup_test();
    let scenario = one_page_scenario(
        SchedPolicy::RoundRobin { quantum: 2 },
        vec![ProcessDef::new(1, 0, 0), ProcessDef::new(2, 0, 1)],
    );
    let result = scenario.run().unwrap();

    assert_eq!(completion_order(&result), vec![1, 2]);
    assert_eq!(result.processes[0].finish_time, 0);
    assert_eq!(result.processes[0].page_faults, 0);
    // pid 2 was dispatched in the same tick.
    assert_eq!(result.processes[1].start_time, 0);
}

#[test]
fn test_tick_budget_exhausted() {
    common::setup_test();
    let scenario = Scenario::builder()
        .process(ProcessDef::new(1, 0, 1_000))
        .max_ticks(50)
        .build()
        .unwrap();
    let result = scenario.run().unwrap();

    assert_eq!(result.exit_kind, ExitKind::TickBudgetExhausted);
    assert_eq!(result.finished_count, 0);
    assert_eq!(result.avg_turnaround_time, 0.0);
    assert_eq!(result.time_elapsed, 50);
    assert!(result.processes.is_empty());
}

#[test]
fn test_empty_scenario() {
    common::setup_test();
    let result = Scenario::builder().build().unwrap().run().unwrap();
    assert_eq!(result.exit_kind, ExitKind::Completed);
    assert_eq!(result.time_elapsed, 0);
    assert_eq!(result.cpu_utilization_percent, 0.0);
}

#[test]
fn test_configuration_errors() {
    common::setup_test();
    assert!(MemoryManager::new(0, ReplacementPolicy::Lru).is_err());

    let mut scenario = workloads::demo_scenario();
    scenario.frames = 0;
    assert!(Simulator::from_scenario(&scenario).is_err());

    let mut scenario = workloads::demo_scenario();
    scenario.policy = SchedPolicy::RoundRobin { quantum: 0 };
    assert!(scenario.run().is_err());

    let mut scenario = workloads::demo_scenario();
    scenario.processes.push(ProcessDef::new(1, 9, 3));
    assert!(Simulator::from_scenario(&scenario).is_err());
}

#[test]
fn test_injected_rng() {
    common::setup_test();
    use rand::rngs::mock::StepRng;

    // A constant source always picks page 0: one cold fault, then hits.
    let mut sim = Simulator::new(
        RoundRobin::new(1),
        MemoryManager::new(2, ReplacementPolicy::Fifo).unwrap(),
        FileLockManager::new(),
        StepRng::new(0, 0),
    );
    sim.add_process(ProcessDef::new(1, 0, 2).pages(3)).unwrap();
    let result = sim.run(100);
    assert_eq!(result.exit_kind, ExitKind::Completed);
    assert_eq!(result.trace.fault_count(Pid(1)), 1);
    assert_eq!(result.processes[0].finish_time, 3);
    assert_eq!(
        sim.process(Pid(1)).unwrap().page_table,
        vec![true, false, false]
    );
}
