// tests/invalidation.rs

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use restage::dag::{Scheduler, TaskRecord, TaskTable, invalidate, sequence};
use restage::engine::TaskOutcome;
use restage::errors::RestageError;
use restage_test_utils::builders::task_table;
use restage_test_utils::init_tracing;

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn mark_all_run(table: &mut TaskTable) {
    for record in table.records_mut() {
        record.has_run = true;
    }
}

/// A <- B <- C
fn chain() -> TaskTable {
    task_table(&[("A", &[]), ("B", &["A"]), ("C", &["B"])])
}

/// A <- B, A <- C, B <- D, C <- D
fn diamond() -> TaskTable {
    task_table(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B", "C"])])
}

#[test]
fn chain_invalidation_resets_the_whole_tree_and_reaches_the_end() {
    init_tracing();
    let mut table = chain();
    mark_all_run(&mut table);

    let frontier = invalidate(&mut table, "A").unwrap();

    assert_eq!(frontier, names(&["C"]));
    for task in ["A", "B", "C"] {
        assert!(!table.get(task).unwrap().has_run, "{task} should be reset");
    }
}

#[test]
fn diamond_reports_shared_dependent_once() {
    let mut table = diamond();
    mark_all_run(&mut table);

    let frontier = invalidate(&mut table, "A").unwrap();
    assert_eq!(frontier, names(&["D"]));

    let order = sequence(&table, frontier.iter().map(String::as_str)).unwrap();
    assert_eq!(order.len(), 4);
    assert_eq!(order.first().map(String::as_str), Some("A"));
    assert_eq!(order.last().map(String::as_str), Some("D"));
    let middle: BTreeSet<String> = order[1..3].iter().cloned().collect();
    assert_eq!(middle, names(&["B", "C"]));
}

#[test]
fn task_without_dependents_is_its_own_frontier() {
    let mut table = diamond();
    mark_all_run(&mut table);

    let frontier = invalidate(&mut table, "D").unwrap();

    assert_eq!(frontier, names(&["D"]));
    assert!(!table.get("D").unwrap().has_run);
    assert!(table.get("A").unwrap().has_run, "upstream stays up to date");
}

#[test]
fn invalidating_twice_gives_the_same_result() {
    let mut table = diamond();
    mark_all_run(&mut table);

    let first = invalidate(&mut table, "B").unwrap();
    let second = invalidate(&mut table, "B").unwrap();

    assert_eq!(first, second);
    assert!(table.get("A").unwrap().has_run);
    assert!(table.get("C").unwrap().has_run);
}

#[test]
fn unknown_task_is_reported() {
    let mut table = chain();

    match invalidate(&mut table, "nope") {
        Err(RestageError::TaskNotFound(name)) => assert_eq!(name, "nope"),
        other => panic!("expected TaskNotFound, got {other:?}"),
    }
}

#[test]
fn cycle_in_hand_built_table_is_reported() {
    let mut table = task_table(&[("A", &["B"]), ("B", &["A"])]);

    assert!(matches!(
        invalidate(&mut table, "A"),
        Err(RestageError::DagCycle(_))
    ));
}

/// styles <- app, styles <- docs; app <- bundle
fn site() -> TaskTable {
    task_table(&[
        ("styles", &[]),
        ("app", &["styles"]),
        ("docs", &["styles"]),
        ("bundle", &["app"]),
    ])
}

fn finish_all(scheduler: &mut Scheduler, mut ready: Vec<String>) -> Vec<String> {
    let mut ran = Vec::new();
    while let Some(task) = ready.pop() {
        ran.push(task.clone());
        let step = scheduler.handle_completion(&task, TaskOutcome::Success);
        ready.extend(step.newly_scheduled.into_iter().map(|t| t.name));
    }
    ran
}

#[test]
fn changed_stylesheet_rebuilds_everything_downstream_only_once() {
    init_tracing();
    let mut scheduler = Scheduler::new(site());

    let step = scheduler.start_full_build().unwrap();
    let ready = step.newly_scheduled.into_iter().map(|t| t.name).collect();
    let initial = finish_all(&mut scheduler, ready);
    assert_eq!(initial.len(), 4);
    assert!(scheduler.is_idle());

    // Two changes to the same task inside one window.
    assert!(scheduler.request_invalidation("styles"));
    assert!(!scheduler.request_invalidation("styles"));

    let reschedule = scheduler.reschedule().unwrap().expect("something pending");
    assert_eq!(reschedule.frontier, names(&["bundle", "docs"]));
    assert_eq!(reschedule.sequence.first().map(String::as_str), Some("styles"));
    assert_eq!(reschedule.sequence.len(), 4);

    let ready = reschedule
        .step
        .newly_scheduled
        .into_iter()
        .map(|t| t.name)
        .collect::<Vec<_>>();
    assert_eq!(ready, vec!["styles".to_string()]);

    let rebuilt = finish_all(&mut scheduler, ready);
    let unique: BTreeSet<String> = rebuilt.iter().cloned().collect();
    assert_eq!(rebuilt.len(), unique.len(), "no task runs twice: {rebuilt:?}");
    assert_eq!(unique, names(&["styles", "app", "docs", "bundle"]));
    assert!(scheduler.pending().is_empty());
}

#[test]
fn changed_leaf_leaves_upstream_alone() {
    let mut scheduler = Scheduler::new(site());
    let step = scheduler.start_full_build().unwrap();
    finish_all(
        &mut scheduler,
        step.newly_scheduled.into_iter().map(|t| t.name).collect(),
    );

    scheduler.request_invalidation("app");
    let reschedule = scheduler.reschedule().unwrap().unwrap();

    assert_eq!(reschedule.frontier, names(&["bundle"]));
    let rebuilt = finish_all(
        &mut scheduler,
        reschedule
            .step
            .newly_scheduled
            .into_iter()
            .map(|t| t.name)
            .collect(),
    );
    assert_eq!(rebuilt, vec!["app".to_string(), "bundle".to_string()]);
}

#[test]
fn nothing_pending_means_no_reschedule() {
    let mut scheduler = Scheduler::new(site());
    assert!(scheduler.reschedule().unwrap().is_none());
}

/// `root` <- two tasks per layer, each depending on both tasks of the layer
/// below <- `top`. The number of root-to-top paths doubles with every layer.
fn lattice(layers: usize) -> TaskTable {
    let layer = |i: usize| vec![format!("l{i}a"), format!("l{i}b")];
    let mut records = vec![TaskRecord::new("root", "echo root", vec![])];
    let mut below = vec!["root".to_string()];
    for i in 0..layers {
        for name in layer(i) {
            records.push(TaskRecord::new(name.clone(), format!("echo {name}"), below.clone()));
        }
        below = layer(i);
    }
    records.push(TaskRecord::new("top", "echo top", below));
    TaskTable::new(records)
}

#[test]
fn deep_lattice_is_walked_once_per_task() {
    let mut table = lattice(40);
    mark_all_run(&mut table);

    let started = Instant::now();
    let frontier = invalidate(&mut table, "root").unwrap();
    let order = sequence(&table, frontier.iter().map(String::as_str)).unwrap();

    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert_eq!(frontier, names(&["top"]));
    assert_eq!(order.len(), 82);
    assert!(table.records().all(|record| !record.has_run));
}

#[test]
fn unknown_pending_task_does_not_block_the_others() {
    init_tracing();
    let mut scheduler = Scheduler::new(site());
    let step = scheduler.start_full_build().unwrap();
    finish_all(
        &mut scheduler,
        step.newly_scheduled.into_iter().map(|t| t.name).collect(),
    );

    // Sorts before "app", so it is walked first.
    scheduler.request_invalidation("0-ghost");
    scheduler.request_invalidation("app");
    let reschedule = scheduler.reschedule().unwrap().expect("app still rebuilds");

    assert_eq!(reschedule.frontier, names(&["bundle"]));
    let rebuilt = finish_all(
        &mut scheduler,
        reschedule
            .step
            .newly_scheduled
            .into_iter()
            .map(|t| t.name)
            .collect(),
    );
    assert_eq!(rebuilt, vec!["app".to_string(), "bundle".to_string()]);
    assert!(scheduler.pending().is_empty());
}

#[test]
fn only_unknown_pending_tasks_mean_no_reschedule() {
    let mut scheduler = Scheduler::new(site());
    scheduler.request_invalidation("ghost");

    assert!(scheduler.reschedule().unwrap().is_none());
    assert!(scheduler.is_idle());
    assert!(scheduler.pending().is_empty());
}
