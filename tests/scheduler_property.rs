// tests/scheduler_property.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use proptest::prelude::*;
use restage::dag::{Scheduler, TaskRecord, TaskTable, invalidate, sequence};
use restage::engine::TaskOutcome;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let deps: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    };
                    deps.into_iter().collect()
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build_table(deps: &[Vec<usize>]) -> TaskTable {
    TaskTable::new(deps.iter().enumerate().map(|(i, ds)| {
        TaskRecord::new(name(i), format!("echo {i}"), ds.iter().map(|d| name(*d)).collect())
    }))
}

/// Every task reachable downstream of `start`, including itself.
fn downstream(deps: &[Vec<usize>], start: usize) -> HashSet<String> {
    let mut reached = HashSet::from([name(start)]);
    let mut changed = true;
    while changed {
        changed = false;
        for (i, ds) in deps.iter().enumerate() {
            if !reached.contains(&name(i)) && ds.iter().any(|d| reached.contains(&name(*d))) {
                reached.insert(name(i));
                changed = true;
            }
        }
    }
    reached
}

proptest! {
    #[test]
    fn full_sequence_runs_every_task_once_after_its_dependencies(deps in dag_strategy(12)) {
        let table = build_table(&deps);
        let frontier: Vec<&str> = table.graph().frontier().collect();

        for task in &frontier {
            prop_assert!(table.dependents_of(task).is_empty());
        }

        let order = sequence(&table, frontier).unwrap();
        prop_assert_eq!(order.len(), deps.len());

        let position: HashMap<&str, usize> =
            order.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        prop_assert_eq!(position.len(), order.len());

        for (i, ds) in deps.iter().enumerate() {
            for d in ds {
                prop_assert!(position[name(*d).as_str()] < position[name(i).as_str()]);
            }
        }
    }

    #[test]
    fn invalidation_resets_exactly_the_downstream_tree(
        deps in dag_strategy(12),
        pick in any::<usize>(),
    ) {
        let mut table = build_table(&deps);
        for record in table.records_mut() {
            record.has_run = true;
        }

        let start = pick % deps.len();
        let frontier = invalidate(&mut table, &name(start)).unwrap();
        let expected = downstream(&deps, start);

        for record in table.records() {
            prop_assert_eq!(!record.has_run, expected.contains(&record.name));
        }
        for task in &frontier {
            prop_assert!(expected.contains(task));
            prop_assert!(table.dependents_of(task).is_empty());
        }
    }

    #[test]
    fn runs_always_terminate(
        deps in dag_strategy(10),
        failing in proptest::collection::hash_set(0..10usize, 0..3),
        changed in proptest::collection::vec(0..10usize, 1..4),
    ) {
        let mut scheduler = Scheduler::new(build_table(&deps));
        let failing: HashSet<String> = failing.into_iter().map(name).collect();

        let drive = |scheduler: &mut Scheduler, mut ready: Vec<String>| -> usize {
            let mut dispatched = 0;
            while let Some(task) = ready.pop() {
                dispatched += 1;
                let outcome = if failing.contains(&task) {
                    TaskOutcome::Failed(1)
                } else {
                    TaskOutcome::Success
                };
                let step = scheduler.handle_completion(&task, outcome);
                ready.extend(step.newly_scheduled.into_iter().map(|t| t.name));
            }
            dispatched
        };

        let step = scheduler.start_full_build().unwrap();
        let ready = step.newly_scheduled.into_iter().map(|t| t.name).collect();
        prop_assert!(drive(&mut scheduler, ready) <= deps.len());
        prop_assert!(scheduler.is_idle());

        for i in changed {
            scheduler.request_invalidation(&name(i % deps.len()));
        }
        if let Some(reschedule) = scheduler.reschedule().unwrap() {
            let ready = reschedule.step.newly_scheduled.into_iter().map(|t| t.name).collect();
            prop_assert!(drive(&mut scheduler, ready) <= reschedule.sequence.len());
        }
        prop_assert!(scheduler.is_idle());
        prop_assert!(scheduler.pending().is_empty());
    }
}
