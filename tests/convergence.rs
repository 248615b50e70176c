use chrono::{Duration, NaiveDate};
use daybook::utils::format_date;
use daybook::{Database, FixedClock, Task, TaskStore, ViewKind};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    Toggle(usize),
    Archive(usize),
    Reschedule(usize, Option<i64>),
    Retitle(usize),
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 5).expect("valid date")
}

fn due(offset: Option<i64>) -> Option<String> {
    offset.map(|days| format_date(today() + Duration::days(days)))
}

fn seed_strategy() -> impl Strategy<Value = Vec<(Option<i64>, bool)>> {
    prop::collection::vec((prop::option::of(-3i64..=3), any::<bool>()), 1..8)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(Op::Toggle),
        1 => any::<usize>().prop_map(Op::Archive),
        1 => (any::<usize>(), prop::option::of(-3i64..=3)).prop_map(|(i, d)| Op::Reschedule(i, d)),
        1 => any::<usize>().prop_map(Op::Retitle),
    ]
}

fn seeded_store(seed: &[(Option<i64>, bool)]) -> (TaskStore, Vec<i64>) {
    let store = TaskStore::new(Database::open_in_memory().expect("open db"), FixedClock(today()));
    let tasks: Vec<Task> = seed
        .iter()
        .enumerate()
        .map(|(i, (offset, completed))| {
            let mut task = Task::new(format!("task {i}"));
            task.due_date = due(*offset);
            task.completed = *completed;
            task
        })
        .collect();
    let ids = store.save(&tasks).expect("save");
    (store, ids)
}

fn assert_unique(store: &TaskStore) {
    for kind in ViewKind::ALL {
        let entries = store.view_entries(kind).expect("scan");
        let ids: HashSet<i64> = entries.iter().map(|e| e.task_id).collect();
        assert_eq!(ids.len(), entries.len(), "duplicate task id in {kind} view");
    }
}

proptest! {
    #[test]
    fn rebuild_converges_after_any_mutation_sequence(
        seed in seed_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..24),
    ) {
        let (store, ids) = seeded_store(&seed);

        for op in ops {
            match op {
                Op::Toggle(i) => {
                    store.toggle_complete(ids[i % ids.len()]).expect("toggle");
                }
                Op::Archive(i) => {
                    store.toggle_archive(ids[i % ids.len()]).expect("archive");
                }
                Op::Reschedule(i, offset) => {
                    let mut task = store.get(ids[i % ids.len()]).expect("get").expect("exists");
                    task.due_date = due(offset);
                    store.save(&[task]).expect("save");
                }
                Op::Retitle(i) => {
                    let mut task = store.get(ids[i % ids.len()]).expect("get").expect("exists");
                    task.title.push('!');
                    store.save(&[task]).expect("save");
                }
            }
            assert_unique(&store);
        }

        store.rebuild_overdue().expect("rebuild");
        store.refresh_today().expect("refresh");

        let drifts: Vec<_> = store
            .check_consistency()
            .expect("check")
            .into_iter()
            .filter(|d| d.view != ViewKind::Active)
            .collect();
        prop_assert!(drifts.is_empty(), "views drifted: {:?}", drifts);

        let overdue: HashSet<i64> = store
            .view_entries(ViewKind::Overdue)
            .expect("scan")
            .iter()
            .map(|e| e.task_id)
            .collect();
        let expected: HashSet<i64> = store
            .compute_overdue_set()
            .expect("scan")
            .iter()
            .filter_map(|t| t.id)
            .collect();
        prop_assert_eq!(overdue, expected);
    }

    #[test]
    fn incremental_toggles_never_need_repair(
        seed in seed_strategy(),
        toggles in prop::collection::vec(any::<usize>(), 1..16),
    ) {
        let (store, ids) = seeded_store(&seed);
        store.sync_views().expect("sync");

        for i in toggles {
            let id = ids[i % ids.len()];
            let before = store.get(id).expect("get").expect("exists").completed;
            let outcome = store.toggle_complete(id).expect("toggle").expect("exists");
            prop_assert_eq!(outcome.completed, !before);
            prop_assert_eq!(outcome.repaired, 0);
            prop_assert!(store.check_consistency().expect("check").is_empty());
        }
        assert_unique(&store);
    }
}
