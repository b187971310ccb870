use daybook_core::{
    CollectionStore, DurableStorage, Habit, HabitFrequency, PlanningEvent, SqliteStorage,
    StorageError, StorageEvent, StorageHandle, StorageResult, StoreConfig, StoreError,
    StoredRecord, Task, TaskPatch, TaskPriority, TaskStatus, WritePolicy,
};
use rusqlite::Connection;
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;

fn memory_handle() -> StorageHandle {
    StorageHandle::open(&StoreConfig::default())
}

fn file_handle(path: &Path) -> StorageHandle {
    StorageHandle::open(&StoreConfig::with_db_path(path))
}

fn task(id: &str, title: &str) -> Task {
    Task::with_id(id, title, TaskPriority::Low)
}

fn ids(store: &CollectionStore<Task>) -> Vec<String> {
    store.list().into_iter().map(|task| task.id).collect()
}

#[test]
fn add_update_remove_scenario() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    assert!(store.is_empty());

    store.add(task("1", "X")).unwrap();
    let listed = store.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "1");
    assert_eq!(listed[0].status, TaskStatus::Todo);
    assert!(!listed[0].completed);

    store
        .update("1", json!({"status": "done", "completed": true}))
        .unwrap();
    let listed = store.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, TaskStatus::Done);
    assert!(listed[0].completed);
    assert_eq!(listed[0].title, "X");

    store.remove("1").unwrap();
    assert!(store.list().is_empty());

    let err = store.remove("1").unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "1"));
}

#[test]
fn duplicate_id_leaves_collection_unchanged() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    store.add(task("a", "first")).unwrap();

    let err = store.add(task("a", "second")).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(id) if id == "a"));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("a").unwrap().title, "first");
}

#[test]
fn update_missing_record_is_not_found() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    let err = store.update("ghost", json!({"title": "x"})).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.is_empty());
}

#[test]
fn update_keeps_position_and_empty_patch_is_noop() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    store.add(task("a", "A")).unwrap();
    store.add(task("b", "B")).unwrap();
    store.add(task("c", "C")).unwrap();

    store.update("b", json!({"title": "B2"})).unwrap();
    assert_eq!(ids(&store), vec!["a", "b", "c"]);
    assert_eq!(store.get("b").unwrap().title, "B2");

    let unchanged = store.update("c", json!({})).unwrap();
    assert_eq!(unchanged.title, "C");
}

#[test]
fn patch_cannot_change_id_or_break_validation() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    store.add(task("a", "A")).unwrap();

    let err = store.update("a", json!({"id": "b"})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch(_)));

    let err = store.update("a", json!({"due_date": "next week"})).unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = store.update("a", json!({"colour": "#ff0000"})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch(message) if message.contains("colour")));

    let err = store.update("a", json!({"priority": "urgent"})).unwrap_err();
    assert!(matches!(err, StoreError::InvalidPatch(_)));

    assert_eq!(store.get("a").unwrap(), store.list()[0]);
    assert!(!store.get("a").unwrap().completed);
}

#[test]
fn status_and_completion_update_independently() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    store.add(task("a", "A")).unwrap();

    let updated = store.update("a", json!({"status": "done"})).unwrap();
    assert_eq!(updated.status, TaskStatus::Done);
    assert!(!updated.completed);

    let mut flagged = task("b", "B");
    flagged.status = TaskStatus::InProgress;
    flagged.completed = true;
    assert!(store.add(flagged).unwrap().completed);
}

#[test]
fn task_patch_can_clear_optional_fields() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    let mut dated = task("a", "A");
    dated.due_date = Some("2024-03-01".to_string());
    dated.description = Some("quarterly".to_string());
    store.add(dated).unwrap();

    let cleared = store
        .update(
            "a",
            TaskPatch {
                due_date: Some(None),
                ..TaskPatch::default()
            },
        )
        .unwrap();
    assert_eq!(cleared.due_date, None);
    assert_eq!(cleared.description.as_deref(), Some("quarterly"));
}

#[test]
fn clear_twice_succeeds() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    store.add(task("a", "A")).unwrap();

    store.clear().unwrap();
    store.clear().unwrap();
    assert!(store.is_empty());
}

#[test]
fn blank_id_gets_generated_uuid() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    let stored = store.add(task("", "untitled id")).unwrap();

    assert!(uuid::Uuid::parse_str(&stored.id).is_ok());
    assert_eq!(store.get(&stored.id).unwrap().title, "untitled id");
}

#[test]
fn blank_collection_name_is_rejected() {
    let result = CollectionStore::<Task>::open(&memory_handle(), "  ", Vec::new());
    assert!(matches!(result, Err(StoreError::InvalidName(_))));
}

#[test]
fn duplicate_initial_data_is_rejected() {
    let result = CollectionStore::<Task>::open(
        &memory_handle(),
        "tasks",
        vec![task("a", "A"), task("a", "again")],
    );
    assert!(matches!(result, Err(StoreError::DuplicateId(_))));
}

#[test]
fn records_survive_restart_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    {
        let handle = file_handle(&path);
        let store = CollectionStore::<Task>::open(&handle, "tasks", Vec::new()).unwrap();
        store.add(task("a", "A")).unwrap();
        store.add(task("b", "B")).unwrap();
        store.add(task("c", "C")).unwrap();
        store
            .update("a", json!({"status": "in_progress", "due_date": "2024-03-01"}))
            .unwrap();
        store.remove("b").unwrap();
        handle.close().unwrap();
    }

    let store = CollectionStore::<Task>::open(&file_handle(&path), "tasks", Vec::new()).unwrap();
    assert_eq!(ids(&store), vec!["a", "c"]);
    let first = store.get("a").unwrap();
    assert_eq!(first.status, TaskStatus::InProgress);
    assert_eq!(first.due_date.as_deref(), Some("2024-03-01"));
}

#[test]
fn planning_events_survive_restart_field_for_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    let mut review = PlanningEvent::at("review", "2024-03-04", "14:30");
    review.category = Some("work".to_string());
    review.color = Some("#3B82F6".to_string());
    let events = vec![
        review,
        PlanningEvent::all_day("holiday", "2024-03-05"),
        PlanningEvent::at("gym", "2024-03-06", "07:00"),
    ];

    {
        let handle = file_handle(&path);
        let store =
            CollectionStore::<PlanningEvent>::open(&handle, "planning", Vec::new()).unwrap();
        for event in &events {
            store.add(event.clone()).unwrap();
        }
        handle.close().unwrap();
    }

    let store =
        CollectionStore::<PlanningEvent>::open(&file_handle(&path), "planning", Vec::new())
            .unwrap();
    assert_eq!(store.list(), events);
}

#[test]
fn habits_survive_restart_field_for_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    let mut reading = Habit::new("read", HabitFrequency::Daily);
    reading.completed_dates = vec!["2024-03-01".to_string(), "2024-03-02".to_string()];
    reading.color = Some("#10B981".to_string());
    let habits = vec![reading, Habit::new("long run", HabitFrequency::Weekly)];

    {
        let handle = file_handle(&path);
        let store = CollectionStore::<Habit>::open(&handle, "habits", habits.clone()).unwrap();
        assert_eq!(store.len(), 2);
        handle.close().unwrap();
    }

    let store =
        CollectionStore::<Habit>::open(&file_handle(&path), "habits", Vec::new()).unwrap();
    assert_eq!(store.list(), habits);
    let stored_ids: Vec<String> = store.list().into_iter().map(|habit| habit.id).collect();
    let seeded_ids: Vec<String> = habits.iter().map(|habit| habit.id.clone()).collect();
    assert_eq!(stored_ids, seeded_ids);
}

#[test]
fn initial_data_is_seeded_only_on_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    {
        let store =
            CollectionStore::<Task>::open(&file_handle(&path), "tasks", vec![task("seed", "S")])
                .unwrap();
        assert_eq!(ids(&store), vec!["seed"]);
        store.remove("seed").unwrap();
    }

    let store =
        CollectionStore::<Task>::open(&file_handle(&path), "tasks", vec![task("seed", "S")])
            .unwrap();
    assert!(store.is_empty());
}

#[test]
fn collections_are_isolated_by_name() {
    let handle = memory_handle();
    let work = CollectionStore::<Task>::open(&handle, "work", Vec::new()).unwrap();
    let home = CollectionStore::<Task>::open(&handle, "home", Vec::new()).unwrap();

    work.add(task("a", "report")).unwrap();
    home.add(task("a", "laundry")).unwrap();
    home.clear().unwrap();

    assert_eq!(work.get("a").unwrap().title, "report");
    assert!(home.is_empty());
}

#[test]
fn corrupt_stored_rows_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daybook.db");

    {
        let store =
            CollectionStore::<Task>::open(&file_handle(&path), "tasks", Vec::new()).unwrap();
        store.add(task("good", "kept")).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO collection_records (collection, id, seq, payload)
         VALUES ('tasks', 'bad', 99, '{not json');",
        [],
    )
    .unwrap();
    drop(conn);

    let store = CollectionStore::<Task>::open(&file_handle(&path), "tasks", Vec::new()).unwrap();
    assert_eq!(ids(&store), vec!["good"]);
}

#[test]
fn unavailable_storage_runs_memory_only() {
    let handle = StorageHandle::unavailable(WritePolicy::Rollback);
    let store = CollectionStore::<Task>::open(&handle, "tasks", vec![task("a", "A")]).unwrap();
    assert!(store.is_degraded());

    store.add(task("b", "B")).unwrap();
    store.update("a", json!({"title": "A2"})).unwrap();
    store.remove("b").unwrap();
    assert_eq!(ids(&store), vec!["a"]);
    assert_eq!(store.get("a").unwrap().title, "A2");
    store.reload().unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn unopenable_database_path_degrades() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("nested").join("daybook.db");

    let handle = file_handle(&path);
    assert!(!handle.is_available());
    let store = CollectionStore::<Task>::open(&handle, "tasks", Vec::new()).unwrap();
    store.add(task("a", "A")).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn listeners_receive_mirror_after_each_mutation() {
    let store = CollectionStore::<Task>::open(&memory_handle(), "tasks", Vec::new()).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = store.subscribe(move |records: &[Task]| sink.borrow_mut().push(records.len()));

    store.add(task("a", "A")).unwrap();
    store.add(task("b", "B")).unwrap();
    let _ = store.add(task("a", "dup"));
    store.remove("a").unwrap();
    assert!(store.unsubscribe(id));
    store.clear().unwrap();

    assert_eq!(*seen.borrow(), vec![1, 2, 1]);
}

/// SQLite storage whose record writes can be switched to fail.
struct FlakyStorage {
    inner: SqliteStorage,
    failing: Cell<bool>,
    /// Number of upcoming collection creations that fail part-way through
    /// seeding.
    broken_seeds: Cell<u32>,
}

impl FlakyStorage {
    fn new() -> Self {
        Self {
            inner: SqliteStorage::open(&StoreConfig::default()).unwrap(),
            failing: Cell::new(false),
            broken_seeds: Cell::new(0),
        }
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.get() {
            return Err(StorageError::Timeout);
        }
        Ok(())
    }
}

impl DurableStorage for FlakyStorage {
    fn origin(&self) -> &str {
        self.inner.origin()
    }

    fn create_collection(&self, name: &str, records: &[StoredRecord]) -> StorageResult<bool> {
        let broken = self.broken_seeds.get();
        if broken == 0 {
            return self.inner.create_collection(name, records);
        }
        self.broken_seeds.set(broken - 1);
        // A blank id violates the table's CHECK constraint after the
        // collection row and the real records were inserted.
        let mut records = records.to_vec();
        records.push(StoredRecord {
            id: String::new(),
            payload: "{}".to_string(),
        });
        self.inner.create_collection(name, &records)
    }

    fn get_all(&self, name: &str) -> StorageResult<Vec<StoredRecord>> {
        self.inner.get_all(name)
    }

    fn put(&self, name: &str, record: &StoredRecord) -> StorageResult<()> {
        self.check()?;
        self.inner.put(name, record)
    }

    fn delete(&self, name: &str, id: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(name, id)
    }

    fn clear(&self, name: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.clear(name)
    }

    fn get_preference(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get_preference(key)
    }

    fn set_preference(&self, key: &str, value: Option<&str>) -> StorageResult<()> {
        self.inner.set_preference(key, value)
    }

    fn poll_external_changes(&self) -> StorageResult<Vec<StorageEvent>> {
        self.inner.poll_external_changes()
    }

    fn close(&self) -> StorageResult<()> {
        self.inner.close()
    }
}

fn flaky_store(policy: WritePolicy) -> (Rc<FlakyStorage>, CollectionStore<Task>) {
    let storage = Rc::new(FlakyStorage::new());
    let handle = StorageHandle::with_storage(Rc::clone(&storage) as Rc<dyn DurableStorage>, policy);
    let store = CollectionStore::open(&handle, "tasks", vec![task("a", "A")]).unwrap();
    (storage, store)
}

#[test]
fn failed_seed_does_not_lose_initial_data() {
    let storage = Rc::new(FlakyStorage::new());
    storage.broken_seeds.set(1);
    let handle = StorageHandle::with_storage(
        Rc::clone(&storage) as Rc<dyn DurableStorage>,
        WritePolicy::Rollback,
    );

    let first = CollectionStore::<Task>::open(&handle, "tasks", vec![task("s1", "seeded")]);
    assert!(matches!(first, Err(StoreError::Storage(_))));

    let second =
        CollectionStore::<Task>::open(&handle, "tasks", vec![task("s1", "seeded")]).unwrap();
    assert_eq!(ids(&second), vec!["s1"]);
    assert_eq!(storage.inner.get_all("tasks").unwrap().len(), 1);
}

#[test]
fn failed_writes_roll_back_the_mirror() {
    let (storage, store) = flaky_store(WritePolicy::Rollback);
    storage.failing.set(true);

    let err = store.add(task("b", "B")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Persist {
            op: "add",
            mirror_retained: false,
            source: StorageError::Timeout,
            ..
        }
    ));
    assert_eq!(ids(&store), vec!["a"]);

    assert!(store.update("a", json!({"title": "A2"})).is_err());
    assert_eq!(store.get("a").unwrap().title, "A");

    assert!(store.remove("a").is_err());
    assert_eq!(ids(&store), vec!["a"]);

    assert!(store.clear().is_err());
    assert_eq!(ids(&store), vec!["a"]);

    storage.failing.set(false);
    store.reload().unwrap();
    assert_eq!(ids(&store), vec!["a"]);
}

#[test]
fn keep_optimistic_policy_retains_mirror_and_reports() {
    let (storage, store) = flaky_store(WritePolicy::KeepOptimistic);
    storage.failing.set(true);

    let err = store.add(task("b", "B")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Persist {
            mirror_retained: true,
            ..
        }
    ));
    assert_eq!(ids(&store), vec!["a", "b"]);

    storage.failing.set(false);
    store.reload().unwrap();
    assert_eq!(ids(&store), vec!["a"]);
}

#[test]
fn closed_handle_reports_persist_errors() {
    let handle = memory_handle();
    let store = CollectionStore::<Task>::open(&handle, "tasks", Vec::new()).unwrap();
    handle.close().unwrap();

    let err = store.add(task("a", "A")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Persist {
            source: StorageError::Closed,
            mirror_retained: false,
            ..
        }
    ));
    assert!(store.is_empty());
}
