//! High-level functional tests for the Migrator facade

use std::sync::{Arc, Mutex};

use dbmigrator::fake::{script_files, FakeDatabaseHandler, FakeDatabaseSource};
use dbmigrator::{
    ActionSet, ExecutionObserver, HandlerError, Migrator, MigratorError, ScriptEntry,
};

fn fake_source() -> FakeDatabaseSource {
    let mut source = FakeDatabaseSource::new()
        .with_database("1", "db_1")
        .with_database("2", "db_2");

    source.baseline_schema.insert("1".into(), script_files(&[("a.txt", "a_sql"), ("b.txt", "b_sql")]));
    source.baseline_schema.insert("2".into(), script_files(&[("c.txt", "c_sql"), ("d.txt", "d_sql")]));
    source.migrations.insert("1".into(), script_files(&[("mig1.txt", "mig1_sql"), ("mig2.txt", "mig2_sql")]));
    source.migrations.insert("2".into(), script_files(&[("mig3.txt", "mig3_sql"), ("mig4.txt", "mig4_sql")]));
    source.code.insert("1".into(), script_files(&[("code1.txt", "code1_sql"), ("code2.txt", "code2_sql")]));
    source.code.insert("2".into(), script_files(&[("code3.txt", "code3_sql"), ("code4.txt", "code4_sql")]));
    source.reference_data.insert("1".into(), script_files(&[("ref1.txt", "ref1_sql"), ("ref2.txt", "ref2_sql")]));
    source.reference_data.insert("2".into(), script_files(&[("ref3.txt", "ref3_sql"), ("ref4.txt", "ref4_sql")]));
    source
}

fn setup(source: FakeDatabaseSource) -> (Arc<FakeDatabaseHandler>, Migrator) {
    let handler = Arc::new(FakeDatabaseHandler::new());
    let migrator = Migrator::new(Arc::new(source), handler.clone());
    (handler, migrator)
}

fn assert_history_contains(handler: &FakeDatabaseHandler, expected: &[&str]) {
    let history = handler.call_history();
    for line in expected {
        assert!(history.iter().any(|h| h == line), "missing '{}' in {:?}", line, history);
    }
}

fn assert_history_excludes(handler: &FakeDatabaseHandler, unexpected: &[&str]) {
    let history = handler.call_history();
    for line in unexpected {
        assert!(!history.iter().any(|h| h == line), "unexpected '{}' in {:?}", line, history);
    }
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl ExecutionObserver for RecordingObserver {
    fn database_recreated(&self, db_nickname: &str, db_name: &str) {
        self.events.lock().unwrap().push(format!("recreate {} as {}", db_nickname, db_name));
    }

    fn script_started(&self, script: &ScriptEntry, tracked: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {} on {} tracked={}", script.filename, script.db_nickname, tracked));
    }

    fn script_skipped(&self, script: &ScriptEntry) {
        self.events.lock().unwrap().push(format!("skip {}", script.filename));
    }

    fn script_failed(&self, script: &ScriptEntry, _error: &HandlerError) {
        self.events.lock().unwrap().push(format!("fail {}", script.filename));
    }
}

// Creating new databases

#[tokio::test]
async fn test_delete_make_new_creates_empty_database_without_running_scripts() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["1"]).await.unwrap();

    assert_eq!(handler.get_history(), "create db_1");
}

#[tokio::test]
async fn test_can_create_multiple_databases_in_order() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["2", "1"]).await.unwrap();

    assert_eq!(handler.get_history(), "create db_2; create db_1");
}

#[tokio::test]
async fn test_delete_make_new_stops_at_first_failure() {
    let (handler, mut migrator) = setup(fake_source());
    handler.simulate_exception_on("db_1");

    let err = migrator.delete_make_new(&["1", "2"]).await.unwrap_err();

    assert!(matches!(err, MigratorError::Handler { operation: "delete_make_new", .. }));
    assert_history_excludes(&handler, &["create db_2"]);
}

#[tokio::test]
async fn test_delete_make_new_unknown_nickname() {
    let (_handler, mut migrator) = setup(fake_source());
    let err = migrator.delete_make_new(&["9"]).await.unwrap_err();
    assert!(matches!(err, MigratorError::Source(_)));
}

// Baseline schema

#[tokio::test]
async fn test_happy_path_can_run_baseline_schema() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["1"]).await.unwrap();
    migrator.run_baseline_schema(&["1"]).await.unwrap();

    assert_eq!(
        handler.get_history(),
        "create db_1; execute a_sql in db_1; execute b_sql in db_1"
    );
}

#[tokio::test]
async fn test_baseline_cannot_be_run_on_database_that_already_has_tables() {
    let (handler, mut migrator) = setup(fake_source());
    handler.set_contains_user_defined_tables(true);

    let err = migrator.run_baseline_schema(&["1"]).await.unwrap_err();
    assert!(matches!(err, MigratorError::AlreadyInitialized { ref db_nickname } if db_nickname == "1"));
}

#[tokio::test]
async fn test_populated_second_database_blocks_the_whole_baseline_batch() {
    let (handler, mut migrator) = setup(fake_source());
    handler.set_populated("db_2");

    let err = migrator.run_baseline_schema(&["1", "2"]).await.unwrap_err();

    assert!(matches!(err, MigratorError::AlreadyInitialized { ref db_nickname } if db_nickname == "2"));
    assert_eq!(handler.get_history(), "", "nothing runs on db_1 either");
}

#[tokio::test]
async fn test_baseline_unknown_nickname_is_missing_connection() {
    let (_handler, mut migrator) = setup(fake_source());
    let err = migrator.run_baseline_schema(&["9"]).await.unwrap_err();
    assert!(matches!(err, MigratorError::MissingConnection { ref db_nickname } if db_nickname == "9"));
}

// Migrations

#[tokio::test]
async fn test_migrations_are_tracked() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["1"]).await.unwrap();
    let report = migrator.run_migrations(&["1"]).await.unwrap();

    assert_eq!(
        handler.get_history(),
        "create db_1; create_track_tbl in db_1; \
         check mig1.txt in db_1; execute mig1_sql in db_1; record mig1.txt in db_1; \
         check mig2.txt in db_1; execute mig2_sql in db_1; record mig2.txt in db_1"
    );
    assert_eq!(report.executed_count(), 2);
    assert_history_excludes(&handler, &["execute mig3_sql in db_2", "create db_2"]);
}

#[tokio::test]
async fn test_second_migration_run_executes_nothing() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.run_migrations(&["1"]).await.unwrap();
    handler.clear_history();

    let report = migrator.run_migrations(&["1"]).await.unwrap();

    assert_eq!(
        handler.get_history(),
        "check mig1.txt in db_1; check mig2.txt in db_1",
        "already applied scripts are only checked, the tracking table is not recreated"
    );
    assert_eq!(report.executed_count(), 0);
    assert_eq!(report.skipped_count(), 2);
}

#[tokio::test]
async fn test_each_migration_runs_at_most_once_across_fresh_migrators() {
    let handler = Arc::new(FakeDatabaseHandler::new());
    let source = Arc::new(fake_source());

    for _ in 0..2 {
        let mut migrator = Migrator::new(source.clone(), handler.clone());
        migrator.run_migrations(&["1", "2"]).await.unwrap();
    }

    for sql in ["mig1_sql in db_1", "mig2_sql in db_1", "mig3_sql in db_2", "mig4_sql in db_2"] {
        assert_eq!(handler.count(&format!("execute {}", sql)), 1, "{}", sql);
    }
    assert_eq!(handler.count("create_track_tbl in db_1"), 2, "fresh migrator re-ensures the table");
}

#[tokio::test]
async fn test_recreated_database_gets_new_tracking_table() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.run_migrations(&["1"]).await.unwrap();
    migrator.delete_make_new(&["1"]).await.unwrap();
    migrator.run_migrations(&["1"]).await.unwrap();

    assert_eq!(handler.count("create_track_tbl in db_1"), 2);
    assert_eq!(handler.count("execute mig1_sql in db_1"), 2);
}

#[tokio::test]
async fn test_migrations_interleave_databases_by_filename() {
    let mut source = FakeDatabaseSource::new()
        .with_database("db1", "db_1")
        .with_database("db2", "db_2");
    source.migrations.insert("db1".into(), script_files(&[("002.sql", "one_2"), ("001.sql", "one_1")]));
    source.migrations.insert("db2".into(), script_files(&[("001.sql", "two_1"), ("003.sql", "two_3")]));
    let (handler, mut migrator) = setup(source);

    migrator.run_migrations(&["db2", "db1"]).await.unwrap();

    let executed: Vec<String> = handler
        .call_history()
        .into_iter()
        .filter(|h| h.starts_with("execute"))
        .collect();
    assert_eq!(
        executed,
        vec![
            "execute one_1 in db_1",
            "execute two_1 in db_2",
            "execute one_2 in db_1",
            "execute two_3 in db_2",
        ]
    );
}

#[tokio::test]
async fn test_failing_migration_aborts_the_batch_and_keeps_earlier_work() {
    let mut source = FakeDatabaseSource::new()
        .with_database("db1", "db_1")
        .with_database("db2", "db_2");
    source.migrations.insert("db1".into(), script_files(&[("a", "a_sql"), ("b", "b_sql")]));
    source.migrations.insert("db2".into(), script_files(&[("bad", "bad_sql"), ("c", "c_sql")]));
    let (handler, mut migrator) = setup(source);
    handler.simulate_exception_on("bad_sql");

    let err = migrator.run_migrations(&["db1", "db2"]).await.unwrap_err();

    assert_eq!(err.failed_script(), Some("bad"));
    assert_history_contains(&handler, &["record a in db_1", "record b in db_1"]);
    assert_history_excludes(&handler, &["record bad in db_2", "execute c_sql in db_2", "check c in db_2"]);

    // Fixing the script and re-running only applies what is left.
    let mut fixed = FakeDatabaseSource::new()
        .with_database("db1", "db_1")
        .with_database("db2", "db_2");
    fixed.migrations.insert("db1".into(), script_files(&[("a", "a_sql"), ("b", "b_sql")]));
    fixed.migrations.insert("db2".into(), script_files(&[("bad", "fixed_sql"), ("c", "c_sql")]));
    let mut rerun = Migrator::new(Arc::new(fixed), handler.clone());
    let report = rerun.run_migrations(&["db1", "db2"]).await.unwrap();

    assert_eq!(report.executed_count(), 2);
    assert_eq!(handler.count("execute a_sql in db_1"), 1);
    assert_eq!(handler.count("execute c_sql in db_2"), 1);
}

// Untracked categories

#[tokio::test]
async fn test_failing_code_definition_aborts_every_database() {
    let mut source = FakeDatabaseSource::new()
        .with_database("db1", "db_1")
        .with_database("db2", "db_2");
    source.code.insert("db1".into(), script_files(&[("01_view.sql", "view_1"), ("03_proc.sql", "proc_1")]));
    source.code.insert("db2".into(), script_files(&[("02_func.sql", "bad_func"), ("04_view.sql", "view_2")]));
    let (handler, mut migrator) = setup(source);
    handler.simulate_exception_on("bad_func");

    let err = migrator.run_code_definitions(&["db1", "db2"]).await.unwrap_err();

    assert_eq!(err.failed_script(), Some("02_func.sql"));
    assert!(matches!(err, MigratorError::ScriptExecution { ref db_nickname, .. } if db_nickname == "db2"));
    assert_eq!(handler.call_history(), vec!["execute view_1 in db_1"]);
}

#[tokio::test]
async fn test_failing_reference_data_aborts_the_batch() {
    let mut source = FakeDatabaseSource::new().with_database("db1", "db_1");
    source.reference_data.insert(
        "db1".into(),
        script_files(&[("a.sql", "a_data"), ("b.sql", "bad_data"), ("c.sql", "c_data")]),
    );
    let (handler, mut migrator) = setup(source);
    handler.simulate_exception_on("bad_data");

    let err = migrator.run_reference_data(&["db1"]).await.unwrap_err();

    assert_eq!(err.failed_script(), Some("b.sql"));
    assert_history_contains(&handler, &["execute a_data in db_1"]);
    assert_history_excludes(&handler, &["execute c_data in db_1"]);
}

#[tokio::test]
async fn test_tracking_table_failure_stops_migrations() {
    let mut source = FakeDatabaseSource::new()
        .with_database("db1", "db_1")
        .with_database("db2", "db_2");
    source.migrations.insert("db1".into(), script_files(&[("a", "a_sql"), ("c", "c_sql")]));
    source.migrations.insert("db2".into(), script_files(&[("b", "b_sql")]));
    let (handler, mut migrator) = setup(source);
    handler.simulate_tracking_table_failure_on("db_2");

    let err = migrator.run_migrations(&["db1", "db2"]).await.unwrap_err();

    assert!(matches!(
        err,
        MigratorError::Handler { operation: "create_tracking_table", ref db_nickname, ref source }
            if db_nickname == "db2" && matches!(source, HandlerError::Failed { .. })
    ));
    assert_history_contains(&handler, &["record a in db_1"]);
    assert_history_excludes(&handler, &["execute b_sql in db_2", "check c in db_1", "execute c_sql in db_1"]);
}

#[tokio::test]
async fn test_code_runs_are_not_tracked() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["1"]).await.unwrap();
    migrator.run_code_definitions(&["1"]).await.unwrap();

    assert_eq!(
        handler.get_history(),
        "create db_1; execute code1_sql in db_1; execute code2_sql in db_1"
    );
}

#[tokio::test]
async fn test_code_definitions_rerun_every_time() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.run_code_definitions(&["1"]).await.unwrap();
    migrator.run_code_definitions(&["1"]).await.unwrap();

    assert_eq!(handler.count("execute code1_sql in db_1"), 2);
    assert_eq!(handler.count("execute code2_sql in db_1"), 2);
}

#[tokio::test]
async fn test_ref_data_runs_are_not_tracked() {
    let (handler, mut migrator) = setup(fake_source());
    migrator.delete_make_new(&["1"]).await.unwrap();
    migrator.run_reference_data(&["1"]).await.unwrap();

    assert_eq!(
        handler.get_history(),
        "create db_1; execute ref1_sql in db_1; execute ref2_sql in db_1"
    );
}

// Facade behaviour

#[tokio::test]
async fn test_empty_nickname_list_is_a_no_op() {
    let (handler, mut migrator) = setup(fake_source());
    let none: [&str; 0] = [];

    migrator.delete_make_new(&none).await.unwrap();
    migrator.run_baseline_schema(&none).await.unwrap();
    migrator.run_migrations(&none).await.unwrap();
    migrator.run_code_definitions(&none).await.unwrap();
    migrator.run_reference_data(&none).await.unwrap();

    assert!(handler.call_history().is_empty());
}

#[tokio::test]
async fn test_run_actions_follows_fixed_order() {
    let (handler, mut migrator) = setup(fake_source());
    let actions = ActionSet {
        delete_make_new: true,
        baseline_schema: true,
        ..ActionSet::update()
    };

    let report = migrator.run_actions(&actions, &["1"]).await.unwrap();

    let history = handler.call_history();
    let position = |line: &str| history.iter().position(|h| h == line).unwrap();
    assert!(position("create db_1") < position("execute a_sql in db_1"));
    assert!(position("execute b_sql in db_1") < position("execute mig1_sql in db_1"));
    assert!(position("record mig2.txt in db_1") < position("execute code1_sql in db_1"));
    assert!(position("execute code2_sql in db_1") < position("execute ref1_sql in db_1"));
    assert_eq!(report.executed_count(), 8);
}

#[tokio::test]
async fn test_applied_scripts_lists_tracking_records() {
    let (_handler, mut migrator) = setup(fake_source());
    migrator.run_migrations(&["1"]).await.unwrap();

    let applied: Vec<String> = migrator
        .applied_scripts("1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.script_name)
        .collect();
    assert_eq!(applied, vec!["mig1.txt", "mig2.txt"]);
}

#[tokio::test]
async fn test_observer_sees_every_step() {
    let observer = Arc::new(RecordingObserver::default());
    let (handler, migrator) = setup(fake_source());
    let mut migrator = migrator.with_observer(observer.clone());
    handler.simulate_exception_on("mig2_sql");

    migrator.delete_make_new(&["1"]).await.unwrap();
    assert!(migrator.run_migrations(&["1"]).await.is_err());

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec![
            "recreate 1 as db_1",
            "start mig1.txt on 1 tracked=true",
            "start mig2.txt on 1 tracked=true",
            "fail mig2.txt",
        ]
    );
}
