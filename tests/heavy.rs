use tempfile::tempdir;

use std::time::Duration;

use aio_write_verify::{
    run_check, run_iterations, run_iterations_with, CheckConfig, FailurePolicy, RunConfig,
    Verification, DEFAULT_MAX_IN_FLIGHT,
};

mod helpers;

use helpers::dir_entries;

#[tokio::test(flavor = "multi_thread")]
async fn reference_run() {
    let root = tempdir().unwrap();
    let dir = root.path().join("Tests");

    // reference parameters; the local filesystem needs no settle time
    let config = RunConfig::new(&dir);

    let report = run_iterations(&config).await.unwrap();

    assert_eq!(10, report.results.len());
    assert!(report.all_passed());
    assert!(!dir.exists());

    root.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn many_chunks_few_slots() {
    let root = tempdir().unwrap();
    let dir = root.path().join("nested").join("work");

    let config = RunConfig {
        iterations: 4,
        check: CheckConfig {
            chunk_len: 65536,
            chunk_count: 128,
            max_in_flight: Some(4),
            ..CheckConfig::default()
        },
        policy: FailurePolicy::Continue,
        keep_dir: true,
        ..RunConfig::new(&dir)
    };

    let report = run_iterations(&config).await.unwrap();

    assert_eq!(4, report.results.len());
    assert_eq!(None, report.first_failure());
    assert!(dir.exists());
    assert_eq!(0, dir_entries(&dir));

    root.close().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn chunk_count_beyond_aio_limit() {
    let dir = tempdir().unwrap();

    // more chunks than fs.aio-max-nr allows slots
    let config = CheckConfig {
        chunk_len: 1,
        chunk_count: 70_000,
        ..CheckConfig::default()
    };
    assert_eq!(DEFAULT_MAX_IN_FLIGHT, config.slots());

    assert_eq!(
        Verification::Success,
        run_check(dir.path(), &config).await.unwrap()
    );
    assert_eq!(0, dir_entries(dir.path()));

    dir.close().unwrap();
}

#[tokio::test]
async fn progress_reported_per_iteration() {
    let root = tempdir().unwrap();

    let config = RunConfig {
        iterations: 3,
        check: CheckConfig {
            chunk_len: 4096,
            chunk_count: 4,
            settle_delay: Duration::from_secs(0),
            ..CheckConfig::default()
        },
        ..RunConfig::new(root.path().join("work"))
    };

    let mut seen = Vec::new();
    let report = run_iterations_with(&config, |iteration| seen.push(iteration))
        .await
        .unwrap();

    assert_eq!(vec![0, 1, 2], seen);
    assert!(report.all_passed());

    root.close().unwrap();
}
