//! End-to-end runs of the sampling pipeline against a scripted process table.

#[path = "../helpers/mod.rs"]
mod helpers;

use anyhow::Result;
use helpers::app::TestAppBuilder;
use procpeek::inspector::test_utils::FakeInspector;
use std::time::Duration;

const HEADER: &str = "Iter,Time,Process,CPU Usage,Memory Usage,Disk Read Count,Disk Write Count,Disk Read Bytes,Disk Write Bytes";

fn header_lines(log: &str) -> usize {
    log.lines().filter(|line| *line == HEADER).count()
}

#[tokio::test(start_paused = true)]
async fn test_samples_share_the_next_run_id() -> Result<()> {
    let inspector = FakeInspector::new()
        .with_process(10, "chrome")
        .with_process(20, "firefox");
    let app = TestAppBuilder::new(inspector)
        .tracking(&["chrome", "firefox"])
        .with_existing_log(&format!(
            "{}\n4,2024-05-01 08:30:00,chrome,1.0,0.5,1,1,4096,512\n",
            HEADER
        ))
        .start()
        .await?;
    assert_eq!(app.run_id, 5);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let finished = app.exit(Duration::from_secs(30)).await?;

    let rows = finished.rows();
    assert_eq!(rows[0].run_id, 4, "existing rows are kept");
    let new_rows: Vec<_> = rows.iter().filter(|r| r.run_id == 5).collect();
    assert_eq!(new_rows.len(), rows.len() - 1, "every new row carries run 5");

    for process in ["chrome", "firefox"] {
        let sequence: Vec<u64> = new_rows
            .iter()
            .filter(|r| r.process == process)
            .map(|r| r.disk_read_count)
            .collect();
        // Three full windows plus the one in flight when exit arrived.
        assert_eq!(sequence, vec![1, 2, 3, 4], "{} rows out of order", process);
    }
    assert_eq!(header_lines(&finished.raw_log()), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sequential_runs_append_to_the_same_log() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("process_info.csv");

    for expected_run in 1..=2u64 {
        let inspector = FakeInspector::new().with_process(7, "code");
        let app = TestAppBuilder::new(inspector)
            .tracking(&["code"])
            .with_log_path(&log_path)
            .start()
            .await?;
        assert_eq!(app.run_id, expected_run);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        app.exit(Duration::from_secs(30)).await?;
    }

    let log = std::fs::read_to_string(&log_path)?;
    assert!(log.starts_with(HEADER));
    assert_eq!(header_lines(&log), 1, "header must only be written once");

    let rows = helpers::app::read_rows(&log_path);
    let runs: Vec<u64> = rows.iter().map(|r| r.run_id).collect();
    assert_eq!(runs, vec![1, 1, 2, 2]);
    assert!(rows.iter().all(|r| r.process == "code" && r.cpu_usage == 10.0));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_header_only_log_starts_at_run_one() -> Result<()> {
    let app = TestAppBuilder::new(FakeInspector::new().with_process(1, "vim"))
        .tracking(&["vim"])
        .with_existing_log(&format!("{}\n", HEADER))
        .start()
        .await?;
    assert_eq!(app.run_id, 1);

    let finished = app.exit(Duration::from_secs(30)).await?;
    assert_eq!(header_lines(&finished.raw_log()), 1);
    assert!(finished.rows().iter().all(|r| r.run_id == 1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_malformed_log_tail_aborts_startup() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("process_info.csv");
    let contents = format!("{}\nnot-a-run,2024-05-01 08:30:00,chrome,1,1,1,1,1,1\n", HEADER);

    let started = TestAppBuilder::new(FakeInspector::new().with_process(1, "chrome"))
        .tracking(&["chrome"])
        .with_log_path(&log_path)
        .with_existing_log(&contents)
        .start()
        .await;
    let err = match started {
        Ok(_) => panic!("startup should fail on a malformed log"),
        Err(e) => e,
    };
    let message = format!("{:#}", err);
    assert!(message.contains("cannot derive the run id"), "{}", message);
    assert!(message.contains("not-a-run"), "{}", message);
    assert_eq!(std::fs::read_to_string(&log_path)?, contents);
    Ok(())
}
