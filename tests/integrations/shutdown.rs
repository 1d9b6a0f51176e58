//! Graceful shutdown: every measured sample reaches the log before exit.

#[path = "../helpers/mod.rs"]
mod helpers;

use anyhow::Result;
use helpers::app::TestAppBuilder;
use procpeek::inspector::test_utils::FakeInspector;
use procpeek::persister::test_utils::FailingSink;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_no_sample_is_lost_on_exit() -> Result<()> {
    let inspector = FakeInspector::new()
        .with_process(1, "alpha")
        .with_process(2, "beta")
        .with_process(3, "gamma");
    let app = TestAppBuilder::new(inspector.clone())
        .tracking(&["alpha", "beta", "gamma"])
        .with_interval_seconds(0.5)
        .start()
        .await?;

    tokio::time::sleep(Duration::from_millis(2200)).await;
    let finished = app.exit(Duration::from_secs(30)).await?;

    let measured: u64 = [1, 2, 3].iter().map(|pid| inspector.measurements(*pid)).sum();
    let rows = finished.rows();
    assert_eq!(rows.len() as u64, measured);
    // Four full windows plus the fifth in flight, for each process.
    assert_eq!(measured, 15);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_external_shutdown_stops_the_listener() -> Result<()> {
    let app = TestAppBuilder::new(FakeInspector::new().with_process(5, "worker"))
        .tracking(&["worker"])
        .start()
        .await?;

    tokio::time::sleep(Duration::from_millis(1500)).await;
    // Same path Ctrl-C takes; nothing is typed on the command channel.
    app.shutdown.trigger();
    let finished = app.wait(Duration::from_secs(30)).await?;

    let sequence: Vec<u64> = finished.rows().iter().map(|r| r.disk_read_count).collect();
    assert_eq!(sequence, vec![1, 2]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exit_while_waiting_for_a_process_is_prompt() -> Result<()> {
    let app = TestAppBuilder::new(FakeInspector::new())
        .tracking(&["ghost"])
        .with_interval_seconds(10.0)
        .start()
        .await?;

    tokio::time::sleep(Duration::from_secs(1)).await;
    let started = Instant::now();
    let finished = app.exit(Duration::from_secs(30)).await?;

    assert!(
        started.elapsed() < Duration::from_secs(10),
        "shutdown waited out the retry delay: {:?}",
        started.elapsed()
    );
    assert!(finished.rows().is_empty());
    assert!(finished.raw_log().starts_with("Iter,Time,Process"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unrecognised_commands_are_ignored() -> Result<()> {
    let app = TestAppBuilder::new(FakeInspector::new().with_process(5, "worker"))
        .tracking(&["worker"])
        .start()
        .await?;

    app.send_command("status");
    app.send_command("quit");
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!app.shutdown.is_triggered());

    app.send_command("e");
    let finished = app.wait(Duration::from_secs(30)).await?;
    assert_eq!(finished.rows().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_log_write_failure_stops_the_run() -> Result<()> {
    let inspector = FakeInspector::new()
        .with_process(1, "alpha")
        .with_process(2, "beta");
    // The header goes through, the first batch of rows does not.
    let app = TestAppBuilder::new(inspector.clone())
        .tracking(&["alpha", "beta"])
        .with_log_sink(Box::new(FailingSink::after_writes(1)))
        .start()
        .await?;
    let shutdown = app.shutdown.clone();

    let err = match app.wait(Duration::from_secs(30)).await {
        Ok(_) => panic!("a failing log must fail the run"),
        Err(e) => e,
    };
    let message = format!("{:#}", err);
    assert!(message.contains("Persister"), "{}", message);
    assert!(message.contains("no space left on device"), "{}", message);

    assert!(shutdown.is_triggered(), "samplers were not told to stop");
    // At most the measurement in flight when the write failed completes.
    for pid in [1, 2] {
        assert!(inspector.measurements(pid) <= 2, "pid {} kept sampling", pid);
    }
    Ok(())
}
