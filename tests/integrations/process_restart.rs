//! A tracked process exits and is relaunched under a new pid mid-run.

#[path = "../helpers/mod.rs"]
mod helpers;

use anyhow::Result;
use helpers::app::TestAppBuilder;
use procpeek::inspector::test_utils::FakeInspector;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_sampler_rebinds_after_restart() -> Result<()> {
    let inspector = FakeInspector::new()
        .with_lifetime(
            1200,
            "notepad.exe",
            Duration::ZERO,
            Some(Duration::from_millis(3500)),
        )
        .with_lifetime(3400, "Notepad.exe", Duration::from_millis(5500), None);
    let app = TestAppBuilder::new(inspector.clone())
        .tracking(&["Notepad"])
        .start()
        .await?;

    tokio::time::sleep(Duration::from_millis(9500)).await;
    let finished = app.exit(Duration::from_secs(30)).await?;

    let rows = finished.rows();
    let names: Vec<&str> = rows.iter().map(|r| r.process.as_str()).collect();
    let first_run = names.iter().take_while(|n| **n == "notepad.exe").count();
    assert_eq!(first_run, 3, "rows: {:?}", names);
    assert!(
        names[first_run..].iter().all(|n| *n == "Notepad.exe"),
        "rows: {:?}",
        names
    );
    assert!(names.len() - first_run >= 3, "rows: {:?}", names);
    assert!(rows.iter().all(|r| r.run_id == finished.run_id));

    // Initial bind, the lookup after the process vanished, the retries while it
    // was down and the one that found the relaunch.
    assert!(inspector.lookups() >= 4, "lookups: {}", inspector.lookups());
    Ok(())
}
