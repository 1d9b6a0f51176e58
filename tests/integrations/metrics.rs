#[path = "../helpers/mod.rs"]
mod helpers;

use anyhow::Result;
use helpers::app::TestAppBuilder;
use procpeek::inspector::test_utils::FakeInspector;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn scrape(addr: SocketAddr) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await?;
    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

#[tokio::test]
async fn pipeline_metrics_are_exported() -> Result<()> {
    let app = TestAppBuilder::new(FakeInspector::new().with_process(3, "chrome"))
        .tracking(&["chrome", "ghost"])
        .with_interval_seconds(0.1)
        .with_config_modifier(|config| {
            config.metrics.enabled = true;
            config.metrics.listen_address = "127.0.0.1:0".parse().unwrap();
        })
        .start()
        .await?;
    let addr = app.metrics_addr.expect("metrics should be enabled");

    tokio::time::sleep(Duration::from_millis(600)).await;
    let body = scrape(addr).await?;

    assert!(body.starts_with("HTTP/1.1 200"), "{}", body);
    assert!(
        body.contains(r#"samples_enqueued_total{process="chrome"}"#),
        "{}",
        body
    );
    assert!(
        body.contains(r#"process_not_found_total{process="ghost"}"#),
        "{}",
        body
    );
    assert!(body.contains("log_rows_written_total"), "{}", body);
    assert!(body.contains("log_flush_duration_seconds_bucket"), "{}", body);

    let finished = app.exit(Duration::from_secs(10)).await?;
    assert!(!finished.rows().is_empty());
    Ok(())
}
