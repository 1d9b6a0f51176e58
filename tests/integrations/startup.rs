use anyhow::Result;
use assert_cmd::Command;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn procpeek_bin() -> Result<Command> {
    let mut cmd = Command::cargo_bin("procpeek")?;
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

#[test]
fn test_startup_fails_without_process_names() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cmd = procpeek_bin()?;
    cmd.arg("-o").arg(dir.path().join("log.csv")).write_stdin("\n");

    cmd.assert()
        .failure()
        .stdout(predicates::str::contains(
            "Enter the names of the processes to track",
        ))
        .stderr(predicates::str::contains("no process names"));

    Ok(())
}

#[test]
fn test_startup_fails_if_log_tail_is_malformed() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "Iter,Time,Process")?;
    writeln!(file, "garbage,line")?;

    let mut cmd = procpeek_bin()?;
    cmd.arg("-p").arg("chrome").arg("-o").arg(file.path());

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("cannot derive the run id"));

    Ok(())
}

#[test]
fn test_startup_fails_with_zero_interval() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cmd = procpeek_bin()?;
    cmd.arg("-p")
        .arg("chrome")
        .arg("-i")
        .arg("0")
        .arg("-o")
        .arg(dir.path().join("log.csv"));

    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("interval_seconds"));

    Ok(())
}

#[test]
fn test_exit_command_stops_a_waiting_sampler() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("log.csv");

    let mut cmd = procpeek_bin()?;
    cmd.arg("-p")
        .arg("procpeek-no-such-process-zz")
        .arg("-i")
        .arg("0.2")
        .arg("-o")
        .arg(&log_path)
        .write_stdin("exit\n")
        .timeout(Duration::from_secs(20));

    cmd.assert()
        .success()
        .stderr(predicates::str::contains("Monitoring started with run id 1"));

    let log = std::fs::read_to_string(&log_path)?;
    assert_eq!(
        log.trim_end(),
        "Iter,Time,Process,CPU Usage,Memory Usage,Disk Read Count,Disk Write Count,Disk Read Bytes,Disk Write Bytes"
    );
    Ok(())
}
