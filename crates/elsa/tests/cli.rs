use std::io::Write;

use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::Builder;

fn config_file(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_ping_command() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--ping");

    cmd.assert()
        .success() // Check for exit code 0
        .stdout(predicate::str::contains("pong"));

    Ok(())
}

#[test]
fn test_dry_run_without_config_has_no_components() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Instantiation plan for 'com.elsa'"))
        .stdout(predicate::str::contains("(no components)"))
        .stdout(predicate::str::contains("pong").not());

    Ok(())
}

#[test]
fn test_dry_run_orders_liveness_handler_before_listener() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_file(
        ".toml",
        "[listener]\nbind_address = \"127.0.0.1:0\"\n",
    );
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--config")
        .arg(config.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "  1. com.elsa.net.probe\n  2. com.elsa.net.listener",
        ));

    Ok(())
}

#[test]
fn test_missing_config_is_a_startup_failure() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--config")
        .arg(dir.path().join("absent.json"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load configuration"));

    Ok(())
}

#[test]
fn test_invalid_config_is_a_startup_failure() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_file(".json", r#"{ "shutdown_grace_ms": 0 }"#);
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--config")
        .arg(config.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("shutdown_grace_ms"));

    Ok(())
}

#[test]
fn test_port_in_use_exits_with_runtime_fault() -> Result<(), Box<dyn std::error::Error>> {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0")?;
    let config = config_file(
        ".json",
        &format!(
            r#"{{ "handle_signals": false, "shutdown_grace_ms": 500, "listener": {{ "bind_address": "{}" }} }}"#,
            occupied.local_addr()?
        ),
    );
    let mut cmd = Command::cargo_bin("elsa")?;

    cmd.arg("--config")
        .arg(config.path())
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(1);

    Ok(())
}

#[cfg(unix)]
#[test]
fn test_sigterm_shuts_down_gracefully() -> Result<(), Box<dyn std::error::Error>> {
    use std::io::{BufRead, BufReader};
    use std::process::{Command as StdCommand, Stdio};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    let config = config_file(
        ".json",
        r#"{ "shutdown_grace_ms": 1000, "listener": { "bind_address": "127.0.0.1:0" } }"#,
    );
    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("elsa"))
        .arg("--config")
        .arg(config.path())
        .env("RUST_LOG", "info")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    let stderr = child.stderr.take().ok_or("stderr not captured")?;
    let (lines_tx, lines_rx) = mpsc::channel();
    let reader = std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            if lines_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut output = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(30);
    while !output.iter().any(|l: &String| l.contains("Listener bound on")) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match lines_rx.recv_timeout(remaining) {
            Ok(line) => output.push(line),
            Err(_) => {
                let _ = child.kill();
                panic!("listener never bound; output so far: {:#?}", output);
            }
        }
    }

    let status = StdCommand::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()?;
    assert!(status.success());

    let exit = loop {
        if let Some(exit) = child.try_wait()? {
            break exit;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("elsa did not exit after SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    reader.join().map_err(|_| "stderr reader panicked")?;
    output.extend(lines_rx.try_iter());

    assert_eq!(exit.code(), Some(0), "output: {:#?}", output);
    assert!(
        output
            .iter()
            .any(|l| l.contains("Stopping component: com.elsa.net.listener")),
        "output: {:#?}",
        output
    );
    assert!(output.iter().any(|l| l.contains("signal SIGTERM")));
    Ok(())
}
