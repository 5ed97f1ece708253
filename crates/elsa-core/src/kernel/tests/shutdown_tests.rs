use std::time::Duration;

use crate::kernel::error::{Error, Result};
#[cfg(unix)]
use crate::kernel::shutdown::OsSignals;
use crate::kernel::shutdown::{ShutdownReason, ShutdownSignal};

#[tokio::test]
async fn test_first_trigger_wins() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();
    let other = handle.clone();

    assert!(!handle.is_triggered());
    assert!(handle.reason().is_none());

    assert!(handle.trigger(ShutdownReason::Signal("SIGTERM".to_string())));
    assert!(!other.request());
    assert!(!other.fault("com.elsa.late", "too late"));

    assert!(other.is_triggered());
    assert_eq!(other.reason(), Some(ShutdownReason::Signal("SIGTERM".to_string())));
}

#[tokio::test]
async fn test_cancelled_completes_after_request() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();
    let trigger = handle.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.request();
    });

    tokio::time::timeout(Duration::from_secs(2), handle.cancelled())
        .await
        .expect("shutdown should be observed");
    assert_eq!(handle.reason(), Some(ShutdownReason::Requested));
}

#[tokio::test]
async fn test_child_token_follows_signal() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();
    let token = handle.child_token();

    assert!(!token.is_cancelled());
    handle.request();
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_cancelling_child_token_does_not_trigger_shutdown() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();
    handle.child_token().cancel();
    assert!(!handle.is_triggered());
}

#[tokio::test]
async fn test_watch_task_reports_error_as_fault() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();

    let task = tokio::spawn(async { Err::<(), _>(Error::Other("connection pool exhausted".into())) });
    handle.watch_task("com.elsa.pool", task).await.unwrap();

    match handle.reason() {
        Some(ShutdownReason::Fault { component, message }) => {
            assert_eq!(component, "com.elsa.pool");
            assert!(message.contains("connection pool exhausted"));
        }
        other => panic!("Expected fault, got {:?}", other),
    }
}

#[tokio::test]
async fn test_watch_task_reports_panic_as_fault() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();

    let blow_up = true;
    let task = tokio::spawn(async move {
        if blow_up {
            panic!("worker blew up");
        }
        Ok::<(), Error>(())
    });
    handle.watch_task("com.elsa.worker", task).await.unwrap();

    assert!(handle.reason().is_some_and(|r| r.is_fault()));
}

#[tokio::test]
async fn test_watch_task_clean_exit_leaves_signal_untouched() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();

    let task = tokio::spawn(async { Result::<()>::Ok(()) });
    handle.watch_task("com.elsa.worker", task).await.unwrap();

    assert!(!handle.is_triggered());
}

#[tokio::test]
async fn test_watch_task_aborted_leaves_signal_untouched() {
    let signal = ShutdownSignal::new();
    let handle = signal.handle();

    let task = tokio::spawn(async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Result::<()>::Ok(())
    });
    task.abort();
    handle.watch_task("com.elsa.worker", task).await.unwrap();

    assert!(!handle.is_triggered());
}

#[test]
fn test_reason_display() {
    assert_eq!(ShutdownReason::Signal("SIGINT".into()).to_string(), "signal SIGINT");
    assert_eq!(ShutdownReason::Requested.to_string(), "shutdown requested");
    let fault = ShutdownReason::Fault {
        component: "com.elsa.db".into(),
        message: "lost connection".into(),
    };
    assert!(fault.is_fault());
    assert_eq!(fault.to_string(), "fault in component 'com.elsa.db': lost connection");
}

#[cfg(unix)]
#[tokio::test]
async fn test_signal_raised_after_install_is_delivered() {
    let mut signals = OsSignals::install().unwrap();
    // Raised before `recv` is first polled.
    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let name = tokio::time::timeout(Duration::from_secs(5), signals.recv())
        .await
        .expect("SIGTERM should be delivered")
        .unwrap();
    assert_eq!(name, "SIGTERM");
}
