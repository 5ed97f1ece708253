//! Cooperative shutdown signalling.
//!
//! The bootstrap owns a [`ShutdownSignal`] and suspends on it while the
//! application is running. Components, the OS signal listener and task
//! supervisors hold cloned [`ShutdownHandle`]s and trigger it. Only the first
//! trigger is recorded; later ones are ignored.
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::kernel::error::{Error, Result};

/// Why the application stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal such as SIGINT or SIGTERM.
    Signal(String),
    /// An explicit shutdown call.
    Requested,
    /// A component failed while running.
    Fault { component: String, message: String },
}

impl ShutdownReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, ShutdownReason::Fault { .. })
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {}", name),
            ShutdownReason::Requested => write!(f, "shutdown requested"),
            ShutdownReason::Fault { component, message } => {
                write!(f, "fault in component '{}': {}", component, message)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    token: CancellationToken,
    reason: Mutex<Option<ShutdownReason>>,
}

/// Owned end of the shutdown channel, held by the bootstrap.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    shared: Arc<Shared>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable handle that can trigger this signal.
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shared: self.shared.clone(),
        }
    }
}

/// Cloneable trigger side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    shared: Arc<Shared>,
}

impl ShutdownHandle {
    /// Trigger shutdown. Returns `false` if it had already been triggered.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        let first = {
            let mut slot = self
                .shared
                .reason
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_some() {
                false
            } else {
                *slot = Some(reason.clone());
                true
            }
        };
        if first {
            log::info!("Shutdown triggered: {}", reason);
            self.shared.token.cancel();
        } else {
            log::debug!("Ignoring repeated shutdown trigger: {}", reason);
        }
        first
    }

    /// Request a graceful shutdown.
    pub fn request(&self) -> bool {
        self.trigger(ShutdownReason::Requested)
    }

    /// Report a fatal fault in a component.
    pub fn fault(&self, component: &str, message: impl Into<String>) -> bool {
        self.trigger(ShutdownReason::Fault {
            component: component.to_string(),
            message: message.into(),
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// The recorded reason, if shutdown has been triggered.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.shared
            .reason
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Completes once shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.shared.token.cancelled().await
    }

    /// A child token cancelled together with this signal.
    pub fn child_token(&self) -> CancellationToken {
        self.shared.token.child_token()
    }

    /// Supervise a spawned component task.
    ///
    /// If the task panics or returns an error, shutdown is triggered with a
    /// fault attributed to `component`. A task that finishes cleanly or is
    /// cancelled leaves the signal untouched.
    pub fn watch_task(&self, component: &str, task: JoinHandle<Result<()>>) -> JoinHandle<()> {
        let handle = self.clone();
        let component = component.to_string();
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("Task of component '{}' failed: {}", component, e);
                    handle.fault(&component, e.to_string());
                }
                Err(join_err) if join_err.is_panic() => {
                    log::error!("Task of component '{}' panicked", component);
                    handle.fault(&component, "task panicked");
                }
                Err(_) => {}
            }
        })
    }
}

/// Installed handlers for OS termination requests.
///
/// Handlers are registered by [`install`](Self::install), so a signal that
/// arrives before [`recv`](Self::recv) is polled is still delivered to it.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Register SIGINT and SIGTERM handlers on Unix. Must be called from
    /// within a Tokio runtime.
    pub fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let interrupt = signal(SignalKind::interrupt())
                .map_err(|e| Error::io(e, "install SIGINT handler"))?;
            let terminate = signal(SignalKind::terminate())
                .map_err(|e| Error::io(e, "install SIGTERM handler"))?;
            Ok(Self {
                interrupt,
                terminate,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination request and return the signal's name.
    pub async fn recv(&mut self) -> Result<String> {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => Ok("SIGINT".to_string()),
                _ = self.terminate.recv() => Ok("SIGTERM".to_string()),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| Error::io(e, "install Ctrl+C handler"))?;
            Ok("Ctrl+C".to_string())
        }
    }
}

