use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::kernel::component::KernelComponent;
use crate::kernel::definition::ComponentDefinition;
use crate::kernel::error::{Error, Result};
use crate::kernel::shutdown::ShutdownHandle;

/// Id of the listener component definition.
pub const LISTENER_COMPONENT_ID: &str = "com.elsa.net.listener";

/// Id of the probe handler component definition.
pub const PROBE_COMPONENT_ID: &str = "com.elsa.net.probe";

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    /// Address to bind, e.g. `127.0.0.1:8080`. Port 0 picks a free port.
    pub bind_address: String,
}

impl ListenerConfig {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address.parse().map_err(|e| {
            Error::config(
                None,
                format!("invalid listener bind_address '{}': {}", self.bind_address, e),
            )
        })
    }
}

/// Capability: serves one accepted connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + Debug {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

#[derive(Debug, Default)]
struct Bound {
    local_addr: Option<SocketAddr>,
    token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// TCP listener whose accept loop runs between `start` and `stop`.
#[derive(Debug)]
pub struct TcpListenerComponent {
    config: ListenerConfig,
    handler: Arc<dyn ConnectionHandler>,
    shutdown: ShutdownHandle,
    bound: Mutex<Bound>,
}

impl TcpListenerComponent {
    pub fn new(
        config: ListenerConfig,
        handler: Arc<dyn ConnectionHandler>,
        shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            config,
            handler,
            shutdown,
            bound: Mutex::new(Bound::default()),
        }
    }

    /// Address the listener is bound to; `None` before `start` and after `stop`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_bound().local_addr
    }

    fn lock_bound(&self) -> std::sync::MutexGuard<'_, Bound> {
        self.bound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KernelComponent for TcpListenerComponent {
    fn name(&self) -> &'static str {
        "TcpListener"
    }

    async fn initialize(&self) -> Result<()> {
        // Only validate here; binding waits for `start`.
        self.config.socket_addr().map(|_| ())
    }

    async fn start(&self) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::io(e, format!("bind listener on {}", addr)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::io(e, "read listener address"))?;
        log::info!("Listener bound on {}", local_addr);

        let token = self.shutdown.child_token();
        let task = tokio::spawn(accept_loop(listener, self.handler.clone(), token.clone()));
        let supervised = self.shutdown.watch_task(LISTENER_COMPONENT_ID, task);

        let mut bound = self.lock_bound();
        bound.local_addr = Some(local_addr);
        bound.token = Some(token);
        bound.task = Some(supervised);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let (token, task) = {
            let mut bound = self.lock_bound();
            bound.local_addr = None;
            (bound.token.take(), bound.task.take())
        };
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::Other(format!("listener task did not finish cleanly: {}", e)))?;
        }
        log::info!("Listener stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn ConnectionHandler>,
    token: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle(stream, peer).await {
                                log::warn!("Connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => log::warn!("Failed to accept connection: {}", e),
                }
            }
        }
    }
}

/// Liveness handler: accepts a connection, logs it and closes it.
#[derive(Debug, Default)]
pub struct ProbeHandler;

#[async_trait]
impl ConnectionHandler for ProbeHandler {
    async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        log::debug!("Probe connection from {}", peer);
        stream
            .shutdown()
            .await
            .map_err(|e| Error::io(e, "close probe connection"))
    }
}

#[async_trait]
impl KernelComponent for ProbeHandler {
    fn name(&self) -> &'static str {
        "ProbeHandler"
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Definition of the listener component; requires a [`ConnectionHandler`].
pub fn listener_definition(config: ListenerConfig) -> ComponentDefinition {
    ComponentDefinition::new(LISTENER_COMPONENT_ID, move |wiring| {
        let handler = wiring.resolve::<dyn ConnectionHandler>()?;
        Ok(TcpListenerComponent::new(
            config.clone(),
            handler,
            wiring.shutdown_handle(),
        ))
    })
    .requires::<dyn ConnectionHandler>()
}

/// Definition of the probe handler, providing [`ConnectionHandler`].
pub fn probe_definition() -> ComponentDefinition {
    ComponentDefinition::new(PROBE_COMPONENT_ID, |_| Ok(ProbeHandler))
        .provides(|c: Arc<ProbeHandler>| c as Arc<dyn ConnectionHandler>)
}
