use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::kernel::catalog::{ComponentCatalog, Namespace};
use crate::kernel::constants;
use crate::kernel::context::{ApplicationContext, ShutdownReport};
use crate::kernel::dependency::DependencyGraph;
use crate::kernel::error::Result;
use crate::kernel::lifecycle::LifecycleState;
use crate::kernel::shutdown::{OsSignals, ShutdownHandle, ShutdownReason, ShutdownSignal};

/// How a completed run ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reason: ShutdownReason,
    pub report: ShutdownReport,
    /// Lifecycle states visited, `NotStarted` through `Stopped`.
    pub history: Vec<LifecycleState>,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.reason.is_fault() {
            constants::EXIT_RUNTIME_FAULT
        } else {
            constants::EXIT_SUCCESS
        }
    }
}

/// Main application struct: wires the catalog's components and runs them
/// until shutdown.
pub struct Application {
    config: AppConfig,
    catalog: ComponentCatalog,
    shutdown: ShutdownSignal,
    state: watch::Sender<LifecycleState>,
}

impl Application {
    /// Creates a new application over the given component catalog.
    pub fn new(config: AppConfig, catalog: ComponentCatalog) -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        Self {
            config,
            catalog,
            shutdown: ShutdownSignal::new(),
            state,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle for requesting shutdown from outside the run loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.handle()
    }

    /// Observe the lifecycle of the context created by [`run`](Self::run).
    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Resolve the component graph without instantiating anything and
    /// return the order components would be created in.
    pub fn dry_run(&self) -> Result<Vec<String>> {
        let namespace = Namespace::new(self.config.namespace.as_str())?;
        let discovered = self.catalog.discover(&namespace);
        let graph = DependencyGraph::resolve(&discovered)?;
        Ok(graph.instantiation_order())
    }

    /// Wire every component under the configured namespace, run until a
    /// shutdown is triggered, then release the components in reverse order.
    ///
    /// `arguments` are handed to component factories unmodified. A wiring or
    /// initialization failure is returned as an error after everything
    /// already created has been released; a fault while running is reported
    /// through [`RunOutcome::exit_code`]. A shutdown triggered before the
    /// context is `Running`, such as a signal during start-up, releases the
    /// components without starting them.
    pub async fn run(self, arguments: Vec<String>) -> Result<RunOutcome> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        let Application {
            config,
            catalog,
            shutdown,
            state,
        } = self;

        // Installed first so a signal during start-up is not fatal.
        let signal_listener = if config.handle_signals {
            match OsSignals::install() {
                Ok(signals) => Some(spawn_signal_listener(signals, shutdown.handle())),
                Err(e) => {
                    log::warn!("Could not listen for termination signals: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let result = run_context(&config, &catalog, &shutdown, state, arguments).await;
        if let Some(listener) = signal_listener {
            listener.abort();
        }
        result
    }
}

async fn run_context(
    config: &AppConfig,
    catalog: &ComponentCatalog,
    shutdown: &ShutdownSignal,
    state: watch::Sender<LifecycleState>,
    arguments: Vec<String>,
) -> Result<RunOutcome> {
    let namespace = Namespace::new(config.namespace.as_str())?;
    let mut context = ApplicationContext::new(
        namespace,
        arguments,
        shutdown.handle(),
        config.grace_period(),
    )
    .with_state_publisher(state);

    context.refresh(catalog).await?;

    if context.shutdown_handle().is_triggered() {
        log::info!("Shutdown requested during start-up; components will not be started");
    } else if let Err(e) = context.start().await {
        // The failing component already triggered a fault shutdown.
        log::error!("Application start failed: {}", e);
    }

    let reason = context.wait_for_shutdown().await;
    log::info!("Shutting down application ({})", reason);
    let report = context.close().await?;

    Ok(RunOutcome {
        reason,
        report,
        history: context.history().to_vec(),
    })
}

fn spawn_signal_listener(mut signals: OsSignals, handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        match signals.recv().await {
            Ok(name) => {
                handle.trigger(ShutdownReason::Signal(name));
            }
            Err(e) => log::warn!("Could not listen for termination signals: {}", e),
        }
    })
}
