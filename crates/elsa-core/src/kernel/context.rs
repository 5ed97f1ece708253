//! The application context: instantiated components plus lifecycle state.
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;

use crate::kernel::catalog::{ComponentCatalog, Namespace};
use crate::kernel::component::{DependencyRegistry, KernelComponent};
use crate::kernel::dependency::DependencyGraph;
use crate::kernel::definition::{ComponentDefinition, Wiring};
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::kernel::lifecycle::{Lifecycle, LifecycleState};
use crate::kernel::shutdown::{ShutdownHandle, ShutdownReason};

static CONTEXT_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Claim on the one application context a process may run at a time.
/// Released on drop.
#[derive(Debug)]
pub(crate) struct ActiveContextGuard;

impl ActiveContextGuard {
    pub(crate) fn acquire() -> Result<Self> {
        CONTEXT_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ActiveContextGuard)
            .map_err(|_| Error::AlreadyRunning)
    }
}

impl Drop for ActiveContextGuard {
    fn drop(&mut self) {
        CONTEXT_ACTIVE.store(false, Ordering::Release);
    }
}

/// Outcome of releasing the components of a context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every component released, in release order, including those listed
    /// in `failed` or `timed_out`.
    pub released: Vec<String>,
    /// Components whose `stop` returned an error.
    pub failed: Vec<String>,
    /// Components that did not stop within the grace period.
    pub timed_out: Vec<String>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }

    /// Every component that was released, whether or not it stopped cleanly,
    /// in release order.
    pub fn release_order(&self) -> &[String] {
        &self.released
    }
}

/// Set of wired components for one namespace plus its lifecycle.
#[derive(Debug)]
pub struct ApplicationContext {
    namespace: Namespace,
    arguments: Vec<String>,
    lifecycle: Lifecycle,
    registry: DependencyRegistry,
    // Live components in instantiation order
    order: Vec<String>,
    shutdown: ShutdownHandle,
    grace_period: Duration,
    refreshed: bool,
    report: Option<ShutdownReport>,
    // Held from refresh until the context is stopped
    claim: Option<ActiveContextGuard>,
}

impl ApplicationContext {
    pub fn new(
        namespace: Namespace,
        arguments: Vec<String>,
        shutdown: ShutdownHandle,
        grace_period: Duration,
    ) -> Self {
        Self {
            namespace,
            arguments,
            lifecycle: Lifecycle::new(),
            registry: DependencyRegistry::new(),
            order: Vec::new(),
            shutdown,
            grace_period,
            refreshed: false,
            report: None,
            claim: None,
        }
    }

    /// Publish lifecycle changes on an existing watch channel.
    pub fn with_state_publisher(mut self, publisher: watch::Sender<LifecycleState>) -> Self {
        self.lifecycle = Lifecycle::with_publisher(publisher);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// States visited so far.
    pub fn history(&self) -> &[LifecycleState] {
        self.lifecycle.history()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Ids of the live components in instantiation order.
    pub fn component_ids(&self) -> &[String] {
        &self.order
    }

    /// Gets a specific component instance by its concrete type T.
    pub fn get_component<T: KernelComponent + 'static>(&self) -> Option<Arc<T>> {
        self.registry.get_concrete::<T>()
    }

    /// Discover, wire and initialize every component under the namespace.
    ///
    /// Start-up is all-or-nothing: on any failure the components created so
    /// far are released in reverse order, the context moves to `Stopped` and
    /// the error is returned.
    ///
    /// Only one context per process may be live between `refresh` and
    /// `Stopped`; while another one is, this fails with
    /// [`Error::AlreadyRunning`] and leaves the context untouched.
    pub async fn refresh(&mut self, catalog: &ComponentCatalog) -> Result<()> {
        if self.refreshed || self.state() != LifecycleState::NotStarted {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Bootstrap,
                component_name: None,
                message: format!("context cannot be refreshed in state {}", self.state()),
                source: None,
            });
        }
        self.claim = Some(ActiveContextGuard::acquire()?);
        self.refreshed = true;

        let discovered = catalog.discover(&self.namespace);
        log::info!(
            "Discovered {} component definition(s) under '{}'",
            discovered.len(),
            self.namespace
        );

        let graph = match DependencyGraph::resolve(&discovered) {
            Ok(graph) => graph,
            Err(e) => {
                log::error!("Component wiring failed: {}", e);
                self.abort_startup().await?;
                return Err(e);
            }
        };

        let definitions: HashMap<&str, &ComponentDefinition> =
            discovered.iter().map(|d| (d.id(), *d)).collect();
        for id in graph.instantiation_order() {
            let Some(definition) = definitions.get(id.as_str()).copied() else {
                continue;
            };
            if let Err(e) = self.instantiate(&graph, definition).await {
                log::error!("Failed to instantiate component '{}': {}", id, e);
                self.abort_startup().await?;
                return Err(e);
            }
        }

        log::info!("Component instantiation complete ({} component(s)).", self.order.len());
        Ok(())
    }

    async fn instantiate(
        &mut self,
        graph: &DependencyGraph,
        definition: &ComponentDefinition,
    ) -> Result<()> {
        let id = definition.id();
        let mut bindings = HashMap::new();
        for binding in graph.bindings_of(id) {
            let export = self
                .registry
                .export_of(&binding.provider, &binding.capability)
                .ok_or_else(|| Error::ComponentRegistryError {
                    operation: "ResolveBinding".to_string(),
                    component_name: Some(id.to_string()),
                    message: format!(
                        "provider '{}' of '{}' is not instantiated",
                        binding.provider, binding.capability
                    ),
                })?;
            bindings.insert(binding.capability, export);
        }

        let built = {
            let wiring = Wiring::new(id, &self.namespace, &self.arguments, &self.shutdown, bindings);
            std::panic::catch_unwind(AssertUnwindSafe(|| definition.instantiate(&wiring)))
                .map_err(|payload| panicked(id, "construction", &*payload))??
        };
        let component = built.component.clone();
        self.registry.register_instance(id, built)?;
        // Tracked before initialize so a failing initialize is rolled back too.
        self.order.push(id.to_string());

        log::info!("Initializing component: {} ({})", id, component.name());
        guarded(id, "initialize", component.initialize())
            .await
            .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Initialize, id, e))
    }

    /// Release whatever was instantiated and move straight to `Stopped`.
    async fn abort_startup(&mut self) -> Result<()> {
        let report = self.release_all().await;
        self.lifecycle.advance(LifecycleState::Stopped)?;
        self.report = Some(report);
        self.claim = None;
        Ok(())
    }

    /// Transition to `Running` and start every component in instantiation
    /// order.
    ///
    /// A component that fails to start triggers a fault shutdown; the error
    /// is returned as well.
    pub async fn start(&mut self) -> Result<()> {
        if !self.refreshed {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Start,
                component_name: None,
                message: "context has not been refreshed".to_string(),
                source: None,
            });
        }
        self.lifecycle.advance(LifecycleState::Running)?;
        log::info!("Application context '{}' is running", self.namespace);

        for id in &self.order {
            let Some(component) = self.registry.get_by_id(id) else {
                continue;
            };
            log::info!("Starting component: {}", id);
            if let Err(e) = guarded(id, "start", component.start()).await {
                log::error!("Component '{}' failed to start: {}", id, e);
                self.shutdown.fault(id, e.to_string());
                return Err(Error::lifecycle(KernelLifecyclePhase::Start, id, e));
            }
        }
        log::info!("Component start complete.");
        Ok(())
    }

    /// Suspend until shutdown is triggered and return the reason.
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        self.shutdown.cancelled().await;
        self.shutdown.reason().unwrap_or(ShutdownReason::Requested)
    }

    /// Release every component in reverse instantiation order and stop.
    ///
    /// Idempotent: closing a stopped context returns the first report again.
    pub async fn close(&mut self) -> Result<ShutdownReport> {
        match self.state() {
            LifecycleState::Stopped => return Ok(self.report.clone().unwrap_or_default()),
            LifecycleState::Running => self.lifecycle.advance(LifecycleState::ShuttingDown)?,
            LifecycleState::NotStarted | LifecycleState::ShuttingDown => {}
        }
        // Spawned component tasks watch the same token.
        if !self.shutdown.is_triggered() {
            self.shutdown.request();
        }

        let report = self.release_all().await;
        self.lifecycle.advance(LifecycleState::Stopped)?;
        if report.is_clean() {
            log::info!("Component shutdown complete.");
        } else {
            log::warn!(
                "Component shutdown finished with {} failure(s) and {} timeout(s)",
                report.failed.len(),
                report.timed_out.len()
            );
        }
        self.report = Some(report.clone());
        self.claim = None;
        Ok(report)
    }

    async fn release_all(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        while let Some(id) = self.order.pop() {
            let Some(component) = self.registry.remove(&id) else {
                log::warn!("Component instance '{}' not found in registry during stop.", id);
                continue;
            };
            log::info!("Stopping component: {}", id);
            let stop = guarded(&id, "stop", component.stop());
            match tokio::time::timeout(self.grace_period, stop).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("Error stopping component {}: {}", id, e);
                    report.failed.push(id.clone());
                }
                Err(_) => {
                    log::error!(
                        "Component {} did not stop within {:?}",
                        id,
                        self.grace_period
                    );
                    report.timed_out.push(id.clone());
                }
            }
            report.released.push(id);
        }
        report
    }
}

/// Run a component lifecycle call, turning a panic into an error.
async fn guarded<F>(component: &str, call: &str, future: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(panicked(component, call, &*payload)),
    }
}

fn panicked(component: &str, call: &str, payload: &(dyn Any + Send)) -> Error {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    log::error!("Component '{}' panicked during {}: {}", component, call, detail);
    Error::ComponentPanicked {
        component: component.to_string(),
        call: call.to_string(),
        message: detail,
    }
}
