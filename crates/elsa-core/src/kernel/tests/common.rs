//! Shared fixtures for kernel and listener tests.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::kernel::catalog::{ComponentCatalog, Namespace};
use crate::kernel::component::KernelComponent;
use crate::kernel::context::ApplicationContext;
use crate::kernel::definition::ComponentDefinition;
use crate::kernel::error::{Error, Result};
use crate::kernel::shutdown::ShutdownSignal;

/// A refreshed context claims a process-wide slot until it stops; tests that
/// refresh a context take this lock so they do not trip over each other.
static RUN_LOCK: Mutex<()> = Mutex::new(());

pub fn run_lock() -> MutexGuard<'static, ()> {
    RUN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Capability used to wire test components together.
pub trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

/// Second capability, for graphs with more than one kind of edge.
pub trait Ledger: Send + Sync {
    fn entries(&self) -> usize;
}

/// Ordered record of lifecycle calls across components.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Events with the given prefix, prefix stripped, e.g. `with_prefix("stop:")`.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

/// Which lifecycle call a [`Recorder`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Nothing,
    Initialize,
    Start,
    Stop,
}

/// Test component that records every lifecycle call.
#[derive(Debug)]
pub struct Recorder {
    pub id: String,
    log: EventLog,
    fail_on: FailOn,
    panic_on: FailOn,
    stop_delay: Option<Duration>,
}

impl Recorder {
    pub fn new(id: &str, log: EventLog) -> Self {
        Self {
            id: id.to_string(),
            log,
            fail_on: FailOn::Nothing,
            panic_on: FailOn::Nothing,
            stop_delay: None,
        }
    }
}

#[async_trait]
impl KernelComponent for Recorder {
    fn name(&self) -> &'static str {
        "Recorder"
    }

    async fn initialize(&self) -> Result<()> {
        self.log.push(format!("init:{}", self.id));
        if self.panic_on == FailOn::Initialize {
            panic!("{} crashed while initializing", self.id);
        }
        if self.fail_on == FailOn::Initialize {
            return Err(Error::Other(format!("{} refused to initialize", self.id)));
        }
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.log.push(format!("start:{}", self.id));
        if self.panic_on == FailOn::Start {
            panic!("{} crashed while starting", self.id);
        }
        if self.fail_on == FailOn::Start {
            return Err(Error::Other(format!("{} refused to start", self.id)));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }
        self.log.push(format!("stop:{}", self.id));
        if self.panic_on == FailOn::Stop {
            panic!("{} crashed while stopping", self.id);
        }
        if self.fail_on == FailOn::Stop {
            return Err(Error::Other(format!("{} refused to stop", self.id)));
        }
        Ok(())
    }
}

impl Greeter for Recorder {
    fn greet(&self) -> String {
        self.id.clone()
    }
}

impl Ledger for Recorder {
    fn entries(&self) -> usize {
        self.log.events().len()
    }
}

/// Builder for recorder definitions.
pub struct RecorderBuilder {
    id: String,
    log: EventLog,
    fail_on: FailOn,
    panic_on: FailOn,
    stop_delay: Option<Duration>,
}

pub fn recorder(id: &str, log: &EventLog) -> RecorderBuilder {
    RecorderBuilder {
        id: id.to_string(),
        log: log.clone(),
        fail_on: FailOn::Nothing,
        panic_on: FailOn::Nothing,
        stop_delay: None,
    }
}

impl RecorderBuilder {
    pub fn failing(mut self, fail_on: FailOn) -> Self {
        self.fail_on = fail_on;
        self
    }

    /// Panic instead of returning from the given lifecycle call.
    pub fn panicking(mut self, panic_on: FailOn) -> Self {
        self.panic_on = panic_on;
        self
    }

    pub fn slow_stop(mut self, delay: Duration) -> Self {
        self.stop_delay = Some(delay);
        self
    }

    /// Definition whose factory resolves nothing.
    pub fn plain(self) -> ComponentDefinition {
        let RecorderBuilder { id, log, fail_on, panic_on, stop_delay } = self;
        ComponentDefinition::new(id.clone(), move |_| {
            let mut component = Recorder::new(&id, log.clone());
            component.fail_on = fail_on;
            component.panic_on = panic_on;
            component.stop_delay = stop_delay;
            Ok(component)
        })
    }

    /// Definition whose factory resolves a [`Greeter`] and logs who it got,
    /// as `wired:<id><-<provider>`.
    pub fn greeted(self) -> ComponentDefinition {
        let RecorderBuilder { id, log, fail_on, panic_on, stop_delay } = self;
        ComponentDefinition::new(id.clone(), move |wiring| {
            let greeter = wiring.resolve::<dyn Greeter>()?;
            log.push(format!("wired:{}<-{}", id, greeter.greet()));
            let mut component = Recorder::new(&id, log.clone());
            component.fail_on = fail_on;
            component.panic_on = panic_on;
            component.stop_delay = stop_delay;
            Ok(component)
        })
        .requires::<dyn Greeter>()
    }
}

pub fn as_greeter(c: Arc<Recorder>) -> Arc<dyn Greeter> {
    c
}

pub fn as_ledger(c: Arc<Recorder>) -> Arc<dyn Ledger> {
    c
}

pub fn catalog(definitions: Vec<ComponentDefinition>) -> ComponentCatalog {
    let mut catalog = ComponentCatalog::new();
    for definition in definitions {
        catalog.register(definition).expect("register definition");
    }
    catalog
}

/// A context for `com.elsa` with a short grace period.
pub fn context(signal: &ShutdownSignal) -> ApplicationContext {
    ApplicationContext::new(
        Namespace::new("com.elsa").expect("valid namespace"),
        Vec::new(),
        signal.handle(),
        Duration::from_millis(200),
    )
}
