//! # Elsa Core Kernel
//!
//! The `kernel` module is the bootstrap of the Elsa quiz service. It builds
//! the application context for a namespace, wires the registered components
//! together and drives them through their lifecycle until shutdown.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Application Bootstrapping**: [`Application`](bootstrap::Application)
//!   runs a context from start-up to teardown.
//! - **Component Registration**: [`ComponentDefinition`](definition::ComponentDefinition)s
//!   are registered in a [`ComponentCatalog`](catalog::ComponentCatalog) and
//!   discovered by [`Namespace`](catalog::Namespace).
//! - **Dependency Resolution**: [`DependencyGraph`](dependency::DependencyGraph)
//!   binds each required capability to exactly one provider and orders
//!   instantiation.
//! - **Component Lifecycle**: [`KernelComponent`](component::KernelComponent),
//!   [`ApplicationContext`](context::ApplicationContext) and the linear
//!   [`LifecycleState`](lifecycle::LifecycleState).
//! - **Shutdown**: [`ShutdownHandle`](shutdown::ShutdownHandle) for signals,
//!   explicit requests and component faults.
//! - **Error Handling**: [`Error`](error::Error) and a `Result` alias.
pub mod bootstrap;
pub mod catalog;
pub mod component;
pub mod constants;
pub mod context;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod lifecycle;
pub mod shutdown;

pub use bootstrap::{Application, RunOutcome};
pub use catalog::{ComponentCatalog, Namespace};
pub use component::{DependencyRegistry, KernelComponent};
pub use context::{ApplicationContext, ShutdownReport};
pub use definition::{CapabilityKey, ComponentDefinition, Wiring};
pub use dependency::DependencyGraph;
pub use error::{Error, Result};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use shutdown::{OsSignals, ShutdownHandle, ShutdownReason, ShutdownSignal};

// Test module declaration
#[cfg(test)]
pub(crate) mod tests;
