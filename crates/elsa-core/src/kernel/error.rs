//! # Elsa Core Kernel Errors
//!
//! Defines error types specific to the Elsa kernel.
//!
//! This module includes [`Error`], the primary enum encompassing the errors
//! that can occur while wiring components, driving the application lifecycle
//! or loading configuration.
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::kernel::lifecycle::LifecycleState;

/// Errors raised by the kernel.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Error related to the DependencyRegistry operations or component lookup failures.
    #[error("Component registry error during operation '{operation}': {message}")]
    ComponentRegistryError {
        operation: String,
        component_name: Option<String>,
        message: String,
    },

    /// No discovered component provides a capability some component requires.
    #[error("Component '{component}' requires capability '{capability}' but no component under the namespace provides it")]
    UnsatisfiedDependency { component: String, capability: String },

    /// Several discovered components provide a required capability and none is primary.
    #[error("Component '{component}' requires capability '{capability}' which is provided ambiguously by [{}]", candidates.join(", "))]
    AmbiguousDependency {
        component: String,
        capability: String,
        candidates: Vec<String>,
    },

    /// The requirements between components form a cycle.
    #[error("Dependency cycle detected: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    /// Two definitions share an id.
    #[error("Component '{id}' is already registered")]
    DuplicateComponent { id: String },

    /// A namespace or component id is not a dotted identifier.
    #[error("Invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },

    /// A factory resolved a capability it did not declare as a requirement.
    #[error("Component '{component}' resolved undeclared capability '{capability}'")]
    UndeclaredDependency { component: String, capability: String },

    /// A lifecycle transition outside the linear sequence was attempted.
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// A component panicked inside a factory or lifecycle call.
    #[error("Component '{component}' panicked during {call}: {message}")]
    ComponentPanicked {
        component: String,
        call: String,
        message: String,
    },

    /// Another application context is already running in this process.
    #[error("An application context is already running in this process")]
    AlreadyRunning,

    /// Configuration could not be read or parsed.
    #[error("Configuration error{}: {message}", path.as_ref().map(|p| format!(" in '{}'", p.display())).unwrap_or_default())]
    Config {
        path: Option<PathBuf>,
        message: String,
    },

    /// I/O failure with context.
    #[error("I/O error during '{operation}': {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Run")]
    Run,
    #[error("Shutdown")]
    Shutdown,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    /// Helper to create an I/O error with the operation that failed.
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Helper to create a configuration error.
    pub fn config(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path,
            message: message.into(),
        }
    }

    /// Wraps an error raised by a component during the given phase.
    pub fn lifecycle(phase: KernelLifecyclePhase, component: &str, source: Error) -> Self {
        Error::KernelLifecycleError {
            phase,
            component_name: Some(component.to_string()),
            message: format!("component '{}' failed", component),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error is a wiring problem detected before any component runs.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::UnsatisfiedDependency { .. }
                | Error::AmbiguousDependency { .. }
                | Error::DependencyCycle { .. }
                | Error::DuplicateComponent { .. }
                | Error::InvalidIdentifier { .. }
                | Error::UndeclaredDependency { .. }
                | Error::Config { .. }
        )
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
