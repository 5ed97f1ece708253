pub mod config;
pub mod kernel;
pub mod net;

// Re-export key public types/traits for easier use by the binary
pub use config::AppConfig;
pub use kernel::Application;
pub use kernel::error::Error as KernelError;
pub use kernel::{ComponentCatalog, ComponentDefinition, KernelComponent, LifecycleState};
