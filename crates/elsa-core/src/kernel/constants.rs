/// Application name
pub const APP_NAME: &str = "Elsa Quiz";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Namespace whose components are wired when no other is configured
pub const DEFAULT_NAMESPACE: &str = "com.elsa";

/// Per-component bound on `stop` during teardown, in milliseconds
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Exit code after a graceful shutdown
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code after a component fault while running
pub const EXIT_RUNTIME_FAULT: i32 = 1;

/// Exit code when start-up fails (wiring, configuration, initialization)
pub const EXIT_STARTUP_FAILURE: i32 = 2;
