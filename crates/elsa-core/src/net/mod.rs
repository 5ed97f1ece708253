//! # Embedded Network Listener
//!
//! Components that open a TCP port for the application. The listener binds
//! only when the context starts its components, which happens after the
//! context is `Running`, so no connection can succeed earlier.
pub mod listener;

pub use listener::{
    ConnectionHandler, ListenerConfig, ProbeHandler, TcpListenerComponent, LISTENER_COMPONENT_ID,
    PROBE_COMPONENT_ID, listener_definition, probe_definition,
};
