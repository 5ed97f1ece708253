use std::fmt;

use tokio::sync::watch;

use crate::kernel::error::{Error, Result};

/// State of the application context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Context constructed, components possibly instantiated, not yet serving.
    #[default]
    NotStarted,
    /// All components instantiated; listeners may accept connections.
    Running,
    /// Components are being released in reverse order.
    ShuttingDown,
    /// Terminal state.
    Stopped,
}

impl LifecycleState {
    /// Whether `self -> next` is one of the permitted transitions.
    ///
    /// `NotStarted -> Stopped` is the start-up abort path; everything else is
    /// the linear `NotStarted -> Running -> ShuttingDown -> Stopped` sequence.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (Running, ShuttingDown)
                | (ShuttingDown, Stopped)
                | (NotStarted, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::Stopped
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::NotStarted => write!(f, "NotStarted"),
            LifecycleState::Running => write!(f, "Running"),
            LifecycleState::ShuttingDown => write!(f, "ShuttingDown"),
            LifecycleState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Single authoritative owner of the lifecycle state.
///
/// Every accepted transition is appended to the history and published to
/// watchers.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
    history: Vec<LifecycleState>,
    publisher: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in `NotStarted` with its own watch channel.
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(LifecycleState::NotStarted);
        Self::with_publisher(publisher)
    }

    /// Create a lifecycle that publishes on an existing channel.
    ///
    /// The channel is reset to `NotStarted`.
    pub fn with_publisher(publisher: watch::Sender<LifecycleState>) -> Self {
        publisher.send_replace(LifecycleState::NotStarted);
        Self {
            state: LifecycleState::NotStarted,
            history: vec![LifecycleState::NotStarted],
            publisher,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// States visited so far, starting with `NotStarted`.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.publisher.subscribe()
    }

    /// Move to `next`, rejecting anything but the permitted transitions.
    pub fn advance(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log::debug!("Lifecycle transition: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
        self.publisher.send_replace(next);
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
