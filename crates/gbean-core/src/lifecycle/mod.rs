//! # GBean Lifecycle Events
//!
//! Decouples "who changed state" from "who cares". Service instances report
//! their transitions to the [`LifecycleMonitor`], which fans each event out
//! to the listeners whose name patterns match the service.
//!
//! Setup events (`loaded`, `starting`, `running`) are delivered in listener
//! registration order; teardown events (`stopping`, `stopped`, `unloaded`)
//! in reverse order, so the last listener wired up is the first torn down.
//! A listener that fails is logged and skipped; it never aborts a transition.
pub mod monitor;

use std::fmt;

use crate::kernel::error::BoxError;
use crate::kernel::name::ServiceName;

pub use monitor::{LifecycleMonitor, ListenerId};

/// Outcome of a listener callback
pub type ListenerResult = std::result::Result<(), BoxError>;

/// Receives lifecycle events for the services it registered interest in.
///
/// All callbacks default to doing nothing.
pub trait LifecycleListener: Send + Sync {
    fn loaded(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }

    fn starting(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }

    fn running(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }

    fn stopping(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }

    fn stopped(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }

    fn unloaded(&self, _name: &ServiceName) -> ListenerResult {
        Ok(())
    }
}

/// The six lifecycle events a service goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Loaded,
    Starting,
    Running,
    Stopping,
    Stopped,
    Unloaded,
}

impl LifecycleEvent {
    /// Get the name of this event
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Loaded => "service.loaded",
            LifecycleEvent::Starting => "service.starting",
            LifecycleEvent::Running => "service.running",
            LifecycleEvent::Stopping => "service.stopping",
            LifecycleEvent::Stopped => "service.stopped",
            LifecycleEvent::Unloaded => "service.unloaded",
        }
    }

    /// Teardown events are delivered in reverse registration order
    pub fn is_teardown(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::Stopping | LifecycleEvent::Stopped | LifecycleEvent::Unloaded
        )
    }

    /// Invoke the callback matching this event
    pub fn deliver(&self, listener: &dyn LifecycleListener, name: &ServiceName) -> ListenerResult {
        match self {
            LifecycleEvent::Loaded => listener.loaded(name),
            LifecycleEvent::Starting => listener.starting(name),
            LifecycleEvent::Running => listener.running(name),
            LifecycleEvent::Stopping => listener.stopping(name),
            LifecycleEvent::Stopped => listener.stopped(name),
            LifecycleEvent::Unloaded => listener.unloaded(name),
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
