use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::kernel::name::{NamePattern, ServiceName, matches_any};
use crate::lifecycle::{LifecycleEvent, LifecycleListener};
use crate::utils::lock;

/// Type for listener registration identifiers
pub type ListenerId = u64;

struct ListenerEntry {
    id: ListenerId,
    listener: Arc<dyn LifecycleListener>,
    patterns: Vec<NamePattern>,
}

#[derive(Default)]
struct MonitorTables {
    /// Registered listeners, in registration order
    listeners: Vec<ListenerEntry>,
    /// Source name -> interested listener ids, sorted by registration order
    bindings: HashMap<ServiceName, Vec<ListenerId>>,
    next_listener_id: ListenerId,
}

impl MonitorTables {
    fn position_of(&self, listener: &Arc<dyn LifecycleListener>) -> Option<usize> {
        self.listeners
            .iter()
            .position(|entry| same_listener(&entry.listener, listener))
    }

    fn bind(&mut self, source: &ServiceName, id: ListenerId) {
        if let Some(ids) = self.bindings.get_mut(source) {
            if let Err(pos) = ids.binary_search(&id) {
                ids.insert(pos, id);
            }
        }
    }

    fn unbind_everywhere(&mut self, id: ListenerId) {
        for ids in self.bindings.values_mut() {
            ids.retain(|bound| *bound != id);
        }
    }

    fn snapshot(&self, source: &ServiceName) -> Vec<Arc<dyn LifecycleListener>> {
        let Some(ids) = self.bindings.get(source) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.listeners.iter().find(|entry| entry.id == *id))
            .map(|entry| entry.listener.clone())
            .collect()
    }
}

/// Listener identity is the address of the shared object, not its vtable
fn same_listener(a: &Arc<dyn LifecycleListener>, b: &Arc<dyn LifecycleListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Fans lifecycle events out to pattern-registered listeners.
///
/// All tables live behind one mutex. Delivery works on a snapshot taken
/// under that mutex and runs after releasing it, so a slow listener never
/// blocks registration for other sources.
pub struct LifecycleMonitor {
    tables: Mutex<MonitorTables>,
}

impl fmt::Debug for LifecycleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = lock(&self.tables);
        f.debug_struct("LifecycleMonitor")
            .field("listeners_count", &tables.listeners.len())
            .field("sources_count", &tables.bindings.len())
            .field("next_listener_id", &tables.next_listener_id)
            .finish()
    }
}

impl LifecycleMonitor {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(MonitorTables {
                next_listener_id: 1,
                ..MonitorTables::default()
            }),
        }
    }

    /// Register `listener` for every service matching any of `patterns`.
    ///
    /// An empty pattern set selects every service. Registering a listener
    /// that is already present replaces its patterns and keeps its position.
    pub fn add_lifecycle_listener(
        &self,
        listener: Arc<dyn LifecycleListener>,
        patterns: Vec<NamePattern>,
    ) -> ListenerId {
        let mut tables = lock(&self.tables);

        let id = match tables.position_of(&listener) {
            Some(pos) => {
                let id = tables.listeners[pos].id;
                tables.listeners[pos].patterns = patterns.clone();
                tables.unbind_everywhere(id);
                log::debug!("Replaced patterns of lifecycle listener {}", id);
                id
            }
            None => {
                let id = tables.next_listener_id;
                tables.next_listener_id += 1;
                tables.listeners.push(ListenerEntry {
                    id,
                    listener,
                    patterns: patterns.clone(),
                });
                log::debug!("Registered lifecycle listener {}", id);
                id
            }
        };

        let matching: Vec<ServiceName> = tables
            .bindings
            .keys()
            .filter(|source| matches_any(&patterns, source))
            .cloned()
            .collect();
        for source in matching {
            tables.bind(&source, id);
        }
        id
    }

    /// Remove a listener; returns false if it was not registered.
    pub fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        let mut tables = lock(&self.tables);
        let Some(pos) = tables.position_of(listener) else {
            return false;
        };
        let entry = tables.listeners.remove(pos);
        tables.unbind_everywhere(entry.id);
        log::debug!("Removed lifecycle listener {}", entry.id);
        true
    }

    /// Start tracking a source, binding every listener whose patterns match.
    ///
    /// Returns false if the source was already known.
    pub fn add_source(&self, name: &ServiceName) -> bool {
        let mut tables = lock(&self.tables);
        if tables.bindings.contains_key(name) {
            return false;
        }
        let ids: Vec<ListenerId> = tables
            .listeners
            .iter()
            .filter(|entry| matches_any(&entry.patterns, name))
            .map(|entry| entry.id)
            .collect();
        tables.bindings.insert(name.clone(), ids);
        true
    }

    /// Forget a source and its listener bindings.
    pub fn remove_source(&self, name: &ServiceName) -> bool {
        lock(&self.tables).bindings.remove(name).is_some()
    }

    /// Listeners bound to `name`, in registration order. Unknown sources yield none.
    pub fn listeners_for(&self, name: &ServiceName) -> Vec<Arc<dyn LifecycleListener>> {
        lock(&self.tables).snapshot(name)
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.tables).listeners.len()
    }

    pub fn is_source(&self, name: &ServiceName) -> bool {
        lock(&self.tables).bindings.contains_key(name)
    }

    /// Deliver `event` for `name` to every bound listener.
    ///
    /// Errors and panics raised by a listener are logged and delivery
    /// continues with the next listener.
    pub fn fire(&self, event: LifecycleEvent, name: &ServiceName) {
        let mut targets = self.listeners_for(name);
        if event.is_teardown() {
            targets.reverse();
        }
        log::trace!("Firing {} for {} to {} listener(s)", event, name, targets.len());

        for listener in targets {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| event.deliver(listener.as_ref(), name)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Lifecycle listener failed handling {} for {}: {}", event, name, e);
                }
                Err(_) => {
                    log::error!("Lifecycle listener panicked handling {} for {}", event, name);
                }
            }
        }
    }

    pub fn fire_loaded(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Loaded, name);
    }

    pub fn fire_starting(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Starting, name);
    }

    pub fn fire_running(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Running, name);
    }

    pub fn fire_stopping(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Stopping, name);
    }

    pub fn fire_stopped(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Stopped, name);
    }

    pub fn fire_unloaded(&self, name: &ServiceName) {
        self.fire(LifecycleEvent::Unloaded, name);
    }
}

impl Default for LifecycleMonitor {
    fn default() -> Self {
        Self::new()
    }
}
