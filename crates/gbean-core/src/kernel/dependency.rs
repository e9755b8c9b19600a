use std::collections::{BTreeSet, HashMap};

use crate::kernel::name::ServiceName;

/// Bidirectional index of service dependencies.
///
/// `parents` maps a child to the services it depends on, `children` maps a
/// parent to the services depending on it. Both sides are always updated
/// together and empty sets are pruned, so no entry outlives its edge.
#[derive(Debug, Default, Clone)]
pub struct ServiceDependencyRegistry {
    parents: HashMap<ServiceName, BTreeSet<ServiceName>>,
    children: HashMap<ServiceName, BTreeSet<ServiceName>>,
}

impl ServiceDependencyRegistry {
    /// Create a new empty dependency registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `child` depends on every service in `parents`.
    ///
    /// Replaces any dependencies previously registered for `child`.
    pub fn register_dependencies<I>(&mut self, child: &ServiceName, parents: I)
    where
        I: IntoIterator<Item = ServiceName>,
    {
        self.unregister_dependencies(child);

        let parents: BTreeSet<ServiceName> = parents.into_iter().collect();
        if parents.is_empty() {
            return;
        }
        for parent in &parents {
            self.children
                .entry(parent.clone())
                .or_default()
                .insert(child.clone());
        }
        log::debug!("Registered dependencies of {}: {:?}", child, parents);
        self.parents.insert(child.clone(), parents);
    }

    /// Remove every dependency of `child`, pruning it from each parent's dependents.
    pub fn unregister_dependencies(&mut self, child: &ServiceName) {
        let Some(parents) = self.parents.remove(child) else {
            return;
        };
        for parent in parents {
            if let Some(dependents) = self.children.get_mut(&parent) {
                dependents.remove(child);
                if dependents.is_empty() {
                    self.children.remove(&parent);
                }
            }
        }
    }

    /// Services `child` depends on
    pub fn get_my_dependencies(&self, child: &ServiceName) -> BTreeSet<ServiceName> {
        self.parents.get(child).cloned().unwrap_or_default()
    }

    /// Services depending on `parent`
    pub fn get_dependencies_on_me(&self, parent: &ServiceName) -> BTreeSet<ServiceName> {
        self.children.get(parent).cloned().unwrap_or_default()
    }

    pub fn has_dependencies(&self, child: &ServiceName) -> bool {
        self.parents.contains_key(child)
    }

    /// Clear all edges.
    pub fn clear(&mut self) {
        self.parents.clear();
        self.children.clear();
    }
}
