//! Tracking of dependencies between named components.
//!
//! The graph keeps two adjacency maps, which are always updated together:
//!
//! * dependents - `name -> components depending on name` (reverse edges)
//! * dependencies - `name -> components name depends on` (forward edges)
//!
//! Both declared (`depends_on`) and implicit (constructor argument, property reference, factory
//! component) edges end up here, which makes the graph the only place where cycles are detected.

use crate::error::ComponentInstanceProviderError;
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use tracing::trace;

#[derive(Default, Clone, Debug)]
struct GraphState {
    dependents: FxHashMap<String, FxHashSet<String>>,
    dependencies: FxHashMap<String, FxHashSet<String>>,
}

impl GraphState {
    fn register(&mut self, name: &str, dependent_name: &str) -> bool {
        if !self
            .dependents
            .entry(name.to_string())
            .or_default()
            .insert(dependent_name.to_string())
        {
            return false;
        }

        self.dependencies
            .entry(dependent_name.to_string())
            .or_default()
            .insert(name.to_string());

        true
    }

    fn is_dependent(
        &self,
        name: &str,
        dependent_name: &str,
        visited: &mut FxHashSet<String>,
    ) -> bool {
        self.dependent_path(name, dependent_name, visited).is_some()
    }

    /// Depth-first search over reverse edges. Returns the chain of components from `name` up to
    /// `dependent_name`, where each element depends on the previous one.
    fn dependent_path(
        &self,
        name: &str,
        dependent_name: &str,
        visited: &mut FxHashSet<String>,
    ) -> Option<Vec<String>> {
        if !visited.insert(name.to_string()) {
            return None;
        }

        let dependents = self.dependents.get(name)?;
        if dependents.contains(dependent_name) {
            return Some(vec![name.to_string(), dependent_name.to_string()]);
        }

        dependents.iter().find_map(|transitive_dependent| {
            self.dependent_path(transitive_dependent, dependent_name, visited)
                .map(|mut path| {
                    path.insert(0, name.to_string());
                    path
                })
        })
    }

    fn collect_destruction_order(
        &self,
        name: &str,
        visited: &mut FxHashSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }

        if let Some(dependents) = self.dependents.get(name) {
            for dependent in dependents {
                self.collect_destruction_order(dependent, visited, order);
            }
        }

        order.push(name.to_string());
    }
}

/// Dependency graph guarded by a single graph-wide lock, so traversals always see a consistent
/// snapshot of all edges.
#[derive(Default)]
pub struct DependencyGraph {
    state: Mutex<GraphState>,
}

impl DependencyGraph {
    /// Records that `dependent_name` depends on `name`. Registering the same edge again is a no-op.
    pub fn register_dependency(&self, name: &str, dependent_name: &str) {
        if self.state.lock().register(name, dependent_name) {
            trace!("Registered dependency: '{dependent_name}' depends on '{name}'.");
        }
    }

    /// Records that `dependent_name` depends on `name`, unless `name` already (transitively)
    /// depends on `dependent_name`. The check and the registration happen atomically, so two
    /// threads cannot close a cycle between them. On failure, the graph is left untouched and the
    /// error carries the full cycle, starting and ending with `name`.
    pub fn register_dependency_checked(
        &self,
        name: &str,
        dependent_name: &str,
    ) -> Result<(), ComponentInstanceProviderError> {
        let mut state = self.state.lock();

        if name == dependent_name {
            return Err(ComponentInstanceProviderError::CircularDependency {
                path: vec![name.to_string(), name.to_string()],
            });
        }

        if let Some(path) =
            state.dependent_path(dependent_name, name, &mut FxHashSet::default())
        {
            // path runs from dependent_name to name, each element depending on the previous one
            let mut cycle: Vec<String> = path.into_iter().rev().collect();
            cycle.push(name.to_string());

            return Err(ComponentInstanceProviderError::CircularDependency { path: cycle });
        }

        if state.register(name, dependent_name) {
            trace!("Registered dependency: '{dependent_name}' depends on '{name}'.");
        }

        Ok(())
    }

    /// Checks if `dependent_name` transitively depends on `name`. Names present in `visited` are
    /// skipped.
    pub fn is_dependent(
        &self,
        name: &str,
        dependent_name: &str,
        visited: &mut FxHashSet<String>,
    ) -> bool {
        self.state.lock().is_dependent(name, dependent_name, visited)
    }

    /// Returns components which directly depend on given one.
    pub fn dependent_components(&self, name: &str) -> FxHashSet<String> {
        self.state
            .lock()
            .dependents
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns components on which given one directly depends.
    pub fn dependencies(&self, dependent_name: &str) -> FxHashSet<String> {
        self.state
            .lock()
            .dependencies
            .get(dependent_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Orders given components (and everything depending on them) so that each component comes
    /// after all of its dependents. Roots are visited in given order.
    pub fn destruction_order<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let state = self.state.lock();
        let mut visited = FxHashSet::default();
        let mut order = vec![];

        for name in names {
            state.collect_destruction_order(name, &mut visited, &mut order);
        }

        order
    }

    /// Removes all edges touching given component.
    pub fn remove_component(&self, name: &str) {
        let mut state = self.state.lock();

        state.dependents.remove(name);
        state.dependents.retain(|_, dependents| {
            dependents.remove(name);
            !dependents.is_empty()
        });

        state.dependencies.remove(name);
        state.dependencies.retain(|_, dependencies| {
            dependencies.remove(name);
            !dependencies.is_empty()
        });
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.dependents.clear();
        state.dependencies.clear();
    }
}
