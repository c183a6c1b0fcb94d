// Dependency injection container

use crate::registry::RegistryBuilder;
use crate::resolver::Scope;
use crate::typer::{Instance, ObjectTyper};
use crate::Error;
use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;
use crate::logging::debug;

pub(crate) struct Graph {
    pub(crate) typers: Vec<ObjectTyper>,
    pub(crate) index: HashMap<String, usize>,
    /// Dependency indices per typer, in parameter order
    pub(crate) edges: Vec<Vec<usize>>,
    /// Reachable typers per root, in construction order
    pub(crate) plans: Vec<Vec<usize>>,
}

/// The frozen dependency graph.
///
/// Cloning is cheap; every clone shares the same graph. Resolution never
/// mutates the container, so it can be used from any number of requests
/// without locking.
#[derive(Clone)]
pub struct Container {
    graph: Arc<Graph>,
}

impl Container {
    /// Start a registration phase
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub(crate) fn from_parts(
        typers: Vec<ObjectTyper>,
        index: HashMap<String, usize>,
        edges: Vec<Vec<usize>>,
        plans: Vec<Vec<usize>>,
    ) -> Self {
        debug!(typer_count = typers.len(), "Creating DI container");
        Self {
            graph: Arc::new(Graph {
                typers,
                index,
                edges,
                plans,
            }),
        }
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    /// A resolution scope for seeding built-in values
    pub fn scope(&self) -> Scope<'_> {
        Scope::new(self)
    }

    /// Resolve a type registered under its own type name
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.scope().resolve::<T>()
    }

    /// Resolve a type registered under an explicit logical name
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.scope().resolve_named::<T>(name)
    }

    /// Resolve and clone the value out
    pub fn resolve_owned<T: Clone + Send + Sync + 'static>(&self) -> Result<T, Error> {
        self.scope().resolve_owned::<T>()
    }

    /// Resolve without knowing the concrete type
    pub fn resolve_any(&self, name: &str) -> Result<Instance, Error> {
        self.scope().resolve_any(name)
    }

    /// Check if a logical name is registered
    pub fn has(&self, name: &str) -> bool {
        self.graph.index.contains_key(name)
    }

    /// Check if a type is registered under its own type name
    pub fn has_type<T: 'static>(&self) -> bool {
        self.typer(type_name::<T>())
            .is_some_and(|typer| typer.produces::<T>())
    }

    pub fn typer(&self, name: &str) -> Option<&ObjectTyper> {
        self.graph.index.get(name).map(|i| &self.graph.typers[*i])
    }

    /// All typers in registration order
    pub fn typers(&self) -> impl Iterator<Item = &ObjectTyper> {
        self.graph.typers.iter()
    }

    pub fn len(&self) -> usize {
        self.graph.typers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.typers.is_empty()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("typers", &self.graph.typers.len())
            .finish()
    }
}
