// Registration phase of the dependency graph

use crate::container::Container;
use crate::logging::{debug, trace, warn};
use crate::typer::{
    Factory, FactoryFn, Instance, ObjectTyper, Representation, Slot, TyperSource, copy_instance,
};
use crate::{Caller, Error, RequestId, StorageHandle};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

/// Collects typers during application bootstrap.
///
/// Registration takes `&self` and is safe from several threads. [`build`]
/// consumes the builder, validates the graph and returns an immutable
/// [`Container`]; nothing can be registered after that point.
///
/// [`build`]: RegistryBuilder::build
pub struct RegistryBuilder {
    typers: Mutex<IndexMap<String, ObjectTyper>>,
}

impl RegistryBuilder {
    /// Create a builder with the request built-ins already declared
    pub fn new() -> Self {
        let builder = Self {
            typers: Mutex::new(IndexMap::new()),
        };
        builder.declare_builtin::<Caller>();
        builder.declare_builtin::<RequestId>();
        builder.declare_builtin::<StorageHandle>();
        builder
    }

    /// Register a factory under the name of the type it returns
    pub fn register<Args, F>(&self, factory: F) -> Result<(), Error>
    where
        F: Factory<Args>,
        F::Output: Clone,
    {
        self.register_with_name(type_name::<F::Output>(), factory)
    }

    /// Register a factory under an explicit logical name
    pub fn register_with_name<Args, F>(&self, name: impl Into<String>, factory: F) -> Result<(), Error>
    where
        F: Factory<Args>,
        F::Output: Clone,
    {
        let name = name.into();
        check_output::<F::Output>(&name)?;

        let call: FactoryFn = Arc::new(move |slots: &[Slot]| {
            factory.call(slots).map(|value| Arc::new(value) as Instance)
        });

        self.insert(ObjectTyper {
            name,
            type_name: type_name::<F::Output>(),
            type_id: TypeId::of::<F::Output>(),
            dependencies: F::dependencies(),
            source: TyperSource::Factory(call),
            representation: Representation::Value,
            copy: Some(copy_instance::<F::Output>),
        });
        Ok(())
    }

    /// Register a factory that hands out a shared pointer.
    ///
    /// Pointer consumers of the result share one allocation per resolution.
    pub fn register_shared<Args, F, T>(&self, factory: F) -> Result<(), Error>
    where
        F: Factory<Args, Output = Arc<T>>,
        T: Send + Sync + 'static,
    {
        let name = type_name::<T>().to_string();
        check_output::<T>(&name)?;

        let call: FactoryFn = Arc::new(move |slots: &[Slot]| {
            factory.call(slots).map(|value| value as Instance)
        });

        self.insert(ObjectTyper {
            name,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            dependencies: F::dependencies(),
            source: TyperSource::Factory(call),
            representation: Representation::Pointer,
            copy: None,
        });
        Ok(())
    }

    /// Register a literal singleton; every resolution returns this instance
    pub fn register_value<T: Send + Sync + 'static>(&self, value: T) -> Result<(), Error> {
        self.register_value_with_name(type_name::<T>(), value)
    }

    pub fn register_value_with_name<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), Error> {
        let name = name.into();
        check_output::<T>(&name)?;
        self.insert(ObjectTyper::literal(name, Arc::new(value)));
        Ok(())
    }

    /// Declare a type whose value is seeded per resolution scope.
    ///
    /// [`Caller`], [`RequestId`] and [`StorageHandle`] are declared by
    /// [`RegistryBuilder::new`].
    pub fn declare_builtin<T: Send + Sync + 'static>(&self) {
        self.insert(ObjectTyper::builtin::<T>());
    }

    /// Whether a logical name is currently registered
    pub fn contains(&self, name: &str) -> bool {
        self.typers.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.typers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, typer: ObjectTyper) {
        let mut typers = self.typers.lock();
        let name = typer.name.clone();
        trace!(typer = %name, deps = typer.dependencies.len(), "Registering typer");

        // IndexMap::insert keeps the original slot for an existing key
        if typers.insert(name.clone(), typer).is_some() {
            warn!(typer = %name, "Typer re-registered, previous entry replaced");
        } else {
            debug!(typer = %name, "Typer registered");
        }
    }

    /// Validate the graph and freeze it.
    ///
    /// Fails with [`Error::MissingDependency`] when a factory names a type
    /// that is neither registered nor built in, with
    /// [`Error::InvalidFactory`] when the name is registered under another
    /// type, and with [`Error::CyclicDependency`] when the graph is not a DAG.
    pub fn build(self) -> Result<Container, Error> {
        let typers: Vec<ObjectTyper> = self.typers.into_inner().into_values().collect();
        let index: HashMap<String, usize> = typers
            .iter()
            .enumerate()
            .map(|(i, typer)| (typer.name.clone(), i))
            .collect();

        let mut edges = Vec::with_capacity(typers.len());
        for typer in &typers {
            let mut targets = Vec::with_capacity(typer.dependencies.len());
            for dep in &typer.dependencies {
                let target = *index.get(&dep.name).ok_or_else(|| Error::MissingDependency {
                    dependency: dep.name.clone(),
                    required_by: typer.name.clone(),
                })?;
                let provider = &typers[target];
                if provider.type_id != dep.type_id {
                    return Err(Error::InvalidFactory {
                        name: typer.name.clone(),
                        reason: format!(
                            "dependency {} is registered as {}",
                            dep.name, provider.type_name
                        ),
                    });
                }
                targets.push(target);
            }
            edges.push(targets);
        }

        let rank = topological_rank(&typers, &edges)?;
        let plans = (0..typers.len())
            .map(|root| construction_plan(root, &edges, &rank))
            .collect();

        debug!(typer_count = typers.len(), "Dependency graph validated");
        Ok(Container::from_parts(typers, index, edges, plans))
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_output<T: 'static>(name: &str) -> Result<(), Error> {
    if TypeId::of::<T>() == TypeId::of::<()>() {
        return Err(Error::InvalidFactory {
            name: name.to_string(),
            reason: "a factory must return exactly one value".to_string(),
        });
    }
    if name.is_empty() {
        return Err(Error::InvalidFactory {
            name: type_name::<T>().to_string(),
            reason: "logical name must not be empty".to_string(),
        });
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Position of every typer in a global dependencies-first order
fn topological_rank(typers: &[ObjectTyper], edges: &[Vec<usize>]) -> Result<Vec<usize>, Error> {
    let mut marks = vec![Mark::Unvisited; typers.len()];
    let mut rank = vec![0; typers.len()];
    let mut next_rank = 0;

    for root in 0..typers.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::InProgress;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(&child) = edges[node].get(top.1) {
                top.1 += 1;
                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        let start = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|(n, _)| typers[*n].name.clone())
                            .collect();
                        path.push(typers[child].name.clone());
                        return Err(Error::CyclicDependency(path));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                rank[node] = next_rank;
                next_rank += 1;
                stack.pop();
            }
        }
    }

    Ok(rank)
}

/// Every typer reachable from `root`, dependencies before dependents
fn construction_plan(root: usize, edges: &[Vec<usize>], rank: &[usize]) -> Vec<usize> {
    let mut seen = vec![false; edges.len()];
    let mut pending = vec![root];
    seen[root] = true;

    while let Some(node) = pending.pop() {
        for &dep in &edges[node] {
            if !seen[dep] {
                seen[dep] = true;
                pending.push(dep);
            }
        }
    }

    let mut plan: Vec<usize> = (0..edges.len()).filter(|i| seen[*i]).collect();
    plan.sort_by_key(|i| rank[*i]);
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Owned;

    #[derive(Clone)]
    struct Leaf;

    #[derive(Clone)]
    struct Branch(Arc<Leaf>);

    #[test]
    fn test_builtins_are_predeclared() {
        let builder = RegistryBuilder::new();
        assert!(builder.contains(type_name::<Caller>()));
        assert!(builder.contains(type_name::<RequestId>()));
        assert!(builder.contains(type_name::<StorageHandle>()));
        assert_eq!(builder.len(), 3);
    }

    #[test]
    fn test_unit_factory_rejected_at_registration() {
        let builder = RegistryBuilder::new();
        let err = builder.register(|_leaf: Arc<Leaf>| ()).unwrap_err();
        assert!(matches!(err, Error::InvalidFactory { .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_reregistration_replaces_in_place() {
        let builder = RegistryBuilder::new();
        builder.register_value_with_name("first", 1u8).unwrap();
        builder.register_value_with_name("second", 2u8).unwrap();
        builder.register_value_with_name("first", 3u8).unwrap();

        let container = builder.build().unwrap();
        let names: Vec<&str> = container.typers().map(|t| t.name()).collect();
        assert_eq!(&names[3..], &["first", "second"]);
        assert_eq!(*container.resolve_named::<u8>("first").unwrap(), 3);
    }

    #[test]
    fn test_missing_dependency_fails_build() {
        let builder = RegistryBuilder::new();
        builder.register(|leaf: Arc<Leaf>| Branch(leaf)).unwrap();

        match builder.build() {
            Err(Error::MissingDependency {
                dependency,
                required_by,
            }) => {
                assert_eq!(dependency, type_name::<Leaf>());
                assert_eq!(required_by, type_name::<Branch>());
            }
            _ => panic!("expected a missing dependency error"),
        }
    }

    #[test]
    fn test_dependency_registered_under_wrong_type_fails_build() {
        let builder = RegistryBuilder::new();
        builder.register_value_with_name(type_name::<Leaf>(), 5u32).unwrap();
        builder.register(|leaf: Arc<Leaf>| Branch(leaf)).unwrap();

        match builder.build() {
            Err(Error::InvalidFactory { name, reason }) => {
                assert_eq!(name, type_name::<Branch>());
                assert!(reason.contains("u32"));
            }
            _ => panic!("expected a type conflict at build"),
        }
    }

    #[derive(Clone)]
    struct Ping;

    #[derive(Clone)]
    struct Pong;

    #[test]
    fn test_cycle_detected_with_path() {
        let builder = RegistryBuilder::new();
        builder.register(|_: Owned<Pong>| Ping).unwrap();
        builder.register(|_: Owned<Ping>| Pong).unwrap();

        match builder.build() {
            Err(Error::CyclicDependency(path)) => {
                assert_eq!(path.len(), 3);
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&type_name::<Ping>().to_string()));
                assert!(path.contains(&type_name::<Pong>().to_string()));
            }
            _ => panic!("expected a cycle"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let builder = RegistryBuilder::new();
        builder.register(|_: Owned<Ping>| Ping).unwrap();
        assert!(matches!(builder.build(), Err(Error::CyclicDependency(_))));
    }

    #[test]
    fn test_plan_orders_dependencies_first() {
        let edges = vec![vec![1, 2], vec![2], vec![]];
        let typers: Vec<ObjectTyper> = (0..3)
            .map(|i| ObjectTyper::literal(format!("t{i}"), Arc::new(i)))
            .collect();
        let rank = topological_rank(&typers, &edges).unwrap();
        assert_eq!(construction_plan(0, &edges, &rank), vec![2, 1, 0]);
        assert_eq!(construction_plan(1, &edges, &rank), vec![2, 1]);
    }
}
