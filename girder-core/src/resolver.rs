// Graph resolution

use crate::container::Container;
use crate::logging::{debug, trace};
use crate::typer::{Dependency, Instance, Owned, Slot, TyperSource};
use crate::Error;
use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

/// One resolution context.
///
/// Holds the values seeded for built-in typers. Each `resolve*` call builds
/// the reachable subgraph afresh, constructing every typer at most once
/// within that call; nothing is cached between calls except literal
/// singletons, which are shared by construction.
pub struct Scope<'c> {
    container: &'c Container,
    seeds: HashMap<String, Instance>,
}

impl<'c> Scope<'c> {
    pub(crate) fn new(container: &'c Container) -> Self {
        Self {
            container,
            seeds: HashMap::new(),
        }
    }

    /// Seed the built-in typer named after `T`
    pub fn seed<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.seed_named(type_name::<T>(), Arc::new(value))
    }

    pub fn seed_named(mut self, name: impl Into<String>, instance: Instance) -> Self {
        self.seeds.insert(name.into(), instance);
        self
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.resolve_named::<T>(type_name::<T>())
    }

    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.resolve_any(name)?
            .downcast::<T>()
            .map_err(|_| Error::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn resolve_owned<T: Clone + Send + Sync + 'static>(&self) -> Result<T, Error> {
        let slot = self.resolve_slot(type_name::<T>())?;
        <Owned<T> as Dependency>::extract(&slot).map(Owned::into_inner)
    }

    pub fn resolve_any(&self, name: &str) -> Result<Instance, Error> {
        self.resolve_slot(name).map(|slot| slot.instance)
    }

    fn resolve_slot(&self, name: &str) -> Result<Slot, Error> {
        let graph = self.container.graph();
        let root = *graph
            .index
            .get(name)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))?;
        let plan = &graph.plans[root];
        debug!(typer = name, plan_len = plan.len(), "Resolving dependency graph");

        let mut built: HashMap<usize, Slot> = HashMap::with_capacity(plan.len());
        for &node in plan {
            let typer = &graph.typers[node];
            let slot = match &typer.source {
                TyperSource::Literal(instance) => Slot::shared(typer.name.clone(), instance.clone()),
                TyperSource::Builtin => {
                    let instance = self.seeds.get(&typer.name).cloned().ok_or_else(|| {
                        Error::ProviderNotFound(format!("{} (built-in, not seeded)", typer.name))
                    })?;
                    Slot::shared(typer.name.clone(), instance)
                }
                TyperSource::Factory(factory) => {
                    let args = graph.edges[node]
                        .iter()
                        .map(|dep| {
                            built.get(dep).cloned().ok_or_else(|| {
                                Error::DependencyInjection(format!(
                                    "{} was not constructed before {}",
                                    graph.typers[*dep].name, typer.name
                                ))
                            })
                        })
                        .collect::<Result<Vec<Slot>, Error>>()?;

                    trace!(typer = %typer.name, args = args.len(), "Invoking factory");
                    Slot {
                        name: typer.name.clone(),
                        instance: factory(&args)?,
                        representation: typer.representation,
                        copy: typer.copy,
                    }
                }
            };
            built.insert(node, slot);
        }

        built
            .remove(&root)
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }
}
