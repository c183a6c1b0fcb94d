//! Typer descriptors and the typed factory convention.
//!
//! A *typer* records how one logical name is produced: either a literal
//! singleton, a factory whose parameters are its dependencies, or a built-in
//! value seeded from the request at resolution time.
//!
//! Factories are plain functions or closures. Every parameter must implement
//! [`Dependency`], which is what makes the dependency list statically known:
//!
//! ```
//! use girder_core::{Owned, RegistryBuilder};
//! use std::sync::Arc;
//!
//! #[derive(Clone)]
//! struct Settings { dsn: String }
//!
//! #[derive(Clone)]
//! struct Repository { settings: Arc<Settings> }
//!
//! #[derive(Clone)]
//! struct Service { repo: Repository }
//!
//! let builder = RegistryBuilder::new();
//! builder.register_value(Settings { dsn: "memory".into() }).unwrap();
//! builder.register(|settings: Arc<Settings>| Repository { settings }).unwrap();
//! builder.register(|repo: Owned<Repository>| Service { repo: repo.into_inner() }).unwrap();
//!
//! let container = builder.build().unwrap();
//! let service = container.resolve::<Service>().unwrap();
//! assert_eq!(service.repo.settings.dsn, "memory");
//! ```

use crate::Error;
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A constructed, type-erased instance
pub type Instance = Arc<dyn Any + Send + Sync>;

pub(crate) type FactoryFn = Arc<dyn Fn(&[Slot]) -> Result<Instance, Error> + Send + Sync>;

/// Copies the value behind an instance into a fresh allocation
pub(crate) type CopyFn = fn(&Instance) -> Option<Instance>;

/// How a typer naturally hands out what it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Produced by value; pointer consumers get their own copy
    Value,
    /// Produced behind a shared pointer; pointer consumers share it
    Pointer,
}

/// One parameter of a factory signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TyperDependency {
    pub name: String,
    pub by_ref: bool,
    /// Type the consumer will downcast to
    pub type_id: TypeId,
}

impl TyperDependency {
    pub fn pointer<T: ?Sized + 'static>() -> Self {
        Self {
            name: type_name::<T>().to_string(),
            by_ref: true,
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn value<T: ?Sized + 'static>() -> Self {
        Self {
            name: type_name::<T>().to_string(),
            by_ref: false,
            type_id: TypeId::of::<T>(),
        }
    }
}

pub(crate) enum TyperSource {
    Literal(Instance),
    Factory(FactoryFn),
    Builtin,
}

/// Registration record for one logical name
pub struct ObjectTyper {
    pub(crate) name: String,
    pub(crate) type_name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) dependencies: Vec<TyperDependency>,
    pub(crate) source: TyperSource,
    pub(crate) representation: Representation,
    pub(crate) copy: Option<CopyFn>,
}

impl ObjectTyper {
    pub(crate) fn literal<T: Send + Sync + 'static>(name: String, value: Arc<T>) -> Self {
        Self {
            name,
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            dependencies: Vec::new(),
            source: TyperSource::Literal(value),
            representation: Representation::Pointer,
            copy: None,
        }
    }

    pub(crate) fn builtin<T: Send + Sync + 'static>() -> Self {
        Self {
            name: type_name::<T>().to_string(),
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            dependencies: Vec::new(),
            source: TyperSource::Builtin,
            representation: Representation::Pointer,
            copy: None,
        }
    }

    /// Logical name this typer is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete Rust type the typer produces
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn dependencies(&self) -> &[TyperDependency] {
        &self.dependencies
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// `false` for literal singletons and built-ins
    pub fn has_factory(&self) -> bool {
        matches!(self.source, TyperSource::Factory(_))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.source, TyperSource::Builtin)
    }

    pub(crate) fn produces<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl fmt::Debug for ObjectTyper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTyper")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .field("has_factory", &self.has_factory())
            .field("representation", &self.representation)
            .finish()
    }
}

/// A resolved dependency as seen by the factory consuming it
#[derive(Clone)]
pub struct Slot {
    pub(crate) name: String,
    pub(crate) instance: Instance,
    pub(crate) representation: Representation,
    pub(crate) copy: Option<CopyFn>,
}

impl Slot {
    pub(crate) fn shared(name: impl Into<String>, instance: Instance) -> Self {
        Self {
            name: name.into(),
            instance,
            representation: Representation::Pointer,
            copy: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    fn mismatch<T: 'static>(&self) -> Error {
        Error::TypeMismatch {
            name: self.name.clone(),
            expected: type_name::<T>(),
        }
    }
}

/// A factory parameter type.
///
/// `Arc<T>` declares a pointer dependency on `T`; [`Owned<T>`] declares a
/// value dependency. Extraction adapts between the representation the
/// producer uses and the one the consumer asked for.
pub trait Dependency: Sized + Send + 'static {
    fn descriptor() -> TyperDependency;

    fn extract(slot: &Slot) -> Result<Self, Error>;
}

impl<T: Send + Sync + 'static> Dependency for Arc<T> {
    fn descriptor() -> TyperDependency {
        TyperDependency::pointer::<T>()
    }

    fn extract(slot: &Slot) -> Result<Self, Error> {
        let instance = match (slot.representation, slot.copy) {
            (Representation::Value, Some(copy)) => {
                copy(&slot.instance).ok_or_else(|| slot.mismatch::<T>())?
            }
            _ => slot.instance.clone(),
        };
        instance.downcast::<T>().map_err(|_| slot.mismatch::<T>())
    }
}

/// Value dependency: the consumer receives its own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owned<T>(pub T);

impl<T> Owned<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync + 'static> Dependency for Owned<T> {
    fn descriptor() -> TyperDependency {
        TyperDependency::value::<T>()
    }

    fn extract(slot: &Slot) -> Result<Self, Error> {
        slot.instance
            .downcast_ref::<T>()
            .cloned()
            .map(Owned)
            .ok_or_else(|| slot.mismatch::<T>())
    }
}

/// A typed constructor: `Fn(D1, …, Dn) -> Output` with `Di: Dependency`.
///
/// Implemented for functions and closures of up to eight parameters. The
/// single return type is the logical output.
pub trait Factory<Args>: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn dependencies() -> Vec<TyperDependency>;

    fn call(&self, slots: &[Slot]) -> Result<Self::Output, Error>;
}

macro_rules! impl_factory {
    ($($arg:ident),*) => {
        impl<Func, Out, $($arg,)*> Factory<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Out + Send + Sync + 'static,
            Out: Send + Sync + 'static,
            $($arg: Dependency,)*
        {
            type Output = Out;

            fn dependencies() -> Vec<TyperDependency> {
                vec![$(<$arg as Dependency>::descriptor()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, slots: &[Slot]) -> Result<Out, Error> {
                let expected = Self::dependencies().len();
                if slots.len() != expected {
                    return Err(Error::DependencyInjection(format!(
                        "{} expects {} arguments, got {}",
                        type_name::<Out>(),
                        expected,
                        slots.len()
                    )));
                }
                let mut slots = slots.iter();
                $(
                    let $arg = <$arg as Dependency>::extract(slots.next().ok_or_else(|| {
                        Error::DependencyInjection(format!("missing argument for {}", type_name::<Out>()))
                    })?)?;
                )*
                Ok((self)($($arg),*))
            }
        }
    };
}

impl_factory!();
impl_factory!(A1);
impl_factory!(A1, A2);
impl_factory!(A1, A2, A3);
impl_factory!(A1, A2, A3, A4);
impl_factory!(A1, A2, A3, A4, A5);
impl_factory!(A1, A2, A3, A4, A5, A6);
impl_factory!(A1, A2, A3, A4, A5, A6, A7);
impl_factory!(A1, A2, A3, A4, A5, A6, A7, A8);

pub(crate) fn copy_instance<T: Clone + Send + Sync + 'static>(instance: &Instance) -> Option<Instance> {
    instance
        .downcast_ref::<T>()
        .map(|value| Arc::new(value.clone()) as Instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Config(u32);

    fn value_slot(value: Config) -> Slot {
        Slot {
            name: type_name::<Config>().to_string(),
            instance: Arc::new(value),
            representation: Representation::Value,
            copy: Some(copy_instance::<Config>),
        }
    }

    #[test]
    fn test_descriptors_follow_parameter_types() {
        let deps = <fn(Arc<Config>, Owned<String>) -> u8 as Factory<(Arc<Config>, Owned<String>)>>::dependencies();
        assert_eq!(deps[0], TyperDependency::pointer::<Config>());
        assert_eq!(deps[1], TyperDependency::value::<String>());
        assert!(deps[0].by_ref);
        assert!(!deps[1].by_ref);
    }

    #[test]
    fn test_pointer_from_value_gets_fresh_cell() {
        let slot = value_slot(Config(7));
        let first = <Arc<Config>>::extract(&slot).unwrap();
        let second = <Arc<Config>>::extract(&slot).unwrap();
        assert_eq!(*first, Config(7));
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_pointer_from_pointer_is_shared() {
        let slot = Slot::shared("cfg", Arc::new(Config(1)));
        let first = <Arc<Config>>::extract(&slot).unwrap();
        let second = <Arc<Config>>::extract(&slot).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_value_from_pointer_is_cloned() {
        let slot = Slot::shared("cfg", Arc::new(Config(3)));
        let owned = <Owned<Config>>::extract(&slot).unwrap();
        assert_eq!(owned.into_inner(), Config(3));
    }

    #[test]
    fn test_extract_wrong_type() {
        let slot = Slot::shared("cfg", Arc::new(Config(3)));
        let err = <Arc<String>>::extract(&slot).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_factory_call_checks_arity() {
        let factory = |cfg: Arc<Config>| cfg.0 + 1;
        let err = Factory::call(&factory, &[]).unwrap_err();
        assert!(matches!(err, Error::DependencyInjection(_)));

        let slot = Slot::shared("cfg", Arc::new(Config(41)));
        assert_eq!(Factory::call(&factory, &[slot]).unwrap(), 42);
    }
}
