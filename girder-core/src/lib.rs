// Core library for the Girder framework
// Typed dependency graph, decorator chains and convention-based REST routing

pub mod application;
pub mod container;
pub mod context;
pub mod decorator;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod permission;
pub mod registry;
pub mod resolver;
pub mod rest;
pub mod routing;
pub mod status;
pub mod traits;
pub mod typer;

pub use application::*;
pub use container::*;
pub use context::*;
pub use decorator::*;
pub use dispatch::*;
pub use envelope::*;
pub use error::*;
pub use http::*;
pub use permission::*;
pub use registry::*;
pub use resolver::*;
pub use rest::*;
pub use routing::{HandlerFn, Route, Router, RouterInfo};
pub use status::*;
pub use traits::*;
pub use typer::{Dependency, Factory, Instance, ObjectTyper, Owned, Representation, Slot, TyperDependency};

pub use futures_util::future::BoxFuture;
