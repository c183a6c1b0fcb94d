//! Convention-based REST registration.
//!
//! A resource names itself, binds handler methods to [`Verb`]s and
//! optionally contributes decorators. The registrar derives method and
//! path from each verb, composes the decorator chain and hands the route to
//! a [`Transport`].
//!
//! ```
//! use girder_core::{BoxFuture, Error, RequestContext, RestResource, RestRoutes, Verb};
//!
//! struct RoleApi;
//!
//! impl RoleApi {
//!     fn get<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
//!         Box::pin(async move { ctx.ok(&"admin") })
//!     }
//!
//!     fn query<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
//!         Box::pin(async move { ctx.ok(&Vec::<String>::new()) })
//!     }
//! }
//!
//! impl RestResource for RoleApi {
//!     fn name(&self) -> &str {
//!         "Role"
//!     }
//!
//!     fn routes(routes: &mut RestRoutes<Self>) {
//!         routes.get(Self::get);
//!         routes.query(Self::query);
//!     }
//! }
//!
//! assert_eq!(Verb::from_name("QUERYLIST"), Some(Verb::QueryList));
//! ```

use crate::context::RequestContext;
use crate::decorator::{Abort, Decorator, DecoratorChain, DecoratorHandler};
use crate::dispatch::Dispatcher;
use crate::logging::{debug, warn};
use crate::routing::{HandlerFn, Route, RouterInfo};
use crate::traits::Transport;
use crate::{Error, HttpMethod, HttpRequest, HttpResponse};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use indexmap::map::Entry;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// Catalog tag of the decorator carrying a route's lifecycle hooks
pub const LIFECYCLE_CATALOG: &str = "lifecycle";

/// The recognised verb table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Detail,
    Query,
    QueryList,
    Post,
    Put,
    Delete,
    Options,
    Patch,
    Head,
    Any,
}

impl Verb {
    pub const ALL: [Verb; 11] = [
        Verb::Get,
        Verb::Detail,
        Verb::Query,
        Verb::QueryList,
        Verb::Post,
        Verb::Put,
        Verb::Delete,
        Verb::Options,
        Verb::Patch,
        Verb::Head,
        Verb::Any,
    ];

    /// Case-insensitive lookup; `All` is an alias of `Any`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "get" => Some(Verb::Get),
            "detail" => Some(Verb::Detail),
            "query" => Some(Verb::Query),
            "querylist" => Some(Verb::QueryList),
            "post" => Some(Verb::Post),
            "put" => Some(Verb::Put),
            "delete" => Some(Verb::Delete),
            "options" => Some(Verb::Options),
            "patch" => Some(Verb::Patch),
            "head" => Some(Verb::Head),
            "any" | "all" => Some(Verb::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Verb::Get => "Get",
            Verb::Detail => "Detail",
            Verb::Query => "Query",
            Verb::QueryList => "QueryList",
            Verb::Post => "Post",
            Verb::Put => "Put",
            Verb::Delete => "Delete",
            Verb::Options => "Options",
            Verb::Patch => "Patch",
            Verb::Head => "Head",
            Verb::Any => "Any",
        }
    }

    pub fn http_method(&self) -> HttpMethod {
        match self {
            Verb::Get | Verb::Detail | Verb::Query | Verb::QueryList => HttpMethod::GET,
            Verb::Post => HttpMethod::POST,
            Verb::Put => HttpMethod::PUT,
            Verb::Delete => HttpMethod::DELETE,
            Verb::Options => HttpMethod::OPTIONS,
            Verb::Patch => HttpMethod::PATCH,
            Verb::Head => HttpMethod::HEAD,
            Verb::Any => HttpMethod::ANY,
        }
    }

    /// Appended to the resource base path
    pub fn path_suffix(&self) -> &'static str {
        match self {
            Verb::Detail => "/detail/:id",
            Verb::Query => "/query",
            Verb::QueryList => "/queryList",
            _ => "",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A handler method: single request-context argument, response written to the context
pub type HandlerMethod<R> =
    for<'a> fn(&'a R, &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>>;

/// A lifecycle hook method; an `Err` aborts like any decorator
pub type HookMethod<R> =
    for<'a> fn(&'a R, &'a mut RequestContext) -> BoxFuture<'a, Result<(), Abort>>;

/// A type whose methods are served as REST routes
pub trait RestResource: Send + Sync + Sized + 'static {
    /// Resource name; lower-cased, it becomes the base path segment
    fn name(&self) -> &str;

    /// Decorators applied to every route of this resource
    fn setup_decorator(&self) -> Vec<Decorator> {
        Vec::new()
    }

    /// Decorators applied to the route of one verb
    fn setup_verb_decorator(&self, _verb: Verb) -> Vec<Decorator> {
        Vec::new()
    }

    /// Bind handler methods to verbs
    fn routes(routes: &mut RestRoutes<Self>);
}

/// One verb's binding
pub struct RouteBinding<R> {
    verb: Verb,
    handler: HandlerMethod<R>,
    before: Option<HookMethod<R>>,
    after: Option<HookMethod<R>>,
}

impl<R: RestResource> RouteBinding<R> {
    fn new(verb: Verb, handler: HandlerMethod<R>) -> Self {
        Self {
            verb,
            handler,
            before: None,
            after: None,
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Hook run before every other decorator of this route
    pub fn on_before(&mut self, hook: HookMethod<R>) -> &mut Self {
        self.before = Some(hook);
        self
    }

    /// Hook run after every other decorator of this route
    pub fn on_after(&mut self, hook: HookMethod<R>) -> &mut Self {
        self.after = Some(hook);
        self
    }

    fn lifecycle(&self, resource: &Arc<R>) -> Option<Decorator> {
        if self.before.is_none() && self.after.is_none() {
            return None;
        }
        let mut builder = Decorator::builder(LIFECYCLE_CATALOG);
        if let Some(hook) = self.before {
            builder = builder.before(LifecycleHook {
                resource: resource.clone(),
                hook,
            });
        }
        if let Some(hook) = self.after {
            builder = builder.after(LifecycleHook {
                resource: resource.clone(),
                hook,
            });
        }
        Some(builder.build())
    }
}

/// Verb table of one resource type, filled by [`RestResource::routes`]
pub struct RestRoutes<R> {
    bindings: IndexMap<Verb, RouteBinding<R>>,
}

impl<R: RestResource> RestRoutes<R> {
    fn new() -> Self {
        Self {
            bindings: IndexMap::new(),
        }
    }

    /// Bind a handler.
    ///
    /// Binding a verb again replaces the earlier binding whole, so hooks
    /// attached to it with `on_before`/`on_after` are dropped as well.
    pub fn bind(&mut self, verb: Verb, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        match self.bindings.entry(verb) {
            Entry::Occupied(mut entry) => {
                warn!(resource = type_name::<R>(), verb = %verb, "Verb bound twice, last binding wins");
                entry.insert(RouteBinding::new(verb, handler));
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(RouteBinding::new(verb, handler)),
        }
    }

    pub fn get(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Get, handler)
    }

    pub fn detail(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Detail, handler)
    }

    pub fn query(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Query, handler)
    }

    pub fn query_list(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::QueryList, handler)
    }

    pub fn post(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Post, handler)
    }

    pub fn put(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Put, handler)
    }

    pub fn delete(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Delete, handler)
    }

    pub fn options(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Options, handler)
    }

    pub fn patch(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Patch, handler)
    }

    pub fn head(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Head, handler)
    }

    pub fn any(&mut self, handler: HandlerMethod<R>) -> &mut RouteBinding<R> {
        self.bind(Verb::Any, handler)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

struct LifecycleHook<R> {
    resource: Arc<R>,
    hook: HookMethod<R>,
}

#[async_trait]
impl<R: RestResource> DecoratorHandler for LifecycleHook<R> {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Abort> {
        (self.hook)(self.resource.as_ref(), ctx).await
    }
}

/// A handler method bound to its resource instance
pub trait BoundHandler: Send + Sync {
    fn invoke<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>>;
}

struct BoundMethod<R> {
    resource: Arc<R>,
    method: HandlerMethod<R>,
}

impl<R: RestResource> BoundHandler for BoundMethod<R> {
    fn invoke<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
        (self.method)(self.resource.as_ref(), ctx)
    }
}

/// A registered route's handler together with its decorator chain.
///
/// Built once at registration; immutable afterwards.
pub struct DynamicCaller {
    info: RouterInfo,
    chain: DecoratorChain,
    handler: Arc<dyn BoundHandler>,
}

impl DynamicCaller {
    pub fn new(info: RouterInfo, chain: DecoratorChain, handler: Arc<dyn BoundHandler>) -> Self {
        Self {
            info,
            chain,
            handler,
        }
    }

    pub fn info(&self) -> &RouterInfo {
        &self.info
    }

    pub fn chain(&self) -> &DecoratorChain {
        &self.chain
    }

    pub fn handler(&self) -> &Arc<dyn BoundHandler> {
        &self.handler
    }
}

impl fmt::Debug for DynamicCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCaller")
            .field("info", &self.info)
            .field("chain", &self.chain)
            .finish()
    }
}

/// Walks resources and registers their routes with a transport
pub struct RestRegistrar<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    dispatcher: Arc<Dispatcher>,
    prefix: String,
}

impl<'t, T: Transport + ?Sized> RestRegistrar<'t, T> {
    pub fn new(transport: &'t mut T, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            transport,
            dispatcher,
            prefix: String::new(),
        }
    }

    /// Mount every resource under `prefix`, e.g. `/api`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Register every bound verb of `resource`.
    ///
    /// Decorators are composed as lifecycle hooks, then verb decorators,
    /// then resource decorators; afters run over that list in reverse.
    pub fn register<R: RestResource>(&mut self, resource: Arc<R>) -> Result<Vec<RouterInfo>, Error> {
        let name = resource.name();
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidResource(format!(
                "{}: name {:?} cannot be used as a path segment",
                type_name::<R>(),
                name
            )));
        }
        let base = format!("{}/{}", self.prefix, name.to_lowercase());

        let mut routes = RestRoutes::new();
        R::routes(&mut routes);
        if routes.is_empty() {
            warn!(resource = %name, "Resource binds no verbs");
        }

        let resource_decorators = resource.setup_decorator();
        let mut registered = Vec::with_capacity(routes.len());

        for binding in routes.bindings.into_values() {
            let verb = binding.verb;
            let mut decorators = Vec::new();
            decorators.extend(binding.lifecycle(&resource));
            decorators.extend(resource.setup_verb_decorator(verb));
            decorators.extend(resource_decorators.iter().cloned());
            let chain = DecoratorChain::new(decorators);

            let info = RouterInfo {
                method: verb.http_method(),
                path: format!("{base}{}", verb.path_suffix()),
                handler_name: format!("{}::{}", type_name::<R>(), verb.name()),
                decorators: chain.decorators().iter().map(|d| d.catalog().to_string()).collect(),
            };

            let caller = Arc::new(DynamicCaller::new(
                info.clone(),
                chain,
                Arc::new(BoundMethod {
                    resource: resource.clone(),
                    method: binding.handler,
                }),
            ));
            let dispatcher = self.dispatcher.clone();
            let handler: HandlerFn = Arc::new(
                move |request: HttpRequest| -> BoxFuture<'static, Result<HttpResponse, Error>> {
                    let dispatcher = dispatcher.clone();
                    let caller = caller.clone();
                    Box::pin(async move { Ok(dispatcher.dispatch(&caller, request).await) })
                },
            );

            self.transport.add_route(Route::from_info(info.clone(), handler))?;
            debug!(
                method = %info.method,
                path = %info.path,
                decorators = info.decorators.len(),
                "REST route registered"
            );
            registered.push(info);
        }

        Ok(registered)
    }
}
