//! Abortable before/after decorators and the chain that runs them.
//!
//! A decorator handler either lets the request continue (`Ok(())`) or stops
//! the chain with an [`Abort`]. Befores run in declaration order; afters run
//! in reverse, so the outermost decorator observes completion last.

use crate::context::RequestContext;
use crate::logging::{debug, trace};
use crate::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A decorator's decision to stop the chain.
///
/// `status` is the application status placed in the envelope `code`; the
/// HTTP status comes from `error` (see [`Error::abort_status`]) and is 400
/// when there is none.
#[derive(Debug)]
pub struct Abort {
    pub status: u16,
    pub error: Option<Error>,
    pub payload: Value,
}

impl Abort {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            error: None,
            payload: Value::Null,
        }
    }

    pub fn with_error(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest(message.into()).into()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Error::Unauthorized(message.into()).into()
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Error::Forbidden(message.into()).into()
    }

    pub fn http_status(&self) -> u16 {
        self.error.as_ref().map_or(400, Error::abort_status)
    }

    /// Human readable text for the envelope
    pub fn message(&self) -> String {
        match (&self.error, &self.payload) {
            (Some(error), _) => error.to_string(),
            (None, Value::String(text)) => text.clone(),
            _ => "request aborted".to_string(),
        }
    }
}

impl From<Error> for Abort {
    fn from(error: Error) -> Self {
        Self {
            status: error.abort_status(),
            error: Some(error),
            payload: Value::Null,
        }
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aborted with status {}: {}", self.status, self.message())
    }
}

/// One side (before or after) of a decorator
#[async_trait]
pub trait DecoratorHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Abort>;
}

/// Adapts a synchronous closure into a [`DecoratorHandler`]
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> DecoratorHandler for FnHandler<F>
where
    F: Fn(&mut RequestContext) -> Result<(), Abort> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Abort> {
        (self.0)(ctx)
    }
}

/// A named, abortable before/after pair attached to a route
#[derive(Clone)]
pub struct Decorator {
    catalog: String,
    metadata: Value,
    before: Option<Arc<dyn DecoratorHandler>>,
    after: Option<Arc<dyn DecoratorHandler>>,
}

impl Decorator {
    pub fn builder(catalog: impl Into<String>) -> DecoratorBuilder {
        DecoratorBuilder {
            decorator: Decorator {
                catalog: catalog.into(),
                metadata: Value::Null,
                before: None,
                after: None,
            },
        }
    }

    /// Before-only decorator
    pub fn guard<F>(catalog: impl Into<String>, check: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), Abort> + Send + Sync + 'static,
    {
        Self::builder(catalog).before_fn(check).build()
    }

    /// After-only decorator
    pub fn post_processor<F>(catalog: impl Into<String>, process: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), Abort> + Send + Sync + 'static,
    {
        Self::builder(catalog).after_fn(process).build()
    }

    /// Tag used to filter decorators out of a chain
    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorator")
            .field("catalog", &self.catalog)
            .field("metadata", &self.metadata)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

pub struct DecoratorBuilder {
    decorator: Decorator,
}

impl DecoratorBuilder {
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.decorator.metadata = metadata;
        self
    }

    pub fn before(mut self, handler: impl DecoratorHandler) -> Self {
        self.decorator.before = Some(Arc::new(handler));
        self
    }

    pub fn after(mut self, handler: impl DecoratorHandler) -> Self {
        self.decorator.after = Some(Arc::new(handler));
        self
    }

    pub fn before_fn<F>(self, f: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), Abort> + Send + Sync + 'static,
    {
        self.before(FnHandler(f))
    }

    pub fn after_fn<F>(self, f: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), Abort> + Send + Sync + 'static,
    {
        self.after(FnHandler(f))
    }

    pub fn build(self) -> Decorator {
        self.decorator
    }
}

/// Ordered decorators of one route; immutable once the route is registered
#[derive(Clone, Default, Debug)]
pub struct DecoratorChain {
    decorators: Vec<Decorator>,
}

impl DecoratorChain {
    pub fn new(decorators: Vec<Decorator>) -> Self {
        Self { decorators }
    }

    pub fn decorators(&self) -> &[Decorator] {
        &self.decorators
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    /// A copy of this chain without decorators tagged `catalog`
    pub fn without_catalog(&self, catalog: &str) -> Self {
        Self {
            decorators: self
                .decorators
                .iter()
                .filter(|d| d.catalog != catalog)
                .cloned()
                .collect(),
        }
    }

    /// Run befores in order; the first abort stops the chain
    pub async fn run_before(&self, ctx: &mut RequestContext) -> Result<(), Abort> {
        for (index, decorator) in self.decorators.iter().enumerate() {
            if let Some(handler) = &decorator.before {
                trace!(index, catalog = %decorator.catalog, "Running before decorator");
                if let Err(abort) = handler.handle(ctx).await {
                    debug!(catalog = %decorator.catalog, status = abort.status, "Before decorator aborted");
                    return Err(abort);
                }
            }
        }
        Ok(())
    }

    /// Run afters last-declared first; the first abort stops the chain
    pub async fn run_after(&self, ctx: &mut RequestContext) -> Result<(), Abort> {
        for (index, decorator) in self.decorators.iter().enumerate().rev() {
            if let Some(handler) = &decorator.after {
                trace!(index, catalog = %decorator.catalog, "Running after decorator");
                if let Err(abort) = handler.handle(ctx).await {
                    debug!(catalog = %decorator.catalog, status = abort.status, "After decorator aborted");
                    return Err(abort);
                }
            }
        }
        Ok(())
    }
}

impl From<Vec<Decorator>> for DecoratorChain {
    fn from(decorators: Vec<Decorator>) -> Self {
        Self::new(decorators)
    }
}

/// Adds a storage filter whose value is derived from the request.
///
/// When `extract` yields nothing the request continues unfiltered.
pub fn storage_filter<F>(field: impl Into<String>, extract: F) -> Decorator
where
    F: Fn(&RequestContext) -> Option<Value> + Send + Sync + 'static,
{
    let field = field.into();
    Decorator::builder("storage")
        .metadata(serde_json::json!({ "filter": field }))
        .before_fn(move |ctx| {
            if let Some(value) = extract(ctx) {
                ctx.add_storage_filter(field.clone(), value);
            }
            Ok(())
        })
        .build()
}

/// Restricts storage to the caller's tenant.
///
/// Anonymous requests abort with 401, callers without a tenant with 403.
pub fn tenant_scope() -> Decorator {
    Decorator::builder("storage")
        .metadata(serde_json::json!({ "filter": "tenant_id" }))
        .before_fn(|ctx| {
            let tenant = ctx
                .require_caller()?
                .tenant_id
                .clone()
                .ok_or_else(|| Abort::forbidden("caller is not bound to a tenant"))?;
            ctx.add_storage_filter("tenant_id", tenant);
            Ok(())
        })
        .build()
}
