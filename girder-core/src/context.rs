// Request-scoped context shared by decorators and handlers

use crate::envelope::Envelope;
use crate::logging::trace;
use crate::{Container, Error, HttpRequest, HttpResponse, NullStorage, StorageBackend};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// The authenticated identity behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_permission(mut self, key: impl Into<String>) -> Self {
        self.permissions.insert(key.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Exact key membership; no wildcard or hierarchy
    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions.contains(key)
    }
}

/// Correlation identifier of the current request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One equality constraint a decorator placed on storage access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageFilter {
    pub field: String,
    pub value: Value,
}

/// The shared storage backend plus the filters accumulated for this request
#[derive(Clone)]
pub struct StorageHandle {
    backend: Arc<dyn StorageBackend>,
    filters: Vec<StorageFilter>,
}

impl StorageHandle {
    pub fn new(backend: Arc<dyn StorageBackend>, filters: Vec<StorageFilter>) -> Self {
        Self { backend, filters }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Borrow the backend as its concrete client type
    pub fn downcast<T: StorageBackend>(&self) -> Option<&T> {
        let backend: &dyn Any = self.backend.as_ref();
        backend.downcast_ref::<T>()
    }

    pub fn filters(&self) -> &[StorageFilter] {
        &self.filters
    }

    /// Value of the last filter on `field`
    pub fn filter(&self, field: &str) -> Option<&Value> {
        self.filters
            .iter()
            .rev()
            .find(|f| f.field == field)
            .map(|f| &f.value)
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle")
            .field("backend", &self.backend.name())
            .field("filters", &self.filters)
            .finish()
    }
}

/// Everything a decorator or handler sees for one request.
///
/// Handlers write their result with [`ok`](Self::ok), [`json`](Self::json)
/// or [`respond`](Self::respond). A request that finishes without a written
/// response is answered with `204 No Content`.
pub struct RequestContext {
    request: HttpRequest,
    request_id: RequestId,
    caller: Option<Caller>,
    container: Container,
    storage: Arc<dyn StorageBackend>,
    filters: Vec<StorageFilter>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    response: Option<HttpResponse>,
}

impl RequestContext {
    /// Anonymous context over a null storage backend with a fresh request id
    pub fn new(request: HttpRequest, container: Container) -> Self {
        Self {
            request,
            request_id: RequestId::generate(),
            caller: None,
            container,
            storage: Arc::new(NullStorage),
            filters: Vec::new(),
            extensions: HashMap::new(),
            response: None,
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_caller(mut self, caller: Option<Caller>) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    /// Path parameter shortcut
    pub fn param(&self, name: &str) -> Option<&str> {
        self.request.param(name).map(String::as_str)
    }

    /// Query parameter shortcut
    pub fn query(&self, name: &str) -> Option<&str> {
        self.request.query(name).map(String::as_str)
    }

    /// Deserialize the request body
    pub fn body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        self.request.json()
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn require_caller(&self) -> Result<&Caller, Error> {
        self.caller
            .as_ref()
            .ok_or_else(|| Error::Unauthorized("authentication required".to_string()))
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Constrain storage access for the rest of this request
    pub fn add_storage_filter(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let filter = StorageFilter {
            field: field.into(),
            value: value.into(),
        };
        trace!(field = %filter.field, "Storage filter added");
        self.filters.push(filter);
    }

    /// Storage handle with every filter added so far
    pub fn storage(&self) -> StorageHandle {
        StorageHandle::new(self.storage.clone(), self.filters.clone())
    }

    /// Resolve from the container with this request's built-ins seeded
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        self.with_scope(|scope| scope.resolve::<T>())
    }

    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, Error> {
        self.with_scope(|scope| scope.resolve_named::<T>(name))
    }

    pub fn resolve_owned<T: Clone + Send + Sync + 'static>(&self) -> Result<T, Error> {
        self.with_scope(|scope| scope.resolve_owned::<T>())
    }

    fn with_scope<R>(&self, f: impl FnOnce(&crate::Scope<'_>) -> R) -> R {
        let mut scope = self
            .container
            .scope()
            .seed(self.request_id.clone())
            .seed(self.storage());
        if let Some(caller) = &self.caller {
            scope = scope.seed(caller.clone());
        }
        f(&scope)
    }

    /// Attach request-local state; replaces any earlier value of the same type
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Write a success envelope around `data`
    pub fn ok<T: Serialize>(&mut self, data: &T) -> Result<(), Error> {
        let data = serde_json::to_value(data).map_err(|e| Error::Serialization(e.to_string()))?;
        let response = Envelope::success(data, self.request_id()).into_response(200)?;
        self.respond(response);
        Ok(())
    }

    /// Write a raw JSON body with an explicit status
    pub fn json<T: Serialize>(&mut self, status: u16, value: &T) -> Result<(), Error> {
        let response = HttpResponse::new(status).with_json(value)?;
        self.respond(response);
        Ok(())
    }

    pub fn respond(&mut self, response: HttpResponse) {
        self.response = Some(response);
    }

    /// Replace the response with the error envelope for `error`
    pub fn fail(&mut self, error: &Error) {
        let response = Envelope::from_error(error, self.request_id()).render(error.status_code());
        self.respond(response);
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn take_response(&mut self) -> Option<HttpResponse> {
        self.response.take()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("request_id", &self.request_id)
            .field("caller", &self.caller.as_ref().map(|c| &c.id))
            .field("filters", &self.filters)
            .field("responded", &self.response.is_some())
            .finish()
    }
}
