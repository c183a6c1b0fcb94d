// Application bootstrapper and HTTP server

use crate::dispatch::{Dispatcher, REQUEST_ID_HEADER};
use crate::envelope::Envelope;
use crate::logging::{debug, error, info, warn};
use crate::rest::{RestRegistrar, RestResource};
use crate::routing::RouterInfo;
use crate::traits::{IdentityProvider, StorageBackend, Transport};
use crate::{Container, Error, HttpRequest, HttpResponse, Route, Router};
use bytes::Bytes;
use futures_util::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Largest request body accepted by [`Application::listen`] unless configured
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

trait Mount: Send {
    fn mount(self: Box<Self>, registrar: &mut RestRegistrar<'_, Router>) -> Result<Vec<RouterInfo>, Error>;
}

struct PendingResource<R>(Arc<R>);

impl<R: RestResource> Mount for PendingResource<R> {
    fn mount(self: Box<Self>, registrar: &mut RestRegistrar<'_, Router>) -> Result<Vec<RouterInfo>, Error> {
        registrar.register(self.0)
    }
}

/// Assembles an [`Application`]; every configuration error surfaces from [`build`](Self::build)
pub struct ApplicationBuilder {
    container: Container,
    identity: Option<Arc<dyn IdentityProvider>>,
    storage: Option<Arc<dyn StorageBackend>>,
    request_id_header: String,
    prefix: String,
    body_limit: usize,
    resources: Vec<Box<dyn Mount>>,
    routes: Vec<Route>,
}

impl ApplicationBuilder {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            identity: None,
            storage: None,
            request_id_header: REQUEST_ID_HEADER.to_string(),
            prefix: String::new(),
            body_limit: DEFAULT_BODY_LIMIT,
            resources: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn identity(mut self, identity: impl IdentityProvider) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    pub fn storage(mut self, storage: impl StorageBackend) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    pub fn request_id_header(mut self, header: impl Into<String>) -> Self {
        self.request_id_header = header.into();
        self
    }

    /// Path prefix for every REST resource
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn resource<R: RestResource>(self, resource: R) -> Self {
        self.resource_arc(Arc::new(resource))
    }

    pub fn resource_arc<R: RestResource>(mut self, resource: Arc<R>) -> Self {
        self.resources.push(Box::new(PendingResource(resource)));
        self
    }

    /// A plain route outside the REST conventions, e.g. a health check
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn build(self) -> Result<Application, Error> {
        let mut dispatcher =
            Dispatcher::new(self.container).with_request_id_header(self.request_id_header);
        if let Some(identity) = self.identity {
            dispatcher = dispatcher.with_identity(identity);
        }
        if let Some(storage) = self.storage {
            dispatcher = dispatcher.with_storage(storage);
        }
        let dispatcher = Arc::new(dispatcher);

        let mut router = Router::new();
        {
            let mut registrar =
                RestRegistrar::new(&mut router, dispatcher.clone()).with_prefix(self.prefix);
            for resource in self.resources {
                resource.mount(&mut registrar)?;
            }
        }
        for route in self.routes {
            router.add_route(route)?;
        }

        info!(routes = router.len(), "Application assembled");
        Ok(Application {
            dispatcher,
            router: Arc::new(router),
            body_limit: self.body_limit,
        })
    }
}

/// The main application struct
pub struct Application {
    dispatcher: Arc<Dispatcher>,
    router: Arc<Router>,
    body_limit: usize,
}

impl Application {
    pub fn builder(container: Container) -> ApplicationBuilder {
        ApplicationBuilder::new(container)
    }

    pub fn container(&self) -> &Container {
        self.dispatcher.container()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn routes(&self) -> Vec<RouterInfo> {
        self.router.routes_info()
    }

    /// Route one request in-process; routing failures become error envelopes
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let header = self.dispatcher.request_id_header().to_string();
        let request_id = request
            .header(&header)
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self.router.route(request).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Request not routed");
                Envelope::from_error(&err, &request_id)
                    .render(err.status_code())
                    .with_header(header, request_id)
            }
        }
    }

    /// Serve HTTP/1.1 on `addr` until the process exits
    pub async fn listen(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %addr, "Server listening");
        self.serve(listener).await
    }

    /// Serve HTTP/1.1 on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        let app = Arc::new(self);
        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "Failed to accept connection");
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let app = app.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    async move { Ok::<_, Infallible>(handle_request(req, app).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(remote = %remote, error = %err, "Error serving connection");
                }
            });
        }
    }

    /// [`handle`](Self::handle) with panics converted into a 500 envelope
    async fn handle_recovered(&self, request: HttpRequest) -> HttpResponse {
        let request_id = request
            .header(self.dispatcher.request_id_header())
            .cloned()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match AssertUnwindSafe(self.handle(request)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                error!(request_id = %request_id, panic = %message, "Recovered from panic");
                let err = Error::Internal("internal server error".to_string());
                Envelope::from_error(&err, &request_id)
                    .render(err.status_code())
                    .with_header(self.dispatcher.request_id_header(), request_id)
            }
        }
    }
}

/// Handle an incoming HTTP request
async fn handle_request(req: Request<IncomingBody>, app: Arc<Application>) -> Response<Full<Bytes>> {
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let mut request = HttpRequest::new(method, path);
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.as_str().to_string(), value.to_string());
        }
    }
    let header = app.dispatcher.request_id_header();
    let request_id = request
        .header(header)
        .cloned()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = match Limited::new(req.into_body(), app.body_limit).collect().await {
        Ok(collected) => {
            request.body = collected.to_bytes().to_vec();
            app.handle_recovered(request).await
        }
        Err(err) => {
            let err = if err.downcast_ref::<LengthLimitError>().is_some() {
                Error::PayloadTooLarge(format!("body exceeds {} bytes", app.body_limit))
            } else {
                Error::BadRequest(format!("failed to read body: {err}"))
            };
            debug!(request_id = %request_id, error = %err, "Request body rejected");
            Envelope::from_error(&err, &request_id)
                .render(err.status_code())
                .with_header(header, request_id)
        }
    };

    into_hyper(response)
}

fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }
    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|err| {
            error!(error = %err, "Invalid response");
            let mut fallback = Response::new(Full::new(Bytes::from_static(b"internal server error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}
