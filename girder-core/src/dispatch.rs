// Per-request execution of a route's decorator chain and handler

use crate::context::{RequestContext, RequestId};
use crate::decorator::Abort;
use crate::envelope::abort_response;
use crate::logging::{debug, error, trace, warn};
use crate::rest::DynamicCaller;
use crate::traits::{Anonymous, IdentityProvider, NullStorage, StorageBackend};
use crate::{Container, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::Instrument;

/// Default header carrying the correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the request context and drives one route.
///
/// The dispatcher does not catch panics; the server loop is the recovery
/// boundary.
pub struct Dispatcher {
    container: Container,
    identity: Arc<dyn IdentityProvider>,
    storage: Arc<dyn StorageBackend>,
    request_id_header: String,
}

impl Dispatcher {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            identity: Arc::new(Anonymous),
            storage: Arc::new(NullStorage),
            request_id_header: REQUEST_ID_HEADER.to_string(),
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_request_id_header(mut self, header: impl Into<String>) -> Self {
        self.request_id_header = header.into().to_ascii_lowercase();
        self
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn request_id_header(&self) -> &str {
        &self.request_id_header
    }

    /// Run `caller` for `request`; always yields a response carrying the request id
    pub async fn dispatch(&self, caller: &DynamicCaller, request: HttpRequest) -> HttpResponse {
        let request_id = request
            .header(&self.request_id_header)
            .filter(|id| !id.is_empty())
            .map(|id| RequestId(id.clone()))
            .unwrap_or_else(RequestId::generate);

        let span = tracing::info_span!(
            "dispatch",
            method = %request.method,
            path = %request.path,
            handler = %caller.info().handler_name,
            request_id = %request_id,
        );

        let response = self
            .execute(caller, request, request_id.clone())
            .instrument(span)
            .await;
        response.with_header(&self.request_id_header, request_id.0)
    }

    async fn execute(
        &self,
        caller: &DynamicCaller,
        request: HttpRequest,
        request_id: RequestId,
    ) -> HttpResponse {
        let identity = match self.identity.identify(&request).await {
            Ok(identity) => identity,
            Err(err) => {
                debug!(error = %err, "Identity provider rejected request");
                return render_abort(&Abort::from(err), request_id.as_str());
            }
        };

        let mut ctx = RequestContext::new(request, self.container.clone())
            .with_request_id(request_id)
            .with_caller(identity)
            .with_storage(self.storage.clone());

        if let Err(abort) = caller.chain().run_before(&mut ctx).await {
            return render_abort(&abort, ctx.request_id());
        }

        trace!("Invoking handler");
        if let Err(err) = caller.handler().invoke(&mut ctx).await {
            if err.is_server_error() {
                error!(error = %err, "Handler failed");
            } else {
                debug!(error = %err, "Handler returned client error");
            }
            ctx.fail(&err);
        }

        if let Err(abort) = caller.chain().run_after(&mut ctx).await {
            return render_abort(&abort, ctx.request_id());
        }

        ctx.take_response().unwrap_or_else(HttpResponse::no_content)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("container", &self.container)
            .field("storage", &self.storage.name())
            .field("request_id_header", &self.request_id_header)
            .finish()
    }
}

fn render_abort(abort: &Abort, request_id: &str) -> HttpResponse {
    let response = abort_response(abort, request_id);
    if response.status >= 500 {
        warn!(status = response.status, message = %abort.message(), "Request aborted");
    } else {
        debug!(status = response.status, message = %abort.message(), "Request aborted");
    }
    response
}
