// Girder - typed dependency graph, decorator chains and convention-based REST
// routing for async HTTP services.
//
// Types are registered once at startup and resolved per request; resources
// bind handlers to a fixed verb table and get their routes, permission
// checks and response envelopes by convention.

// Re-export core functionality
pub use girder_core::*;

// Re-export optional crates
#[cfg(feature = "config")]
pub use girder_config;

#[cfg(feature = "testing")]
pub use girder_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Abort,
        Application,
        BoxFuture,
        Caller,
        Container,
        Decorator,
        Error,
        HttpMethod,
        HttpRequest,
        HttpResponse,
        IdentityProvider,
        Owned,
        PermissionDecorators,
        RegistryBuilder,
        RequestContext,
        RestResource,
        RestRoutes,
        StorageBackend,
        Verb,
        require_permissions,
        storage_filter,
        tenant_scope,
    };
}
