//! Testing utilities for Girder applications.
//!
//! Everything runs in-process: requests go straight into the router or the
//! application's dispatcher without opening a socket.
//!
//! ## Quick Start
//!
//! ```
//! use girder_core::{BoxFuture, Caller, Error, RequestContext, RestResource, RestRoutes};
//! use girder_testing::*;
//!
//! struct RoleApi;
//!
//! impl RoleApi {
//!     fn get<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
//!         Box::pin(async move {
//!             let who = ctx.require_caller()?.id.clone();
//!             ctx.ok(&who)
//!         })
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
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let app = TestAppBuilder::new()
//!     .identity(StaticIdentity::new().with_token("t-1", Caller::new("alice")))
//!     .resource(RoleApi)
//!     .build()
//!     .unwrap();
//!
//! app.client()
//!     .bearer("t-1")
//!     .get("/role")
//!     .await
//!     .assert_status(200)
//!     .assert_json_field("data", "alice");
//!
//! app.client().get("/role").await.assert_status(401);
//! # });
//! ```

mod assertions;
mod identity;
mod mock;
mod test_app;
mod test_client;

pub use assertions::{assert_body_contains, assert_envelope_error, assert_header, assert_status};
pub use identity::StaticIdentity;
pub use mock::MemoryStorage;
pub use test_app::{TestApp, TestAppBuilder};
pub use test_client::{TestClient, TestResponse};

// Re-export common testing utilities
pub use tokio::test as tokio_test;
