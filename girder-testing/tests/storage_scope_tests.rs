// End-to-end tests for tenant-scoped storage through the test harness

use girder_core::{
    BoxFuture, Caller, Decorator, Error, RequestContext, RestResource, RestRoutes, Verb,
    storage_filter, tenant_scope,
};
use girder_testing::*;
use serde_json::{Value, json};

struct Orders;

impl Orders {
    fn query<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let handle = ctx.storage();
            let storage = handle
                .downcast::<MemoryStorage>()
                .ok_or_else(|| Error::Internal("unexpected storage backend".into()))?;
            let ids: Vec<Value> = storage
                .query(&handle)
                .into_iter()
                .filter_map(|row| row.get("id").cloned())
                .collect();
            ctx.ok(&ids)
        })
    }
}

impl RestResource for Orders {
    fn name(&self) -> &str {
        "Orders"
    }

    fn setup_decorator(&self) -> Vec<Decorator> {
        vec![
            tenant_scope(),
            storage_filter("status", |ctx| ctx.query("status").map(Value::from)),
        ]
    }

    fn setup_verb_decorator(&self, _verb: Verb) -> Vec<Decorator> {
        Vec::new()
    }

    fn routes(routes: &mut RestRoutes<Self>) {
        routes.query(Self::query);
    }
}

fn app() -> TestApp {
    TestAppBuilder::new()
        .identity(
            StaticIdentity::new()
                .with_token("acme", Caller::new("wile").with_tenant("acme"))
                .with_token("drifter", Caller::new("nobody")),
        )
        .storage(MemoryStorage::with_rows(vec![
            json!({"id": 1, "tenant_id": "acme", "status": "open"}),
            json!({"id": 2, "tenant_id": "acme", "status": "closed"}),
            json!({"id": 3, "tenant_id": "umbrella", "status": "open"}),
        ]))
        .prefix("api")
        .resource(Orders)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_rows_are_scoped_to_the_callers_tenant() {
    let app = app();
    let client = app.client().bearer("acme");

    client
        .get("/api/orders/query")
        .await
        .assert_status(200)
        .assert_json_field("data", json!([1, 2]));

    client
        .get("/api/orders/query?status=open")
        .await
        .assert_json_field("data", json!([1]));
}

#[tokio::test]
async fn test_scope_rejects_anonymous_and_tenantless_callers() {
    let app = app();

    let response = app.client().get("/api/orders/query").await;
    response.assert_status(401);
    assert_envelope_error(&response, 401);

    let response = app.client().bearer("drifter").get("/api/orders/query").await;
    response.assert_status(403);
    assert_body_contains(&response, "not bound to a tenant");

    let response = app.client().bearer("forged").get("/api/orders/query").await;
    response.assert_status(401);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = app();
    let response = app
        .client()
        .bearer("acme")
        .with_header("X-Request-Id", "trace-42")
        .get("/api/orders/query")
        .await;

    assert_header(&response, "x-request-id", "trace-42");
    assert_eq!(response.envelope().request_id, "trace-42");
}

#[tokio::test]
async fn test_unknown_routes_are_enveloped() {
    let response = app().client().get("/api/invoices").await;
    response.assert_status(404);
    assert_envelope_error(&response, 404);
}
