//! Role service demo.
//!
//! ```text
//! GIRDER_PORT=3000 GIRDER_LOG__FORMAT=pretty cargo run --example role_service --features config
//! curl -H 'authorization: Bearer admin' localhost:3000/api/role/query
//! curl -X POST -H 'authorization: Bearer admin' -d '{"name":"auditor"}' localhost:3000/api/role
//! ```

use girder::girder_config::ServerConfig;
use girder::logging::info;
use girder::prelude::*;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide role table
#[derive(Default)]
struct RoleTable {
    roles: RwLock<Vec<String>>,
}

/// Per-request view of the table, stamped with the caller
#[derive(Clone)]
struct RoleRepository {
    table: Arc<RoleTable>,
    actor: String,
}

impl RoleRepository {
    fn list(&self) -> Vec<String> {
        self.table.roles.read().clone()
    }

    fn create(&self, name: String) -> usize {
        info!(actor = %self.actor, role = %name, "Creating role");
        let mut roles = self.table.roles.write();
        roles.push(name);
        roles.len()
    }
}

#[derive(Deserialize)]
struct NewRole {
    name: String,
}

struct RoleApi {
    permissions: PermissionDecorators,
}

impl RoleApi {
    fn query<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let repo = ctx.resolve::<RoleRepository>()?;
            ctx.ok(&repo.list())
        })
    }

    fn post<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let input: NewRole = ctx.body()?;
            let repo = ctx.resolve::<RoleRepository>()?;
            let id = repo.create(input.name);
            ctx.json(201, &serde_json::json!({ "id": id }))
        })
    }
}

impl RestResource for RoleApi {
    fn name(&self) -> &str {
        "Role"
    }

    fn setup_verb_decorator(&self, verb: Verb) -> Vec<Decorator> {
        self.permissions.for_verb(verb).into_iter().collect()
    }

    fn routes(routes: &mut RestRoutes<Self>) {
        routes.query(Self::query);
        routes.post(Self::post);
    }
}

/// Demo tokens: `admin` may do everything, `viewer` may only query
struct DemoIdentity {
    callers: HashMap<&'static str, Caller>,
}

#[async_trait::async_trait]
impl IdentityProvider for DemoIdentity {
    async fn identify(&self, request: &HttpRequest) -> Result<Option<Caller>, Error> {
        Ok(request
            .bearer_token()
            .and_then(|token| self.callers.get(token).cloned()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = ServerConfig::from_env()?;
    let _guard = config.log_config()?.init()?;

    let registry = RegistryBuilder::new();
    registry.register_value(RoleTable::default())?;
    registry.register(|table: Arc<RoleTable>, caller: Arc<Caller>| RoleRepository {
        table,
        actor: caller.id.clone(),
    })?;
    let container = registry.build()?;

    let mut permissions = PermissionDecorators::new("Role")?;
    permissions.extend(["Export"])?;

    let identity = DemoIdentity {
        callers: HashMap::from([
            (
                "admin",
                Caller::new("admin").with_permissions(["Role.Query", "Role.Create", "Role.Export"]),
            ),
            ("viewer", Caller::new("viewer").with_permission("Role.Query")),
        ]),
    };

    let app = config
        .apply(Application::builder(container))
        .identity(identity)
        .prefix("/api")
        .resource(RoleApi { permissions })
        .build()?;

    for route in app.routes() {
        info!(method = %route.method.as_str(), path = %route.path, decorators = ?route.decorators, "Route");
    }

    app.listen(config.socket_addr()?).await
}
