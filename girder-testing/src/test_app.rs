// Test Application Builder

use crate::TestClient;
use girder_core::{
    Application, ApplicationBuilder, Container, Error, IdentityProvider, RegistryBuilder,
    RestResource, Route, RouterInfo, StorageBackend,
};
use std::sync::Arc;

type Step = Box<dyn FnOnce(ApplicationBuilder) -> ApplicationBuilder>;

/// Application assembled for in-process tests
pub struct TestApp {
    app: Arc<Application>,
}

impl TestApp {
    pub fn app(&self) -> &Arc<Application> {
        &self.app
    }

    pub fn container(&self) -> &Container {
        self.app.container()
    }

    pub fn routes(&self) -> Vec<RouterInfo> {
        self.app.routes()
    }

    pub fn client(&self) -> TestClient {
        TestClient::for_app(self.app.clone())
    }
}

/// Builder for test applications.
///
/// Types go into [`registry`](Self::registry); everything else is applied
/// to the [`ApplicationBuilder`] in call order when the app is built.
pub struct TestAppBuilder {
    registry: RegistryBuilder,
    steps: Vec<Step>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            registry: RegistryBuilder::new(),
            steps: Vec::new(),
        }
    }

    pub fn registry(&self) -> &RegistryBuilder {
        &self.registry
    }

    pub fn identity(self, identity: impl IdentityProvider) -> Self {
        self.step(move |builder| builder.identity(identity))
    }

    pub fn storage(self, storage: impl StorageBackend) -> Self {
        self.step(move |builder| builder.storage(storage))
    }

    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.step(move |builder| builder.prefix(prefix))
    }

    pub fn resource<R: RestResource>(self, resource: R) -> Self {
        self.step(move |builder| builder.resource(resource))
    }

    pub fn route(self, route: Route) -> Self {
        self.step(move |builder| builder.route(route))
    }

    fn step(mut self, step: impl FnOnce(ApplicationBuilder) -> ApplicationBuilder + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Build the container and the application
    pub fn build(self) -> Result<TestApp, Error> {
        let container = self.registry.build()?;
        let builder = self
            .steps
            .into_iter()
            .fold(Application::builder(container), |builder, step| step(builder));
        Ok(TestApp {
            app: Arc::new(builder.build()?),
        })
    }
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}
