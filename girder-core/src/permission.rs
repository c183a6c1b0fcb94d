// Permission decorators keyed by "<Resource>.<Operation>"

use crate::context::RequestContext;
use crate::decorator::{Abort, Decorator, DecoratorHandler};
use crate::logging::{debug, warn};
use crate::rest::Verb;
use crate::Error;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Operations every resource family starts with
pub const DEFAULT_OPERATIONS: [&str; 6] = ["Query", "Create", "Delete", "Modify", "Read", "All"];

/// Catalog tag of every permission decorator
pub const PERMISSION_CATALOG: &str = "permission";

/// Derive a permission key.
///
/// Neither part may be empty or contain `.`, so distinct pairs never
/// collide.
pub fn permission_key(resource: &str, operation: &str) -> Result<String, Error> {
    for part in [resource, operation] {
        if part.is_empty() || part.contains('.') {
            return Err(Error::InvalidPermissionKey(format!(
                "{resource}.{operation}: names must be non-empty and must not contain '.'"
            )));
        }
    }
    Ok(format!("{resource}.{operation}"))
}

/// Before handler admitting callers that hold every listed key
#[derive(Debug, Clone)]
pub struct PermissionCheck {
    required: Vec<String>,
}

impl PermissionCheck {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    fn check(&self, ctx: &RequestContext) -> Result<(), Abort> {
        let caller = ctx.require_caller()?;
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|key| !caller.has_permission(key))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            return Ok(());
        }
        debug!(caller = %caller.id, missing = ?missing, "Permission denied");
        Err(Abort::forbidden(format!(
            "permission denied, requires {}",
            self.required.join(", ")
        )))
    }
}

#[async_trait]
impl DecoratorHandler for PermissionCheck {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Abort> {
        self.check(ctx)
    }
}

/// Guard requiring all of `keys`
pub fn require_permissions<I, S>(keys: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    Decorator::builder(PERMISSION_CATALOG)
        .metadata(serde_json::json!({ "permissions": keys }))
        .before(PermissionCheck::new(keys))
        .build()
}

/// A resource's family of permission decorators.
///
/// ```
/// use girder_core::PermissionDecorators;
///
/// let mut family = PermissionDecorators::new("Role").unwrap();
/// family.extend(["Grant"]).unwrap();
/// assert!(family.get("Grant").is_some());
/// assert!(family.get_key("Role.Create").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct PermissionDecorators {
    resource: String,
    decorators: BTreeMap<String, Decorator>,
}

impl PermissionDecorators {
    pub fn new(resource: impl Into<String>) -> Result<Self, Error> {
        let mut family = Self {
            resource: resource.into(),
            decorators: BTreeMap::new(),
        };
        family.extend(DEFAULT_OPERATIONS)?;
        Ok(family)
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Add ad hoc operations; an existing key is replaced
    pub fn extend<I, S>(&mut self, operations: I) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for operation in operations {
            let key = permission_key(&self.resource, operation.as_ref())?;
            self.insert(key);
        }
        Ok(self)
    }

    /// Union with another family; on equal keys the other family wins
    pub fn merge(&mut self, other: PermissionDecorators) -> &mut Self {
        for (key, decorator) in other.decorators {
            if self.decorators.insert(key.clone(), decorator).is_some() {
                warn!(key = %key, "Permission decorator replaced during merge");
            }
        }
        self
    }

    fn insert(&mut self, key: String) {
        if self
            .decorators
            .insert(key.clone(), require_permissions([key.clone()]))
            .is_some()
        {
            warn!(key = %key, "Permission decorator replaced");
        }
    }

    /// Decorator for an operation of this family's own resource
    pub fn get(&self, operation: &str) -> Option<Decorator> {
        self.get_key(&format!("{}.{}", self.resource, operation))
    }

    pub fn get_key(&self, key: &str) -> Option<Decorator> {
        self.decorators.get(key).cloned()
    }

    /// Every key in the family, sorted
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.decorators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    pub fn query(&self) -> Option<Decorator> {
        self.get("Query")
    }

    pub fn create(&self) -> Option<Decorator> {
        self.get("Create")
    }

    pub fn delete(&self) -> Option<Decorator> {
        self.get("Delete")
    }

    pub fn modify(&self) -> Option<Decorator> {
        self.get("Modify")
    }

    pub fn read(&self) -> Option<Decorator> {
        self.get("Read")
    }

    /// The administration decorator
    pub fn all(&self) -> Option<Decorator> {
        self.get("All")
    }

    /// Conventional operation for a REST verb
    pub fn for_verb(&self, verb: Verb) -> Option<Decorator> {
        let operation = match verb {
            Verb::Get | Verb::Detail => "Read",
            Verb::Query | Verb::QueryList => "Query",
            Verb::Post => "Create",
            Verb::Put | Verb::Patch => "Modify",
            Verb::Delete => "Delete",
            Verb::Options | Verb::Head | Verb::Any => "All",
        };
        self.get(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::DecoratorChain;
    use crate::{Caller, HttpRequest, RegistryBuilder};

    fn context(caller: Option<Caller>) -> RequestContext {
        let container = RegistryBuilder::new().build().unwrap();
        RequestContext::new(HttpRequest::new("POST", "/role"), container).with_caller(caller)
    }

    #[test]
    fn test_default_family() {
        let family = PermissionDecorators::new("Role").unwrap();
        let keys: Vec<&str> = family.keys().collect();
        assert_eq!(
            keys,
            vec!["Role.All", "Role.Create", "Role.Delete", "Role.Modify", "Role.Query", "Role.Read"]
        );
        let create = family.create().unwrap();
        assert_eq!(create.catalog(), PERMISSION_CATALOG);
        assert_eq!(create.metadata()["permissions"][0], "Role.Create");
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            PermissionDecorators::new(""),
            Err(Error::InvalidPermissionKey(_))
        ));
        assert!(matches!(
            PermissionDecorators::new("Role.Admin"),
            Err(Error::InvalidPermissionKey(_))
        ));
        let mut family = PermissionDecorators::new("Role").unwrap();
        assert!(family.extend(["Sub.Op"]).is_err());
    }

    #[test]
    fn test_extend_and_merge() {
        let mut roles = PermissionDecorators::new("Role").unwrap();
        roles.extend(["Grant", "Create"]).unwrap();
        assert_eq!(roles.len(), 7);

        let users = PermissionDecorators::new("User").unwrap();
        roles.merge(users);
        assert_eq!(roles.len(), 13);
        assert!(roles.get_key("User.Read").is_some());
        assert!(roles.get("Grant").is_some());
    }

    #[tokio::test]
    async fn test_role_create_is_strict() {
        let chain = DecoratorChain::new(vec![
            PermissionDecorators::new("Role").unwrap().create().unwrap(),
        ]);

        let mut admitted = context(Some(Caller::new("a").with_permission("Role.Create")));
        assert!(chain.run_before(&mut admitted).await.is_ok());

        let mut denied = context(Some(
            Caller::new("b").with_permissions(["Role.All", "Role.Read", "User.Create"]),
        ));
        let abort = chain.run_before(&mut denied).await.unwrap_err();
        assert_eq!(abort.http_status(), 403);
        assert!(abort.message().contains("Role.Create"));

        let mut anonymous = context(None);
        let abort = chain.run_before(&mut anonymous).await.unwrap_err();
        assert_eq!(abort.http_status(), 401);
    }

    #[test]
    fn test_for_verb() {
        let family = PermissionDecorators::new("Role").unwrap();
        let key = |verb| family.for_verb(verb).unwrap().metadata()["permissions"][0].clone();
        assert_eq!(key(Verb::Post), "Role.Create");
        assert_eq!(key(Verb::Detail), "Role.Read");
        assert_eq!(key(Verb::QueryList), "Role.Query");
        assert_eq!(key(Verb::Patch), "Role.Modify");
        assert_eq!(key(Verb::Any), "Role.All");
    }
}
