// Fixed bearer-token identities for tests

use async_trait::async_trait;
use girder_core::{Caller, Error, HttpRequest, IdentityProvider};
use std::collections::HashMap;

/// Maps bearer tokens to fixed callers.
///
/// Requests without a token are anonymous; an unknown token is rejected
/// with [`Error::Unauthorized`].
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    tokens: HashMap<String, Caller>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.tokens.insert(token.into(), caller);
        self
    }

    pub fn caller(&self, token: &str) -> Option<&Caller> {
        self.tokens.get(token)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn identify(&self, request: &HttpRequest) -> Result<Option<Caller>, Error> {
        match request.bearer_token() {
            None => Ok(None),
            Some(token) => self
                .tokens
                .get(token)
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::Unauthorized("unknown bearer token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_identify() {
        let identity =
            StaticIdentity::new().with_token("t-admin", Caller::new("admin").with_permission("Role.All"));

        let request = HttpRequest::new("GET", "/").with_header("Authorization", "Bearer t-admin");
        let caller = identity.identify(&request).await.unwrap().unwrap();
        assert_eq!(caller.id, "admin");

        assert!(identity.identify(&HttpRequest::new("GET", "/")).await.unwrap().is_none());

        let request = HttpRequest::new("GET", "/").with_header("Authorization", "Bearer forged");
        assert!(matches!(
            identity.identify(&request).await,
            Err(Error::Unauthorized(_))
        ));
    }
}
