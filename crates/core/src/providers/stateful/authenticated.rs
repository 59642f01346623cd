use super::{ParentChain, Parents, StatefulResourceProvider};
use crate::error::Result;
use parking_lot::Mutex;
use sling_resolver_api::{LoginError, Resource, ResourceIter, RowIter, Value, ValueMap};
use sling_resolver_plugin::{
    AuthType, AuthenticationInfo, ParentProvider, ProviderHandle, ProviderState, Query, ResolveContext,
    ResourceProvider,
};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
enum AuthState {
    Unauthenticated,
    Authenticated(Option<ProviderState>),
    LoggedOut,
}

/// A provider handle bound to the credentials of one session.
///
/// `required` providers authenticate on construction, `lazy` ones on first
/// use, and `no` providers never; every call runs with a context carrying the
/// cached state. After `logout` the wrapper refuses further work.
pub struct AuthenticatedResourceProvider {
    handle: Arc<ProviderHandle>,
    auth_info: Arc<AuthenticationInfo>,
    state: Mutex<AuthState>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Unauthenticated => f.write_str("Unauthenticated"),
            AuthState::Authenticated(state) => write!(f, "Authenticated(has_state={})", state.is_some()),
            AuthState::LoggedOut => f.write_str("LoggedOut"),
        }
    }
}

impl AuthenticatedResourceProvider {
    pub fn new(handle: Arc<ProviderHandle>, auth_info: Arc<AuthenticationInfo>) -> std::result::Result<Self, LoginError> {
        let provider = Self {
            handle,
            auth_info,
            state: Mutex::new(AuthState::Unauthenticated),
        };
        if provider.handle.info.auth_type == AuthType::Required {
            provider.provider_state()?;
        }
        Ok(provider)
    }

    pub fn handle(&self) -> &Arc<ProviderHandle> {
        &self.handle
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.lock(), AuthState::Authenticated(_))
    }

    fn provider(&self) -> &dyn ResourceProvider {
        self.handle.instance.as_ref()
    }

    fn provider_state(&self) -> std::result::Result<Option<ProviderState>, LoginError> {
        let mut state = self.state.lock();
        match &*state {
            AuthState::Authenticated(cached) => Ok(cached.clone()),
            AuthState::LoggedOut => Err(LoginError::new(
                &self.handle.info.name,
                "provider session has been logged out",
            )),
            AuthState::Unauthenticated => {
                if self.handle.info.auth_type == AuthType::No {
                    return Ok(None);
                }
                let authenticated = self.provider().authenticate(&self.auth_info)?;
                debug!("Authenticated provider {}", self.handle.info);
                *state = AuthState::Authenticated(authenticated.clone());
                Ok(authenticated)
            }
        }
    }

    fn with_context<R>(
        &self,
        parameters: Option<&BTreeMap<String, String>>,
        parents: Parents<'_>,
        op: impl FnOnce(&ResolveContext<'_>) -> R,
    ) -> std::result::Result<R, LoginError> {
        let state = self.provider_state()?;
        let chain = ParentChain::new(parents);
        let parent: Option<&dyn ParentProvider> = if parents.is_empty() { None } else { Some(&chain) };
        let ctx = ResolveContext::new(state).with_parameters(parameters).with_parent(parent);
        Ok(op(&ctx))
    }

    /// Reads degrade to nothing when the provider cannot be used.
    fn or_nothing<T: Default>(&self, result: std::result::Result<T, LoginError>) -> T {
        result.unwrap_or_else(|e| {
            debug!("Skipping provider {}: {}", self.handle.info.name, e);
            T::default()
        })
    }
}

impl StatefulResourceProvider for AuthenticatedResourceProvider {
    fn name(&self) -> &str {
        &self.handle.info.name
    }

    fn logout(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), AuthState::LoggedOut);
        if let AuthState::Authenticated(state) = previous {
            self.provider().logout(state.as_ref());
            debug!("Logged out of provider {}", self.handle.info.name);
        }
    }

    fn refresh(&self) -> std::result::Result<(), LoginError> {
        self.with_context(None, &[], |ctx| self.provider().refresh(ctx))
    }

    fn is_live(&self) -> std::result::Result<bool, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().is_live(ctx))
    }

    fn get_parent(&self, child: &Resource, parents: Parents<'_>) -> Option<Resource> {
        let result = self.with_context(None, parents, |ctx| self.provider().get_parent(ctx, child));
        self.or_nothing(result)
    }

    fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&BTreeMap<String, String>>,
        parents: Parents<'_>,
    ) -> Option<Resource> {
        let result = self.with_context(parameters, parents, |ctx| {
            self.provider().get_resource(ctx, path, parent)
        });
        self.or_nothing(result)
    }

    fn list_children(&self, parent: &Resource, parents: Parents<'_>) -> Option<ResourceIter> {
        let result = self.with_context(None, parents, |ctx| self.provider().list_children(ctx, parent));
        self.or_nothing(result)
    }

    fn attribute_names(&self) -> std::result::Result<Vec<String>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().attribute_names(ctx))
    }

    fn attribute(&self, name: &str) -> std::result::Result<Option<Value>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().attribute(ctx, name))
    }

    fn create(&self, path: &str, properties: ValueMap, parents: Parents<'_>) -> Result<Resource> {
        let created = self.with_context(None, parents, |ctx| self.provider().create(ctx, path, properties))??;
        Ok(created)
    }

    fn delete(&self, resource: &Resource, parents: Parents<'_>) -> Result<()> {
        let parameters = &resource.metadata().parameters;
        let parameters = (!parameters.is_empty()).then_some(parameters);
        self.with_context(parameters, parents, |ctx| self.provider().delete(ctx, resource))??;
        Ok(())
    }

    fn revert(&self) {
        let result = self.with_context(None, &[], |ctx| self.provider().revert(ctx));
        self.or_nothing(result)
    }

    fn commit(&self) -> Result<()> {
        self.with_context(None, &[], |ctx| self.provider().commit(ctx))??;
        Ok(())
    }

    fn has_changes(&self) -> std::result::Result<bool, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().has_changes(ctx))
    }

    fn supported_languages(&self) -> std::result::Result<Vec<String>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().supported_languages(ctx))
    }

    fn find_resources(&self, query: &str, language: &str) -> std::result::Result<Option<ResourceIter>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().find_resources(ctx, query, language))
    }

    fn query_resources(&self, query: &str, language: &str) -> std::result::Result<Option<RowIter>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().query_resources(ctx, query, language))
    }

    fn find(&self, query: &Query) -> std::result::Result<Option<ResourceIter>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().find(ctx, query))
    }

    fn adapt_to(&self, target: TypeId) -> std::result::Result<Option<Box<dyn Any + Send>>, LoginError> {
        self.with_context(None, &[], |ctx| self.provider().adapt_to(ctx, target))
    }

    fn copy(&self, src: &str, dst: &str) -> Result<bool> {
        Ok(self.with_context(None, &[], |ctx| self.provider().copy(ctx, src, dst))??)
    }

    fn move_resource(&self, src: &str, dst: &str) -> Result<bool> {
        Ok(self.with_context(None, &[], |ctx| self.provider().move_resource(ctx, src, dst))??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sling_resolver_plugin::ProviderInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts authentications and logouts; rejects the user "bad".
    #[derive(Default)]
    struct Counting {
        logins: AtomicUsize,
        logouts: AtomicUsize,
    }

    impl ResourceProvider for Counting {
        fn authenticate(&self, auth_info: &AuthenticationInfo) -> std::result::Result<Option<ProviderState>, LoginError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            match auth_info.get("user.name").map(String::as_str) {
                Some("bad") => Err(LoginError::new("counting", "rejected")),
                user => Ok(Some(Arc::new(user.unwrap_or("anonymous").to_string()))),
            }
        }

        fn logout(&self, _state: Option<&ProviderState>) {
            self.logouts.fetch_add(1, Ordering::SeqCst);
        }

        fn get_resource(&self, ctx: &ResolveContext<'_>, path: &str, _parent: Option<&Resource>) -> Option<Resource> {
            let user = ctx.state::<String>().cloned().unwrap_or_default();
            Some(Resource::real(path, ValueMap::new().with("user", user)))
        }

        fn list_children(&self, _ctx: &ResolveContext<'_>, _parent: &Resource) -> Option<ResourceIter> {
            None
        }
    }

    fn wrap(auth: AuthType, user: &str) -> (std::result::Result<AuthenticatedResourceProvider, LoginError>, Arc<Counting>) {
        let counting = Arc::new(Counting::default());
        let handle = Arc::new(ProviderHandle::new(
            ProviderInfo::new("counting", "/").with_auth_type(auth),
            counting.clone(),
        ));
        let auth_info = Arc::new(AuthenticationInfo::from([("user.name".to_string(), user.to_string())]));
        (AuthenticatedResourceProvider::new(handle, auth_info), counting)
    }

    #[test]
    fn test_required_authenticates_eagerly() {
        let (provider, counting) = wrap(AuthType::Required, "alice");
        let provider = provider.unwrap();
        assert!(provider.is_authenticated());
        assert_eq!(counting.logins.load(Ordering::SeqCst), 1);

        let res = provider.get_resource("/x", None, None, &[]).unwrap();
        assert_eq!(res.value_map().get_string("user").as_deref(), Some("alice"));
        assert_eq!(counting.logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_required_failure_is_error() {
        let (provider, _) = wrap(AuthType::Required, "bad");
        assert!(provider.is_err());
    }

    #[test]
    fn test_lazy_authenticates_on_first_use() {
        let (provider, counting) = wrap(AuthType::Lazy, "bob");
        let provider = provider.unwrap();
        assert_eq!(counting.logins.load(Ordering::SeqCst), 0);
        provider.get_resource("/x", None, None, &[]).unwrap();
        provider.get_resource("/y", None, None, &[]).unwrap();
        assert_eq!(counting.logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_failure_degrades_reads() {
        let (provider, _) = wrap(AuthType::Lazy, "bad");
        let provider = provider.unwrap();
        assert!(provider.get_resource("/x", None, None, &[]).is_none());
        assert!(provider.attribute_names().is_err());
    }

    #[test]
    fn test_no_auth_has_no_state() {
        let (provider, counting) = wrap(AuthType::No, "carol");
        let provider = provider.unwrap();
        let res = provider.get_resource("/x", None, None, &[]).unwrap();
        assert_eq!(res.value_map().get_string("user").as_deref(), Some(""));
        assert_eq!(counting.logins.load(Ordering::SeqCst), 0);
        provider.logout();
        assert_eq!(counting.logouts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_logout_is_idempotent_and_terminal() {
        let (provider, counting) = wrap(AuthType::Required, "alice");
        let provider = provider.unwrap();
        provider.logout();
        provider.logout();
        assert_eq!(counting.logouts.load(Ordering::SeqCst), 1);
        assert!(provider.get_resource("/x", None, None, &[]).is_none());
        assert_eq!(counting.logins.load(Ordering::SeqCst), 1);
    }
}
