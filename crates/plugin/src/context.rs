use sling_resolver_api::{Resource, ResourceIter};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Opaque per-session state returned by [`crate::ResourceProvider::authenticate`].
pub type ProviderState = Arc<dyn Any + Send + Sync>;

/// Credentials and hints passed when a resolver session is opened.
pub type AuthenticationInfo = BTreeMap<String, String>;

pub const AUTH_USER: &str = "user.name";
pub const AUTH_PASSWORD: &str = "user.password";

/// Set to `"true"` to open a session that bypasses provider credential checks.
pub const AUTH_ADMINISTRATIVE: &str = "sling.administrative";

/// Less specific providers mounted above the current one, exposed to a provider
/// that wants to delegate part of its tree.
pub trait ParentProvider {
    fn get_resource(&self, path: &str, parent: Option<&Resource>) -> Option<Resource>;

    fn list_children(&self, parent: &Resource) -> Option<ResourceIter>;
}

/// Everything a provider gets to know about the calling session.
#[derive(Clone, Default)]
pub struct ResolveContext<'a> {
    state: Option<ProviderState>,
    parameters: Option<&'a BTreeMap<String, String>>,
    parent: Option<&'a dyn ParentProvider>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(state: Option<ProviderState>) -> Self {
        Self {
            state,
            parameters: None,
            parent: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Option<&'a BTreeMap<String, String>>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parent(mut self, parent: Option<&'a dyn ParentProvider>) -> Self {
        self.parent = parent;
        self
    }

    pub fn provider_state(&self) -> Option<&ProviderState> {
        self.state.as_ref()
    }

    /// Typed view of the provider state.
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.as_ref().and_then(|s| s.downcast_ref::<T>())
    }

    pub fn parameters(&self) -> Option<&BTreeMap<String, String>> {
        self.parameters
    }

    pub fn parent(&self) -> Option<&'a dyn ParentProvider> {
        self.parent
    }
}
