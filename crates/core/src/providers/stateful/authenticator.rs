use super::{AuthenticatedResourceProvider, StatefulResourceProvider};
use parking_lot::Mutex;
use sling_resolver_api::LoginError;
use sling_resolver_plugin::{AuthType, AuthenticationInfo, HandleId, ProviderHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    stateful: HashMap<HandleId, Arc<dyn StatefulResourceProvider>>,
    authenticated: Vec<Arc<dyn StatefulResourceProvider>>,
    modifiable: Vec<Arc<dyn StatefulResourceProvider>>,
    refreshable: Vec<Arc<dyn StatefulResourceProvider>>,
}

/// Creates the session view of each provider on first use and remembers which
/// ones the session has touched, so that commit, refresh and logout only visit
/// those.
pub struct ResourceProviderAuthenticator {
    auth_info: Arc<AuthenticationInfo>,
    state: Mutex<State>,
}

impl ResourceProviderAuthenticator {
    pub fn new(auth_info: AuthenticationInfo) -> Self {
        Self {
            auth_info: Arc::new(auth_info),
            state: Mutex::new(State::default()),
        }
    }

    pub fn auth_info(&self) -> &AuthenticationInfo {
        &self.auth_info
    }

    /// Authenticates every handle up front. On failure the providers already
    /// logged in are logged out again.
    pub fn authenticate_all(&self, handles: &[Arc<ProviderHandle>]) -> Result<(), LoginError> {
        for handle in handles {
            if let Err(e) = self.get_stateful(handle) {
                warn!("Authentication against {} failed: {}", handle.info.name, e);
                self.logout_all();
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn get_stateful(&self, handle: &Arc<ProviderHandle>) -> Result<Arc<dyn StatefulResourceProvider>, LoginError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.stateful.get(&handle.id) {
            return Ok(existing.clone());
        }

        let provider: Arc<dyn StatefulResourceProvider> =
            Arc::new(AuthenticatedResourceProvider::new(handle.clone(), self.auth_info.clone())?);
        debug!("Opened session view of provider {}", handle.info);

        if handle.info.auth_type != AuthType::No {
            state.authenticated.push(provider.clone());
        }
        if handle.info.modifiable {
            state.modifiable.push(provider.clone());
        }
        if handle.info.refreshable {
            state.refreshable.push(provider.clone());
        }
        state.stateful.insert(handle.id, provider.clone());
        Ok(provider)
    }

    /// Session views of `handles` in order; failures stay in place so that
    /// callers decide whether to skip them.
    pub fn get_all(&self, handles: &[Arc<ProviderHandle>]) -> Vec<Result<Arc<dyn StatefulResourceProvider>, LoginError>> {
        handles.iter().map(|h| self.get_stateful(h)).collect()
    }

    pub fn all_used_authenticated(&self) -> Vec<Arc<dyn StatefulResourceProvider>> {
        self.state.lock().authenticated.clone()
    }

    pub fn all_used_modifiable(&self) -> Vec<Arc<dyn StatefulResourceProvider>> {
        self.state.lock().modifiable.clone()
    }

    pub fn all_used_refreshable(&self) -> Vec<Arc<dyn StatefulResourceProvider>> {
        self.state.lock().refreshable.clone()
    }

    fn logout_all(&self) {
        for provider in self.all_used_authenticated() {
            provider.logout();
        }
    }
}
