use crate::error::{ResolverError, Result};
use crate::events::EventBus;
use crate::mapping::{MapConfigurationProvider, MapEntries, MapEntriesHandler, Resolution, handler, request_map_path};
use crate::providers::ProviderStorage;
use crate::session::SessionResolver;
use parking_lot::RwLock;
use sling_resolver_api::{LoginError, ResourceResolver};
use sling_resolver_plugin::{AUTH_ADMINISTRATIVE, AuthenticationInfo, ProviderHandle};
use std::sync::Arc;
use tracing::info;
use url::Url;

/// Owns the mounted providers, the mapping configuration and the event bus,
/// and hands out resolver sessions.
pub struct ResolverFactory {
    storage: Arc<ProviderStorage>,
    config: Arc<dyn MapConfigurationProvider>,
    bus: Arc<EventBus>,
    map_entries: RwLock<Option<Arc<MapEntries>>>,
}

impl ResolverFactory {
    pub fn new(
        handlers: impl IntoIterator<Item = Arc<ProviderHandle>>,
        config: Arc<dyn MapConfigurationProvider>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            storage: Arc::new(ProviderStorage::new(handlers)),
            config,
            bus,
            map_entries: RwLock::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<ProviderStorage> {
        &self.storage
    }

    pub fn config(&self) -> &Arc<dyn MapConfigurationProvider> {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn resource_resolver(&self, auth_info: AuthenticationInfo) -> std::result::Result<SessionResolver, LoginError> {
        SessionResolver::new(Arc::clone(&self.storage), auth_info)
    }

    pub fn administrative_resolver(&self) -> std::result::Result<SessionResolver, LoginError> {
        let auth_info = AuthenticationInfo::from([(AUTH_ADMINISTRATIVE.to_string(), "true".to_string())]);
        self.resource_resolver(auth_info)
    }

    /// Builds the mapping index over an administrative session and subscribes
    /// it to the bus. A previously active index is disposed.
    pub fn activate(&self) -> Result<Arc<MapEntries>> {
        self.deactivate();

        let resolver: Arc<dyn ResourceResolver> = Arc::new(self.administrative_resolver()?);
        let entries = Arc::new(MapEntries::new(
            Arc::clone(&self.config),
            resolver,
            self.bus.clone(),
        ));
        if !entries.do_init() {
            return Err(ResolverError::Internal("mapping index could not be built".to_string()));
        }
        let subscription = self.bus.subscribe(Arc::new(entries.event_filter()), entries.clone());
        entries.set_subscription(subscription);

        info!(
            "Activated mapping index: {} resolve entries, {} map entries",
            entries.resolve_maps().len(),
            entries.map_maps().len()
        );
        *self.map_entries.write() = Some(Arc::clone(&entries));
        Ok(entries)
    }

    pub fn deactivate(&self) {
        if let Some(entries) = self.map_entries.write().take() {
            entries.dispose();
            info!("Deactivated mapping index");
        }
    }

    pub fn is_active(&self) -> bool {
        self.map_entries.read().is_some()
    }

    /// The active index, or an empty one before activation.
    pub fn map_entries(&self) -> Arc<dyn MapEntriesHandler> {
        match self.map_entries.read().as_ref() {
            Some(entries) => Arc::clone(entries) as Arc<dyn MapEntriesHandler>,
            None => handler::EMPTY.clone(),
        }
    }

    /// Resolves an absolute request URL against the mapping index.
    pub fn resolve_url(&self, url: &str) -> Result<Option<Resolution>> {
        let parsed = Url::parse(url).map_err(|e| ResolverError::Config(format!("invalid URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ResolverError::Config(format!("URL without host: {url}")))?;
        let port = parsed.port().map(i32::from).unwrap_or(-1);
        let map_path = request_map_path(parsed.scheme(), host, port, parsed.path());
        Ok(self.map_entries().resolve(&map_path))
    }
}

impl Drop for ResolverFactory {
    fn drop(&mut self) {
        self.deactivate();
    }
}
