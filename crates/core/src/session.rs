use crate::error::Result;
use crate::providers::{CombinedResourceProvider, ProviderStorage, ResourceProviderAuthenticator};
use sling_resolver_api::{LoginError, Resource, ResourceIter, ResourceResolver, RowIter, Value, ValueMap};
use sling_resolver_plugin::{AuthType, AuthenticationInfo, ProviderHandle, Query};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A resolver session: one set of credentials over every mounted provider.
pub struct SessionResolver {
    combined: CombinedResourceProvider,
    closed: AtomicBool,
}

impl SessionResolver {
    /// Opens a session, logging in to every provider that requires it.
    pub fn new(storage: Arc<ProviderStorage>, auth_info: AuthenticationInfo) -> std::result::Result<Self, LoginError> {
        let authenticator = Arc::new(ResourceProviderAuthenticator::new(auth_info));
        let required: Vec<Arc<ProviderHandle>> = storage
            .all()
            .iter()
            .filter(|h| h.info.auth_type == AuthType::Required)
            .cloned()
            .collect();
        authenticator.authenticate_all(&required)?;
        debug!("Opened resolver session over {} provider(s)", storage.all().len());
        Ok(Self {
            combined: CombinedResourceProvider::new(storage, authenticator),
            closed: AtomicBool::new(false),
        })
    }

    pub fn combined(&self) -> &CombinedResourceProvider {
        &self.combined
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resource lookup for request resolution, which never yields synthetic placeholders.
    pub fn resolve_resource(&self, path: &str, parameters: Option<&BTreeMap<String, String>>) -> Option<Resource> {
        self.combined.get_resource(path, None, parameters, true)
    }

    pub fn create(&self, path: &str, properties: ValueMap) -> Result<Resource> {
        self.combined.create(path, properties)
    }

    pub fn delete(&self, resource: &Resource) -> Result<()> {
        self.combined.delete(resource)
    }

    pub fn copy(&self, src: &str, dst: &str) -> Result<bool> {
        self.combined.copy(src, dst)
    }

    pub fn move_resource(&self, src: &str, dst: &str) -> Result<bool> {
        self.combined.move_resource(src, dst)
    }

    pub fn commit(&self) -> Result<()> {
        self.combined.commit()
    }

    pub fn revert(&self) {
        self.combined.revert()
    }

    pub fn has_changes(&self) -> bool {
        self.combined.has_changes()
    }

    pub fn query_resources(&self, query: &str, language: &str) -> RowIter {
        self.combined.query_resources(query, language)
    }

    pub fn find(&self, query: &Query) -> ResourceIter {
        self.combined.find(query)
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.combined.supported_languages()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.combined.attribute_names()
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.combined.attribute(name)
    }

    pub fn adapt_to<T: Any>(&self) -> Option<T> {
        self.combined.adapt_to::<T>()
    }
}

impl ResourceResolver for SessionResolver {
    fn get_resource(&self, path: &str) -> Option<Resource> {
        self.combined.get_resource(path, None, None, false)
    }

    fn get_parent(&self, resource: &Resource) -> Option<Resource> {
        self.combined.get_parent(resource)
    }

    fn list_children(&self, parent: &Resource) -> ResourceIter {
        self.combined.list_children(parent)
    }

    fn find_resources(&self, query: &str, language: &str) -> ResourceIter {
        self.combined.find_resources(query, language)
    }

    fn refresh(&self) {
        self.combined.refresh()
    }

    fn is_live(&self) -> bool {
        !self.is_closed() && self.combined.is_live()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.combined.logout();
        debug!("Closed resolver session");
    }
}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryResourceProvider;
    use sling_resolver_plugin::{AUTH_PASSWORD, AUTH_USER, ProviderInfo};

    fn storage() -> Arc<ProviderStorage> {
        let content = BTreeMap::from([
            ("/".to_string(), ValueMap::new()),
            ("/content".to_string(), ValueMap::new().with("jcr:title", "Content")),
        ]);
        let provider = MemoryResourceProvider::new("repo")
            .with_content(content)
            .with_credentials("admin", "admin");
        let info = ProviderInfo::new("repo", "/")
            .with_auth_type(AuthType::Required)
            .with_modifiable(true)
            .with_refreshable(true);
        Arc::new(ProviderStorage::new([Arc::new(ProviderHandle::new(info, Arc::new(provider)))]))
    }

    fn credentials(user: &str, password: &str) -> AuthenticationInfo {
        AuthenticationInfo::from([
            (AUTH_USER.to_string(), user.to_string()),
            (AUTH_PASSWORD.to_string(), password.to_string()),
        ])
    }

    #[test]
    fn test_open_fails_on_required_login() {
        assert!(SessionResolver::new(storage(), credentials("admin", "nope")).is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let session = SessionResolver::new(storage(), credentials("admin", "admin")).unwrap();
        assert!(session.is_live());
        assert_eq!(
            session.get_resource("/content").and_then(|r| r.value_map().get_string("jcr:title")),
            Some("Content".to_string())
        );
        session.close();
        session.close();
        assert!(!session.is_live());
        assert!(session.get_resource("/content").is_none());
    }

    #[test]
    fn test_writes_round_trip_through_commit() {
        let storage = storage();
        let writer = SessionResolver::new(storage.clone(), credentials("admin", "admin")).unwrap();
        writer.create("/content/new", ValueMap::new()).unwrap();
        assert!(writer.has_changes());
        writer.commit().unwrap();
        assert!(!writer.has_changes());

        let reader = SessionResolver::new(storage, credentials("admin", "admin")).unwrap();
        assert!(reader.get_resource("/content/new").is_some());
        assert!(reader.resolve_resource("/missing", None).is_none());
    }
}
