use crate::context::{AuthenticationInfo, ProviderState, ResolveContext};
use crate::info::ProviderInfo;
use crate::query::Query;
use sling_resolver_api::models::path;
use sling_resolver_api::{LoginError, PersistenceError, Resource, ResourceIter, RowIter, Value, ValueMap};
use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A pluggable backend serving one subtree of the resource namespace.
///
/// Only reading a single resource and listing children are mandatory; every
/// other capability has a neutral default so simple providers stay small.
pub trait ResourceProvider: Send + Sync {
    /// Called once per session for `lazy` and `required` providers.
    fn authenticate(&self, _auth_info: &AuthenticationInfo) -> Result<Option<ProviderState>, LoginError> {
        Ok(None)
    }

    fn logout(&self, _state: Option<&ProviderState>) {}

    fn refresh(&self, _ctx: &ResolveContext<'_>) {}

    fn is_live(&self, _ctx: &ResolveContext<'_>) -> bool {
        true
    }

    fn get_resource(&self, ctx: &ResolveContext<'_>, path: &str, parent: Option<&Resource>) -> Option<Resource>;

    /// `None` when this provider knows nothing about children of `parent`.
    fn list_children(&self, ctx: &ResolveContext<'_>, parent: &Resource) -> Option<ResourceIter>;

    fn get_parent(&self, ctx: &ResolveContext<'_>, child: &Resource) -> Option<Resource> {
        let parent_path = path::parent(child.path())?;
        self.get_resource(ctx, &parent_path, None)
    }

    fn attribute_names(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn attribute(&self, _ctx: &ResolveContext<'_>, _name: &str) -> Option<Value> {
        None
    }

    fn create(&self, _ctx: &ResolveContext<'_>, path: &str, _properties: ValueMap) -> Result<Resource, PersistenceError> {
        Err(PersistenceError::Failed(format!("provider is read-only, cannot create {path}")))
    }

    fn delete(&self, _ctx: &ResolveContext<'_>, resource: &Resource) -> Result<(), PersistenceError> {
        Err(PersistenceError::Failed(format!(
            "provider is read-only, cannot delete {}",
            resource.path()
        )))
    }

    fn revert(&self, _ctx: &ResolveContext<'_>) {}

    fn commit(&self, _ctx: &ResolveContext<'_>) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn has_changes(&self, _ctx: &ResolveContext<'_>) -> bool {
        false
    }

    /// `Ok(false)` when this provider does not handle the copy.
    fn copy(&self, _ctx: &ResolveContext<'_>, _src: &str, _dst: &str) -> Result<bool, PersistenceError> {
        Ok(false)
    }

    /// `Ok(false)` when this provider does not handle the move.
    fn move_resource(&self, _ctx: &ResolveContext<'_>, _src: &str, _dst: &str) -> Result<bool, PersistenceError> {
        Ok(false)
    }

    fn supported_languages(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn find_resources(&self, _ctx: &ResolveContext<'_>, _query: &str, _language: &str) -> Option<ResourceIter> {
        None
    }

    fn query_resources(&self, _ctx: &ResolveContext<'_>, _query: &str, _language: &str) -> Option<RowIter> {
        None
    }

    fn find(&self, _ctx: &ResolveContext<'_>, _query: &Query) -> Option<ResourceIter> {
        None
    }

    /// Adapt the provider (or its session state) to the type identified by `target`.
    fn adapt_to(&self, _ctx: &ResolveContext<'_>, _target: TypeId) -> Option<Box<dyn Any + Send>> {
        None
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered provider, stable for the lifetime of the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

/// A registered provider together with its metadata.
pub struct ProviderHandle {
    pub id: HandleId,
    pub info: ProviderInfo,
    pub instance: Arc<dyn ResourceProvider>,
}

impl ProviderHandle {
    pub fn new(info: ProviderInfo, instance: Arc<dyn ResourceProvider>) -> Self {
        Self {
            id: HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)),
            info,
            instance,
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("id", &self.id)
            .field("info", &self.info)
            .finish()
    }
}
