//! Providers bound to one resolver session.

pub mod authenticated;
pub mod authenticator;
pub mod combined;

pub use authenticated::AuthenticatedResourceProvider;
pub use authenticator::ResourceProviderAuthenticator;
pub use combined::CombinedResourceProvider;

use crate::error::Result;
use sling_resolver_api::{LoginError, Resource, ResourceIter, RowIter, Value, ValueMap};
use sling_resolver_plugin::{ParentProvider, Query};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Less specific providers matching the same path, most specific first.
pub type Parents<'a> = &'a [Arc<dyn StatefulResourceProvider>];

/// One mounted provider together with the authentication state of a session.
///
/// Reads answer `None` or empty when the provider cannot be used; operations
/// that fan out across providers report login failures so that callers can
/// skip the provider explicitly.
pub trait StatefulResourceProvider: Send + Sync {
    /// Provider name for diagnostics.
    fn name(&self) -> &str;

    fn logout(&self);

    fn refresh(&self) -> std::result::Result<(), LoginError>;

    fn is_live(&self) -> std::result::Result<bool, LoginError>;

    fn get_parent(&self, child: &Resource, parents: Parents<'_>) -> Option<Resource>;

    fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&BTreeMap<String, String>>,
        parents: Parents<'_>,
    ) -> Option<Resource>;

    fn list_children(&self, parent: &Resource, parents: Parents<'_>) -> Option<ResourceIter>;

    fn attribute_names(&self) -> std::result::Result<Vec<String>, LoginError>;

    fn attribute(&self, name: &str) -> std::result::Result<Option<Value>, LoginError>;

    fn create(&self, path: &str, properties: ValueMap, parents: Parents<'_>) -> Result<Resource>;

    fn delete(&self, resource: &Resource, parents: Parents<'_>) -> Result<()>;

    fn revert(&self);

    fn commit(&self) -> Result<()>;

    fn has_changes(&self) -> std::result::Result<bool, LoginError>;

    fn supported_languages(&self) -> std::result::Result<Vec<String>, LoginError>;

    fn find_resources(&self, query: &str, language: &str) -> std::result::Result<Option<ResourceIter>, LoginError>;

    fn query_resources(&self, query: &str, language: &str) -> std::result::Result<Option<RowIter>, LoginError>;

    fn find(&self, query: &Query) -> std::result::Result<Option<ResourceIter>, LoginError>;

    fn adapt_to(&self, target: TypeId) -> std::result::Result<Option<Box<dyn Any + Send>>, LoginError>;

    /// `Ok(false)` when the provider leaves the copy to the caller.
    fn copy(&self, src: &str, dst: &str) -> Result<bool>;

    fn move_resource(&self, src: &str, dst: &str) -> Result<bool>;
}

/// Exposes the remaining parents to a provider as its parent provider.
pub(crate) struct ParentChain<'a> {
    parents: Parents<'a>,
}

impl<'a> ParentChain<'a> {
    pub(crate) fn new(parents: Parents<'a>) -> Self {
        Self { parents }
    }
}

impl ParentProvider for ParentChain<'_> {
    fn get_resource(&self, path: &str, parent: Option<&Resource>) -> Option<Resource> {
        let (head, tail) = self.parents.split_first()?;
        head.get_resource(path, parent, None, tail)
    }

    fn list_children(&self, parent: &Resource) -> Option<ResourceIter> {
        let (head, tail) = self.parents.split_first()?;
        head.list_children(parent, tail)
    }
}

/// Stands in when no provider matches a path.
pub struct EmptyResourceProvider;

impl StatefulResourceProvider for EmptyResourceProvider {
    fn name(&self) -> &str {
        "empty"
    }

    fn logout(&self) {}

    fn refresh(&self) -> std::result::Result<(), LoginError> {
        Ok(())
    }

    fn is_live(&self) -> std::result::Result<bool, LoginError> {
        Ok(false)
    }

    fn get_parent(&self, _child: &Resource, _parents: Parents<'_>) -> Option<Resource> {
        None
    }

    fn get_resource(
        &self,
        _path: &str,
        _parent: Option<&Resource>,
        _parameters: Option<&BTreeMap<String, String>>,
        _parents: Parents<'_>,
    ) -> Option<Resource> {
        None
    }

    fn list_children(&self, _parent: &Resource, _parents: Parents<'_>) -> Option<ResourceIter> {
        None
    }

    fn attribute_names(&self) -> std::result::Result<Vec<String>, LoginError> {
        Ok(Vec::new())
    }

    fn attribute(&self, _name: &str) -> std::result::Result<Option<Value>, LoginError> {
        Ok(None)
    }

    fn create(&self, path: &str, _properties: ValueMap, _parents: Parents<'_>) -> Result<Resource> {
        Err(crate::error::ResolverError::Unsupported(format!("create at {path}")))
    }

    fn delete(&self, resource: &Resource, _parents: Parents<'_>) -> Result<()> {
        Err(crate::error::ResolverError::Unsupported(format!("delete at {}", resource.path())))
    }

    fn revert(&self) {}

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn has_changes(&self) -> std::result::Result<bool, LoginError> {
        Ok(false)
    }

    fn supported_languages(&self) -> std::result::Result<Vec<String>, LoginError> {
        Ok(Vec::new())
    }

    fn find_resources(&self, _query: &str, _language: &str) -> std::result::Result<Option<ResourceIter>, LoginError> {
        Ok(None)
    }

    fn query_resources(&self, _query: &str, _language: &str) -> std::result::Result<Option<RowIter>, LoginError> {
        Ok(None)
    }

    fn find(&self, _query: &Query) -> std::result::Result<Option<ResourceIter>, LoginError> {
        Ok(None)
    }

    fn adapt_to(&self, _target: TypeId) -> std::result::Result<Option<Box<dyn Any + Send>>, LoginError> {
        Ok(None)
    }

    fn copy(&self, _src: &str, _dst: &str) -> Result<bool> {
        Ok(false)
    }

    fn move_resource(&self, _src: &str, _dst: &str) -> Result<bool> {
        Ok(false)
    }
}
