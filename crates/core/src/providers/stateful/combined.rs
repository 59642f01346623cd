use super::{EmptyResourceProvider, Parents, ResourceProviderAuthenticator, StatefulResourceProvider};
use crate::error::{ResolverError, Result};
use crate::providers::ProviderStorage;
use indexmap::IndexSet;
use sling_resolver_api::models::path;
use sling_resolver_api::{Resource, ResourceIter, RowIter, Value, ValueMap};
use sling_resolver_plugin::{ProviderHandle, Query};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type Stateful = Arc<dyn StatefulResourceProvider>;

/// Runs `op` against the most specific provider, handing it the others as parents.
fn with_head<R>(providers: &[Stateful], op: impl FnOnce(&dyn StatefulResourceProvider, Parents<'_>) -> R) -> R {
    match providers.split_first() {
        Some((head, tail)) => op(head.as_ref(), tail),
        None => op(&EmptyResourceProvider, &[]),
    }
}

/// The resource tree of one session, federated over every mounted provider.
///
/// Single-target operations go to the provider with the longest mount path
/// covering the target. Fan-out operations skip providers the session cannot
/// log in to.
pub struct CombinedResourceProvider {
    storage: Arc<ProviderStorage>,
    authenticator: Arc<ResourceProviderAuthenticator>,
}

impl CombinedResourceProvider {
    pub fn new(storage: Arc<ProviderStorage>, authenticator: Arc<ResourceProviderAuthenticator>) -> Self {
        Self { storage, authenticator }
    }

    pub fn storage(&self) -> &Arc<ProviderStorage> {
        &self.storage
    }

    pub fn authenticator(&self) -> &Arc<ResourceProviderAuthenticator> {
        &self.authenticator
    }

    /// Handles mounted at or above `path`, most specific first.
    fn matching_handles(&self, path: &str, modifiable_only: bool) -> Vec<Arc<ProviderHandle>> {
        let mut handles: Vec<Arc<ProviderHandle>> = self
            .storage
            .tree()
            .get_matching_nodes(path)
            .into_iter()
            .filter(|h| !modifiable_only || h.info.modifiable)
            .cloned()
            .collect();
        handles.reverse();
        handles
    }

    fn usable(&self, handles: &[Arc<ProviderHandle>]) -> Vec<Stateful> {
        self.authenticator
            .get_all(handles)
            .into_iter()
            .filter_map(|provider| {
                provider
                    .map_err(|e| debug!("Skipping provider: {}", e))
                    .ok()
            })
            .collect()
    }

    /// Providers covering `path`, most specific first.
    pub fn get_matching_providers(&self, path: &str) -> Vec<Stateful> {
        self.usable(&self.matching_handles(path, false))
    }

    fn get_matching_modifiable_providers(&self, path: &str) -> Vec<Stateful> {
        self.usable(&self.matching_handles(path, true))
    }

    /// Whether some provider is mounted at or below `path`.
    fn is_intermediate_path(&self, path: &str) -> bool {
        self.storage.tree().get_node(path).is_some()
    }

    /// Looks `path` up in the best matching provider. Outside of resolution a
    /// miss on an ancestor of a mount point answers a synthetic resource.
    pub fn get_resource(
        &self,
        path: &str,
        parent: Option<&Resource>,
        parameters: Option<&BTreeMap<String, String>>,
        is_resolve: bool,
    ) -> Option<Resource> {
        let providers = self.get_matching_providers(path);
        let found = with_head(&providers, |head, parents| head.get_resource(path, parent, parameters, parents));
        if found.is_some() {
            return found;
        }
        if !is_resolve && self.is_intermediate_path(path) {
            debug!("Synthesizing resource at {}", path);
            return Some(Resource::synthetic(path));
        }
        None
    }

    pub fn get_parent(&self, child: &Resource) -> Option<Resource> {
        let parent_path = child.parent_path()?;
        let providers = self.get_matching_providers(&parent_path);
        with_head(&providers, |head, parents| head.get_parent(child, parents)).or_else(|| {
            self.is_intermediate_path(&parent_path)
                .then(|| Resource::synthetic(parent_path))
        })
    }

    /// Children of `parent`: the best matching provider's own children, then
    /// one entry per mount point directly below `parent`. Real entries win
    /// over synthetic ones of the same path.
    pub fn list_children(&self, parent: &Resource) -> ResourceIter {
        let parent_path = parent.path().to_string();
        let providers = self.get_matching_providers(&parent_path);
        let real = with_head(&providers, |head, parents| head.list_children(parent, parents))
            .into_iter()
            .flatten();

        let mounted: Vec<(String, Option<Arc<ProviderHandle>>)> = self
            .storage
            .tree()
            .get_node(&parent_path)
            .map(|node| {
                node.children()
                    .map(|(name, child)| (path::child(&parent_path, name), child.value().cloned()))
                    .collect()
            })
            .unwrap_or_default();

        let authenticator = Arc::clone(&self.authenticator);
        let parent = parent.clone();
        let mounted = mounted.into_iter().map(move |(child_path, handle)| {
            let found = handle
                .and_then(|h| authenticator.get_stateful(&h).ok())
                .and_then(|provider| provider.get_resource(&child_path, Some(&parent), None, &[]));
            found.unwrap_or_else(|| Resource::synthetic(child_path))
        });

        Box::new(UniqueIterator::new(real.chain(mounted)))
    }

    pub fn create(&self, path: &str, properties: ValueMap) -> Result<Resource> {
        let providers = self.get_matching_modifiable_providers(path);
        match providers.split_first() {
            Some((head, parents)) => head.create(path, properties, parents),
            None => Err(ResolverError::Unsupported(format!(
                "create '{}' at {}",
                path::name(path),
                path::parent(path).unwrap_or_default()
            ))),
        }
    }

    pub fn delete(&self, resource: &Resource) -> Result<()> {
        let providers = self.get_matching_modifiable_providers(resource.path());
        match providers.split_first() {
            Some((head, parents)) => head.delete(resource, parents),
            None => Err(ResolverError::Unsupported(format!("delete at '{}'", resource.path()))),
        }
    }

    /// The provider able to take a two-path operation: covering `src` (and
    /// modifiable there when `src_modifiable`) and modifiable at `dst`.
    fn dual_path_provider(&self, src: &str, dst: &str, src_modifiable: bool) -> Result<Option<Stateful>> {
        let destination: HashSet<_> = self.matching_handles(dst, true).into_iter().map(|h| h.id).collect();
        let Some(handle) = self
            .matching_handles(src, src_modifiable)
            .into_iter()
            .find(|h| destination.contains(&h.id))
        else {
            return Ok(None);
        };
        Ok(Some(self.authenticator.get_stateful(&handle)?))
    }

    /// `Ok(false)` when no single provider covers both paths.
    pub fn copy(&self, src: &str, dst: &str) -> Result<bool> {
        match self.dual_path_provider(src, dst, false)? {
            Some(provider) => provider.copy(src, dst),
            None => Ok(false),
        }
    }

    pub fn move_resource(&self, src: &str, dst: &str) -> Result<bool> {
        match self.dual_path_provider(src, dst, true)? {
            Some(provider) => provider.move_resource(src, dst),
            None => Ok(false),
        }
    }

    pub fn commit(&self) -> Result<()> {
        for provider in self.authenticator.all_used_modifiable() {
            provider.commit()?;
        }
        Ok(())
    }

    pub fn revert(&self) {
        for provider in self.authenticator.all_used_modifiable() {
            provider.revert();
        }
    }

    pub fn has_changes(&self) -> bool {
        self.authenticator
            .all_used_modifiable()
            .iter()
            .any(|p| p.has_changes().unwrap_or(false))
    }

    pub fn refresh(&self) {
        for provider in self.authenticator.all_used_refreshable() {
            if let Err(e) = provider.refresh() {
                debug!("Refresh of {} failed: {}", provider.name(), e);
            }
        }
    }

    pub fn logout(&self) {
        for provider in self.authenticator.all_used_authenticated() {
            provider.logout();
        }
    }

    /// A provider that went away ends the whole session.
    pub fn is_live(&self) -> bool {
        let live = self
            .authenticator
            .all_used_authenticated()
            .iter()
            .all(|p| p.is_live().unwrap_or(false));
        if !live {
            self.logout();
        }
        live
    }

    fn providers_for_language(&self, language: &str) -> Vec<Stateful> {
        self.usable(self.storage.queryable())
            .into_iter()
            .filter(|p| {
                p.supported_languages()
                    .is_ok_and(|languages| languages.iter().any(|l| l == language))
            })
            .collect()
    }

    pub fn find_resources(&self, query: &str, language: &str) -> ResourceIter {
        let providers = self.providers_for_language(language);
        let (query, language) = (query.to_string(), language.to_string());
        Box::new(providers.into_iter().flat_map(move |provider| {
            provider
                .find_resources(&query, &language)
                .ok()
                .flatten()
                .into_iter()
                .flatten()
        }))
    }

    pub fn query_resources(&self, query: &str, language: &str) -> RowIter {
        let providers = self.providers_for_language(language);
        let (query, language) = (query.to_string(), language.to_string());
        Box::new(providers.into_iter().flat_map(move |provider| {
            provider
                .query_resources(&query, &language)
                .ok()
                .flatten()
                .into_iter()
                .flatten()
        }))
    }

    pub fn find(&self, query: &Query) -> ResourceIter {
        let providers = self.usable(self.storage.native_queryable());
        let query = query.clone();
        Box::new(
            providers
                .into_iter()
                .flat_map(move |provider| provider.find(&query).ok().flatten().into_iter().flatten()),
        )
    }

    pub fn supported_languages(&self) -> Vec<String> {
        let languages: IndexSet<String> = self
            .usable(self.storage.queryable())
            .iter()
            .filter_map(|p| p.supported_languages().ok())
            .flatten()
            .collect();
        languages.into_iter().collect()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let names: IndexSet<String> = self
            .usable(self.storage.attributable())
            .iter()
            .filter_map(|p| {
                p.attribute_names()
                    .map_err(|e| debug!("Skipping attributes of {}: {}", p.name(), e))
                    .ok()
            })
            .flatten()
            .collect();
        names.into_iter().collect()
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.usable(self.storage.attributable())
            .iter()
            .find_map(|p| p.attribute(name).ok().flatten())
    }

    /// The first adaptable provider able to produce a `T`.
    pub fn adapt_to<T: Any>(&self) -> Option<T> {
        self.usable(self.storage.adaptable()).iter().find_map(|p| {
            p.adapt_to(TypeId::of::<T>())
                .ok()
                .flatten()
                .and_then(|adapted| adapted.downcast::<T>().ok())
                .map(|adapted| *adapted)
        })
    }
}

/// Drops resources whose path was already produced and records the path each
/// resource was reached under.
pub struct UniqueIterator<I> {
    inner: I,
    seen: HashSet<String>,
}

impl<I> UniqueIterator<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }
}

impl<I: Iterator<Item = Resource>> Iterator for UniqueIterator<I> {
    type Item = Resource;

    fn next(&mut self) -> Option<Resource> {
        loop {
            let mut resource = self.inner.next()?;
            if !self.seen.insert(resource.path().to_string()) {
                continue;
            }
            let path = resource.path().to_string();
            resource.metadata_mut().resolution_path.get_or_insert(path);
            return Some(resource);
        }
    }
}
