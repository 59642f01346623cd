use super::tree::PathTree;
use sling_resolver_plugin::ProviderHandle;
use std::sync::Arc;
use tracing::debug;

/// The mounted providers of one factory, with views by capability.
#[derive(Debug, Default)]
pub struct ProviderStorage {
    handlers: Vec<Arc<ProviderHandle>>,
    attributable: Vec<Arc<ProviderHandle>>,
    refreshable: Vec<Arc<ProviderHandle>>,
    queryable: Vec<Arc<ProviderHandle>>,
    native_queryable: Vec<Arc<ProviderHandle>>,
    adaptable: Vec<Arc<ProviderHandle>>,
    tree: PathTree<Arc<ProviderHandle>>,
}

impl ProviderStorage {
    /// Registers `handlers` ordered by mount path. Of several providers
    /// mounted at the same path the highest ranked one is used.
    pub fn new(handlers: impl IntoIterator<Item = Arc<ProviderHandle>>) -> Self {
        let mut sorted: Vec<Arc<ProviderHandle>> = handlers.into_iter().collect();
        sorted.sort_by(|a, b| a.info.compare_mount(&b.info));

        let mut active: Vec<Arc<ProviderHandle>> = Vec::with_capacity(sorted.len());
        for handler in sorted {
            if let Some(last) = active.last_mut()
                && last.info.path == handler.info.path
            {
                debug!("Provider {} shadows {} at {}", handler.info.name, last.info.name, handler.info.path);
                *last = handler;
                continue;
            }
            active.push(handler);
        }

        let mut tree = PathTree::new();
        for handler in &active {
            tree.add_node(&handler.info.path, Arc::clone(handler));
        }

        let select = |keep: fn(&ProviderHandle) -> bool| -> Vec<Arc<ProviderHandle>> {
            active.iter().filter(|h| keep(h)).cloned().collect()
        };
        Self {
            attributable: select(|h| h.info.attributable),
            refreshable: select(|h| h.info.refreshable),
            queryable: select(|h| h.info.queryable),
            native_queryable: select(|h| h.info.native_query),
            adaptable: select(|h| h.info.adaptable),
            handlers: active,
            tree,
        }
    }

    pub fn all(&self) -> &[Arc<ProviderHandle>] {
        &self.handlers
    }

    pub fn attributable(&self) -> &[Arc<ProviderHandle>] {
        &self.attributable
    }

    pub fn refreshable(&self) -> &[Arc<ProviderHandle>] {
        &self.refreshable
    }

    pub fn queryable(&self) -> &[Arc<ProviderHandle>] {
        &self.queryable
    }

    pub fn native_queryable(&self) -> &[Arc<ProviderHandle>] {
        &self.native_queryable
    }

    pub fn adaptable(&self) -> &[Arc<ProviderHandle>] {
        &self.adaptable
    }

    pub fn tree(&self) -> &PathTree<Arc<ProviderHandle>> {
        &self.tree
    }
}
