use super::entry::MapEntry;
use indexmap::IndexMap;
use std::sync::{Arc, LazyLock};

/// Outcome of resolving a map path against the resolve maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Candidate repository paths, in redirect order.
    Internal(Vec<String>),
    Redirect { location: String, status: i32 },
}

/// Read side of the mapping index as used by resolver sessions.
pub trait MapEntriesHandler: Send + Sync {
    /// Entries to try for `request_path` (a `scheme/host.port/path` map
    /// path), most specific first.
    fn resolve_maps_iterator<'a>(&'a self, request_path: &str) -> Box<dyn Iterator<Item = MapEntry> + 'a>;

    fn map_maps(&self) -> Arc<Vec<MapEntry>>;

    /// Alias → child name for the children of `parent_path`.
    fn alias_map(&self, parent_path: &str) -> Arc<IndexMap<String, String>>;

    /// Every resolve entry, sorted.
    fn resolve_maps(&self) -> Vec<MapEntry>;

    fn is_optimize_alias_resolution_enabled(&self) -> bool;

    fn resolve(&self, map_path: &str) -> Option<Resolution> {
        self.resolve_maps_iterator(map_path).find_map(|entry| {
            let mut mapped = entry.replace(map_path)?;
            if entry.is_internal() {
                Some(Resolution::Internal(mapped))
            } else {
                Some(Resolution::Redirect {
                    location: mapped.swap_remove(0),
                    status: entry.status(),
                })
            }
        })
    }

    /// External map paths for `path` from the first matching map entry.
    fn map(&self, path: &str) -> Vec<String> {
        self.map_maps()
            .iter()
            .find_map(|entry| entry.replace(path))
            .unwrap_or_default()
    }
}

/// Handler in place until the index has been built.
pub struct EmptyMapEntries;

pub static EMPTY: LazyLock<Arc<dyn MapEntriesHandler>> = LazyLock::new(|| Arc::new(EmptyMapEntries));

impl MapEntriesHandler for EmptyMapEntries {
    fn resolve_maps_iterator<'a>(&'a self, _request_path: &str) -> Box<dyn Iterator<Item = MapEntry> + 'a> {
        Box::new(std::iter::empty())
    }

    fn map_maps(&self) -> Arc<Vec<MapEntry>> {
        Arc::default()
    }

    fn alias_map(&self, _parent_path: &str) -> Arc<IndexMap<String, String>> {
        Arc::default()
    }

    fn resolve_maps(&self) -> Vec<MapEntry> {
        Vec::new()
    }

    fn is_optimize_alias_resolution_enabled(&self) -> bool {
        false
    }
}
