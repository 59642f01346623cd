use super::{JCR_CONTENT, JCR_SYSTEM_PREFIX, PROP_ALIAS};
use dashmap::DashMap;
use indexmap::IndexMap;
use sling_resolver_api::Resource;
use sling_resolver_api::models::path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Parent path → (alias → child name). Per-parent maps are replaced as a
/// whole so readers never observe a partial update.
pub type AliasMap = DashMap<String, Arc<IndexMap<String, String>>>;

/// An alias must be a single path segment other than `.` and `..`.
pub fn is_valid_alias(alias: &str) -> bool {
    alias != "." && alias != ".." && !alias.contains(['/', '#', '?'])
}

/// Where the aliases of `resource` are filed: the parent path of the
/// containing resource and that resource's name. A `jcr:content` node
/// contributes aliases for its parent.
pub fn alias_location(resource: &Resource) -> Option<(String, String)> {
    let containing = if resource.name() == JCR_CONTENT {
        resource.parent_path()?
    } else {
        resource.path().to_string()
    };
    let parent = path::parent(&containing)?;
    Some((parent, path::name(&containing).to_string()))
}

/// Registers the aliases of `resource`; returns whether any alias was added.
pub fn load_alias(resource: &Resource, map: &AliasMap) -> bool {
    if resource.path().starts_with(JCR_SYSTEM_PREFIX) {
        debug!("loadAliases: Ignoring {}", resource.path());
        return false;
    }
    let Some((parent_path, resource_name)) = alias_location(resource) else {
        return false;
    };
    let Some(aliases) = resource.properties().and_then(|p| p.get_strings(PROP_ALIAS)) else {
        return false;
    };

    let mut parent_map = map
        .get(&parent_path)
        .map(|m| m.as_ref().clone())
        .unwrap_or_default();
    let mut has_alias = false;
    for alias in aliases {
        if let Some(current) = parent_map.get(&alias) {
            warn!(
                "Encountered duplicate alias {} under parent path {}. Refusing to replace current target {} with {}.",
                alias, parent_path, current, resource_name
            );
        } else if !is_valid_alias(&alias) {
            warn!(
                "Encountered invalid alias {} under parent path {}. Refusing to use it.",
                alias, parent_path
            );
        } else {
            parent_map.insert(alias, resource_name.clone());
            has_alias = true;
        }
    }
    if has_alias {
        map.insert(parent_path, Arc::new(parent_map));
    }
    has_alias
}

/// Drops every alias pointing at `child_name` under `parent_path`.
pub fn remove_aliases_of(map: &AliasMap, parent_path: &str, child_name: &str) -> bool {
    let Some(current) = map.get(parent_path).map(|m| Arc::clone(m.value())) else {
        return false;
    };
    let remaining: IndexMap<String, String> = current
        .iter()
        .filter(|(_, name)| name.as_str() != child_name)
        .map(|(a, n)| (a.clone(), n.clone()))
        .collect();
    let changed = remaining.len() != current.len();
    if remaining.is_empty() {
        map.remove(parent_path);
    } else if changed {
        map.insert(parent_path.to_string(), Arc::new(remaining));
    }
    changed
}
