//! The incrementally maintained mapping index.

use super::alias::{self, AliasMap};
use super::entry::{INTERNAL_STATUS, MapEntry};
use super::event::{ChangeKind, MappingEventFilter};
use super::handler::MapEntriesHandler;
use super::iter::{MapEntryIterator, ResolveMaps};
use super::vanity::{self, actual_content_path, map_entry_redirect};
use super::{
    ANY_SCHEME_HOST, GLOBAL_LIST_KEY, JCR_CONTENT, JCR_CONTENT_SUFFIX, JCR_SYSTEM_PREFIX, MapConfigurationProvider,
    PROP_ALIAS, PROP_REDIRECT_EXTERNAL, PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS, PROP_REG_EXP,
    PROP_VANITY_ORDER, PROP_VANITY_PATH,
};
use crate::events::Subscription;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use sling_resolver_api::event::AttributeChange;
use sling_resolver_api::models::path;
use sling_resolver_api::resolver::PROPERTY_QUERY_LANGUAGE;
use sling_resolver_api::{Event, EventAdmin, EventHandler, Resource, ResourceResolver, Topic};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for waiting on a running rebuild when disposing.
const DISPOSE_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Content path → resolve-map keys whose entries redirect to it.
type VanityTargets = DashMap<String, Vec<String>>;

/// Per-batch bookkeeping of [`MapEntries::handle_events`].
struct Batch<'r> {
    resolver: &'r dyn ResourceResolver,
    refreshed: bool,
    reload_configuration: bool,
    changed: bool,
}

impl Batch<'_> {
    fn refresh(&mut self) {
        if !self.refreshed {
            self.resolver.refresh();
            self.refreshed = true;
        }
    }
}

/// Resolve maps, map maps, vanity targets and aliases built from the content
/// tree and the configuration, kept current by change events.
///
/// Readers take no lock: every structure is reached through an `Arc` that a
/// full rebuild replaces, and lists inside are replaced per key. Writers are
/// serialized by the `initializing` lock.
pub struct MapEntries {
    config: Arc<dyn MapConfigurationProvider>,
    event_admin: Arc<dyn EventAdmin>,
    resolver: Mutex<Option<Arc<dyn ResourceResolver>>>,
    subscription: Mutex<Option<Subscription>>,
    initializing: ReentrantMutex<()>,
    disposed: AtomicBool,
    dispose_timeout: Duration,
    resolve_maps: RwLock<Arc<ResolveMaps>>,
    map_maps: RwLock<Arc<Vec<MapEntry>>>,
    vanity_targets: RwLock<Arc<VanityTargets>>,
    aliases: RwLock<Arc<AliasMap>>,
}

impl MapEntries {
    /// Creates an empty index; call [`MapEntries::do_init`] to build it.
    pub fn new(
        config: Arc<dyn MapConfigurationProvider>,
        resolver: Arc<dyn ResourceResolver>,
        event_admin: Arc<dyn EventAdmin>,
    ) -> Self {
        Self {
            config,
            event_admin,
            resolver: Mutex::new(Some(resolver)),
            subscription: Mutex::new(None),
            initializing: ReentrantMutex::new(()),
            disposed: AtomicBool::new(false),
            dispose_timeout: DISPOSE_LOCK_TIMEOUT,
            resolve_maps: RwLock::new(Arc::default()),
            map_maps: RwLock::new(Arc::default()),
            vanity_targets: RwLock::new(Arc::default()),
            aliases: RwLock::new(Arc::default()),
        }
    }

    /// How long [`MapEntries::dispose`] waits for a running update.
    #[cfg(test)]
    pub(crate) fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.dispose_timeout = timeout;
        self
    }

    /// Filter for subscribing this index to an event bus.
    pub fn event_filter(&self) -> MappingEventFilter {
        MappingEventFilter::new(self.config.is_vanity_path_enabled())
    }

    /// Keeps the subscription so that [`MapEntries::dispose`] can cancel it.
    pub fn set_subscription(&self, subscription: Subscription) {
        if let Some(previous) = self.subscription.lock().replace(subscription) {
            previous.cancel();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn resolver(&self) -> Option<Arc<dyn ResourceResolver>> {
        self.resolver.lock().clone()
    }

    fn maps(&self) -> Arc<ResolveMaps> {
        Arc::clone(&self.resolve_maps.read())
    }

    fn targets(&self) -> Arc<VanityTargets> {
        Arc::clone(&self.vanity_targets.read())
    }

    fn alias_index(&self) -> Arc<AliasMap> {
        Arc::clone(&self.aliases.read())
    }

    /// Rebuilds the whole index and announces the change.
    pub fn do_init(&self) -> bool {
        let _guard = self.initializing.lock();
        if self.is_disposed() {
            return false;
        }
        let Some(resolver) = self.resolver() else {
            return false;
        };
        resolver.refresh();

        let aliases = AliasMap::new();
        if self.config.is_optimize_alias_resolution_enabled() {
            self.load_aliases(resolver.as_ref(), &aliases);
        }

        let maps = ResolveMaps::new();
        let targets = VanityTargets::new();
        if self.config.is_vanity_path_enabled() {
            self.load_vanity_paths(resolver.as_ref(), &maps, &targets);
        }

        let (global, map_maps) = self.build_configuration(resolver.as_ref());
        maps.insert(GLOBAL_LIST_KEY.to_string(), Arc::new(global));

        if self.is_disposed() {
            return false;
        }
        *self.aliases.write() = Arc::new(aliases);
        *self.vanity_targets.write() = Arc::new(targets);
        *self.resolve_maps.write() = Arc::new(maps);
        *self.map_maps.write() = Arc::new(map_maps);
        info!(
            "Mapping index built: {} resolve keys, {} map entries",
            self.maps().len(),
            self.map_maps.read().len()
        );

        self.send_change_event();
        true
    }

    /// Ends the index: no more writes, the resolver is closed and the event
    /// subscription cancelled. Calling it again only warns.
    pub fn dispose(&self) {
        let guard = self.initializing.try_lock_for(self.dispose_timeout);
        if guard.is_none() {
            warn!(
                "dispose: Could not acquire the initialization lock within {:?}, disposing anyway",
                self.dispose_timeout
            );
        }
        self.disposed.store(true, Ordering::SeqCst);

        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }

        match self.resolver.lock().take() {
            Some(resolver) => resolver.close(),
            None => warn!("dispose: ResourceResolver has already been cleared before; duplicate call to dispose()?"),
        }
    }

    fn send_change_event(&self) {
        self.event_admin.post_event(Event::mapping_changed());
    }

    // ---- event handling ------------------------------------------------

    /// Applies one batch of change events: the resolver is refreshed at most
    /// once, the configuration reloaded at most once, and a single change
    /// notification is sent if anything changed.
    pub fn handle_events(&self, events: &[Event]) {
        let _guard = self.initializing.lock();
        if self.is_disposed() {
            return;
        }
        let Some(resolver) = self.resolver() else {
            return;
        };

        let mut batch = Batch {
            resolver: resolver.as_ref(),
            refreshed: false,
            reload_configuration: false,
            changed: false,
        };
        for event in events {
            self.handle_one(event, &mut batch);
        }

        if batch.reload_configuration && !self.is_disposed() {
            batch.refresh();
            self.do_update_configuration(batch.resolver);
            batch.changed = true;
        }
        if batch.changed {
            self.send_change_event();
        }
    }

    fn handle_one(&self, event: &Event, batch: &mut Batch<'_>) {
        let Some(path) = event.path.as_deref() else {
            return;
        };
        if path.starts_with(JCR_SYSTEM_PREFIX) {
            return;
        }
        debug!("handleEvent: {} {}", event.topic, path);

        match event.topic {
            Topic::ResourceRemoved => {
                if self.touches_map_configuration(path) {
                    batch.reload_configuration = true;
                } else {
                    batch.refresh();
                    batch.changed |= self.remove_resource(path, batch.resolver);
                }
                return;
            }
            Topic::MappingChanged => return,
            Topic::ResourceAdded | Topic::ResourceChanged => {}
        }

        if !event.has_attributes() {
            if event.topic == Topic::ResourceAdded {
                if self.config.is_map_configuration(path) {
                    batch.reload_configuration = true;
                } else {
                    batch.refresh();
                    batch.changed |= self.add_resource(path, batch.resolver);
                }
            }
            return;
        }

        for change in AttributeChange::ALL {
            if let Some(names) = event.attributes(change) {
                self.apply_attribute_changes(path, change, names, batch);
            }
        }
    }

    fn apply_attribute_changes(
        &self,
        path: &str,
        change: AttributeChange,
        names: &[String],
        batch: &mut Batch<'_>,
    ) {
        for name in names {
            match ChangeKind::of(name) {
                ChangeKind::VanityPath => {
                    if !self.config.is_vanity_path_enabled() {
                        continue;
                    }
                    batch.refresh();
                    batch.changed |= match change {
                        AttributeChange::Added => self.add_vanity(path, batch.resolver),
                        AttributeChange::Changed => self.update_vanity(path, batch.resolver),
                        AttributeChange::Removed => self.remove_vanity(path),
                    };
                }
                ChangeKind::VanityOrder => {
                    if !self.config.is_vanity_path_enabled() {
                        continue;
                    }
                    batch.refresh();
                    let removed = change == AttributeChange::Removed;
                    batch.changed |= self.update_vanity_order(path, removed, batch.resolver);
                }
                ChangeKind::Alias => {
                    if !self.config.is_optimize_alias_resolution_enabled() {
                        continue;
                    }
                    batch.refresh();
                    batch.changed |= match change {
                        AttributeChange::Added => self.add_alias(path, batch.resolver),
                        AttributeChange::Changed | AttributeChange::Removed => {
                            self.update_alias(path, batch.resolver)
                        }
                    };
                }
                ChangeKind::Other => {
                    if self.config.is_map_configuration(path) {
                        batch.reload_configuration = true;
                    } else if (name == PROP_REDIRECT_EXTERNAL || name == PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS)
                        && self.targets().contains_key(&actual_content_path(path))
                    {
                        batch.refresh();
                        batch.changed |= self.update_vanity(path, batch.resolver);
                    }
                }
            }
        }
    }

    fn touches_map_configuration(&self, path: &str) -> bool {
        self.config.is_map_configuration(path)
            || self.config.map_root().starts_with(&format!("{path}/"))
    }

    fn add_resource(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        let mut changed = false;
        if self.config.is_vanity_path_enabled() {
            changed |= self.add_vanity(path, resolver);
        }
        if self.config.is_optimize_alias_resolution_enabled() {
            changed |= self.add_alias(path, resolver);
        }
        changed
    }

    /// A removed node takes its subtree's vanity paths and aliases with it.
    /// A removed `jcr:content` only takes what it contributed to its parent.
    fn remove_resource(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        let mut changed = false;
        let prefix = format!("{path}/");
        let owner = path
            .ends_with(JCR_CONTENT_SUFFIX)
            .then(|| actual_content_path(path));

        let targets: Vec<String> = self
            .targets()
            .iter()
            .map(|e| e.key().clone())
            .filter(|t| t == path || t.starts_with(&prefix) || owner.as_deref() == Some(t.as_str()))
            .collect();
        for target in targets {
            changed |= self.remove_vanity_target(&target);
        }
        // the owner keeps the vanity paths set on itself
        if let Some(owner) = owner.as_deref()
            && self.config.is_vanity_path_enabled()
        {
            changed |= self.add_vanity(owner, resolver);
        }

        if self.config.is_optimize_alias_resolution_enabled() {
            let parents: Vec<String> = self.alias_index().iter().map(|e| e.key().clone()).collect();
            for content_path in parents {
                if path::is_same_or_descendant(path, &content_path) {
                    changed |= self.remove_alias(&content_path, Some(path), resolver);
                } else if content_path.starts_with(&prefix) {
                    changed |= self.remove_alias(&content_path, None, resolver);
                }
            }
        }
        changed
    }

    // ---- vanity paths --------------------------------------------------

    fn load_vanity_paths(&self, resolver: &dyn ResourceResolver, maps: &ResolveMaps, targets: &VanityTargets) {
        let config = self.config.vanity_path_config();
        let mut count = 0usize;
        for resource in resolver.find_resources(PROP_VANITY_PATH, PROPERTY_QUERY_LANGUAGE) {
            if vanity::is_valid_vanity_path(resource.path(), config)
                && self.register_vanity(&resource, maps, targets)
            {
                count += 1;
            }
        }
        debug!("loadVanityPaths: {} resources carry vanity paths", count);
    }

    fn register_vanity(&self, resource: &Resource, maps: &ResolveMaps, targets: &VanityTargets) -> bool {
        let registrations =
            vanity::vanity_registrations(resource, self.config.default_vanity_path_redirect_status());
        let mut registered = false;
        for reg in registrations {
            for entry in reg.entries {
                registered |= self.add_entry(maps, &reg.key, entry);
            }
            let mut keys = targets.entry(reg.target).or_default();
            if !keys.contains(&reg.key) {
                keys.push(reg.key);
            }
        }
        registered
    }

    /// Adds `entry` under `key` keeping the list sorted; an identical entry
    /// is not added twice.
    fn add_entry(&self, maps: &ResolveMaps, key: &str, entry: MapEntry) -> bool {
        if self.is_disposed() {
            return false;
        }
        let current = maps.get(key).map(|l| Arc::clone(l.value())).unwrap_or_default();
        if current.iter().any(|e| e == &entry) {
            return false;
        }
        let mut list = current.as_ref().clone();
        list.push(entry);
        list.sort();
        maps.insert(key.to_string(), Arc::new(list));
        true
    }

    fn add_vanity(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        if !vanity::is_valid_vanity_path(path, self.config.vanity_path_config()) {
            return false;
        }
        let Some(resource) = resolver.get_resource(path) else {
            return false;
        };
        let has_vanity = resource
            .properties()
            .is_some_and(|p| p.contains_key(PROP_VANITY_PATH));
        has_vanity && self.register_vanity(&resource, &self.maps(), &self.targets())
    }

    fn update_vanity(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        let removed = self.remove_vanity(path);
        let added = self.add_vanity(path, resolver);
        removed || added
    }

    fn remove_vanity(&self, path: &str) -> bool {
        self.remove_vanity_target(&actual_content_path(path))
    }

    /// Drops the entries redirecting to `target` from every key recorded for
    /// it; entries of other targets under the same keys stay.
    fn remove_vanity_target(&self, target: &str) -> bool {
        if self.is_disposed() {
            return false;
        }
        let Some((_, keys)) = self.targets().remove(target) else {
            return false;
        };
        let maps = self.maps();
        for key in keys {
            let Some(current) = maps.get(&key).map(|l| Arc::clone(l.value())) else {
                continue;
            };
            let remaining: Vec<MapEntry> = current
                .iter()
                .filter(|e| map_entry_redirect(e).as_deref() != Some(target))
                .cloned()
                .collect();
            if remaining.is_empty() {
                maps.remove(&key);
            } else {
                maps.insert(key, Arc::new(remaining));
            }
        }
        true
    }

    /// Applies the current `sling:vanityOrder` of `path` (0 once removed) to
    /// its entries and re-sorts the affected lists.
    fn update_vanity_order(&self, path: &str, removed: bool, resolver: &dyn ResourceResolver) -> bool {
        if self.is_disposed() {
            return false;
        }
        let order = if removed {
            0
        } else {
            match resolver.get_resource(path) {
                Some(resource) => resource
                    .properties()
                    .and_then(|p| p.get_long(PROP_VANITY_ORDER))
                    .unwrap_or(0),
                None => return false,
            }
        };

        let target = actual_content_path(path);
        let Some(keys) = self.targets().get(&target).map(|k| k.value().clone()) else {
            return false;
        };
        let maps = self.maps();
        for key in keys {
            let Some(current) = maps.get(&key).map(|l| Arc::clone(l.value())) else {
                continue;
            };
            let mut list: Vec<MapEntry> = current
                .iter()
                .map(|e| {
                    if map_entry_redirect(e).as_deref() == Some(target.as_str()) {
                        e.with_order(order)
                    } else {
                        e.clone()
                    }
                })
                .collect();
            list.sort();
            maps.insert(key, Arc::new(list));
        }
        true
    }

    // ---- aliases -------------------------------------------------------

    fn load_aliases(&self, resolver: &dyn ResourceResolver, aliases: &AliasMap) {
        let mut count = 0usize;
        for resource in resolver.find_resources(PROP_ALIAS, PROPERTY_QUERY_LANGUAGE) {
            if alias::load_alias(&resource, aliases) {
                count += 1;
            }
        }
        debug!("loadAliases: {} resources carry aliases", count);
    }

    fn add_alias(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        if self.is_disposed() {
            return false;
        }
        resolver
            .get_resource(path)
            .is_some_and(|resource| alias::load_alias(&resource, &self.alias_index()))
    }

    /// Re-reads the aliases of the resource owning `path`'s aliases.
    fn update_alias(&self, path: &str, resolver: &dyn ResourceResolver) -> bool {
        if self.is_disposed() {
            return false;
        }
        let containing = if path::name(path) == JCR_CONTENT {
            path::parent(path)
        } else {
            Some(path.to_string())
        };
        let Some(containing) = containing else {
            return false;
        };
        let Some(parent) = path::parent(&containing) else {
            return false;
        };
        let aliases = self.alias_index();
        let removed = alias::remove_aliases_of(&aliases, &parent, path::name(&containing));
        let added = self.reload_aliases_of(&containing, resolver, &aliases);
        removed || added
    }

    /// Handles removal of `path` (or of the whole parent when `None`) for the
    /// aliases registered under `content_path`.
    fn remove_alias(&self, content_path: &str, path: Option<&str>, resolver: &dyn ResourceResolver) -> bool {
        if self.is_disposed() {
            return false;
        }
        let base = content_path.trim_end_matches('/').len();
        let resource_path = match path {
            Some(p) if p.len() > content_path.len() => {
                let sub_path = &p[base + 1..];
                match sub_path.find('/') {
                    None if sub_path == JCR_CONTENT => return false,
                    None => p.to_string(),
                    Some(first) if sub_path.rfind('/') == Some(first) => {
                        // only the jcr:content child of a direct child owns aliases here
                        if sub_path.starts_with(&format!("{JCR_CONTENT}/"))
                            || !sub_path.ends_with(&format!("/{JCR_CONTENT}"))
                        {
                            return false;
                        }
                        match path::parent(p) {
                            Some(parent) => parent,
                            None => return false,
                        }
                    }
                    Some(_) => return false,
                }
            }
            _ => content_path.to_string(),
        };

        let aliases = self.alias_index();
        let Some(current) = aliases.get(content_path).map(|m| Arc::clone(m.value())) else {
            return false;
        };
        let remaining: IndexMap<String, String> = current
            .iter()
            .filter(|(_, name)| !path::is_same_or_descendant(&path::child(content_path, name), &resource_path))
            .map(|(a, n)| (a.clone(), n.clone()))
            .collect();
        if remaining.is_empty() {
            aliases.remove(content_path);
        } else {
            aliases.insert(content_path.to_string(), Arc::new(remaining));
        }

        // a removed jcr:content leaves the aliases of the node itself
        if resource_path != content_path {
            self.reload_aliases_of(&resource_path, resolver, &aliases);
        }
        true
    }

    fn reload_aliases_of(&self, containing: &str, resolver: &dyn ResourceResolver, aliases: &AliasMap) -> bool {
        let Some(resource) = resolver.get_resource(containing) else {
            return false;
        };
        let mut added = false;
        if resource.properties().is_some_and(|p| p.contains_key(PROP_ALIAS)) {
            added |= alias::load_alias(&resource, aliases);
        }
        if let Some(content) = resolver.get_child(&resource, JCR_CONTENT)
            && content.properties().is_some_and(|p| p.contains_key(PROP_ALIAS))
        {
            added |= alias::load_alias(&content, aliases);
        }
        added
    }

    // ---- configuration -------------------------------------------------

    fn do_update_configuration(&self, resolver: &dyn ResourceResolver) {
        let (global, map_maps) = self.build_configuration(resolver);
        if self.is_disposed() {
            return;
        }
        self.maps().insert(GLOBAL_LIST_KEY.to_string(), Arc::new(global));
        *self.map_maps.write() = Arc::new(map_maps);
    }

    /// The global resolve list and the map maps from the map root tree, the
    /// virtual URLs and the mappings.
    fn build_configuration(&self, resolver: &dyn ResourceResolver) -> (Vec<MapEntry>, Vec<MapEntry>) {
        let mut global = Vec::new();
        let mut map_entries: IndexMap<String, MapEntry> = IndexMap::new();

        if let Some(root) = resolver.get_resource(self.config.map_root()) {
            self.gather(resolver, &root, "", &mut global, &mut map_entries);
        }
        self.load_configuration(&mut global);
        self.load_map_configuration(&mut map_entries);

        global.sort();
        let mut map_maps: Vec<MapEntry> = map_entries.into_values().collect();
        map_maps.sort();
        map_maps.dedup();
        (global, map_maps)
    }

    fn gather(
        &self,
        resolver: &dyn ResourceResolver,
        parent: &Resource,
        parent_path: &str,
        global: &mut Vec<MapEntry>,
        map_entries: &mut IndexMap<String, MapEntry>,
    ) {
        for child in resolver.list_children(parent) {
            let (name, trailing_slash) = match child.properties().and_then(|p| p.get_string(PROP_REG_EXP)) {
                Some(name) => (name, false),
                None => (format!("{}/", child.name()), true),
            };
            let child_path = format!("{parent_path}{name}");

            // end hooked entries have no children
            if !child_path.ends_with('$') {
                let child_parent = if trailing_slash {
                    child_path.clone()
                } else {
                    format!("{child_path}/")
                };
                self.gather(resolver, &child, &child_parent, global, map_entries);
            }

            match MapEntry::create_resolve_entry(&child_path, &child, trailing_slash) {
                Ok(Some(entry)) => global.push(entry),
                Ok(None) => {}
                Err(e) => debug!("ignored entry due to {}", e),
            }

            for entry in MapEntry::create_map_entries(&child_path, &child, trailing_slash).unwrap_or_default() {
                if let Some(url) = entry.redirect().first() {
                    add_map_entry(map_entries, entry.pattern(), url, entry.status());
                }
            }
        }
    }

    /// Resolve entries for the virtual URLs and the inbound mappings.
    fn load_configuration(&self, global: &mut Vec<MapEntry>) {
        for (ext, int) in self.config.virtual_url_map() {
            if ext == int {
                continue;
            }
            let url = format!("^{ANY_SCHEME_HOST}{ext}$");
            match MapEntry::new(&url, INTERNAL_STATUS, false, 0, vec![int.clone()]) {
                Ok(entry) => global.push(entry),
                Err(e) => debug!("ignored entry due to {}", e),
            }
        }

        let mut inbound: IndexMap<&str, Vec<String>> = IndexMap::new();
        for mapping in self.config.mappings() {
            if mapping.maps_inbound() && !mapping.to().is_empty() {
                inbound
                    .entry(mapping.to())
                    .or_default()
                    .push(mapping.from().to_string());
            }
        }
        for (to, froms) in inbound {
            match MapEntry::new(&format!("{ANY_SCHEME_HOST}{to}"), INTERNAL_STATUS, false, 0, froms) {
                Ok(entry) => global.push(entry),
                Err(e) => debug!("ignored entry due to {}", e),
            }
        }
    }

    /// Map entries for the virtual URLs and the outbound mappings.
    fn load_map_configuration(&self, map_entries: &mut IndexMap<String, MapEntry>) {
        for (ext, int) in self.config.virtual_url_map() {
            if ext != int {
                add_map_entry(map_entries, &format!("^{int}$"), ext, INTERNAL_STATUS);
            }
        }

        for mapping in self.config.mappings().iter().rev() {
            if mapping.maps_outbound() && !mapping.to().is_empty() {
                add_map_entry(map_entries, mapping.from(), mapping.to(), INTERNAL_STATUS);
            }
        }
    }

    // ---- inspection ----------------------------------------------------

    /// Entries stored under one resolve-maps key.
    pub fn entries_for_key(&self, key: &str) -> Option<Arc<Vec<MapEntry>>> {
        self.maps().get(key).map(|l| Arc::clone(l.value()))
    }

    /// Snapshot of the vanity reverse index.
    pub fn vanity_targets(&self) -> BTreeMap<String, Vec<String>> {
        self.targets()
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Parent paths that currently have aliases.
    pub fn alias_parents(&self) -> Vec<String> {
        let mut parents: Vec<String> = self.alias_index().iter().map(|e| e.key().clone()).collect();
        parents.sort();
        parents
    }
}

/// Records `pattern → url`, adding `url` as a further redirect when the
/// same pattern is already mapped.
fn add_map_entry(map_entries: &mut IndexMap<String, MapEntry>, pattern: &str, url: &str, status: i32) {
    let key = if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        format!("^{pattern}")
    };
    if let Some(existing) = map_entries.get_mut(&key) {
        let mut redirect = existing.redirect().to_vec();
        redirect.push(url.to_string());
        *existing = existing.with_redirect(redirect);
        return;
    }
    match MapEntry::new(&key, status, false, 0, vec![url.to_string()]) {
        Ok(entry) => {
            map_entries.insert(key, entry);
        }
        Err(e) => debug!("ignored entry due to {}", e),
    }
}

impl MapEntriesHandler for MapEntries {
    fn resolve_maps_iterator<'a>(&'a self, request_path: &str) -> Box<dyn Iterator<Item = MapEntry> + 'a> {
        Box::new(MapEntryIterator::new(
            request_path,
            self.maps(),
            self.config.has_vanity_path_precedence(),
        ))
    }

    fn map_maps(&self) -> Arc<Vec<MapEntry>> {
        Arc::clone(&self.map_maps.read())
    }

    fn alias_map(&self, parent_path: &str) -> Arc<IndexMap<String, String>> {
        self.alias_index()
            .get(parent_path)
            .map(|m| Arc::clone(m.value()))
            .unwrap_or_default()
    }

    fn resolve_maps(&self) -> Vec<MapEntry> {
        let mut all: Vec<MapEntry> = self
            .maps()
            .iter()
            .flat_map(|l| l.value().as_ref().clone())
            .collect();
        all.sort();
        all
    }

    fn is_optimize_alias_resolution_enabled(&self) -> bool {
        self.config.is_optimize_alias_resolution_enabled()
    }
}

impl EventHandler for MapEntries {
    fn handle_event(&self, event: &Event) {
        self.handle_events(std::slice::from_ref(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MapConfiguration, Mapping, Resolution};
    use sling_resolver_api::{ResourceIter, ValueMap};

    /// Resolver over a fixed set of resources, keyed by path.
    #[derive(Default)]
    struct FixedResolver {
        resources: RwLock<BTreeMap<String, ValueMap>>,
        refreshes: std::sync::atomic::AtomicUsize,
        closed: AtomicBool,
    }

    impl FixedResolver {
        fn with(self, path: &str, props: ValueMap) -> Self {
            self.resources.write().insert(path.to_string(), props);
            self
        }

        fn set(&self, path: &str, props: ValueMap) {
            self.resources.write().insert(path.to_string(), props);
        }

        fn remove_tree(&self, root: &str) {
            self.resources
                .write()
                .retain(|p, _| !path::is_same_or_descendant(p, root));
        }
    }

    impl ResourceResolver for FixedResolver {
        fn get_resource(&self, p: &str) -> Option<Resource> {
            self.resources.read().get(p).map(|v| Resource::real(p, v.clone()))
        }

        fn get_parent(&self, resource: &Resource) -> Option<Resource> {
            self.get_resource(&resource.parent_path()?)
        }

        fn list_children(&self, parent: &Resource) -> ResourceIter {
            let parent_path = parent.path().to_string();
            let children: Vec<Resource> = self
                .resources
                .read()
                .iter()
                .filter(|(p, _)| path::parent(p).as_deref() == Some(parent_path.as_str()))
                .map(|(p, v)| Resource::real(p.clone(), v.clone()))
                .collect();
            Box::new(children.into_iter())
        }

        fn find_resources(&self, query: &str, _language: &str) -> ResourceIter {
            let found: Vec<Resource> = self
                .resources
                .read()
                .iter()
                .filter(|(_, v)| v.contains_key(query))
                .map(|(p, v)| Resource::real(p.clone(), v.clone()))
                .collect();
            Box::new(found.into_iter())
        }

        fn refresh(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }

        fn is_live(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingAdmin(std::sync::atomic::AtomicUsize);

    impl EventAdmin for CountingAdmin {
        fn post_event(&self, event: Event) {
            assert_eq!(event.topic, Topic::MappingChanged);
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn index(resolver: FixedResolver, config: MapConfiguration) -> (MapEntries, Arc<FixedResolver>, Arc<CountingAdmin>) {
        let resolver = Arc::new(resolver);
        let admin = Arc::new(CountingAdmin::default());
        let entries = MapEntries::new(Arc::new(config), resolver.clone(), admin.clone());
        assert!(entries.do_init());
        (entries, resolver, admin)
    }

    fn vanity(path: &str, order: Option<i64>) -> ValueMap {
        let props = ValueMap::new().with(PROP_VANITY_PATH, path);
        match order {
            Some(o) => props.with(PROP_VANITY_ORDER, o),
            None => props,
        }
    }

    fn redirects(entries: &MapEntries, key: &str) -> Vec<(String, i64)> {
        entries
            .entries_for_key(key)
            .map(|l| l.iter().map(|e| (e.redirect()[0].clone(), e.order())).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_vanity_entries_for_extensionless_target() {
        let (entries, _, admin) = index(
            FixedResolver::default().with("/content/bar", vanity("/foo", None)),
            MapConfiguration::empty(),
        );
        let list = entries.entries_for_key("/foo").unwrap();
        let patterns: Vec<_> = list.iter().map(|e| (e.pattern().to_string(), e.redirect()[0].clone())).collect();
        assert_eq!(
            patterns,
            vec![
                ("^[^/]+/[^/]+/foo(\\..*)".to_string(), "/content/bar$1".to_string()),
                ("^[^/]+/[^/]+/foo$".to_string(), "/content/bar.html".to_string()),
            ]
        );
        assert_eq!(entries.vanity_targets().get("/content/bar"), Some(&vec!["/foo".to_string()]));
        assert_eq!(admin.0.load(Ordering::SeqCst), 1);

        assert_eq!(
            entries.resolve("http/localhost.80/foo"),
            Some(Resolution::Internal(vec!["/content/bar.html".to_string()]))
        );
        assert_eq!(
            entries.resolve("http/localhost.80/foo.print.html"),
            Some(Resolution::Internal(vec!["/content/bar.print.html".to_string()]))
        );
    }

    #[test]
    fn test_vanity_disabled() {
        let (entries, _, _) = index(
            FixedResolver::default().with("/content/bar", vanity("/foo", None)),
            MapConfiguration::empty().with_vanity_paths(false),
        );
        assert!(entries.entries_for_key("/foo").is_none());
        assert!(entries.vanity_targets().is_empty());
    }

    #[test]
    fn test_external_vanity_redirect() {
        let (entries, _, _) = index(
            FixedResolver::default().with(
                "/content/bar",
                vanity("/foo", None).with(PROP_REDIRECT_EXTERNAL, true),
            ),
            MapConfiguration::empty().with_default_vanity_path_redirect_status(301),
        );
        assert_eq!(
            entries.resolve("http/localhost.80/foo"),
            Some(Resolution::Redirect {
                location: "/content/bar.html".to_string(),
                status: 301
            })
        );
    }

    #[test]
    fn test_vanity_order_updates() {
        let resolver = FixedResolver::default()
            .with("/justVanityPath", vanity("/target/justVanityPath", None))
            .with("/justVanityPath2", vanity("/target/justVanityPath", Some(100)));
        let (entries, resolver, _) = index(resolver, MapConfiguration::empty());
        let key = "/target/justVanityPath";

        assert_eq!(
            redirects(&entries, key),
            vec![
                ("/justVanityPath2$1".to_string(), 100),
                ("/justVanityPath$1".to_string(), 0),
                ("/justVanityPath2.html".to_string(), 100),
                ("/justVanityPath.html".to_string(), 0),
            ]
        );

        resolver.set("/justVanityPath", vanity(key, Some(1000)));
        entries.handle_event(
            &Event::changed("/justVanityPath").with_attributes(AttributeChange::Added, &[PROP_VANITY_ORDER]),
        );
        assert_eq!(
            redirects(&entries, key),
            vec![
                ("/justVanityPath$1".to_string(), 1000),
                ("/justVanityPath2$1".to_string(), 100),
                ("/justVanityPath.html".to_string(), 1000),
                ("/justVanityPath2.html".to_string(), 100),
            ]
        );

        resolver.set("/justVanityPath", vanity(key, None));
        entries.handle_event(
            &Event::changed("/justVanityPath").with_attributes(AttributeChange::Removed, &[PROP_VANITY_ORDER]),
        );
        assert_eq!(
            redirects(&entries, key),
            vec![
                ("/justVanityPath2$1".to_string(), 100),
                ("/justVanityPath$1".to_string(), 0),
                ("/justVanityPath2.html".to_string(), 100),
                ("/justVanityPath.html".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_vanity_update_is_idempotent() {
        let (entries, _, _) = index(
            FixedResolver::default().with("/content/bar", vanity("/foo", None)),
            MapConfiguration::empty(),
        );
        entries.handle_event(
            &Event::changed("/content/bar").with_attributes(AttributeChange::Added, &[PROP_VANITY_PATH]),
        );
        entries.handle_event(
            &Event::changed("/content/bar").with_attributes(AttributeChange::Changed, &[PROP_VANITY_PATH]),
        );
        assert_eq!(entries.entries_for_key("/foo").unwrap().len(), 2);
        assert_eq!(entries.vanity_targets()["/content/bar"], vec!["/foo".to_string()]);
    }

    #[test]
    fn test_removed_node_drops_subtree_vanity_paths() {
        let resolver = FixedResolver::default()
            .with("/content/a", vanity("/va", None))
            .with("/content/a/b", vanity("/vb", None))
            .with("/content/c", vanity("/vc", None));
        let (entries, resolver, admin) = index(resolver, MapConfiguration::empty());

        resolver.remove_tree("/content/a");
        entries.handle_event(&Event::removed("/content/a"));

        assert!(entries.entries_for_key("/va").is_none());
        assert!(entries.entries_for_key("/vb").is_none());
        assert_eq!(entries.entries_for_key("/vc").unwrap().len(), 2);
        assert_eq!(admin.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_removed_jcr_content_keeps_descendants() {
        let resolver = FixedResolver::default()
            .with("/content/page", vanity("/vpage", None))
            .with(
                "/content/page/jcr:content",
                vanity("/vcontent", None).with(PROP_ALIAS, "pg"),
            )
            .with("/content/page/child", vanity("/vchild", None))
            .with("/content/page/child/grand", ValueMap::new().with(PROP_ALIAS, "gr"));
        let (entries, resolver, _) = index(resolver, MapConfiguration::empty());
        assert_eq!(entries.alias_map("/content").get("pg").map(String::as_str), Some("page"));

        resolver.remove_tree("/content/page/jcr:content");
        entries.handle_event(&Event::removed("/content/page/jcr:content"));

        assert!(entries.alias_map("/content").get("pg").is_none());
        assert!(entries.entries_for_key("/vcontent").is_none());
        assert_eq!(
            entries.alias_map("/content/page/child").get("gr").map(String::as_str),
            Some("grand")
        );
        assert_eq!(redirects(&entries, "/vchild").len(), 2);
        assert_eq!(redirects(&entries, "/vpage").len(), 2);
        let targets = entries.vanity_targets();
        assert_eq!(targets.get("/content/page/child"), Some(&vec!["/vchild".to_string()]));
        assert_eq!(targets.get("/content/page"), Some(&vec!["/vpage".to_string()]));
    }

    #[test]
    fn test_aliases_loaded_and_updated() {
        let resolver = FixedResolver::default()
            .with("/content/bar", ValueMap::new())
            .with("/content/bar/jcr:content", ValueMap::new().with(PROP_ALIAS, "baz"));
        let (entries, resolver, _) = index(resolver, MapConfiguration::empty());
        assert_eq!(entries.alias_map("/content").get("baz").map(String::as_str), Some("bar"));

        resolver.set("/content/bar/jcr:content", ValueMap::new().with(PROP_ALIAS, "qux"));
        entries.handle_event(
            &Event::changed("/content/bar/jcr:content")
                .with_attributes(AttributeChange::Changed, &[PROP_ALIAS]),
        );
        let aliases = entries.alias_map("/content");
        assert!(aliases.get("baz").is_none());
        assert_eq!(aliases.get("qux").map(String::as_str), Some("bar"));

        resolver.set("/content/bar/jcr:content", ValueMap::new());
        entries.handle_event(
            &Event::changed("/content/bar/jcr:content")
                .with_attributes(AttributeChange::Removed, &[PROP_ALIAS]),
        );
        assert!(entries.alias_map("/content").is_empty());
    }

    #[test]
    fn test_alias_optimisation_disabled() {
        let (entries, _, _) = index(
            FixedResolver::default().with("/content/bar", ValueMap::new().with(PROP_ALIAS, "baz")),
            MapConfiguration::empty().with_optimize_alias_resolution(false),
        );
        assert!(entries.alias_map("/content").is_empty());
        assert!(!entries.is_optimize_alias_resolution_enabled());
    }

    #[test]
    fn test_removed_child_keeps_sibling_aliases() {
        let resolver = FixedResolver::default()
            .with("/parent/a", ValueMap::new().with(PROP_ALIAS, "x"))
            .with("/parent/b", ValueMap::new().with(PROP_ALIAS, "y"));
        let (entries, resolver, _) = index(resolver, MapConfiguration::empty());

        resolver.remove_tree("/parent/a");
        entries.handle_event(&Event::removed("/parent/a"));
        let aliases = entries.alias_map("/parent");
        assert!(aliases.get("x").is_none());
        assert_eq!(aliases.get("y").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_map_root_configuration() {
        let resolver = FixedResolver::default()
            .with("/etc/map", ValueMap::new())
            .with("/etc/map/http", ValueMap::new())
            .with(
                "/etc/map/http/localhost.8080",
                ValueMap::new().with("sling:internalRedirect", "/content"),
            )
            .with(
                "/etc/map/http/old.example.com",
                ValueMap::new()
                    .with(PROP_REDIRECT_EXTERNAL, "http://new.example.com/")
                    .with("sling:status", 301i64),
            );
        let (entries, resolver, admin) = index(resolver, MapConfiguration::empty());

        assert_eq!(
            entries.resolve("http/localhost.8080/page.html"),
            Some(Resolution::Internal(vec!["/content/page.html".to_string()]))
        );
        assert_eq!(
            entries.resolve("http/old.example.com.80/x"),
            Some(Resolution::Redirect {
                location: "http://new.example.com/x".to_string(),
                status: 301
            })
        );
        assert_eq!(entries.map("/content/page.html"), vec!["http/localhost.8080/page.html".to_string()]);

        resolver.set(
            "/etc/map/http/localhost.8080",
            ValueMap::new().with("sling:internalRedirect", "/apps"),
        );
        entries.handle_event(
            &Event::changed("/etc/map/http/localhost.8080")
                .with_attributes(AttributeChange::Changed, &["sling:internalRedirect"]),
        );
        assert_eq!(
            entries.resolve("http/localhost.8080/page.html"),
            Some(Resolution::Internal(vec!["/apps/page.html".to_string()]))
        );
        assert_eq!(admin.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_mappings_and_virtual_urls() {
        let config = MapConfiguration::empty()
            .with_mappings(vec![Mapping::parse("/content/:/")])
            .with_virtual_url("/home", "/content/home.html");
        let (entries, _, _) = index(FixedResolver::default(), config);

        assert_eq!(
            entries.resolve("http/localhost.80/home"),
            Some(Resolution::Internal(vec!["/content/home.html".to_string()]))
        );
        assert_eq!(
            entries.resolve("http/localhost.80/a/b.html"),
            Some(Resolution::Internal(vec!["/content/a/b.html".to_string()]))
        );
        assert_eq!(entries.map("/content/home.html"), vec!["/home".to_string()]);
        assert_eq!(entries.map("/content/a/b.html"), vec!["/a/b.html".to_string()]);
    }

    #[test]
    fn test_batch_refreshes_once() {
        let (entries, resolver, admin) = index(
            FixedResolver::default()
                .with("/content/a", vanity("/va", None))
                .with("/content/b", ValueMap::new().with(PROP_ALIAS, "bee")),
            MapConfiguration::empty(),
        );
        let before = resolver.refreshes.load(Ordering::SeqCst);
        entries.handle_events(&[
            Event::changed("/content/a").with_attributes(AttributeChange::Changed, &[PROP_VANITY_PATH]),
            Event::changed("/content/b").with_attributes(AttributeChange::Changed, &[PROP_ALIAS]),
            Event::changed("/etc/map/http").with_attributes(AttributeChange::Changed, &["sling:match"]),
        ]);
        assert_eq!(resolver.refreshes.load(Ordering::SeqCst), before + 1);
        assert_eq!(admin.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dispose_is_terminal() {
        let (entries, resolver, _) = index(FixedResolver::default(), MapConfiguration::empty());
        entries.dispose();
        assert!(entries.is_disposed());
        assert!(!resolver.is_live());
        assert!(!entries.do_init());

        resolver.set("/content/bar", vanity("/foo", None));
        entries.handle_event(&Event::added("/content/bar"));
        assert!(entries.entries_for_key("/foo").is_none());

        // second dispose only warns
        entries.dispose();
    }

    #[test]
    fn test_dispose_does_not_wait_for_held_lock() {
        let (entries, resolver, _) = index(FixedResolver::default(), MapConfiguration::empty());
        let entries = entries.with_dispose_timeout(Duration::from_millis(50));
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        std::thread::scope(|scope| {
            let held = &entries;
            scope.spawn(move || {
                let _guard = held.initializing.lock();
                locked_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            });
            locked_rx.recv().unwrap();

            entries.dispose();
            assert!(entries.is_disposed());
            assert!(!resolver.is_live());
            release_tx.send(()).unwrap();
        });
        assert!(!entries.do_init());
    }

    /// Disposes the index from another thread while it is being built.
    struct DisposingResolver {
        inner: FixedResolver,
        entries: std::sync::OnceLock<std::sync::Weak<MapEntries>>,
        fired: AtomicBool,
    }

    impl ResourceResolver for DisposingResolver {
        fn get_resource(&self, p: &str) -> Option<Resource> {
            self.inner.get_resource(p)
        }

        fn get_parent(&self, resource: &Resource) -> Option<Resource> {
            self.inner.get_parent(resource)
        }

        fn list_children(&self, parent: &Resource) -> ResourceIter {
            self.inner.list_children(parent)
        }

        fn find_resources(&self, query: &str, language: &str) -> ResourceIter {
            if !self.fired.swap(true, Ordering::SeqCst)
                && let Some(entries) = self.entries.get().and_then(std::sync::Weak::upgrade)
            {
                std::thread::scope(|scope| {
                    scope.spawn(|| entries.dispose());
                });
            }
            self.inner.find_resources(query, language)
        }

        fn refresh(&self) {}

        fn is_live(&self) -> bool {
            self.inner.is_live()
        }

        fn close(&self) {
            self.inner.close()
        }
    }

    #[test]
    fn test_dispose_during_init_discards_results() {
        let resolver = Arc::new(DisposingResolver {
            inner: FixedResolver::default().with("/content/bar", vanity("/foo", None)),
            entries: std::sync::OnceLock::new(),
            fired: AtomicBool::new(false),
        });
        let admin = Arc::new(CountingAdmin::default());
        let entries = Arc::new(
            MapEntries::new(Arc::new(MapConfiguration::empty()), resolver.clone(), admin.clone())
                .with_dispose_timeout(Duration::from_millis(50)),
        );
        assert!(resolver.entries.set(Arc::downgrade(&entries)).is_ok());

        assert!(!entries.do_init());
        assert!(entries.is_disposed());
        assert!(!resolver.is_live());
        assert!(entries.entries_for_key("/foo").is_none());
        assert!(entries.vanity_targets().is_empty());
        assert_eq!(admin.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_jcr_system_is_ignored() {
        let (entries, resolver, admin) = index(FixedResolver::default(), MapConfiguration::empty());
        resolver.set("/jcr:system/x", vanity("/sys", None));
        entries.handle_event(
            &Event::changed("/jcr:system/x").with_attributes(AttributeChange::Added, &[PROP_VANITY_PATH]),
        );
        assert!(entries.entries_for_key("/sys").is_none());
        assert_eq!(admin.0.load(Ordering::SeqCst), 1);
    }
}
