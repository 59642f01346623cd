//! A resource provider keeping its tree in memory.
//!
//! Writes of a session stay pending until `commit`, which applies them to the
//! shared tree and posts one change event per touched resource.

use parking_lot::{Mutex, RwLock};
use sling_resolver_api::models::path;
use sling_resolver_api::resolver::PROPERTY_QUERY_LANGUAGE;
use sling_resolver_api::{
    Event, EventAdmin, LoginError, PersistenceError, Resource, ResourceIter, RowIter, Value, ValueMap,
};
use sling_resolver_plugin::{
    AUTH_ADMINISTRATIVE, AUTH_PASSWORD, AUTH_USER, AuthenticationInfo, ProviderState, Query, ResolveContext,
    ResourceProvider,
};
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Column carrying the resource path in query rows.
pub const ROW_PATH: &str = "jcr:path";

/// Committed content of a [`MemoryResourceProvider`], obtainable through `adapt_to`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSnapshot(pub BTreeMap<String, ValueMap>);

/// Pending writes of one session. `None` marks a deleted path.
#[derive(Debug, Default)]
pub struct MemorySession {
    user: Option<String>,
    pending: Mutex<BTreeMap<String, Option<ValueMap>>>,
}

impl MemorySession {
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    password: String,
}

pub struct MemoryResourceProvider {
    name: String,
    content: RwLock<BTreeMap<String, ValueMap>>,
    /// Used by contexts that carry no session, i.e. providers that never authenticate.
    shared: Arc<MemorySession>,
    credentials: Option<Credentials>,
    attributes: ValueMap,
    event_admin: Option<Arc<dyn EventAdmin>>,
}

impl MemoryResourceProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: RwLock::new(BTreeMap::new()),
            shared: Arc::new(MemorySession::default()),
            credentials: None,
            attributes: ValueMap::new(),
            event_admin: None,
        }
    }

    pub fn with_content(self, content: BTreeMap<String, ValueMap>) -> Self {
        *self.content.write() = content;
        self
    }

    /// Require `user`/`password` on authentication.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_event_admin(mut self, event_admin: Arc<dyn EventAdmin>) -> Self {
        self.event_admin = Some(event_admin);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Committed content, bypassing any session.
    pub fn snapshot(&self) -> ContentSnapshot {
        ContentSnapshot(self.content.read().clone())
    }

    fn session(&self, ctx: &ResolveContext<'_>) -> Arc<MemorySession> {
        ctx.provider_state()
            .and_then(|state| Arc::clone(state).downcast::<MemorySession>().ok())
            .unwrap_or_else(|| Arc::clone(&self.shared))
    }

    fn lookup(&self, session: &MemorySession, path: &str) -> Option<ValueMap> {
        if let Some(pending) = session.pending.lock().get(path) {
            return pending.clone();
        }
        self.content.read().get(path).cloned()
    }

    /// Every path visible to `session`, pending writes applied.
    fn visible(&self, session: &MemorySession) -> BTreeMap<String, ValueMap> {
        let mut visible = self.content.read().clone();
        for (path, change) in session.pending.lock().iter() {
            match change {
                Some(properties) => visible.insert(path.clone(), properties.clone()),
                None => visible.remove(path),
            };
        }
        visible
    }

    fn subtree(&self, session: &MemorySession, root: &str) -> Vec<(String, ValueMap)> {
        self.visible(session)
            .into_iter()
            .filter(|(p, _)| path::is_same_or_descendant(p, root))
            .collect()
    }

    fn copy_subtree(&self, session: &MemorySession, src: &str, dst: &str) -> Result<String, PersistenceError> {
        let nodes = self.subtree(session, src);
        if nodes.is_empty() {
            return Err(PersistenceError::NotFound(src.to_string()));
        }
        let target = path::child(dst, path::name(src));
        if self.lookup(session, &target).is_some() {
            return Err(PersistenceError::AlreadyExists(target));
        }
        let mut pending = session.pending.lock();
        for (p, properties) in nodes {
            let copied = format!("{}{}", target, &p[src.len()..]);
            pending.insert(copied, Some(properties));
        }
        Ok(target)
    }

    fn delete_subtree(&self, session: &MemorySession, root: &str) {
        let doomed: Vec<String> = self.subtree(session, root).into_iter().map(|(p, _)| p).collect();
        let mut pending = session.pending.lock();
        for p in doomed {
            pending.insert(p, None);
        }
    }

    fn matching(&self, ctx: &ResolveContext<'_>, accepts: impl Fn(&str, &ValueMap) -> bool) -> Vec<(String, ValueMap)> {
        self.visible(&self.session(ctx))
            .into_iter()
            .filter(|(p, properties)| accepts(p, properties))
            .collect()
    }
}

/// The change event announcing `path` went from `before` to `after`.
fn change_event(path: &str, before: Option<&ValueMap>, after: Option<&ValueMap>) -> Option<Event> {
    match (before, after) {
        (None, None) => None,
        (None, Some(added)) => {
            let mut event = Event::added(path);
            event.added_attributes = Some(added.keys().cloned().collect());
            Some(event)
        }
        (Some(_), None) => Some(Event::removed(path)),
        (Some(old), Some(new)) => {
            let added: Vec<String> = new.keys().filter(|k| !old.contains_key(k)).cloned().collect();
            let removed: Vec<String> = old.keys().filter(|k| !new.contains_key(k)).cloned().collect();
            let changed: Vec<String> = new
                .iter()
                .filter(|(k, v)| old.get(k).is_some_and(|previous| previous != *v))
                .map(|(k, _)| k.clone())
                .collect();
            if added.is_empty() && removed.is_empty() && changed.is_empty() {
                return None;
            }
            let mut event = Event::changed(path);
            event.added_attributes = (!added.is_empty()).then_some(added);
            event.changed_attributes = (!changed.is_empty()).then_some(changed);
            event.removed_attributes = (!removed.is_empty()).then_some(removed);
            Some(event)
        }
    }
}

impl ResourceProvider for MemoryResourceProvider {
    fn authenticate(&self, auth_info: &AuthenticationInfo) -> Result<Option<ProviderState>, LoginError> {
        let administrative = auth_info.get(AUTH_ADMINISTRATIVE).is_some_and(|v| v == "true");
        if let Some(expected) = &self.credentials
            && !administrative
        {
            let user = auth_info.get(AUTH_USER);
            let password = auth_info.get(AUTH_PASSWORD);
            if user != Some(&expected.user) || password != Some(&expected.password) {
                return Err(LoginError::new(&self.name, "invalid credentials"));
            }
        }
        let session = MemorySession {
            user: auth_info.get(AUTH_USER).cloned(),
            pending: Mutex::new(BTreeMap::new()),
        };
        debug!("Opened session of {} for {:?}", self.name, session.user);
        Ok(Some(Arc::new(session)))
    }

    fn logout(&self, state: Option<&ProviderState>) {
        if let Some(session) = state.and_then(|s| s.downcast_ref::<MemorySession>()) {
            session.pending.lock().clear();
        }
    }

    fn get_resource(&self, ctx: &ResolveContext<'_>, path: &str, _parent: Option<&Resource>) -> Option<Resource> {
        let properties = self.lookup(&self.session(ctx), path)?;
        Some(Resource::real(path, properties))
    }

    fn list_children(&self, ctx: &ResolveContext<'_>, parent: &Resource) -> Option<ResourceIter> {
        let children: Vec<Resource> = self
            .visible(&self.session(ctx))
            .into_iter()
            .filter(|(p, _)| path::parent(p).as_deref() == Some(parent.path()))
            .map(|(p, properties)| Resource::real(p, properties))
            .collect();
        if children.is_empty() {
            return None;
        }
        Some(Box::new(children.into_iter()))
    }

    fn attribute_names(&self, ctx: &ResolveContext<'_>) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.keys().cloned().collect();
        if self.session(ctx).user.is_some() {
            names.push(AUTH_USER.to_string());
        }
        names
    }

    fn attribute(&self, ctx: &ResolveContext<'_>, name: &str) -> Option<Value> {
        if name == AUTH_USER {
            return self.session(ctx).user.clone().map(Value::from);
        }
        self.attributes.get(name).cloned()
    }

    fn create(&self, ctx: &ResolveContext<'_>, path: &str, properties: ValueMap) -> Result<Resource, PersistenceError> {
        let session = self.session(ctx);
        if self.lookup(&session, path).is_some() {
            return Err(PersistenceError::AlreadyExists(path.to_string()));
        }
        session.pending.lock().insert(path.to_string(), Some(properties.clone()));
        Ok(Resource::real(path, properties))
    }

    fn delete(&self, ctx: &ResolveContext<'_>, resource: &Resource) -> Result<(), PersistenceError> {
        let session = self.session(ctx);
        if self.lookup(&session, resource.path()).is_none() {
            return Err(PersistenceError::NotFound(resource.path().to_string()));
        }
        self.delete_subtree(&session, resource.path());
        Ok(())
    }

    fn revert(&self, ctx: &ResolveContext<'_>) {
        self.session(ctx).pending.lock().clear();
    }

    fn commit(&self, ctx: &ResolveContext<'_>) -> Result<(), PersistenceError> {
        let pending = std::mem::take(&mut *self.session(ctx).pending.lock());
        if pending.is_empty() {
            return Ok(());
        }

        let mut events = Vec::new();
        {
            let mut content = self.content.write();
            for (path, change) in pending {
                let before = match change {
                    Some(properties) => {
                        let before = content.insert(path.clone(), properties);
                        events.extend(change_event(&path, before.as_ref(), content.get(&path)));
                        continue;
                    }
                    None => content.remove(&path),
                };
                events.extend(change_event(&path, before.as_ref(), None));
            }
        }

        info!("Committed {} change(s) to {}", events.len(), self.name);
        if let Some(admin) = &self.event_admin {
            for event in events {
                admin.post_event(event);
            }
        }
        Ok(())
    }

    fn has_changes(&self, ctx: &ResolveContext<'_>) -> bool {
        !self.session(ctx).pending.lock().is_empty()
    }

    fn copy(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> Result<bool, PersistenceError> {
        self.copy_subtree(&self.session(ctx), src, dst)?;
        Ok(true)
    }

    fn move_resource(&self, ctx: &ResolveContext<'_>, src: &str, dst: &str) -> Result<bool, PersistenceError> {
        let session = self.session(ctx);
        self.copy_subtree(&session, src, dst)?;
        self.delete_subtree(&session, src);
        Ok(true)
    }

    fn supported_languages(&self, _ctx: &ResolveContext<'_>) -> Vec<String> {
        vec![PROPERTY_QUERY_LANGUAGE.to_string()]
    }

    /// The query is a property name; resources carrying it match.
    fn find_resources(&self, ctx: &ResolveContext<'_>, query: &str, language: &str) -> Option<ResourceIter> {
        if language != PROPERTY_QUERY_LANGUAGE {
            return None;
        }
        let found: Vec<Resource> = self
            .matching(ctx, |_, properties| properties.contains_key(query))
            .into_iter()
            .map(|(p, properties)| Resource::real(p, properties))
            .collect();
        Some(Box::new(found.into_iter()))
    }

    fn query_resources(&self, ctx: &ResolveContext<'_>, query: &str, language: &str) -> Option<RowIter> {
        if language != PROPERTY_QUERY_LANGUAGE {
            return None;
        }
        let rows: Vec<ValueMap> = self
            .matching(ctx, |_, properties| properties.contains_key(query))
            .into_iter()
            .filter_map(|(p, properties)| {
                let value = properties.get(query)?.clone();
                Some(ValueMap::new().with(ROW_PATH, p).with(query, value))
            })
            .collect();
        Some(Box::new(rows.into_iter()))
    }

    fn find(&self, ctx: &ResolveContext<'_>, query: &Query) -> Option<ResourceIter> {
        let found: Vec<Resource> = self
            .visible(&self.session(ctx))
            .into_iter()
            .map(|(p, properties)| Resource::real(p, properties))
            .filter(|resource| query.accepts(resource))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        Some(Box::new(found.into_iter()))
    }

    fn adapt_to(&self, _ctx: &ResolveContext<'_>, target: TypeId) -> Option<Box<dyn Any + Send>> {
        (target == TypeId::of::<ContentSnapshot>()).then(|| Box::new(self.snapshot()) as Box<dyn Any + Send>)
    }
}
