//! Classification of change events and the subscription filter of the index.

use super::{
    PROP_ALIAS, PROP_REDIRECT_EXTERNAL, PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS,
    PROP_REDIRECT_EXTERNAL_STATUS, PROP_REDIRECT_INTERNAL, PROP_REG_EXP, PROP_VANITY_ORDER,
    PROP_VANITY_PATH,
};
use sling_resolver_api::event::{AttributeChange, EVENT_TOPIC};
use sling_resolver_api::{Event, EventFilter, Topic};

/// Property names besides the vanity ones that affect the index.
const TRACKED_PROPERTIES: [&str; 6] = [
    PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS,
    PROP_REDIRECT_EXTERNAL,
    PROP_REDIRECT_INTERNAL,
    PROP_REDIRECT_EXTERNAL_STATUS,
    PROP_REG_EXP,
    PROP_ALIAS,
];

const VANITY_PROPERTIES: [&str; 2] = [PROP_VANITY_PATH, PROP_VANITY_ORDER];

/// What a changed property means for the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    VanityPath,
    VanityOrder,
    Alias,
    /// Anything else rebuilds the configuration part of the index.
    Other,
}

impl ChangeKind {
    pub fn of(property: &str) -> Self {
        match property {
            PROP_VANITY_PATH => ChangeKind::VanityPath,
            PROP_VANITY_ORDER => ChangeKind::VanityOrder,
            PROP_ALIAS => ChangeKind::Alias,
            _ => ChangeKind::Other,
        }
    }
}

/// The LDAP-style subscription filter for the event bus.
pub fn create_filter(vanity_path_enabled: bool) -> String {
    let mut filter = String::from("(|");
    for change in AttributeChange::ALL {
        let attr = change.event_property();
        filter.push_str("(|");
        if vanity_path_enabled {
            for prop in VANITY_PROPERTIES {
                filter.push_str(&format!("({attr}={prop})"));
            }
        }
        for prop in TRACKED_PROPERTIES {
            filter.push_str(&format!("({attr}={prop})"));
        }
        filter.push(')');
    }
    filter.push_str(&format!("({EVENT_TOPIC}={})", Topic::ResourceRemoved.as_str()));
    filter.push(')');
    filter
}

/// Matcher equivalent to [`create_filter`] for the in-process bus.
#[derive(Debug, Clone)]
pub struct MappingEventFilter {
    vanity_path_enabled: bool,
}

impl MappingEventFilter {
    pub fn new(vanity_path_enabled: bool) -> Self {
        Self { vanity_path_enabled }
    }

    pub fn filter_string(&self) -> String {
        create_filter(self.vanity_path_enabled)
    }

    fn is_tracked(&self, name: &str) -> bool {
        TRACKED_PROPERTIES.contains(&name)
            || (self.vanity_path_enabled && VANITY_PROPERTIES.contains(&name))
    }
}

impl EventFilter for MappingEventFilter {
    fn matches(&self, event: &Event) -> bool {
        match event.topic {
            Topic::ResourceRemoved => true,
            Topic::MappingChanged => false,
            Topic::ResourceAdded | Topic::ResourceChanged => AttributeChange::ALL
                .iter()
                .filter_map(|c| event.attributes(*c))
                .flatten()
                .any(|name| self.is_tracked(name)),
        }
    }
}
