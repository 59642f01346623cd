//! Repository change events and the event bus contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event property naming the affected path.
pub const PROPERTY_PATH: &str = "path";
pub const PROPERTY_ADDED_ATTRIBUTES: &str = "resourceAddedAttributes";
pub const PROPERTY_CHANGED_ATTRIBUTES: &str = "resourceChangedAttributes";
pub const PROPERTY_REMOVED_ATTRIBUTES: &str = "resourceRemovedAttributes";
pub const EVENT_TOPIC: &str = "event.topics";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    ResourceAdded,
    ResourceChanged,
    ResourceRemoved,
    MappingChanged,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::ResourceAdded => "org/apache/sling/api/resource/Resource/ADDED",
            Topic::ResourceChanged => "org/apache/sling/api/resource/Resource/CHANGED",
            Topic::ResourceRemoved => "org/apache/sling/api/resource/Resource/REMOVED",
            Topic::MappingChanged => "org/apache/sling/api/resource/ResourceResolverMapping/CHANGED",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which attribute array of an event a property name was listed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeChange {
    Added,
    Changed,
    Removed,
}

impl AttributeChange {
    pub const ALL: [AttributeChange; 3] = [
        AttributeChange::Added,
        AttributeChange::Changed,
        AttributeChange::Removed,
    ];

    /// Name of the event property holding this attribute array.
    pub fn event_property(&self) -> &'static str {
        match self {
            AttributeChange::Added => PROPERTY_ADDED_ATTRIBUTES,
            AttributeChange::Changed => PROPERTY_CHANGED_ATTRIBUTES,
            AttributeChange::Removed => PROPERTY_REMOVED_ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub topic: Topic,
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_attributes: Option<Vec<String>>,
}

impl Event {
    pub fn new(topic: Topic, path: Option<String>) -> Self {
        Self {
            topic,
            path,
            added_attributes: None,
            changed_attributes: None,
            removed_attributes: None,
        }
    }

    pub fn added(path: impl Into<String>) -> Self {
        Self::new(Topic::ResourceAdded, Some(path.into()))
    }

    pub fn changed(path: impl Into<String>) -> Self {
        Self::new(Topic::ResourceChanged, Some(path.into()))
    }

    pub fn removed(path: impl Into<String>) -> Self {
        Self::new(Topic::ResourceRemoved, Some(path.into()))
    }

    pub fn mapping_changed() -> Self {
        Self::new(Topic::MappingChanged, None)
    }

    pub fn with_attributes(mut self, change: AttributeChange, names: &[&str]) -> Self {
        let names = Some(names.iter().map(|n| n.to_string()).collect());
        match change {
            AttributeChange::Added => self.added_attributes = names,
            AttributeChange::Changed => self.changed_attributes = names,
            AttributeChange::Removed => self.removed_attributes = names,
        }
        self
    }

    pub fn attributes(&self, change: AttributeChange) -> Option<&[String]> {
        match change {
            AttributeChange::Added => self.added_attributes.as_deref(),
            AttributeChange::Changed => self.changed_attributes.as_deref(),
            AttributeChange::Removed => self.removed_attributes.as_deref(),
        }
    }

    pub fn has_attributes(&self) -> bool {
        self.added_attributes.is_some()
            || self.changed_attributes.is_some()
            || self.removed_attributes.is_some()
    }
}

/// Receives events delivered by an [`EventAdmin`].
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

/// Decides whether a subscriber wants an event.
pub trait EventFilter: Send + Sync {
    fn matches(&self, event: &Event) -> bool;
}

/// Accepts every event.
pub struct AcceptAll;

impl EventFilter for AcceptAll {
    fn matches(&self, _event: &Event) -> bool {
        true
    }
}

/// The event bus seen by producers.
pub trait EventAdmin: Send + Sync {
    fn post_event(&self, event: Event);
}
