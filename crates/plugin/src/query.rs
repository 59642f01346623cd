use serde::{Deserialize, Serialize};
use sling_resolver_api::{Resource, Value};

/// A structured query answered by providers with native query support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Only resources at or below this path.
    pub path: Option<String>,
    /// Only resources carrying this property.
    pub property: Option<String>,
    /// When set together with `property`, the property must equal this value.
    pub value: Option<Value>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `resource` satisfies the path and property conditions.
    pub fn accepts(&self, resource: &Resource) -> bool {
        let in_scope = self.path.as_deref().is_none_or(|path| {
            sling_resolver_api::models::path::is_same_or_descendant(resource.path(), path)
        });
        if !in_scope {
            return false;
        }
        match &self.property {
            None => true,
            Some(name) => match resource.properties().and_then(|p| p.get(name)) {
                None => false,
                Some(actual) => self.value.as_ref().is_none_or(|expected| expected == actual),
            },
        }
    }
}
