use super::path;
use super::value::ValueMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resource type reported for placeholder resources.
pub const RESOURCE_TYPE_SYNTHETIC: &str = "sling:syntheticResourceProviderResource";

/// Resource type used when a resource carries no `sling:resourceType`.
pub const RESOURCE_TYPE_NON_EXISTING: &str = "sling:nonexisting";

pub const PROP_RESOURCE_TYPE: &str = "sling:resourceType";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

/// A resource answered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    pub path: String,
    pub properties: ValueMap,
    #[serde(default)]
    pub metadata: ResourceMetadata,
}

impl ResourceData {
    pub fn new(path: impl Into<String>, properties: ValueMap) -> Self {
        Self {
            path: path.into(),
            properties,
            metadata: ResourceMetadata::default(),
        }
    }
}

/// A placeholder materialized for an ancestor of some provider's mount point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticResource {
    pub path: String,
    #[serde(default)]
    pub metadata: ResourceMetadata,
}

/// A resource of the virtual tree. Placeholders are a distinct variant so that
/// callers have to match before treating one as real content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    Real(ResourceData),
    Synthetic(SyntheticResource),
}

impl Resource {
    pub fn real(path: impl Into<String>, properties: ValueMap) -> Self {
        Resource::Real(ResourceData::new(path, properties))
    }

    pub fn synthetic(path: impl Into<String>) -> Self {
        Resource::Synthetic(SyntheticResource {
            path: path.into(),
            metadata: ResourceMetadata::default(),
        })
    }

    pub fn path(&self) -> &str {
        match self {
            Resource::Real(data) => &data.path,
            Resource::Synthetic(s) => &s.path,
        }
    }

    pub fn name(&self) -> &str {
        path::name(self.path())
    }

    pub fn parent_path(&self) -> Option<String> {
        path::parent(self.path())
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, Resource::Synthetic(_))
    }

    /// Properties of a real resource; placeholders have none.
    pub fn value_map(&self) -> ValueMap {
        match self {
            Resource::Real(data) => data.properties.clone(),
            Resource::Synthetic(_) => ValueMap::new(),
        }
    }

    pub fn properties(&self) -> Option<&ValueMap> {
        match self {
            Resource::Real(data) => Some(&data.properties),
            Resource::Synthetic(_) => None,
        }
    }

    pub fn resource_type(&self) -> String {
        match self {
            Resource::Real(data) => data
                .properties
                .get_string(PROP_RESOURCE_TYPE)
                .unwrap_or_else(|| RESOURCE_TYPE_NON_EXISTING.to_string()),
            Resource::Synthetic(_) => RESOURCE_TYPE_SYNTHETIC.to_string(),
        }
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        match self {
            Resource::Real(data) => &data.metadata,
            Resource::Synthetic(s) => &s.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ResourceMetadata {
        match self {
            Resource::Real(data) => &mut data.metadata,
            Resource::Synthetic(s) => &mut s.metadata,
        }
    }
}

/// Boxed lazy sequence of resources.
pub type ResourceIter = Box<dyn Iterator<Item = Resource> + Send>;

/// Boxed lazy sequence of query rows.
pub type RowIter = Box<dyn Iterator<Item = ValueMap> + Send>;
