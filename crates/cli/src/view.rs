use serde::Serialize;
use sling_resolver_api::Resource;
use sling_resolver_core::mapping::MapEntry;
use tabled::Tabled;

/// One row of the index dump.
#[derive(Tabled, Serialize)]
pub struct EntryView {
    pub pattern: String,
    pub redirect: String,
    pub status: String,
    pub order: i64,
}

impl EntryView {
    pub fn from_entry(entry: &MapEntry) -> Self {
        let status = if entry.is_internal() {
            "internal".to_string()
        } else {
            entry.status().to_string()
        };
        Self {
            pattern: entry.pattern().to_string(),
            redirect: entry.redirect().join(", "),
            status,
            order: entry.order(),
        }
    }
}

#[derive(Tabled)]
pub struct ChildView {
    pub name: String,
    #[tabled(rename = "type")]
    pub resource_type: String,
    pub properties: usize,
}

impl ChildView {
    pub fn from_resource(resource: &Resource) -> Self {
        // mount point ancestors are listed like directories
        let name = if resource.is_synthetic() {
            format!("{}/", resource.name())
        } else {
            resource.name().to_string()
        };
        Self {
            name,
            resource_type: resource.resource_type(),
            properties: resource.properties().map(|p| p.len()).unwrap_or(0),
        }
    }
}
