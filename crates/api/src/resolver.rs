use crate::models::{Resource, ResourceIter};

/// Query language understood by providers that can list resources carrying a
/// given property. The query string is the property name.
pub const PROPERTY_QUERY_LANGUAGE: &str = "property";

/// A resolver session as seen by consumers such as the mapping index.
///
/// A session is meant to be used from one thread at a time; the trait is
/// `Send + Sync` so a long lived administrative session can be owned by a
/// shared component.
pub trait ResourceResolver: Send + Sync {
    fn get_resource(&self, path: &str) -> Option<Resource>;

    fn get_parent(&self, resource: &Resource) -> Option<Resource>;

    fn list_children(&self, parent: &Resource) -> ResourceIter;

    fn find_resources(&self, query: &str, language: &str) -> ResourceIter;

    fn get_child(&self, parent: &Resource, name: &str) -> Option<Resource> {
        self.get_resource(&crate::models::path::child(parent.path(), name))
    }

    /// Drop any cached view so later reads observe committed changes.
    fn refresh(&self);

    fn is_live(&self) -> bool;

    fn close(&self);
}
