use crate::Source;
use sling_resolver_api::ValueMap;
use sling_resolver_api::models::path as resource_path;
use sling_resolver_core::mapping::{MapConfiguration, MapEntriesHandler};
use sling_resolver_core::providers::MemoryResourceProvider;
use sling_resolver_core::{EventBus, ResolverFactory, SessionResolver};
use sling_resolver_plugin::{ProviderHandle, ProviderInfo};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// An in-memory repository loaded from a content file, with its mapping
/// index activated.
pub struct Repository {
    factory: ResolverFactory,
}

impl Repository {
    pub fn open(source: &Source) -> Result<Self, Box<dyn std::error::Error>> {
        let content_path = match &source.content {
            Some(path) => path.clone(),
            None => default_content_path(),
        };
        let content = load_content(&content_path)?;
        info!("Loaded {} resource(s) from {}", content.len(), content_path.display());

        let config = match &source.config {
            Some(path) => MapConfiguration::from_json_file(path)?,
            None => MapConfiguration::empty(),
        };
        Self::from_content(content, config)
    }

    pub fn from_content(
        content: BTreeMap<String, ValueMap>,
        config: MapConfiguration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let bus = EventBus::new();
        let provider = MemoryResourceProvider::new("repository")
            .with_content(content)
            .with_event_admin(bus.clone());
        let info = ProviderInfo::new("repository", "/")
            .with_modifiable(true)
            .with_queryable(true)
            .with_adaptable(true);
        let factory = ResolverFactory::new(
            [Arc::new(ProviderHandle::new(info, Arc::new(provider)))],
            Arc::new(config),
            bus,
        );
        factory.activate()?;
        Ok(Self { factory })
    }

    pub fn index(&self) -> Arc<dyn MapEntriesHandler> {
        self.factory.map_entries()
    }

    pub fn factory(&self) -> &ResolverFactory {
        &self.factory
    }

    pub fn session(&self) -> Result<SessionResolver, Box<dyn std::error::Error>> {
        Ok(self.factory.administrative_resolver()?)
    }
}

pub fn default_content_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sling-resolver")
        .join("content.json")
}

fn load_content(path: &Path) -> Result<BTreeMap<String, ValueMap>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let content: BTreeMap<String, ValueMap> = serde_json::from_str(&raw)?;
    if let Some(bad) = content.keys().find(|p| !resource_path::is_absolute(p)) {
        return Err(format!("resource paths must be absolute: {bad}").into());
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sling_resolver_core::mapping::Resolution;
    use std::io::Write;

    fn source(content: &str, config: Option<&str>) -> (tempfile::TempDir, Source) {
        let dir = tempfile::tempdir().unwrap();
        let content_path = dir.path().join("content.json");
        std::fs::File::create(&content_path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        let config_path = config.map(|json| {
            let path = dir.path().join("config.json");
            std::fs::write(&path, json).unwrap();
            path
        });
        let source = Source {
            content: Some(content_path),
            config: config_path,
        };
        (dir, source)
    }

    #[test]
    fn test_open_builds_index() {
        let (_dir, source) = source(
            r#"{
                "/": {},
                "/content": {},
                "/content/bar": {"sling:vanityPath": "/foo"}
            }"#,
            None,
        );
        let repository = Repository::open(&source).unwrap();
        assert_eq!(
            repository.factory().resolve_url("http://localhost/foo").unwrap(),
            Some(Resolution::Internal(vec!["/content/bar.html".to_string()]))
        );
    }

    #[test]
    fn test_relative_paths_are_rejected() {
        let (_dir, source) = source(r#"{"content": {}}"#, None);
        assert!(Repository::open(&source).is_err());
    }

    #[test]
    fn test_missing_content_file() {
        let source = Source {
            content: Some(PathBuf::from("/nonexistent/content.json")),
            config: None,
        };
        assert!(Repository::open(&source).is_err());
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let (_dir, source) = source(r#"{"/": {}}"#, Some(r#"{"mapRoot": "etc/map"}"#));
        assert!(Repository::open(&source).is_err());
    }
}
