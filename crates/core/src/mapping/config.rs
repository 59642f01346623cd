use super::{DEFAULT_MAP_ROOT, DEFAULT_VANITY_PATH_REDIRECT_STATUS, Mapping};
use crate::error::{ResolverError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

/// What the mapping index needs to know about its configuration.
pub trait MapConfigurationProvider: Send + Sync {
    fn map_root(&self) -> &str;

    /// External path → internal path.
    fn virtual_url_map(&self) -> &IndexMap<String, String>;

    fn mappings(&self) -> &[Mapping];

    fn default_vanity_path_redirect_status(&self) -> i32;

    fn is_vanity_path_enabled(&self) -> bool;

    fn is_optimize_alias_resolution_enabled(&self) -> bool;

    fn has_vanity_path_precedence(&self) -> bool;

    /// Allow/deny list ordered longest prefix first; `None` allows everything.
    fn vanity_path_config(&self) -> Option<&[VanityPathConfig]>;

    /// Whether `path` is part of the mapping configuration tree.
    fn is_map_configuration(&self, path: &str) -> bool {
        let root = self.map_root();
        path == root
            || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
    }
}

/// One allow (`is_exclude == false`) or deny prefix for vanity path sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VanityPathConfig {
    pub prefix: String,
    pub is_exclude: bool,
}

impl VanityPathConfig {
    pub fn new(prefix: impl Into<String>, is_exclude: bool) -> Self {
        Self {
            prefix: prefix.into(),
            is_exclude,
        }
    }
}

/// Longest prefix first, then by prefix text.
impl Ord for VanityPathConfig {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .prefix
            .len()
            .cmp(&self.prefix.len())
            .then_with(|| self.prefix.cmp(&other.prefix))
            .then_with(|| self.is_exclude.cmp(&other.is_exclude))
    }
}

impl PartialOrd for VanityPathConfig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The configuration document as written in JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverProperties {
    pub map_root: String,
    /// `from:to`, `from>to` or `from<to`.
    pub mappings: Vec<String>,
    pub allow_direct: bool,
    /// `external:internal`.
    pub virtual_urls: Vec<String>,
    pub default_vanity_path_redirect_status: i32,
    pub enable_vanity_paths: bool,
    pub vanity_path_precedence: bool,
    pub optimize_alias_resolution: bool,
    pub vanity_path_allow_list: Vec<String>,
    pub vanity_path_deny_list: Vec<String>,
}

impl Default for ResolverProperties {
    fn default() -> Self {
        Self {
            map_root: DEFAULT_MAP_ROOT.to_string(),
            mappings: vec![
                "/:/".to_string(),
                "/content/:/".to_string(),
                "/system/docroot/:/".to_string(),
            ],
            allow_direct: true,
            virtual_urls: vec!["/:/".to_string()],
            default_vanity_path_redirect_status: DEFAULT_VANITY_PATH_REDIRECT_STATUS,
            enable_vanity_paths: true,
            vanity_path_precedence: false,
            optimize_alias_resolution: true,
            vanity_path_allow_list: Vec::new(),
            vanity_path_deny_list: Vec::new(),
        }
    }
}

/// Resolved configuration implementing [`MapConfigurationProvider`].
#[derive(Debug, Clone)]
pub struct MapConfiguration {
    map_root: String,
    mappings: Vec<Mapping>,
    virtual_urls: IndexMap<String, String>,
    default_vanity_path_redirect_status: i32,
    vanity_paths_enabled: bool,
    vanity_path_precedence: bool,
    optimize_alias_resolution: bool,
    vanity_path_config: Option<Vec<VanityPathConfig>>,
}

impl Default for MapConfiguration {
    fn default() -> Self {
        Self::from(ResolverProperties::default())
    }
}

impl From<ResolverProperties> for MapConfiguration {
    fn from(props: ResolverProperties) -> Self {
        let mut mappings = Vec::with_capacity(props.mappings.len() + 1);
        if props.allow_direct {
            mappings.push(Mapping::DIRECT);
        }
        mappings.extend(props.mappings.iter().map(|m| Mapping::parse(m)));

        let virtual_urls = props
            .virtual_urls
            .iter()
            .filter_map(|v| {
                let (ext, int) = v.split_once(':')?;
                Some((ext.trim().to_string(), int.trim().to_string()))
            })
            .collect();

        let mut vanity_path_config: Vec<VanityPathConfig> = props
            .vanity_path_allow_list
            .iter()
            .map(|p| (p, false))
            .chain(props.vanity_path_deny_list.iter().map(|p| (p, true)))
            .filter(|(p, _)| !p.trim().is_empty())
            .map(|(p, exclude)| {
                let p = p.trim();
                let prefix = if p.ends_with('/') { p.to_string() } else { format!("{p}/") };
                VanityPathConfig::new(prefix, exclude)
            })
            .collect();
        vanity_path_config.sort();

        Self {
            map_root: props.map_root,
            mappings,
            virtual_urls,
            default_vanity_path_redirect_status: props.default_vanity_path_redirect_status,
            vanity_paths_enabled: props.enable_vanity_paths,
            vanity_path_precedence: props.vanity_path_precedence,
            optimize_alias_resolution: props.optimize_alias_resolution,
            vanity_path_config: (!vanity_path_config.is_empty()).then_some(vanity_path_config),
        }
    }
}

impl MapConfiguration {
    /// No mappings, no virtual URLs, vanity paths and alias optimisation on.
    pub fn empty() -> Self {
        Self::from(ResolverProperties {
            mappings: Vec::new(),
            allow_direct: false,
            virtual_urls: Vec::new(),
            ..ResolverProperties::default()
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let props: ResolverProperties = serde_json::from_str(json)?;
        if !props.map_root.starts_with('/') {
            return Err(ResolverError::Config(format!(
                "map root must be absolute: {}",
                props.map_root
            )));
        }
        Ok(Self::from(props))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn with_map_root(mut self, root: impl Into<String>) -> Self {
        self.map_root = root.into();
        self
    }

    pub fn with_mappings(mut self, mappings: Vec<Mapping>) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn with_virtual_url(mut self, external: impl Into<String>, internal: impl Into<String>) -> Self {
        self.virtual_urls.insert(external.into(), internal.into());
        self
    }

    pub fn with_vanity_paths(mut self, enabled: bool) -> Self {
        self.vanity_paths_enabled = enabled;
        self
    }

    pub fn with_vanity_path_precedence(mut self, precedence: bool) -> Self {
        self.vanity_path_precedence = precedence;
        self
    }

    pub fn with_optimize_alias_resolution(mut self, enabled: bool) -> Self {
        self.optimize_alias_resolution = enabled;
        self
    }

    pub fn with_default_vanity_path_redirect_status(mut self, status: i32) -> Self {
        self.default_vanity_path_redirect_status = status;
        self
    }

    pub fn with_vanity_path_config(mut self, config: Option<Vec<VanityPathConfig>>) -> Self {
        self.vanity_path_config = config.map(|mut c| {
            c.sort();
            c
        });
        self
    }
}

impl MapConfigurationProvider for MapConfiguration {
    fn map_root(&self) -> &str {
        &self.map_root
    }

    fn virtual_url_map(&self) -> &IndexMap<String, String> {
        &self.virtual_urls
    }

    fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    fn default_vanity_path_redirect_status(&self) -> i32 {
        self.default_vanity_path_redirect_status
    }

    fn is_vanity_path_enabled(&self) -> bool {
        self.vanity_paths_enabled
    }

    fn is_optimize_alias_resolution_enabled(&self) -> bool {
        self.optimize_alias_resolution
    }

    fn has_vanity_path_precedence(&self) -> bool {
        self.vanity_path_precedence
    }

    fn vanity_path_config(&self) -> Option<&[VanityPathConfig]> {
        self.vanity_path_config.as_deref()
    }
}
