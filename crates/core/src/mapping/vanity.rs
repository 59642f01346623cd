//! Vanity path parsing and the entries registered for a vanity path.

use super::entry::{INTERNAL_STATUS, MapEntry};
use super::{
    ANY_SCHEME_HOST, JCR_CONTENT, JCR_CONTENT_SUFFIX, JCR_SYSTEM_PREFIX, PROP_REDIRECT_EXTERNAL,
    PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS, PROP_VANITY_ORDER, PROP_VANITY_PATH, VanityPathConfig,
};
use sling_resolver_api::Resource;
use sling_resolver_api::models::path;
use tracing::{debug, warn};
use url::Url;

/// A parsed `sling:vanityPath` value: the `scheme/host.port` part (a pattern
/// for bare paths) and the absolute path without extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VanityDefinition {
    pub prefix: String,
    pub path: String,
}

impl VanityDefinition {
    pub fn url(&self) -> String {
        format!("{}{}", self.prefix, self.path)
    }
}

/// Entries contributed by one vanity value, filed under `key`.
#[derive(Debug, Clone)]
pub struct VanityRegistration {
    /// The content path the entries redirect to.
    pub target: String,
    /// Resolve-maps key, the vanity path itself.
    pub key: String,
    pub entries: Vec<MapEntry>,
}

/// Parses one vanity value; full URLs keep their scheme, host and port,
/// bare paths match any host. Returns `None` for blank or malformed values.
pub fn parse_vanity_path(value: &str) -> Option<VanityDefinition> {
    let info = value.trim();
    if info.is_empty() {
        return None;
    }

    let (prefix, mut vanity) = if info.contains(":/") {
        match Url::parse(info) {
            Ok(u) => {
                let host = u.host_str().unwrap_or_default();
                let port = u.port_or_known_default().map(i32::from).unwrap_or(-1);
                (format!("{}/{}.{}", u.scheme(), host, port), u.path().to_string())
            }
            Err(e) => {
                warn!("Ignoring malformed vanity path {}: {}", value, e);
                return None;
            }
        }
    } else if info.starts_with('/') {
        (format!("^{ANY_SCHEME_HOST}"), info.to_string())
    } else {
        (format!("^{ANY_SCHEME_HOST}"), format!("/{info}"))
    };

    let last_slash = vanity.rfind('/').map(|i| i + 1).unwrap_or(0);
    if let Some(dot) = vanity[last_slash..].find('.') {
        vanity.truncate(last_slash + dot);
        warn!("Removing extension from vanity path {}", value);
    }

    Some(VanityDefinition {
        prefix,
        path: vanity,
    })
}

/// Whether a resource at `resource_path` may contribute vanity paths.
pub fn is_valid_vanity_path(resource_path: &str, config: Option<&[VanityPathConfig]>) -> bool {
    if resource_path.starts_with(JCR_SYSTEM_PREFIX) {
        debug!("isValidVanityPath: not valid {}", resource_path);
        return false;
    }
    if let Some(list) = config {
        let allowed = list
            .iter()
            .find(|c| resource_path.starts_with(&c.prefix))
            .is_some_and(|c| !c.is_exclude);
        if !allowed {
            debug!("isValidVanityPath: not valid as not in white list {}", resource_path);
            return false;
        }
    }
    true
}

/// Content path a `jcr:content` child stands for.
pub fn actual_content_path(p: &str) -> String {
    if p.ends_with(JCR_CONTENT_SUFFIX) {
        path::parent(p).unwrap_or_else(|| p.to_string())
    } else {
        p.to_string()
    }
}

/// The redirect target recorded for an entry: its single redirect with the
/// `$1` or `.html` suffix removed. Entries with several redirects have no
/// single target.
pub fn map_entry_redirect(entry: &MapEntry) -> Option<String> {
    let redirect = entry.redirect();
    if redirect.len() > 1 {
        warn!("something went wrong, please restart the bundle");
        return None;
    }
    let target = redirect.first()?;
    let target = target
        .strip_suffix("$1")
        .or_else(|| target.strip_suffix(".html"))
        .unwrap_or(target);
    Some(target.to_string())
}

/// Builds the resolve entries for every vanity value on `resource`.
pub fn vanity_registrations(resource: &Resource, default_status: i32) -> Vec<VanityRegistration> {
    let Some(props) = resource.properties() else {
        return Vec::new();
    };

    let order = props.get_long(PROP_VANITY_ORDER).unwrap_or(0);
    let status = if props.get_bool(PROP_REDIRECT_EXTERNAL).unwrap_or(false) {
        props
            .get_long(PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS)
            .map(|s| s as i32)
            .unwrap_or(default_status)
    } else {
        INTERNAL_STATUS
    };

    // the node named jcr:content redirects to its parent
    let target = if resource.name() == JCR_CONTENT {
        resource
            .parent_path()
            .unwrap_or_else(|| resource.path().to_string())
    } else {
        resource.path().to_string()
    };
    let target_name = path::name(&target).to_string();

    let values = props.get_strings(PROP_VANITY_PATH).unwrap_or_default();
    values
        .iter()
        .filter_map(|value| parse_vanity_path(value))
        .map(|def| {
            let url = def.url();
            let candidates = match target_name.rfind('.') {
                Some(idx) => {
                    let extension = &target_name[idx + 1..];
                    vec![
                        (format!("{url}$"), target.clone()),
                        (format!("{url}\\.{extension}"), target.clone()),
                    ]
                }
                None => vec![
                    (format!("{url}$"), format!("{target}.html")),
                    (format!("{url}(\\..*)"), format!("{target}$1")),
                ],
            };
            let entries = candidates
                .into_iter()
                .filter_map(|(pattern, redirect)| {
                    MapEntry::new(&pattern, status, false, order, vec![redirect])
                        .map_err(|e| debug!("ignored entry due to {}", e))
                        .ok()
                })
                .collect();
            VanityRegistration {
                target: target.clone(),
                key: def.path,
                entries,
            }
        })
        .filter(|r| !r.entries.is_empty())
        .collect()
}
