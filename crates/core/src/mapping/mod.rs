//! URL mapping: the `/etc/map` configuration tree, vanity paths, aliases and
//! the incremental index maintained over them.

pub mod alias;
pub mod config;
pub mod entries;
pub mod entry;
pub mod event;
pub mod handler;
pub mod iter;
pub mod rule;
pub mod vanity;

pub use config::{MapConfiguration, MapConfigurationProvider, VanityPathConfig};
pub use entries::MapEntries;
pub use entry::MapEntry;
pub use event::{ChangeKind, MappingEventFilter};
pub use handler::{EmptyMapEntries, MapEntriesHandler, Resolution};
pub use rule::{Direction, Mapping};

/// Matches any `scheme/host.port` prefix of a map path.
pub const ANY_SCHEME_HOST: &str = "[^/]+/[^/]+";

/// Key of the resolve-maps list holding the configuration entries.
pub const GLOBAL_LIST_KEY: &str = "*";

pub const DEFAULT_MAP_ROOT: &str = "/etc/map";

/// 302 Found.
pub const DEFAULT_REDIRECT_STATUS: i32 = 302;

pub const DEFAULT_VANITY_PATH_REDIRECT_STATUS: i32 = DEFAULT_REDIRECT_STATUS;

pub const JCR_SYSTEM_PREFIX: &str = "/jcr:system/";
pub const JCR_CONTENT: &str = "jcr:content";
pub const JCR_CONTENT_SUFFIX: &str = "/jcr:content";

pub const PROP_REG_EXP: &str = "sling:match";
pub const PROP_REDIRECT_EXTERNAL: &str = "sling:redirect";
pub const PROP_REDIRECT_EXTERNAL_STATUS: &str = "sling:status";
pub const PROP_REDIRECT_EXTERNAL_REDIRECT_STATUS: &str = "sling:redirectStatus";
pub const PROP_REDIRECT_INTERNAL: &str = "sling:internalRedirect";
pub const PROP_VANITY_PATH: &str = "sling:vanityPath";
pub const PROP_VANITY_ORDER: &str = "sling:vanityOrder";
pub const PROP_ALIAS: &str = "sling:alias";

/// Builds the map path of a request: `scheme/host.port/path`, using the
/// scheme's default port when `port` is negative.
pub fn request_map_path(scheme: &str, host: &str, port: i32, path: &str) -> String {
    let port = if port < 0 {
        if scheme == "https" { 443 } else { 80 }
    } else {
        port
    };
    format!("{scheme}/{host}.{port}{path}")
}
