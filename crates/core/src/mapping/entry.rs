use super::{
    ANY_SCHEME_HOST, DEFAULT_REDIRECT_STATUS, PROP_REDIRECT_EXTERNAL, PROP_REDIRECT_EXTERNAL_STATUS,
    PROP_REDIRECT_INTERNAL,
};
use crate::error::{ResolverError, Result};
use regex::Regex;
use sling_resolver_api::Resource;
use std::cmp::Ordering;
use std::fmt;
use tracing::info;

/// Status of entries that forward internally instead of redirecting.
pub const INTERNAL_STATUS: i32 = -1;

/// A compiled rewrite rule: a URL pattern anchored at the start of the input,
/// one or more replacements, a status (`-1` for internal forwards) and a sort
/// order used to break ties between equally specific patterns.
#[derive(Debug, Clone)]
pub struct MapEntry {
    url_pattern: Regex,
    redirect: Vec<String>,
    status: i32,
    order: i64,
}

impl MapEntry {
    pub fn new(
        url: &str,
        status: i32,
        trailing_slash: bool,
        order: i64,
        redirect: Vec<String>,
    ) -> Result<Self> {
        let mut url = url.to_string();
        let mut redirect = redirect;

        // the trailing slash becomes optional and redirects keep one
        if trailing_slash {
            if !url.ends_with('/') {
                url.push('/');
            }
            url.push('?');
            for r in redirect.iter_mut() {
                if !r.ends_with('/') {
                    r.push('/');
                }
            }
        }

        if !url.starts_with('^') {
            url.insert(0, '^');
        }

        let url_pattern = Regex::new(&url).map_err(|source| ResolverError::Pattern {
            pattern: url.clone(),
            source,
        })?;

        Ok(Self {
            url_pattern,
            redirect,
            status,
            order,
        })
    }

    /// Resolve entry for an `/etc/map` style configuration node, or `None`
    /// when the node neither redirects externally nor internally.
    pub fn create_resolve_entry(url: &str, resource: &Resource, trailing_slash: bool) -> Result<Option<Self>> {
        let Some(props) = resource.properties() else {
            return Ok(None);
        };
        let url = fix_uri_path(url);

        if let Some(redirect) = props.get_string(PROP_REDIRECT_EXTERNAL) {
            let status = props
                .get_long(PROP_REDIRECT_EXTERNAL_STATUS)
                .map(|s| s as i32)
                .unwrap_or(DEFAULT_REDIRECT_STATUS);
            return Self::new(&url, status, trailing_slash, 0, vec![redirect]).map(Some);
        }

        let internal: Vec<String> = props
            .get_strings(PROP_REDIRECT_INTERNAL)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect();
        if internal.is_empty() {
            return Ok(None);
        }
        Self::new(&url, INTERNAL_STATUS, trailing_slash, 0, internal).map(Some)
    }

    /// Outbound entries for an `/etc/map` style configuration node: each plain
    /// internal redirect maps back onto the node's URL.
    pub fn create_map_entries(url: &str, resource: &Resource, trailing_slash: bool) -> Option<Vec<Self>> {
        let props = resource.properties()?;

        if let Some(redirect) = props.get_string(PROP_REDIRECT_EXTERNAL) {
            info!(
                "createMapEntry: Configuration has external redirect to {}; not creating mapping for configuration in {}",
                redirect,
                resource.path()
            );
            return None;
        }

        let (url, end_hook) = match url.strip_suffix('$') {
            Some(stripped) => (stripped, "$"),
            None => (url, ""),
        };
        let url = url.strip_prefix(ANY_SCHEME_HOST).unwrap_or(url);

        if is_reg_exp(url) {
            info!(
                "createMapEntry: URL {} contains a regular expression; not creating mapping for configuration in {}",
                url,
                resource.path()
            );
            return None;
        }

        let internal = props.get_strings(PROP_REDIRECT_INTERNAL)?;
        let entries = internal
            .iter()
            .filter(|path| !is_reg_exp(path))
            .filter_map(|path| {
                let pattern = format!("{path}{end_hook}");
                Self::new(&pattern, INTERNAL_STATUS, trailing_slash, 0, vec![url.to_string()])
                    .map_err(|e| tracing::debug!("ignored entry due to {}", e))
                    .ok()
            })
            .collect();
        Some(entries)
    }

    /// Rewrites `value` with every redirect when the pattern matches its
    /// start; `$n` in a redirect refers to the n-th capture group.
    pub fn replace(&self, value: &str) -> Option<Vec<String>> {
        let caps = self.url_pattern.captures(value)?;
        let whole = caps.get(0)?;
        let results = self
            .redirect
            .iter()
            .map(|redirect| {
                let mut out = String::with_capacity(value.len() + redirect.len());
                out.push_str(&value[..whole.start()]);
                caps.expand(&to_expand_syntax(redirect), &mut out);
                out.push_str(&value[whole.end()..]);
                out
            })
            .collect();
        Some(results)
    }

    pub fn pattern(&self) -> &str {
        self.url_pattern.as_str()
    }

    pub fn redirect(&self) -> &[String] {
        &self.redirect
    }

    pub fn is_internal(&self) -> bool {
        self.status == INTERNAL_STATUS
    }

    pub fn status(&self) -> i32 {
        self.status
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn with_order(&self, order: i64) -> Self {
        Self {
            order,
            ..self.clone()
        }
    }

    pub fn with_redirect(&self, redirect: Vec<String>) -> Self {
        Self {
            redirect,
            ..self.clone()
        }
    }
}

/// Most specific first: longer patterns, then higher order.
impl Ord for MapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .pattern()
            .len()
            .cmp(&self.pattern().len())
            .then_with(|| other.order.cmp(&self.order))
            .then_with(|| self.pattern().cmp(other.pattern()))
            .then_with(|| self.redirect.cmp(&other.redirect))
            .then_with(|| self.status.cmp(&other.status))
    }
}

impl PartialOrd for MapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MapEntry {}

impl fmt::Display for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapEntry: match:{}, replacement:", self.pattern())?;
        if self.redirect.len() == 1 {
            write!(f, "{}", self.redirect[0])?;
        } else {
            write!(f, "[{}]", self.redirect.join(", "))?;
        }
        if self.is_internal() {
            write!(f, ", internal")
        } else {
            write!(f, ", status:{}", self.status)
        }
    }
}

fn is_reg_exp(s: &str) -> bool {
    s.chars().any(|c| {
        matches!(
            c,
            '\\' | '[' | ']' | '(' | ')' | '*' | '+' | '?' | '{' | '}' | '|' | '^' | '$'
        )
    })
}

/// Adds the scheme's default port to `scheme/host/...` URLs naming a literal
/// host without one.
fn fix_uri_path(url: &str) -> String {
    let mut parts = url.splitn(3, '/');
    let (Some(scheme), Some(host)) = (parts.next(), parts.next()) else {
        return url.to_string();
    };
    let port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return url.to_string(),
    };
    if host.is_empty() || is_reg_exp(host) {
        return url.to_string();
    }
    let has_port = host
        .rsplit_once('.')
        .is_some_and(|(_, last)| !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()));
    if has_port {
        return url.to_string();
    }
    match parts.next() {
        Some(rest) => format!("{scheme}/{host}.{port}/{rest}"),
        None => format!("{scheme}/{host}.{port}"),
    }
}

/// Converts `$1` style group references into the `${1}` form so that a
/// reference directly followed by a word character stays a numbered group.
fn to_expand_syntax(redirect: &str) -> String {
    let mut out = String::with_capacity(redirect.len() + 4);
    let mut chars = redirect.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '$' => match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    out.push_str("${");
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        out.push(d);
                        chars.next();
                    }
                    out.push('}');
                }
                Some('{') => out.push('$'),
                _ => out.push_str("$$"),
            },
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sling_resolver_api::ValueMap;

    fn entry(url: &str, order: i64, redirect: &str) -> MapEntry {
        MapEntry::new(url, -1, false, order, vec![redirect.to_string()]).unwrap()
    }

    #[test]
    fn test_pattern_is_anchored() {
        let e = entry("/foo", 0, "/bar");
        assert_eq!(e.pattern(), "^/foo");
        assert!(e.replace("/x/foo").is_none());
    }

    #[test]
    fn test_replace_keeps_unmatched_tail() {
        let e = entry("^[^/]+/[^/]+/foo(\\..*)", 0, "/content/bar$1");
        let out = e.replace("http/localhost.80/foo.print.html").unwrap();
        assert_eq!(out, vec!["/content/bar.print.html".to_string()]);

        let exact = entry("^[^/]+/[^/]+/foo$", 0, "/content/bar.html");
        assert_eq!(exact.replace("http/localhost.80/foo").unwrap()[0], "/content/bar.html");
        assert!(exact.replace("http/localhost.80/foo/x").is_none());
    }

    #[test]
    fn test_group_reference_followed_by_text() {
        let e = entry("^/a/(\\w+)", 0, "/b/$1x");
        assert_eq!(e.replace("/a/cd").unwrap()[0], "/b/cdx");
    }

    #[test]
    fn test_trailing_slash_is_optional() {
        let e = MapEntry::new("http/localhost.8080/", -1, true, 0, vec!["/content".into()]).unwrap();
        assert_eq!(e.pattern(), "^http/localhost.8080/?");
        assert_eq!(e.redirect(), &["/content/".to_string()]);
        assert_eq!(e.replace("http/localhost.8080/foo").unwrap()[0], "/content/foo");
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let err = MapEntry::new("/content/en-us-{132", -1, false, 0, vec!["/x".into()]);
        assert!(matches!(err, Err(ResolverError::Pattern { .. })));
    }

    #[test]
    fn test_ordering_length_then_order() {
        let short = entry("/ab", 0, "/x");
        let long = entry("/abcd", 0, "/x");
        let long_ordered = entry("/abce", 10, "/x");
        let mut all = vec![short.clone(), long.clone(), long_ordered.clone()];
        all.sort();
        assert_eq!(all, vec![long_ordered, long, short]);
    }

    #[test]
    fn test_resolve_entry_from_node() {
        let external = Resource::real(
            "/etc/map/http/example.com",
            ValueMap::new()
                .with(PROP_REDIRECT_EXTERNAL, "http://www.example.com/")
                .with(PROP_REDIRECT_EXTERNAL_STATUS, 301i64),
        );
        let e = MapEntry::create_resolve_entry("http/example.com/", &external, true)
            .unwrap()
            .unwrap();
        assert_eq!(e.pattern(), "^http/example.com.80/?");
        assert_eq!(e.status(), 301);

        let internal = Resource::real(
            "/etc/map/http/localhost.8080",
            ValueMap::new().with(PROP_REDIRECT_INTERNAL, "/content"),
        );
        let e = MapEntry::create_resolve_entry("http/localhost.8080/", &internal, true)
            .unwrap()
            .unwrap();
        assert!(e.is_internal());
        assert_eq!(e.redirect(), &["/content/".to_string()]);

        let neither = Resource::real("/etc/map/http", ValueMap::new());
        assert!(MapEntry::create_resolve_entry("http/", &neither, true).unwrap().is_none());
    }

    #[test]
    fn test_map_entries_from_node() {
        let node = Resource::real(
            "/etc/map/http/localhost.8080",
            ValueMap::new().with(
                PROP_REDIRECT_INTERNAL,
                vec!["/content".to_string(), "/content/(.*)".to_string()],
            ),
        );
        let entries = MapEntry::create_map_entries("http/localhost.8080/", &node, true).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].pattern(), "^/content/?");
        assert_eq!(entries[0].redirect(), &["http/localhost.8080/".to_string()]);

        let external = Resource::real(
            "/etc/map/http/old",
            ValueMap::new().with(PROP_REDIRECT_EXTERNAL, "http://new/"),
        );
        assert!(MapEntry::create_map_entries("http/old/", &external, true).is_none());
    }

    #[test]
    fn test_fix_uri_path() {
        assert_eq!(fix_uri_path("http/example.com/"), "http/example.com.80/");
        assert_eq!(fix_uri_path("https/example.com"), "https/example.com.443");
        assert_eq!(fix_uri_path("http/localhost.8080/"), "http/localhost.8080/");
        assert_eq!(fix_uri_path("http/[^/]+/a"), "http/[^/]+/a");
        assert_eq!(fix_uri_path("ftp/host/"), "ftp/host/");
    }
}
