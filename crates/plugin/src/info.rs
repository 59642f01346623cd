use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// When a provider has to be authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    /// Never authenticated; the resolve context carries no state.
    #[default]
    No,
    /// Authenticated on first use.
    Lazy,
    /// Authenticated when the resolver session is opened.
    Required,
}

/// Registration metadata of a mounted provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub name: String,
    /// Mount point.
    pub path: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub modifiable: bool,
    #[serde(default)]
    pub refreshable: bool,
    /// Answers language based queries.
    #[serde(default)]
    pub queryable: bool,
    /// Answers native [`crate::Query`] objects.
    #[serde(default)]
    pub native_query: bool,
    #[serde(default)]
    pub attributable: bool,
    #[serde(default)]
    pub adaptable: bool,
    #[serde(default)]
    pub ranking: i32,
}

impl ProviderInfo {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            auth_type: AuthType::No,
            modifiable: false,
            refreshable: false,
            queryable: false,
            native_query: false,
            attributable: false,
            adaptable: false,
            ranking: 0,
        }
    }

    pub fn with_auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    pub fn with_modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    pub fn with_refreshable(mut self, refreshable: bool) -> Self {
        self.refreshable = refreshable;
        self
    }

    pub fn with_queryable(mut self, queryable: bool) -> Self {
        self.queryable = queryable;
        self
    }

    pub fn with_native_query(mut self, native_query: bool) -> Self {
        self.native_query = native_query;
        self
    }

    pub fn with_attributable(mut self, attributable: bool) -> Self {
        self.attributable = attributable;
        self
    }

    pub fn with_adaptable(mut self, adaptable: bool) -> Self {
        self.adaptable = adaptable;
        self
    }

    pub fn with_ranking(mut self, ranking: i32) -> Self {
        self.ranking = ranking;
        self
    }

    /// Registration order: mount path, then ranking, then name.
    pub fn compare_mount(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.ranking.cmp(&other.ranking))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [path={}, authType={:?}]", self.name, self.path, self.auth_type)
    }
}
