pub mod context;
pub mod info;
pub mod provider;
pub mod query;

pub use context::{AUTH_ADMINISTRATIVE, AUTH_PASSWORD, AUTH_USER, AuthenticationInfo, ParentProvider, ProviderState, ResolveContext};
pub use info::{AuthType, ProviderInfo};
pub use provider::{HandleId, ProviderHandle, ResourceProvider};
pub use query::Query;
