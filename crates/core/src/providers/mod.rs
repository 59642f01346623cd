//! Mounting and federation of resource providers.

pub mod memory;
pub mod stateful;
pub mod storage;
pub mod tree;

pub use memory::{ContentSnapshot, MemoryResourceProvider};
pub use stateful::{
    AuthenticatedResourceProvider, CombinedResourceProvider, ResourceProviderAuthenticator, StatefulResourceProvider,
};
pub use storage::ProviderStorage;
pub use tree::PathTree;
