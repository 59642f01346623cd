pub mod error;
pub mod events;
pub mod factory;
pub mod logging;
pub mod mapping;
pub mod providers;
pub mod session;

pub use error::{ResolverError, Result};
pub use events::{EventBus, Subscription};
pub use factory::ResolverFactory;
pub use session::SessionResolver;
