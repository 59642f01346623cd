pub mod error;
pub mod event;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use error::{LoginError, PersistenceError};
pub use event::{Event, EventAdmin, EventFilter, EventHandler, Topic};
pub use models::*;
pub use resolver::ResourceResolver;
