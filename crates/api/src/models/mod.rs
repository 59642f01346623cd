pub mod path;
pub mod resource;
pub mod value;

pub use resource::*;
pub use value::*;
