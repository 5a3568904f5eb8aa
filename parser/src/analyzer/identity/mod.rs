mod builder;
mod timeline;

pub use builder::*;
pub use timeline::*;
