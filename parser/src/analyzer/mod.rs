#[allow(clippy::module_inception)]
mod analyzer;
pub mod attributor;
pub mod catalog;
pub mod change_dump;
pub mod identity;
pub mod survey;

pub use analyzer::Analyzer;
