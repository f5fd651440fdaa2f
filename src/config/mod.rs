//! Configuration module
//!
//! Loads and validates the YAML file describing the eclipse, the exposure
//! tables and the runtime settings.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
