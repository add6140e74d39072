//! Schema documents and the live node registry built from them.

pub mod envelope;
pub mod registry;

pub use envelope::{Schema, SchemaMetadata, DEFAULT_SCHEMA_VERSION};
pub use registry::NodeRegistry;
