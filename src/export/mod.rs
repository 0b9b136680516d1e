//! Model export and serialization module
//!
//! The best fitted pipeline is persisted as JSON with its run metadata.

mod serializer;

pub use serializer::{ModelMetadata, PersistedModel, FORMAT_VERSION};
