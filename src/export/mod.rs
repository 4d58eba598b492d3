//! Model export and serialization module
//!
//! Trained models are persisted as self-contained artifacts: the classifier,
//! the frozen preprocessing state and readable metadata in one checksummed file.

mod serializer;

pub use serializer::{ModelArtifact, ModelMetadata};
