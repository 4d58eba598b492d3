//! Model artifact serialization
//!
//! An artifact bundles a trained classifier with the frozen preprocessing
//! state it was trained behind. On disk it is a bincode envelope carrying
//! magic bytes, a format version, readable metadata and the model payload
//! guarded by an FNV-1a checksum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, ThyroidError};
use crate::preprocessing::{DiagnosticClass, FittedPreprocessor};
use crate::training::{Classifier, ModelKind, ModelMetrics, TrainedModel};

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Display name of the classifier
    pub name: String,
    pub model_kind: ModelKind,
    /// Version of the crate that wrote the artifact
    pub crate_version: String,
    pub trained_at: DateTime<Utc>,
    /// Frozen feature column layout
    pub feature_names: Vec<String>,
    /// Class names in label-code order
    pub classes: Vec<String>,
    /// Rows the model was fitted on, after balancing
    pub n_training_samples: usize,
    /// Validation-partition metrics
    pub metrics: Option<ModelMetrics>,
}

impl ModelMetadata {
    pub fn new(kind: ModelKind, preprocessor: &FittedPreprocessor) -> Self {
        let schema = preprocessor.schema();
        Self {
            name: kind.display_name().to_string(),
            model_kind: kind,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            feature_names: schema.feature_names.clone(),
            classes: schema
                .labels
                .classes()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            n_training_samples: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ModelMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_training_samples(mut self, n: usize) -> Self {
        self.n_training_samples = n;
        self
    }
}

/// Bincode payload inside the envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactPayload {
    preprocessor: FittedPreprocessor,
    model: TrainedModel,
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedModel {
    /// Magic bytes for format detection
    magic: [u8; 4],
    /// Format version
    format_version: u32,
    metadata: ModelMetadata,
    /// Serialized model data
    model_data: Vec<u8>,
    /// Checksum for integrity verification
    checksum: u64,
}

impl SerializedModel {
    /// Magic bytes for thyroid model files
    const MAGIC: [u8; 4] = [b'T', b'H', b'Y', b'M'];
    /// Current format version
    const VERSION: u32 = 1;

    fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = compute_checksum(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    /// Verify checksum
    fn verify_checksum(&self) -> bool {
        compute_checksum(&self.model_data) == self.checksum
    }
}

/// FNV-1a hash
fn compute_checksum(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A trained classifier together with everything needed to use it
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub preprocessor: FittedPreprocessor,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(model: TrainedModel, preprocessor: FittedPreprocessor) -> Self {
        let metadata = ModelMetadata::new(model.kind(), &preprocessor);
        Self {
            metadata,
            preprocessor,
            model,
        }
    }

    pub fn with_metadata(mut self, f: impl FnOnce(ModelMetadata) -> ModelMetadata) -> Self {
        self.metadata = f(self.metadata);
        self
    }

    /// Artifact file name for this model
    pub fn file_name(&self) -> String {
        self.metadata.model_kind.file_name()
    }

    /// Encode the envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = ArtifactPayload {
            preprocessor: self.preprocessor.clone(),
            model: self.model.clone(),
        };
        let model_data = bincode::serialize(&payload)?;
        let envelope = SerializedModel::new(self.metadata.clone(), model_data);
        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode and validate an envelope. `origin` names the source in errors.
    pub fn from_bytes(bytes: &[u8], origin: &Path) -> Result<Self> {
        let envelope: SerializedModel = bincode::deserialize(bytes)
            .map_err(|e| ThyroidError::artifact(origin, format!("unreadable envelope: {e}")))?;

        if envelope.magic != SerializedModel::MAGIC {
            return Err(ThyroidError::artifact(origin, "not a thyroid model file"));
        }
        if envelope.format_version != SerializedModel::VERSION {
            return Err(ThyroidError::artifact(
                origin,
                format!(
                    "format version {} is not supported (expected {})",
                    envelope.format_version,
                    SerializedModel::VERSION
                ),
            ));
        }
        if !envelope.verify_checksum() {
            return Err(ThyroidError::artifact(
                origin,
                "checksum verification failed, file may be corrupted",
            ));
        }

        let payload: ArtifactPayload = bincode::deserialize(&envelope.model_data)
            .map_err(|e| ThyroidError::artifact(origin, format!("unreadable model payload: {e}")))?;

        Ok(Self {
            metadata: envelope.metadata,
            preprocessor: payload.preprocessor,
            model: payload.model,
        })
    }

    /// Write to `dir`, creating it if needed; returns the artifact path
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        self.save(&path)?;
        Ok(path)
    }

    /// Write to an explicit path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        info!(path = %path.display(), bytes = bytes.len(), model = %self.metadata.name, "model saved");
        Ok(())
    }

    /// Read and validate an artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ThyroidError::artifact(path, format!("cannot open: {e}")))?;
        let mut bytes = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|e| ThyroidError::artifact(path, format!("cannot read: {e}")))?;

        let artifact = Self::from_bytes(&bytes, path)?;
        debug!(
            path = %path.display(),
            model = %artifact.metadata.name,
            trained_at = %artifact.metadata.trained_at,
            "model loaded"
        );
        Ok(artifact)
    }

    /// Class names in label-code order
    pub fn classes(&self) -> &[DiagnosticClass] {
        self.preprocessor.schema().labels.classes()
    }

    /// Shortcut for the wrapped model
    pub fn classifier(&self) -> &dyn Classifier {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_fnv1a() {
        // Published FNV-1a 64-bit vectors
        assert_eq!(compute_checksum(b""), 0xcbf29ce484222325);
        assert_eq!(compute_checksum(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_garbage_is_artifact_error() {
        let err = ModelArtifact::from_bytes(b"not a model", Path::new("x.model")).unwrap_err();
        assert!(matches!(err, ThyroidError::ModelArtifact { .. }));
        assert!(err.to_string().contains("Retrain"));
    }

    #[test]
    fn test_missing_file_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(dir.path().join("Decision_Tree.model")).unwrap_err();
        assert!(matches!(err, ThyroidError::ModelArtifact { .. }));
    }
}
