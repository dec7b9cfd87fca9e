// File system operations for persisting history and trained models
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::classifier::TrainedModel;
use crate::signal::EegSample;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse stored data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
    #[error("Model hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: String, found: String },
    #[error("History record {0} has no event label")]
    Unlabelled(usize),
}

pub type StorageResult<T> = Result<T, StorageError>;

const HISTORY_FILE: &str = "history.json";
const MODEL_FILE: &str = "model.json";
const MODEL_META_FILE: &str = "model_meta.json";

/// Describes a saved model; kept next to the model blob so a corrupted
/// or hand-edited blob is rejected at load time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub id: uuid::Uuid,
    pub model_type: String,
    pub n_samples: usize,
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub class_counts: Vec<(crate::signal::EventKind, usize)>,
    /// SHA256 of the serialized model blob
    pub sha256: String,
}

/// Get the app data directory for MindLink
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    let mindlink_dir = data_dir.join("com.mindlink.app");
    fs::create_dir_all(&mindlink_dir)?;
    Ok(mindlink_dir)
}

/// Directory holding the persisted history file
pub fn get_history_dir() -> StorageResult<PathBuf> {
    let dir = get_app_data_dir()?.join("history");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Directory holding the persisted model blob and metadata
pub fn get_model_dir() -> StorageResult<PathBuf> {
    let dir = get_app_data_dir()?.join("model");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write the labelled history to `dir/history.json`
pub fn save_history(dir: &Path, samples: &[EegSample]) -> StorageResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(HISTORY_FILE);
    let json = serde_json::to_string_pretty(samples)?;
    fs::write(&path, json)?;
    log::info!("Saved {} history samples to {}", samples.len(), path.display());
    Ok(path)
}

/// Load history from `dir/history.json`. Fails closed: a file containing
/// any unlabelled record is rejected whole rather than partially loaded.
pub fn load_history(dir: &Path) -> StorageResult<Vec<EegSample>> {
    let path = dir.join(HISTORY_FILE);
    let json = fs::read_to_string(&path)?;
    let samples: Vec<EegSample> = serde_json::from_str(&json)?;

    for (i, sample) in samples.iter().enumerate() {
        if sample.event_name.is_none() {
            return Err(StorageError::Unlabelled(i));
        }
    }
    Ok(samples)
}

/// Write a trained model and its metadata into `dir`
pub fn save_model(dir: &Path, model: &TrainedModel) -> StorageResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let blob = serde_json::to_vec(model)?;
    let hash = calculate_sha256(&blob);

    let model_path = dir.join(MODEL_FILE);
    fs::write(&model_path, &blob)?;

    let meta = ModelMetadata {
        id: model.id,
        model_type: model.model_type.clone(),
        n_samples: model.n_samples,
        train_accuracy: model.train_accuracy,
        test_accuracy: model.test_accuracy,
        trained_at: model.trained_at,
        class_counts: model.class_counts.clone(),
        sha256: hash,
    };
    let meta_path = dir.join(MODEL_META_FILE);
    fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;

    log::info!("Saved model {} to {}", model.id, model_path.display());
    Ok(model_path)
}

/// Load a model from `dir`, verifying the blob against the stored hash
pub fn load_model(dir: &Path) -> StorageResult<TrainedModel> {
    let meta_json = fs::read_to_string(dir.join(MODEL_META_FILE))?;
    let meta: ModelMetadata = serde_json::from_str(&meta_json)?;

    let blob = fs::read(dir.join(MODEL_FILE))?;
    let found = calculate_sha256(&blob);
    if found != meta.sha256 {
        return Err(StorageError::HashMismatch {
            expected: meta.sha256,
            found,
        });
    }

    let model: TrainedModel = serde_json::from_slice(&blob)?;
    Ok(model)
}

/// Read saved model metadata without deserializing the blob
pub fn load_model_metadata(dir: &Path) -> StorageResult<ModelMetadata> {
    let meta_json = fs::read_to_string(dir.join(MODEL_META_FILE))?;
    Ok(serde_json::from_str(&meta_json)?)
}
