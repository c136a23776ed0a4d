//! Checkpoint bundle loading.
//!
//! A bundle directory holds `checkpoint.json` (label catalog + weights) and
//! `vocab.txt` (tokenizer vocabulary). Both are produced offline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::labels::LabelCatalog;
use super::model::{PooledLinearModel, PooledLinearWeights, SequenceClassifier};
use super::tokenizer::WordPieceTokenizer;
use crate::config::TRAINING_MAX_LENGTH;
use crate::error::ClassifierError;

pub const CHECKPOINT_FILE: &str = "checkpoint.json";
pub const VOCAB_FILE: &str = "vocab.txt";

fn default_training_max_length() -> usize {
    TRAINING_MAX_LENGTH
}

/// On-disk layout of `checkpoint.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    pub labels: LabelCatalog,
    /// Sequence length the training data was tokenized with.
    #[serde(default = "default_training_max_length")]
    pub training_max_length: usize,
    pub model: PooledLinearWeights,
}

/// A validated, loaded bundle.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub labels: LabelCatalog,
    pub training_max_length: usize,
    pub model: PooledLinearModel,
    pub tokenizer: WordPieceTokenizer,
}

impl Checkpoint {
    /// Assemble a bundle, checking that the head width matches the catalog and
    /// the vocabulary fits the embedding table.
    pub fn from_parts(
        file: CheckpointFile,
        tokenizer: WordPieceTokenizer,
    ) -> Result<Self, ClassifierError> {
        let model = PooledLinearModel::new(file.model)?;

        if model.num_labels() != file.labels.len() {
            return Err(ClassifierError::ModelUnavailable {
                reason: format!(
                    "classifier head has {} outputs but the catalog has {} labels",
                    model.num_labels(),
                    file.labels.len()
                ),
            });
        }
        if tokenizer.vocab_size() > model.vocab_size() {
            return Err(ClassifierError::ModelUnavailable {
                reason: format!(
                    "vocabulary has {} tokens but the embedding table has {} rows",
                    tokenizer.vocab_size(),
                    model.vocab_size()
                ),
            });
        }

        Ok(Self {
            labels: file.labels,
            training_max_length: file.training_max_length,
            model,
            tokenizer,
        })
    }

    /// Load `checkpoint.json` and `vocab.txt` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ClassifierError> {
        let checkpoint_path: PathBuf = dir.join(CHECKPOINT_FILE);
        let raw = std::fs::read_to_string(&checkpoint_path).map_err(|e| {
            ClassifierError::ModelUnavailable {
                reason: format!("failed to read {}: {e}", checkpoint_path.display()),
            }
        })?;
        let file: CheckpointFile =
            serde_json::from_str(&raw).map_err(|e| ClassifierError::ModelUnavailable {
                reason: format!("failed to parse {}: {e}", checkpoint_path.display()),
            })?;

        let tokenizer = WordPieceTokenizer::from_vocab_file(&dir.join(VOCAB_FILE))?;
        let checkpoint = Self::from_parts(file, tokenizer)?;

        tracing::info!(
            "Loaded checkpoint from {} ({} labels, {} vocab)",
            dir.display(),
            checkpoint.labels.len(),
            checkpoint.tokenizer.vocab_size()
        );
        Ok(checkpoint)
    }
}
