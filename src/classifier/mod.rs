//! Intent classification.
//!
//! `IntentClassifier` tokenizes a draft, runs the checkpoint's model, and
//! normalizes the scores into a probability for every label in the catalog.
//! The loaded classifier is shared read-only across sessions through
//! [`SharedClassifier`], which loads it at most once.

pub mod checkpoint;
pub mod labels;
pub mod model;
pub mod shared;
pub mod tokenizer;

pub use checkpoint::Checkpoint;
pub use labels::LabelCatalog;
pub use model::{PooledLinearModel, PooledLinearWeights, SequenceClassifier};
pub use shared::{CheckpointLoader, ClassifierLoader, SharedClassifier};
pub use tokenizer::{TokenizedInput, Tokenize, WordPieceTokenizer};

use serde::{Deserialize, Serialize};

use crate::config::INTERACTIVE_MAX_LENGTH;
use crate::error::ClassifierError;

/// Probability assigned to one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProbability {
    pub label: String,
    pub probability: f32,
}

/// Outcome of classifying one draft. Replaced wholesale on re-analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Winning label, always a catalog member.
    pub label: String,
    /// Probability of the winning label.
    pub confidence: f32,
    /// One entry per catalog label, in catalog order.
    pub distribution: Vec<LabelProbability>,
}

impl ClassificationResult {
    pub fn probability(&self, label: &str) -> Option<f32> {
        self.distribution
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }

    /// Distribution ordered from most to least likely.
    pub fn ranked(&self) -> Vec<&LabelProbability> {
        let mut ranked: Vec<&LabelProbability> = self.distribution.iter().collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked
    }
}

/// A loaded classifier: catalog, tokenizer and model.
pub struct IntentClassifier {
    labels: LabelCatalog,
    tokenizer: Box<dyn Tokenize>,
    model: Box<dyn SequenceClassifier>,
    max_length: usize,
}

impl std::fmt::Debug for IntentClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentClassifier")
            .field("labels", &self.labels)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl IntentClassifier {
    pub fn new(
        labels: LabelCatalog,
        tokenizer: Box<dyn Tokenize>,
        model: Box<dyn SequenceClassifier>,
        max_length: usize,
    ) -> Result<Self, ClassifierError> {
        if model.num_labels() != labels.len() {
            return Err(ClassifierError::ModelUnavailable {
                reason: format!(
                    "model emits {} scores for {} labels",
                    model.num_labels(),
                    labels.len()
                ),
            });
        }
        Ok(Self {
            labels,
            tokenizer,
            model,
            max_length,
        })
    }

    /// Build from a loaded checkpoint bundle.
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        max_length: usize,
    ) -> Result<Self, ClassifierError> {
        if checkpoint.training_max_length != max_length {
            tracing::info!(
                "Interactive max length {} differs from training max length {}",
                max_length,
                checkpoint.training_max_length
            );
        }
        Self::new(
            checkpoint.labels,
            Box::new(checkpoint.tokenizer),
            Box::new(checkpoint.model),
            max_length,
        )
    }

    /// Build from a checkpoint with the interactive length.
    pub fn from_checkpoint_default(checkpoint: Checkpoint) -> Result<Self, ClassifierError> {
        Self::from_checkpoint(checkpoint, INTERACTIVE_MAX_LENGTH)
    }

    pub fn labels(&self) -> &LabelCatalog {
        &self.labels
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Classify a draft. Deterministic for fixed weights and text.
    pub fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        let input = self.tokenizer.encode(text, self.max_length)?;
        tracing::debug!("Classifying {} tokens", input.real_len());

        let scores = self.model.classify_raw(&input)?;
        if scores.len() != self.labels.len() {
            return Err(ClassifierError::Inference {
                reason: format!(
                    "model returned {} scores for {} labels",
                    scores.len(),
                    self.labels.len()
                ),
            });
        }

        let probabilities = softmax(&scores)?;
        let winner = argmax(&probabilities);

        let distribution: Vec<LabelProbability> = self
            .labels
            .iter()
            .zip(&probabilities)
            .map(|(label, &probability)| LabelProbability {
                label: label.to_string(),
                probability,
            })
            .collect();

        let label = self
            .labels
            .label(winner)
            .ok_or_else(|| ClassifierError::Inference {
                reason: format!("winning index {winner} outside catalog"),
            })?
            .to_string();

        Ok(ClassificationResult {
            label,
            confidence: probabilities[winner],
            distribution,
        })
    }
}

/// Normalized exponential over raw scores.
pub fn softmax(scores: &[f32]) -> Result<Vec<f32>, ClassifierError> {
    if scores.is_empty() {
        return Err(ClassifierError::Inference {
            reason: "no scores to normalize".into(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ClassifierError::Inference {
            reason: "model produced non-finite scores".into(),
        });
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}

/// Index of the largest value; the first one wins ties.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
