//! Inference capability: turns tokenized input into per-label scores.

use serde::{Deserialize, Serialize};

use super::tokenizer::TokenizedInput;
use crate::error::ClassifierError;

/// A loaded sequence-classification model.
///
/// Implementations are read-only after construction and shared across
/// sessions.
pub trait SequenceClassifier: Send + Sync {
    /// Width of the classification head (one score per label).
    fn num_labels(&self) -> usize;

    /// Raw, unnormalized scores for one input.
    fn classify_raw(&self, input: &TokenizedInput) -> Result<Vec<f32>, ClassifierError>;
}

/// Weights of a pooled-embedding classifier.
///
/// Each token id selects a row of `embeddings`; rows of attended positions are
/// mean-pooled and fed through a dense head
/// (`classifier_weight · pooled + classifier_bias`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PooledLinearWeights {
    /// `[vocab_size][hidden]`
    pub embeddings: Vec<Vec<f32>>,
    /// `[num_labels][hidden]`
    pub classifier_weight: Vec<Vec<f32>>,
    /// `[num_labels]`
    pub classifier_bias: Vec<f32>,
}

/// Validated [`PooledLinearWeights`].
#[derive(Debug, Clone)]
pub struct PooledLinearModel {
    weights: PooledLinearWeights,
    hidden: usize,
}

impl PooledLinearModel {
    /// Validate tensor shapes.
    pub fn new(weights: PooledLinearWeights) -> Result<Self, ClassifierError> {
        let unavailable = |reason: String| ClassifierError::ModelUnavailable { reason };

        let hidden = weights
            .embeddings
            .first()
            .map(Vec::len)
            .ok_or_else(|| unavailable("embedding table is empty".into()))?;
        if hidden == 0 {
            return Err(unavailable("hidden size is zero".into()));
        }
        if let Some(row) = weights.embeddings.iter().position(|r| r.len() != hidden) {
            return Err(unavailable(format!(
                "embedding row {row} has width {}, expected {hidden}",
                weights.embeddings[row].len()
            )));
        }
        if weights.classifier_weight.is_empty() {
            return Err(unavailable("classifier head has no outputs".into()));
        }
        if let Some(row) = weights
            .classifier_weight
            .iter()
            .position(|r| r.len() != hidden)
        {
            return Err(unavailable(format!(
                "classifier row {row} has width {}, expected {hidden}",
                weights.classifier_weight[row].len()
            )));
        }
        if weights.classifier_bias.len() != weights.classifier_weight.len() {
            return Err(unavailable(format!(
                "classifier bias has {} entries for {} outputs",
                weights.classifier_bias.len(),
                weights.classifier_weight.len()
            )));
        }

        Ok(Self { weights, hidden })
    }

    pub fn vocab_size(&self) -> usize {
        self.weights.embeddings.len()
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }
}

impl SequenceClassifier for PooledLinearModel {
    fn num_labels(&self) -> usize {
        self.weights.classifier_weight.len()
    }

    fn classify_raw(&self, input: &TokenizedInput) -> Result<Vec<f32>, ClassifierError> {
        if input.input_ids.len() != input.attention_mask.len() {
            return Err(ClassifierError::Inference {
                reason: "input ids and attention mask differ in length".into(),
            });
        }

        let mut pooled = vec![0f32; self.hidden];
        let mut attended = 0usize;
        for (&id, &mask) in input.input_ids.iter().zip(&input.attention_mask) {
            if mask == 0 {
                continue;
            }
            let row = self
                .weights
                .embeddings
                .get(id as usize)
                .ok_or_else(|| ClassifierError::Inference {
                    reason: format!("token id {id} outside embedding table"),
                })?;
            for (acc, v) in pooled.iter_mut().zip(row) {
                *acc += v;
            }
            attended += 1;
        }
        if attended == 0 {
            return Err(ClassifierError::Inference {
                reason: "input has no attended tokens".into(),
            });
        }
        let scale = 1.0 / attended as f32;
        for v in &mut pooled {
            *v *= scale;
        }

        Ok(self
            .weights
            .classifier_weight
            .iter()
            .zip(&self.weights.classifier_bias)
            .map(|(row, bias)| bias + row.iter().zip(&pooled).map(|(w, x)| w * x).sum::<f32>())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> PooledLinearWeights {
        PooledLinearWeights {
            embeddings: vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            classifier_weight: vec![vec![2.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]],
            classifier_bias: vec![0.0, 0.5, -1.0],
        }
    }

    #[test]
    fn mean_pools_attended_positions_only() {
        let model = PooledLinearModel::new(weights()).unwrap();
        let input = TokenizedInput {
            input_ids: vec![1, 2, 1, 0],
            attention_mask: vec![1, 1, 0, 0],
        };
        let scores = model.classify_raw(&input).unwrap();
        // pooled = [0.5, 0.5]
        assert_eq!(scores, vec![1.0, 1.5, 0.0]);
        assert_eq!(model.num_labels(), 3);
        assert_eq!(model.hidden_size(), 2);
        assert_eq!(model.vocab_size(), 3);
    }

    #[test]
    fn out_of_range_token_is_inference_error() {
        let model = PooledLinearModel::new(weights()).unwrap();
        let input = TokenizedInput {
            input_ids: vec![7],
            attention_mask: vec![1],
        };
        assert!(matches!(
            model.classify_raw(&input),
            Err(ClassifierError::Inference { .. })
        ));
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let mut w = weights();
        w.classifier_bias.pop();
        assert!(matches!(
            PooledLinearModel::new(w),
            Err(ClassifierError::ModelUnavailable { .. })
        ));

        let mut w = weights();
        w.embeddings[1].push(3.0);
        assert!(PooledLinearModel::new(w).is_err());

        let mut w = weights();
        w.classifier_weight[0] = vec![1.0];
        assert!(PooledLinearModel::new(w).is_err());
    }
}
