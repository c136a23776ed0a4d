//! Label catalog: the ordered set of intents a checkpoint can emit.

use serde::{Deserialize, Serialize};

/// Ordered intent categories. Position `i` corresponds to model output `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelCatalog {
    labels: Vec<String>,
}

impl LabelCatalog {
    /// Build a catalog, rejecting empty, blank or duplicate labels.
    pub fn new<I, S>(labels: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err("label catalog is empty".to_string());
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(format!("label at index {i} is blank"));
            }
            if labels[..i].contains(label) {
                return Err(format!("duplicate label {label:?}"));
            }
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label for a model output index.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Model output index for a label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for LabelCatalog {
    type Error = String;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<LabelCatalog> for Vec<String> {
    fn from(catalog: LabelCatalog) -> Self {
        catalog.labels
    }
}
