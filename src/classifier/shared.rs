//! Initialize-once classifier shared by every session in the process.

use std::sync::Arc;

use tokio::sync::OnceCell;

use super::{Checkpoint, ClassificationResult, IntentClassifier};
use crate::config::ClassifierConfig;
use crate::error::ClassifierError;

/// Produces a classifier. Called at most once per successful load.
pub trait ClassifierLoader: Send + Sync + 'static {
    fn load(&self) -> Result<IntentClassifier, ClassifierError>;
}

/// Loads a checkpoint bundle from disk.
#[derive(Debug, Clone)]
pub struct CheckpointLoader {
    config: ClassifierConfig,
}

impl CheckpointLoader {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

impl ClassifierLoader for CheckpointLoader {
    fn load(&self) -> Result<IntentClassifier, ClassifierError> {
        let checkpoint = Checkpoint::load(&self.config.checkpoint_dir)?;
        IntentClassifier::from_checkpoint(checkpoint, self.config.max_length)
    }
}

/// Lazily loaded, read-only classifier.
///
/// Concurrent first callers share a single load. A failed load leaves the cell
/// empty so a later call can try again.
pub struct SharedClassifier {
    loader: Arc<dyn ClassifierLoader>,
    cell: OnceCell<Arc<IntentClassifier>>,
}

impl SharedClassifier {
    pub fn new(loader: Arc<dyn ClassifierLoader>) -> Self {
        Self {
            loader,
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-loaded classifier.
    pub fn preloaded(classifier: IntentClassifier) -> Self {
        struct Unreachable;
        impl ClassifierLoader for Unreachable {
            fn load(&self) -> Result<IntentClassifier, ClassifierError> {
                Err(ClassifierError::ModelUnavailable {
                    reason: "preloaded classifier has no loader".into(),
                })
            }
        }

        Self {
            loader: Arc::new(Unreachable),
            cell: OnceCell::new_with(Some(Arc::new(classifier))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Get the classifier, loading it on first use.
    pub async fn get(&self) -> Result<Arc<IntentClassifier>, ClassifierError> {
        let classifier = self
            .cell
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                tracing::info!("Loading intent classifier");
                let loaded = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ClassifierError::ModelUnavailable {
                        reason: format!("classifier load task failed: {e}"),
                    })?;
                match loaded {
                    Ok(classifier) => Ok(Arc::new(classifier)),
                    Err(e) => {
                        tracing::warn!("Intent classifier unavailable: {}", e);
                        Err(e)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(classifier))
    }

    /// Classify on the blocking pool so inference never stalls the runtime.
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifierError> {
        let classifier = self.get().await?;
        let text = text.to_string();
        tokio::task::spawn_blocking(move || classifier.classify(&text))
            .await
            .map_err(|e| ClassifierError::Inference {
                reason: format!("inference task failed: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::classifier::{LabelCatalog, PooledLinearModel, PooledLinearWeights, WordPieceTokenizer};

    struct CountingLoader {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl CountingLoader {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
            }
        }
    }

    impl ClassifierLoader for CountingLoader {
        fn load(&self) -> Result<IntentClassifier, ClassifierError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            // Widen the window for concurrent callers.
            std::thread::sleep(std::time::Duration::from_millis(20));
            if call < self.fail_first {
                return Err(ClassifierError::ModelUnavailable {
                    reason: "checkpoint not downloaded yet".into(),
                });
            }
            let tokenizer =
                WordPieceTokenizer::from_tokens(["[PAD]", "[UNK]", "[CLS]", "[SEP]"]).unwrap();
            let model = PooledLinearModel::new(PooledLinearWeights {
                embeddings: vec![vec![1.0]; 4],
                classifier_weight: vec![vec![1.0], vec![-1.0]],
                classifier_bias: vec![0.0, 0.0],
            })
            .unwrap();
            IntentClassifier::new(
                LabelCatalog::new(["inquiry", "sales"]).unwrap(),
                Box::new(tokenizer),
                Box::new(model),
                8,
            )
        }
    }

    #[tokio::test]
    async fn concurrent_first_use_loads_once() {
        let loader = Arc::new(CountingLoader::new(0));
        let shared = Arc::new(SharedClassifier::new(loader.clone()));

        let a = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move { shared.get().await }
        });
        let b = tokio::spawn({
            let shared = Arc::clone(&shared);
            async move { shared.get().await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(shared.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_can_be_retried() {
        let loader = Arc::new(CountingLoader::new(1));
        let shared = SharedClassifier::new(loader.clone());

        let err = shared.classify("hello").await.unwrap_err();
        assert!(matches!(err, ClassifierError::ModelUnavailable { .. }));
        assert!(!shared.is_loaded());

        let result = shared.classify("hello").await.unwrap();
        assert_eq!(result.label, "inquiry");
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn checkpoint_loader_reports_missing_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let loader = CheckpointLoader::new(ClassifierConfig {
            checkpoint_dir: dir.path().join("missing"),
            max_length: 64,
        });
        let shared = SharedClassifier::new(Arc::new(loader));
        assert!(matches!(
            shared.get().await,
            Err(ClassifierError::ModelUnavailable { .. })
        ));
    }
}
