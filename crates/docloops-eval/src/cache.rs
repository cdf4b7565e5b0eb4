use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::fingerprint::fingerprint;
use crate::model::{EvaluationResult, Metadata};
use crate::traits::{EvaluationError, Evaluator};

/// Memoizes an evaluator by `(content fingerprint, doc_type)`.
///
/// Only successful, non-degraded results are cached, so a transient backend
/// failure is retried on the next call.
pub struct CachingEvaluator {
    inner: Arc<dyn Evaluator>,
    name: String,
    entries: Mutex<HashMap<(String, String), EvaluationResult>>,
}

impl CachingEvaluator {
    pub fn new(inner: Arc<dyn Evaluator>) -> Self {
        let name = format!("{} (cached)", inner.name());
        Self {
            inner,
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &(String, String)) -> Option<EvaluationResult> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl Evaluator for CachingEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        content: &str,
        doc_type: &str,
        metadata: &Metadata,
    ) -> Result<EvaluationResult, EvaluationError> {
        let key = (fingerprint(content), doc_type.to_string());

        if let Some(cached) = self.lookup(&key) {
            debug!(doc_type, hash = %&key.0[..12], "Evaluation cache hit");
            return Ok(cached);
        }

        let result = self.inner.evaluate(content, doc_type, metadata).await?;

        if !result.is_failed() {
            if let Ok(mut entries) = self.entries.lock() {
                entries.insert(key, result.clone());
            }
        }

        Ok(result)
    }
}
