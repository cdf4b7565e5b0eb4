use docloops_eval::{Evaluator, Improver};
use std::collections::HashMap;
use std::sync::Arc;

use crate::CycleError;

/// Evaluator and improver serving one document type
#[derive(Clone)]
pub struct Registration {
    pub evaluator: Arc<dyn Evaluator>,
    pub improver: Arc<dyn Improver>,
}

/// Explicit `doc_type -> (evaluator, improver)` map handed to the controller
#[derive(Clone, Default)]
pub struct Collaborators {
    entries: HashMap<String, Registration>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register collaborators for `doc_type`, replacing any earlier ones
    pub fn register(
        mut self,
        doc_type: impl Into<String>,
        evaluator: Arc<dyn Evaluator>,
        improver: Arc<dyn Improver>,
    ) -> Self {
        self.entries
            .insert(doc_type.into(), Registration { evaluator, improver });
        self
    }

    pub fn get(&self, doc_type: &str) -> Result<&Registration, CycleError> {
        self.entries.get(doc_type).ok_or_else(|| {
            CycleError::Configuration(format!(
                "No evaluator/improver registered for document type '{}'",
                doc_type
            ))
        })
    }

    pub fn contains(&self, doc_type: &str) -> bool {
        self.entries.contains_key(doc_type)
    }

    /// Registered document types, sorted
    pub fn doc_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
