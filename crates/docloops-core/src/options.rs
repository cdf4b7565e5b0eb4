use serde::{Deserialize, Serialize};

use crate::CycleError;

/// Score at which a cycle stops regardless of other settings
pub const SCORE_CEILING: u32 = 95;

/// Per-cycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleOptions {
    /// Improvement iterations to attempt; 0 only evaluates
    pub max_iterations: usize,
    /// An iteration must gain strictly more than this to continue
    pub min_improvement: f64,
    /// Stop as soon as the score reaches this value
    pub target_score: Option<f64>,
    /// Categories to focus every rewrite on, overriding recommendations
    pub focus_categories: Option<Vec<String>>,
    /// Record to history and write the results archive
    pub save_results: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            min_improvement: 0.0,
            target_score: None,
            focus_categories: None,
            save_results: true,
        }
    }
}

impl CycleOptions {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    pub fn with_target_score(mut self, target_score: f64) -> Self {
        self.target_score = Some(target_score);
        self
    }

    pub fn with_focus_categories(mut self, categories: Vec<String>) -> Self {
        self.focus_categories = Some(categories);
        self
    }

    pub fn without_saving(mut self) -> Self {
        self.save_results = false;
        self
    }

    pub fn validate(&self) -> Result<(), CycleError> {
        if !self.min_improvement.is_finite() {
            return Err(CycleError::Configuration(
                "min_improvement must be a finite number".to_string(),
            ));
        }
        if let Some(target) = self.target_score {
            if !target.is_finite() || target < 0.0 {
                return Err(CycleError::Configuration(format!(
                    "target_score must be a non-negative number, got {}",
                    target
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn target_reached(&self, score: u32) -> bool {
        self.target_score
            .is_some_and(|target| f64::from(score) >= target)
    }
}
