#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docloops_core::{Collaborators, CycleController};
use docloops_eval::{
    EvaluationError, EvaluationResult, Evaluator, Grade, ImproveError, Improver, Metadata,
};
use docloops_logging::Logger;

/// Scores content by exact lookup; unknown content is an evaluator error
pub struct ScriptedEvaluator {
    scores: HashMap<String, u32>,
    recommendations: Vec<String>,
    pub calls: AtomicUsize,
}

impl ScriptedEvaluator {
    pub fn new(scores: &[(&str, u32)]) -> Self {
        Self {
            scores: scores.iter().map(|(c, s)| (c.to_string(), *s)).collect(),
            recommendations: vec!["Add more examples".to_string()],
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn evaluate(
        &self,
        content: &str,
        _doc_type: &str,
        _metadata: &Metadata,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = *self
            .scores
            .get(content)
            .ok_or_else(|| EvaluationError::Backend(format!("no score for {:?}", content)))?;

        Ok(EvaluationResult {
            total_score: score,
            max_score: 100,
            grade: Grade::from_score(score, 100),
            summary: format!("{} scored {}", content, score),
            category_scores: Default::default(),
            top_recommendations: self.recommendations.clone(),
        })
    }
}

/// Returns queued rewrites in order; `Err` entries become improver failures
pub struct ScriptedImprover {
    outputs: Mutex<VecDeque<Result<String, String>>>,
    pub focus_seen: Mutex<Vec<Vec<String>>>,
    /// Raised after the rewrite is produced, when set
    interrupt_after: Mutex<Option<Arc<AtomicBool>>>,
}

impl ScriptedImprover {
    pub fn new(outputs: &[&str]) -> Self {
        Self::with_results(outputs.iter().map(|o| Ok(o.to_string())).collect())
    }

    pub fn with_results(outputs: Vec<Result<String, String>>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            focus_seen: Mutex::new(Vec::new()),
            interrupt_after: Mutex::new(None),
        }
    }

    pub fn interrupt_on_call(&self, flag: Arc<AtomicBool>) {
        *self.interrupt_after.lock().unwrap() = Some(flag);
    }

    pub fn calls(&self) -> usize {
        self.focus_seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Improver for ScriptedImprover {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn improve(
        &self,
        _content: &str,
        _evaluation: &EvaluationResult,
        focus_areas: &[String],
        _metadata: &Metadata,
    ) -> Result<String, ImproveError> {
        self.focus_seen.lock().unwrap().push(focus_areas.to_vec());
        if let Some(flag) = self.interrupt_after.lock().unwrap().as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
        match self.outputs.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(ImproveError::Backend(e)),
            None => Err(ImproveError::Backend("script exhausted".into())),
        }
    }
}

pub fn controller(
    evaluator: &Arc<ScriptedEvaluator>,
    improver: &Arc<ScriptedImprover>,
) -> CycleController {
    let collaborators = Collaborators::new().register("readme", evaluator.clone(), improver.clone());
    CycleController::new(collaborators, Arc::new(Logger::quiet()))
}
