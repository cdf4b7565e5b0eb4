use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use docloops_eval::{short_fingerprint, EvaluationResult, Evaluator, FocusAreaSelector, Metadata};
use docloops_git::TextDiff;
use docloops_history::{CycleInput, EvaluationInput, HistoryStore, ImprovementInput};
use docloops_logging::{LogEvent, Logger};

use crate::archive::CycleArchive;
use crate::collaborators::{Collaborators, Registration};
use crate::document::Document;
use crate::error::CycleError;
use crate::improvement::{ImprovementDetails, ImprovementResult};
use crate::options::{CycleOptions, SCORE_CEILING};
use crate::records::{CycleRecord, FailedAttempt, IterationRecord, StopReason};

/// Drives the evaluate, improve, re-evaluate cycle for single documents.
///
/// Cheap to clone: every clone shares the collaborators, history, archive
/// and interrupt flag, so one controller can run many documents
/// concurrently.
#[derive(Clone)]
pub struct CycleController {
    collaborators: Arc<Collaborators>,
    logger: Arc<Logger>,
    history: Option<Arc<HistoryStore>>,
    archive: Option<CycleArchive>,
    text_diff: TextDiff,
    interrupted: Arc<AtomicBool>,
}

impl CycleController {
    pub fn new(collaborators: Collaborators, logger: Arc<Logger>) -> Self {
        Self {
            collaborators: Arc::new(collaborators),
            logger,
            history: None,
            archive: None,
            text_diff: TextDiff::new(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_archive(mut self, archive: CycleArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    pub fn history(&self) -> Option<&Arc<HistoryStore>> {
        self.history.as_ref()
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Evaluate a document once. Evaluator failures come back as a degraded
    /// zero score; only an unregistered document type is an error.
    ///
    /// With history attached the evaluation is recorded under
    /// `metadata["doc_id"]`, or a content fingerprint when absent.
    pub async fn evaluate(
        &self,
        content: &str,
        doc_type: &str,
        metadata: &Metadata,
    ) -> Result<(EvaluationResult, BTreeMap<String, f64>), CycleError> {
        let registration = self.collaborators.get(doc_type)?;
        let evaluation = self
            .assess(registration.evaluator.as_ref(), content, doc_type, metadata, 0)
            .await;

        if let Some(history) = &self.history {
            let doc_id = metadata
                .get("doc_id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| short_fingerprint(content));
            history.add_evaluation(EvaluationInput {
                doc_type,
                doc_id: &doc_id,
                evaluation: &evaluation,
                content: Some(content),
                metadata,
            });
        }

        let metrics = evaluation.metrics();
        Ok((evaluation, metrics))
    }

    /// Run a single rewrite against an existing evaluation. The result has
    /// no `eval_after`; re-evaluate with [`evaluate`](Self::evaluate).
    pub async fn improve(
        &self,
        content: &str,
        evaluation: &EvaluationResult,
        doc_type: &str,
        metadata: &Metadata,
    ) -> Result<ImprovementResult, CycleError> {
        let registration = self.collaborators.get(doc_type)?;
        let focus_areas = FocusAreaSelector::select(evaluation, None);

        let improved = registration
            .improver
            .improve(content, evaluation, &focus_areas, metadata)
            .await?;

        let details = ImprovementDetails::compute(content, &improved, &focus_areas, &self.text_diff);
        Ok(ImprovementResult {
            original_content: content.to_string(),
            improved_content: improved,
            details,
            eval_before: evaluation.clone(),
            eval_after: None,
        })
    }

    /// Run a full cycle. Always returns a record holding the best content
    /// seen; the only error is a configuration problem detected up front.
    pub async fn run_cycle(
        &self,
        document: Document,
        options: &CycleOptions,
    ) -> Result<CycleRecord, CycleError> {
        options.validate()?;
        let registration = self.collaborators.get(&document.doc_type)?.clone();

        let mut run = CycleRun::start(self, document, options);
        let stop_reason = run.drive(&registration).await;
        let record = run.finish(stop_reason);

        if options.save_results {
            self.persist(&record);
        }

        self.logger.log(&LogEvent::CycleCompleted {
            cycle_id: record.cycle_id.clone(),
            iterations: record.iterations.len(),
            initial_score: record.initial_score,
            final_score: record.final_score,
            stop_reason: record.stop_reason.as_str().to_string(),
            duration_secs: record.duration_secs(),
        });
        info!(
            cycle_id = %record.cycle_id,
            iterations = record.iterations.len(),
            initial_score = record.initial_score,
            final_score = record.final_score,
            stop_reason = %record.stop_reason,
            "Cycle completed"
        );

        Ok(record)
    }

    /// Evaluate, substituting a degraded result for any evaluator error
    async fn assess(
        &self,
        evaluator: &dyn Evaluator,
        content: &str,
        doc_type: &str,
        metadata: &Metadata,
        iteration: usize,
    ) -> EvaluationResult {
        match evaluator.evaluate(content, doc_type, metadata).await {
            Ok(evaluation) => {
                self.logger.log(&LogEvent::EvaluationCompleted {
                    iteration,
                    total_score: evaluation.total_score,
                    max_score: evaluation.max_score,
                    grade: evaluation.grade.to_string(),
                });
                evaluation
            }
            Err(e) => {
                warn!(evaluator = evaluator.name(), iteration, error = %e, "Evaluation failed");
                self.logger.log(&LogEvent::EvaluationFailed {
                    iteration,
                    error: e.to_string(),
                });
                EvaluationResult::failed(e)
            }
        }
    }

    fn persist(&self, record: &CycleRecord) {
        if let Some(history) = &self.history {
            history.add_cycle(CycleInput {
                doc_type: &record.doc_type,
                doc_id: &record.doc_id,
                score_trajectory: &record.score_trajectory(),
                final_score: record.final_score,
                stop_reason: record.stop_reason.as_str(),
                initial_content: Some(&record.initial_content),
                final_content: Some(&record.final_content),
                metadata: &record.metadata,
            });
        }

        if let Some(archive) = &self.archive {
            match archive.write(record) {
                Ok(path) => self.logger.log(&LogEvent::ResultsSaved { path }),
                Err(e) => warn!(
                    cycle_id = %record.cycle_id,
                    dir = %archive.dir().display(),
                    error = %e,
                    "Failed to write cycle results"
                ),
            }
        }
    }
}

/// Mutable state of one cycle in progress
struct CycleRun<'a> {
    controller: &'a CycleController,
    options: &'a CycleOptions,
    document: Document,
    doc_id: String,
    cycle_id: String,
    started_at: chrono::DateTime<Utc>,
    initial_evaluation: Option<EvaluationResult>,
    best_content: String,
    best_evaluation: Option<EvaluationResult>,
    iterations: Vec<IterationRecord>,
    failed_attempt: Option<FailedAttempt>,
}

impl<'a> CycleRun<'a> {
    fn start(controller: &'a CycleController, document: Document, options: &'a CycleOptions) -> Self {
        let started_at = Utc::now();
        let doc_id = document.doc_id();
        let cycle_id = format!(
            "{}:{}:{}",
            document.doc_type,
            doc_id,
            started_at.format("%Y%m%dT%H%M%S%.6fZ")
        );

        controller.logger.log(&LogEvent::CycleStarted {
            cycle_id: cycle_id.clone(),
            doc_type: document.doc_type.clone(),
            doc_id: doc_id.clone(),
            max_iterations: options.max_iterations,
        });

        Self {
            controller,
            options,
            best_content: document.content.clone(),
            document,
            doc_id,
            cycle_id,
            started_at,
            initial_evaluation: None,
            best_evaluation: None,
            iterations: Vec::new(),
            failed_attempt: None,
        }
    }

    fn cancelled(&self) -> bool {
        let cancelled = self.controller.is_interrupted();
        if cancelled {
            info!(cycle_id = %self.cycle_id, "Cycle cancelled");
        }
        cancelled
    }

    async fn evaluate(&self, registration: &Registration, document: &Document, iteration: usize) -> EvaluationResult {
        let evaluation = self
            .controller
            .assess(
                registration.evaluator.as_ref(),
                &document.content,
                &document.doc_type,
                &document.metadata,
                iteration,
            )
            .await;

        if self.options.save_results {
            if let Some(history) = &self.controller.history {
                history.add_evaluation(EvaluationInput {
                    doc_type: &document.doc_type,
                    doc_id: &self.doc_id,
                    evaluation: &evaluation,
                    content: Some(&document.content),
                    metadata: &document.metadata,
                });
            }
        }

        evaluation
    }

    async fn drive(&mut self, registration: &Registration) -> StopReason {
        if self.cancelled() {
            return StopReason::Cancelled;
        }

        let initial = self.evaluate(registration, &self.document, 0).await;
        self.initial_evaluation = Some(initial.clone());
        self.best_evaluation = Some(initial.clone());

        let mut current = self.document.clone();
        let mut current_eval = initial;
        let mut index = 1;

        loop {
            if self.cancelled() {
                return StopReason::Cancelled;
            }
            if self.options.target_reached(current_eval.total_score) {
                return StopReason::TargetReached;
            }
            if index > self.options.max_iterations {
                return StopReason::MaxIterations;
            }

            let focus_areas =
                FocusAreaSelector::select(&current_eval, self.options.focus_categories.as_deref());
            self.controller.logger.log(&LogEvent::IterationStarted {
                iteration: index,
                focus_areas: focus_areas.clone(),
            });
            debug!(iteration = index, focus_areas = focus_areas.len(), "Improving document");

            let improved = match registration
                .improver
                .improve(&current.content, &current_eval, &focus_areas, &current.metadata)
                .await
            {
                Ok(improved) => improved,
                Err(e) => {
                    warn!(improver = registration.improver.name(), iteration = index, error = %e, "Improvement failed");
                    self.controller.logger.log(&LogEvent::ImprovementFailed {
                        iteration: index,
                        error: e.to_string(),
                    });
                    self.failed_attempt = Some(FailedAttempt {
                        index,
                        score_before: current_eval.total_score,
                        focus_areas,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return StopReason::ImproverFailed;
                }
            };

            let details = ImprovementDetails::compute(
                &current.content,
                &improved,
                &focus_areas,
                &self.controller.text_diff,
            );
            self.controller.logger.log(&LogEvent::ImprovementCompleted {
                iteration: index,
                lines_added: details.lines_added,
                lines_removed: details.lines_removed,
                word_count_before: details.word_count_before,
                word_count_after: details.word_count_after,
            });

            if self.cancelled() {
                return StopReason::Cancelled;
            }

            let next = current.revised(improved);
            let next_eval = self.evaluate(registration, &next, index).await;
            let record = IterationRecord {
                index,
                content_before: current.content.clone(),
                content_after: next.content.clone(),
                eval_before: current_eval.clone(),
                eval_after: next_eval.clone(),
                improvement_details: details,
            };
            let delta = record.score_delta();
            self.record_improvement(&record);
            self.iterations.push(record);

            if next_eval.total_score > self.best_score() {
                self.best_content = next.content.clone();
                self.best_evaluation = Some(next_eval.clone());
            }

            self.controller.logger.log(&LogEvent::IterationCompleted {
                iteration: index,
                score_before: current_eval.total_score,
                score_after: next_eval.total_score,
                delta,
            });

            if self.options.target_reached(next_eval.total_score) {
                return StopReason::TargetReached;
            }
            if (delta as f64) <= self.options.min_improvement {
                return StopReason::InsufficientImprovement;
            }
            if index == self.options.max_iterations {
                return StopReason::MaxIterations;
            }
            if next_eval.total_score >= SCORE_CEILING {
                return StopReason::ScoreCeiling;
            }

            current = next;
            current_eval = next_eval;
            index += 1;
        }
    }

    fn record_improvement(&self, record: &IterationRecord) {
        if !self.options.save_results {
            return;
        }
        if let Some(history) = &self.controller.history {
            history.add_improvement(ImprovementInput {
                doc_type: &self.document.doc_type,
                doc_id: &self.doc_id,
                score_before: record.eval_before.total_score,
                score_after: record.eval_after.total_score,
                content_before: Some(&record.content_before),
                content_after: Some(&record.content_after),
                details: &record.improvement_details.to_metadata(),
                metadata: &self.document.metadata,
            });
        }
    }

    fn best_score(&self) -> u32 {
        self.best_evaluation.as_ref().map_or(0, |e| e.total_score)
    }

    fn finish(self, stop_reason: StopReason) -> CycleRecord {
        let initial_score = self.initial_evaluation.as_ref().map_or(0, |e| e.total_score);
        let final_score = self.best_score();

        CycleRecord {
            cycle_id: self.cycle_id,
            doc_type: self.document.doc_type,
            doc_id: self.doc_id,
            iterations: self.iterations,
            initial_content: self.document.content,
            final_content: self.best_content,
            initial_score,
            final_score,
            initial_evaluation: self.initial_evaluation,
            final_evaluation: self.best_evaluation,
            stop_reason,
            failed_attempt: self.failed_attempt,
            started_at: self.started_at,
            finished_at: Utc::now(),
            metadata: self.document.metadata,
        }
    }
}
