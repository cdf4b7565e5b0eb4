use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use docloops_eval::fingerprint;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::{
    CycleEntry, CycleInput, DocTypeMetrics, DocumentHistory, DocumentImprovement,
    EvaluationEntry, EvaluationInput, HistoryMetrics, HistoryQuery, ImprovementEntry,
    ImprovementInput, SortBy, TimelinePoint,
};

const EVALUATIONS_FILE: &str = "evaluations.json";
const IMPROVEMENTS_FILE: &str = "improvements.json";
const CYCLES_FILE: &str = "cycles.json";

const MOST_IMPROVED_LIMIT: usize = 5;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed history file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct HistoryState {
    evaluations: Vec<EvaluationEntry>,
    improvements: Vec<ImprovementEntry>,
    cycles: Vec<CycleEntry>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl HistoryState {
    /// Current time, nudged forward so that ids issued by one store never
    /// collide even within the same microsecond
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

/// Append-only history of evaluations, improvements and cycles.
///
/// Appends are serialized through an internal mutex, so a single store can be
/// shared (`Arc<HistoryStore>`) by concurrently running cycles.
pub struct HistoryStore {
    dir: Option<PathBuf>,
    state: Mutex<HistoryState>,
}

impl HistoryStore {
    /// A store persisted under `dir`. Nothing is read until [`load`](Self::load).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            state: Mutex::new(HistoryState::default()),
        }
    }

    /// A store that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            state: Mutex::new(HistoryState::default()),
        }
    }

    /// Default on-disk location, `<data dir>/docloops/history`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("docloops").join("history"))
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_evaluation(&self, input: EvaluationInput<'_>) -> String {
        let mut state = self.state();
        let timestamp = state.next_timestamp();
        let id = entry_id(input.doc_type, input.doc_id, timestamp);

        state.evaluations.push(EvaluationEntry {
            id: id.clone(),
            timestamp,
            doc_type: input.doc_type.to_string(),
            doc_id: input.doc_id.to_string(),
            score: input.evaluation.total_score,
            max_score: input.evaluation.max_score,
            grade: input.evaluation.grade,
            evaluation: input.evaluation.clone(),
            content_hash: input.content.map(fingerprint),
            metadata: input.metadata.clone(),
        });

        debug!(id = %id, score = input.evaluation.total_score, "Recorded evaluation");
        id
    }

    pub fn add_improvement(&self, input: ImprovementInput<'_>) -> String {
        let mut state = self.state();
        let timestamp = state.next_timestamp();
        let id = entry_id(input.doc_type, input.doc_id, timestamp);

        state.improvements.push(ImprovementEntry {
            id: id.clone(),
            timestamp,
            doc_type: input.doc_type.to_string(),
            doc_id: input.doc_id.to_string(),
            score_before: input.score_before,
            score_after: input.score_after,
            improvement: i64::from(input.score_after) - i64::from(input.score_before),
            content_before_hash: input.content_before.map(fingerprint),
            content_after_hash: input.content_after.map(fingerprint),
            details: input.details.clone(),
            metadata: input.metadata.clone(),
        });

        debug!(id = %id, "Recorded improvement");
        id
    }

    pub fn add_cycle(&self, input: CycleInput<'_>) -> String {
        let mut state = self.state();
        let timestamp = state.next_timestamp();
        let id = entry_id(input.doc_type, input.doc_id, timestamp);
        let initial_score = input.score_trajectory.first().copied().unwrap_or(0);

        state.cycles.push(CycleEntry {
            id: id.clone(),
            timestamp,
            doc_type: input.doc_type.to_string(),
            doc_id: input.doc_id.to_string(),
            iteration_count: input.score_trajectory.len().saturating_sub(1),
            score_trajectory: input.score_trajectory.to_vec(),
            initial_score,
            final_score: input.final_score,
            total_improvement: i64::from(input.final_score) - i64::from(initial_score),
            stop_reason: input.stop_reason.to_string(),
            initial_content_hash: input.initial_content.map(fingerprint),
            final_content_hash: input.final_content.map(fingerprint),
            metadata: input.metadata.clone(),
        });

        debug!(id = %id, "Recorded cycle");
        id
    }

    pub fn evaluations(&self, query: &HistoryQuery) -> Vec<EvaluationEntry> {
        let state = self.state();
        let matching: Vec<EvaluationEntry> = state
            .evaluations
            .iter()
            .filter(|e| query.matches(&e.doc_type, &e.doc_id))
            .cloned()
            .collect();
        apply_query(matching, query, |e| e.timestamp, |e| i64::from(e.score), |_| 0)
    }

    pub fn improvements(&self, query: &HistoryQuery) -> Vec<ImprovementEntry> {
        let state = self.state();
        let matching: Vec<ImprovementEntry> = state
            .improvements
            .iter()
            .filter(|e| query.matches(&e.doc_type, &e.doc_id))
            .cloned()
            .collect();
        apply_query(
            matching,
            query,
            |e| e.timestamp,
            |e| i64::from(e.score_after),
            |e| e.improvement,
        )
    }

    pub fn cycles(&self, query: &HistoryQuery) -> Vec<CycleEntry> {
        let state = self.state();
        let matching: Vec<CycleEntry> = state
            .cycles
            .iter()
            .filter(|e| query.matches(&e.doc_type, &e.doc_id))
            .cloned()
            .collect();
        apply_query(
            matching,
            query,
            |e| e.timestamp,
            |e| i64::from(e.final_score),
            |e| e.total_improvement,
        )
    }

    /// Aggregate statistics across every recorded entry
    pub fn metrics(&self) -> HistoryMetrics {
        let state = self.state();

        let mut metrics = HistoryMetrics {
            total_evaluations: state.evaluations.len(),
            total_improvements: state.improvements.len(),
            total_cycles: state.cycles.len(),
            average_evaluation_score: mean(state.evaluations.iter().map(|e| f64::from(e.score))),
            average_improvement: mean(state.improvements.iter().map(|i| i.improvement as f64)),
            ..Default::default()
        };

        let mut per_document: BTreeMap<String, i64> = BTreeMap::new();
        for entry in &state.improvements {
            *per_document
                .entry(format!("{}:{}", entry.doc_type, entry.doc_id))
                .or_insert(0) += entry.improvement;
        }
        let mut most_improved: Vec<DocumentImprovement> = per_document
            .into_iter()
            .map(|(doc, total_improvement)| DocumentImprovement {
                doc,
                total_improvement,
            })
            .collect();
        most_improved.sort_by(|a, b| b.total_improvement.cmp(&a.total_improvement));
        most_improved.truncate(MOST_IMPROVED_LIMIT);
        metrics.most_improved_documents = most_improved;

        let mut doc_types: Vec<&str> = state
            .evaluations
            .iter()
            .map(|e| e.doc_type.as_str())
            .chain(state.improvements.iter().map(|i| i.doc_type.as_str()))
            .collect();
        doc_types.sort_unstable();
        doc_types.dedup();

        for doc_type in doc_types {
            let evaluations: Vec<_> = state.evaluations.iter().filter(|e| e.doc_type == doc_type).collect();
            let improvements: Vec<_> = state.improvements.iter().filter(|i| i.doc_type == doc_type).collect();

            metrics.by_doc_type.insert(
                doc_type.to_string(),
                DocTypeMetrics {
                    evaluations: evaluations.len(),
                    improvements: improvements.len(),
                    cycles: state.cycles.iter().filter(|c| c.doc_type == doc_type).count(),
                    average_score: mean(evaluations.iter().map(|e| f64::from(e.score))),
                    average_improvement: mean(improvements.iter().map(|i| i.improvement as f64)),
                },
            );
        }

        metrics
    }

    /// Full record for one document
    pub fn document_history(&self, doc_type: &str, doc_id: &str) -> DocumentHistory {
        let query = HistoryQuery::for_document(doc_type, doc_id);
        let evaluations = self.evaluations(&query);
        let improvements = self.improvements(&query);
        let cycles = self.cycles(&query);

        let timeline: Vec<TimelinePoint> = evaluations
            .iter()
            .rev()
            .map(|e| TimelinePoint {
                timestamp: e.timestamp,
                score: e.score,
            })
            .collect();

        let total_improvement: i64 = improvements.iter().map(|i| i.improvement).sum();
        let average_improvement = mean(improvements.iter().map(|i| i.improvement as f64));

        DocumentHistory {
            doc_type: doc_type.to_string(),
            doc_id: doc_id.to_string(),
            first_evaluated: timeline.first().map(|p| p.timestamp),
            last_evaluated: timeline.last().map(|p| p.timestamp),
            initial_score: timeline.first().map(|p| p.score),
            latest_score: timeline.last().map(|p| p.score),
            evaluations,
            improvements,
            cycles,
            timeline,
            total_improvement,
            average_improvement,
        }
    }

    /// Write all three collections. Each file is written to a temporary
    /// sibling and renamed into place. In-memory stores do nothing.
    pub fn save(&self) -> Result<(), HistoryError> {
        let Some(dir) = &self.dir else {
            debug!("In-memory history, skipping save");
            return Ok(());
        };

        let (evaluations, improvements, cycles) = {
            let state = self.state();
            (
                serde_json::to_string_pretty(&state.evaluations)?,
                serde_json::to_string_pretty(&state.improvements)?,
                serde_json::to_string_pretty(&state.cycles)?,
            )
        };

        fs::create_dir_all(dir).map_err(|source| HistoryError::Io {
            path: dir.clone(),
            source,
        })?;
        write_atomic(&dir.join(EVALUATIONS_FILE), &evaluations)?;
        write_atomic(&dir.join(IMPROVEMENTS_FILE), &improvements)?;
        write_atomic(&dir.join(CYCLES_FILE), &cycles)?;

        info!(dir = %dir.display(), "History saved");
        Ok(())
    }

    /// Read whichever history files exist. If any of them fails to read or
    /// parse, nothing is replaced.
    pub fn load(&self) -> Result<(), HistoryError> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let evaluations: Option<Vec<EvaluationEntry>> = read_collection(&dir.join(EVALUATIONS_FILE))?;
        let improvements: Option<Vec<ImprovementEntry>> = read_collection(&dir.join(IMPROVEMENTS_FILE))?;
        let cycles: Option<Vec<CycleEntry>> = read_collection(&dir.join(CYCLES_FILE))?;

        let mut state = self.state();
        if let Some(evaluations) = evaluations {
            state.evaluations = evaluations;
        }
        if let Some(improvements) = improvements {
            state.improvements = improvements;
        }
        if let Some(cycles) = cycles {
            state.cycles = cycles;
        }

        let newest = state
            .evaluations
            .iter()
            .map(|e| e.timestamp)
            .chain(state.improvements.iter().map(|i| i.timestamp))
            .chain(state.cycles.iter().map(|c| c.timestamp))
            .max();
        state.last_timestamp = state.last_timestamp.max(newest);

        debug!(
            evaluations = state.evaluations.len(),
            improvements = state.improvements.len(),
            cycles = state.cycles.len(),
            "History loaded"
        );
        Ok(())
    }
}

/// `doc_type:doc_id:YYYYmmddTHHMMSS.ffffffZ`
fn entry_id(doc_type: &str, doc_id: &str, timestamp: DateTime<Utc>) -> String {
    format!("{}:{}:{}", doc_type, doc_id, timestamp.format("%Y%m%dT%H%M%S%.6fZ"))
}

fn apply_query<T>(
    mut entries: Vec<T>,
    query: &HistoryQuery,
    timestamp: impl Fn(&T) -> DateTime<Utc>,
    score: impl Fn(&T) -> i64,
    improvement: impl Fn(&T) -> i64,
) -> Vec<T> {
    // Newest first, then a stable sort so ties keep recency order
    entries.sort_by(|a, b| timestamp(b).cmp(&timestamp(a)));
    match query.sort_by {
        SortBy::Newest => {}
        SortBy::Score => entries.sort_by(|a, b| score(b).cmp(&score(a))),
        SortBy::Improvement => entries.sort_by(|a, b| improvement(b).cmp(&improvement(a))),
    }

    if let Some(limit) = query.limit.filter(|l| *l > 0) {
        entries.truncate(limit);
    }
    entries
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), HistoryError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(|source| HistoryError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, HistoryError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = serde_json::from_str(&contents).map_err(|source| HistoryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(entries))
}
