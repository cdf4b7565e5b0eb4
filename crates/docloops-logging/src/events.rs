use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for the evaluate/improve cycle.
///
/// Iteration 0 is the initial evaluation; improvement iterations count
/// from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    CycleStarted {
        cycle_id: String,
        doc_type: String,
        doc_id: String,
        max_iterations: usize,
    },
    EvaluationCompleted {
        iteration: usize,
        total_score: u32,
        max_score: u32,
        grade: String,
    },
    /// The evaluator failed and a degraded zero score was substituted
    EvaluationFailed {
        iteration: usize,
        error: String,
    },
    IterationStarted {
        iteration: usize,
        focus_areas: Vec<String>,
    },
    ImprovementCompleted {
        iteration: usize,
        lines_added: usize,
        lines_removed: usize,
        word_count_before: usize,
        word_count_after: usize,
    },
    ImprovementFailed {
        iteration: usize,
        error: String,
    },
    IterationCompleted {
        iteration: usize,
        score_before: u32,
        score_after: u32,
        delta: i64,
    },
    CycleCompleted {
        cycle_id: String,
        iterations: usize,
        initial_score: u32,
        final_score: u32,
        stop_reason: String,
        duration_secs: f64,
    },
    ResultsSaved {
        path: PathBuf,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

const RULE_WIDTH: usize = 68;

/// Logger for cycle events. Writes to stderr in the chosen format and,
/// optionally, appends timestamped JSON lines to a file.
pub struct Logger {
    format: LogFormat,
    file_writer: Option<Mutex<File>>,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            file_writer: None,
            quiet: false,
        }
    }

    /// Logger that emits nothing on the console; file output still applies
    pub fn quiet() -> Self {
        Self {
            format: LogFormat::Compact,
            file_writer: None,
            quiet: true,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            file_writer: Some(Mutex::new(file)),
            quiet: false,
        })
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let _ = writeln!(file, "{}", event.with_timestamp());
            }
        }

        if self.quiet {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::CycleStarted {
                doc_type,
                doc_id,
                max_iterations,
                ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(stderr, "{}", format!("╭{}╮", "─".repeat(RULE_WIDTH)).bright_blue());
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "docloops".bold().bright_white(),
                    format!("{} ({}), up to {} iterations", doc_id, doc_type, max_iterations).dimmed()
                );
                let _ = writeln!(stderr, "{}", format!("╰{}╯", "─".repeat(RULE_WIDTH)).bright_blue());
                let _ = writeln!(stderr);
            }
            LogEvent::EvaluationCompleted {
                iteration,
                total_score,
                max_score,
                grade,
            } => {
                let label = if *iteration == 0 { "Initial score" } else { "Score" };
                let _ = writeln!(
                    stderr,
                    "    {} {}: {}/{} ({})",
                    "●".bright_cyan(),
                    label,
                    total_score.to_string().bold(),
                    max_score,
                    grade
                );
            }
            LogEvent::EvaluationFailed { iteration, error } => {
                let _ = writeln!(
                    stderr,
                    "    {} Evaluation {} failed, scoring 0: {}",
                    "⚠".bright_yellow(),
                    iteration,
                    error.bright_yellow()
                );
            }
            LogEvent::IterationStarted {
                iteration,
                focus_areas,
            } => {
                let header = format!("─ Iteration {} ", iteration);
                let padding = "─".repeat(RULE_WIDTH.saturating_sub(header.chars().count()));
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    header.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr, "  {} {}", "▶".bright_magenta(), "FOCUS".bright_magenta().bold());
                for area in focus_areas {
                    let _ = writeln!(stderr, "{} {}", "    │".dimmed(), area);
                }
            }
            LogEvent::ImprovementCompleted {
                lines_added,
                lines_removed,
                word_count_before,
                word_count_after,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "    {} Rewrite: {}, {}, {} → {} words",
                    "✓".bright_green(),
                    format!("+{}", lines_added).green(),
                    format!("-{}", lines_removed).red(),
                    word_count_before,
                    word_count_after
                );
            }
            LogEvent::ImprovementFailed { iteration, error } => {
                let _ = writeln!(
                    stderr,
                    "    {} Improvement {} failed: {}",
                    "✗".bright_red(),
                    iteration,
                    error.bright_red()
                );
            }
            LogEvent::IterationCompleted {
                score_before,
                score_after,
                delta,
                ..
            } => {
                let delta_text = format!("{:+}", delta);
                let styled = if *delta > 0 {
                    delta_text.bright_green()
                } else if *delta < 0 {
                    delta_text.bright_red()
                } else {
                    delta_text.bright_yellow()
                };
                let _ = writeln!(
                    stderr,
                    "    {} {} → {} ({})",
                    "→".dimmed(),
                    score_before,
                    score_after,
                    styled
                );
                let _ = writeln!(stderr, "{}", format!("└{}┘", "─".repeat(RULE_WIDTH)).bright_blue());
            }
            LogEvent::CycleCompleted { .. } => {
                // The binary prints the final report
            }
            LogEvent::ResultsSaved { path } => {
                let _ = writeln!(
                    stderr,
                    "    {} {}",
                    "📁".dimmed(),
                    format!("Results saved to {}", path.display()).dimmed()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::CycleStarted {
                doc_type, doc_id, ..
            } => format!("[{}] cycle:start {}:{}", timestamp, doc_type, doc_id),
            LogEvent::EvaluationCompleted {
                iteration,
                total_score,
                max_score,
                ..
            } => format!("[{}] eval:{} {}/{}", timestamp, iteration, total_score, max_score),
            LogEvent::EvaluationFailed { iteration, error } => {
                format!("[{}] eval:{}:error {}", timestamp, iteration, error)
            }
            LogEvent::IterationStarted {
                iteration,
                focus_areas,
            } => format!("[{}] iter:start:{} focus={}", timestamp, iteration, focus_areas.len()),
            LogEvent::ImprovementCompleted {
                iteration,
                lines_added,
                lines_removed,
                ..
            } => format!(
                "[{}] improve:{} +{} -{}",
                timestamp, iteration, lines_added, lines_removed
            ),
            LogEvent::ImprovementFailed { iteration, error } => {
                format!("[{}] improve:{}:error {}", timestamp, iteration, error)
            }
            LogEvent::IterationCompleted {
                iteration, delta, ..
            } => format!("[{}] iter:done:{} {:+}", timestamp, iteration, delta),
            LogEvent::CycleCompleted {
                iterations,
                initial_score,
                final_score,
                stop_reason,
                duration_secs,
                ..
            } => format!(
                "[{}] cycle:done:{} {}->{} {} {:.1}s",
                timestamp, iterations, initial_score, final_score, stop_reason, duration_secs
            ),
            LogEvent::ResultsSaved { path } => {
                format!("[{}] saved {}", timestamp, path.display())
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = LogEvent::IterationCompleted {
            iteration: 2,
            score_before: 60,
            score_after: 75,
            delta: 15,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "iteration_completed");
        assert_eq!(json["delta"], 15);
    }

    #[test]
    fn test_file_logger_appends_timestamped_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("cycle.jsonl");

        let mut logger = Logger::with_file(LogFormat::Json, &path).unwrap();
        logger.quiet = true;
        logger.log(&LogEvent::EvaluationFailed {
            iteration: 0,
            error: "backend down".into(),
        });
        logger.log(&LogEvent::ResultsSaved {
            path: PathBuf::from("/tmp/out"),
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "evaluation_failed");
        assert_eq!(lines[0]["error"], "backend down");
        assert!(lines[1]["timestamp"].is_string());
    }
}
