use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::CycleRecord;

/// Writes a browsable copy of each finished cycle:
///
/// ```text
/// <dir>/<doc_type>/<cycle_id>/
///     report.md  original.md  final.md  cycle.json
///     iteration_N/
///         report.md  before.md  after.md  eval_before.json  eval_after.json
/// ```
#[derive(Debug, Clone)]
pub struct CycleArchive {
    dir: PathBuf,
}

impl CycleArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory a record is written to
    pub fn cycle_dir(&self, record: &CycleRecord) -> PathBuf {
        self.dir
            .join(sanitize(&record.doc_type))
            .join(sanitize(&record.cycle_id))
    }

    pub fn write(&self, record: &CycleRecord) -> io::Result<PathBuf> {
        let cycle_dir = self.cycle_dir(record);
        fs::create_dir_all(&cycle_dir)?;

        fs::write(cycle_dir.join("report.md"), record.format_report())?;
        fs::write(cycle_dir.join("original.md"), &record.initial_content)?;
        fs::write(cycle_dir.join("final.md"), &record.final_content)?;
        write_json(&cycle_dir.join("cycle.json"), record)?;

        for iteration in &record.iterations {
            let iter_dir = cycle_dir.join(format!("iteration_{}", iteration.index));
            fs::create_dir_all(&iter_dir)?;

            fs::write(
                iter_dir.join("report.md"),
                iteration.to_improvement_result().format_report(),
            )?;
            fs::write(iter_dir.join("before.md"), &iteration.content_before)?;
            fs::write(iter_dir.join("after.md"), &iteration.content_after)?;
            write_json(&iter_dir.join("eval_before.json"), &iteration.eval_before)?;
            write_json(&iter_dir.join("eval_after.json"), &iteration.eval_after)?;
        }

        Ok(cycle_dir)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    fs::write(path, json)
}

/// Keep ids usable as a single path component on every platform
fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
