use std::{collections::BTreeMap, path::Path, time::Instant};

use serde::Serialize;
use tracing::info;

use crate::io::write_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus { Running, Succeeded, Failed }

#[derive(Debug, Clone, Serialize)]
pub struct StageMetrics {
    pub name: String,
    pub duration_secs: f64,
}

/// Wall-clock timings, row counts and warning counts of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub pipeline: String,
    pub status: RunStatus,
    pub stages: Vec<StageMetrics>,
    pub row_counts: BTreeMap<String, usize>,
    pub warnings: BTreeMap<String, usize>,
    pub total_duration_secs: f64,
    #[serde(skip)]
    started: Instant,
}

impl RunMetrics {
    pub fn new(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            status: RunStatus::Running,
            stages: Vec::new(),
            row_counts: BTreeMap::new(),
            warnings: BTreeMap::new(),
            total_duration_secs: 0.0,
            started: Instant::now(),
        }
    }

    /// Runs `f` as the named stage, recording its duration.
    pub fn stage<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let duration_secs = start.elapsed().as_secs_f64();
        info!(stage = name, duration_secs, "stage finished");
        self.stages.push(StageMetrics { name: name.to_string(), duration_secs });
        result
    }

    pub fn record_rows(&mut self, name: &str, count: usize) {
        self.row_counts.insert(name.to_string(), count);
    }

    pub fn record_warnings(&mut self, check: &str, count: usize) {
        self.warnings.insert(check.to_string(), count);
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.total_duration_secs = self.started.elapsed().as_secs_f64();
        info!(pipeline = %self.pipeline, status = ?status, total_duration_secs = self.total_duration_secs, "run finished");
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        write_json(self, path)
    }
}
