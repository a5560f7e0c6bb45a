//! RunRecord for disk serialization / replay of pipeline runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::AnalyticsSummary;
use crate::error::Stage;
use crate::types::InteractionBatch;
use crate::visualize::ChartArtifact;

/// Everything one pipeline run produced, or where it stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub requested: usize,
    pub outcome: Option<RunOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed {
        batch: InteractionBatch,
        summary: AnalyticsSummary,
        chart: ChartArtifact,
    },
    Failed {
        stage: Stage,
        kind: String,
        error: String,
        /// Present when generation succeeded before the failure.
        batch: Option<InteractionBatch>,
    },
}

impl RunRecord {
    pub fn new(requested: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            requested,
            outcome: None,
        }
    }

    pub fn finish(&mut self, outcome: RunOutcome) {
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    /// Batch recorded by this run, if generation got that far.
    pub fn batch(&self) -> Option<&InteractionBatch> {
        match self.outcome.as_ref()? {
            RunOutcome::Completed { batch, .. } => Some(batch),
            RunOutcome::Failed { batch, .. } => batch.as_ref(),
        }
    }

    /// `<dir>/run_<timestamp>_<id>.json`
    pub fn default_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!(
            "run_{}_{}.json",
            self.started_at.format("%Y%m%d_%H%M%S"),
            self.run_id.simple()
        ))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let record: Self = serde_json::from_str(&json)?;
        Ok(record)
    }
}
