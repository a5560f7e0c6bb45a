//! Pipeline — one forward pass: generate → simulate → analyze → render.

use tracing::{info, warn};

use crate::analytics::{AnalyticsEngine, AnalyticsSummary};
use crate::error::{PipelineError, Stage};
use crate::generator::InteractionGenerator;
use crate::simulator::AppSimulator;
use crate::snapshot::{RunOutcome, RunRecord};
use crate::types::InteractionBatch;
use crate::visualize::{ChartArtifact, Visualizer};

/// Products of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub batch: InteractionBatch,
    pub summary: AnalyticsSummary,
    pub chart: ChartArtifact,
}

/// Products of a replay, which starts from an existing batch.
#[derive(Debug, Clone)]
pub struct ReplayRun {
    pub summary: AnalyticsSummary,
    pub chart: ChartArtifact,
}

/// Wires the four stages. Stateful targets belong to a single pipeline, so
/// build one pipeline per concurrent run.
pub struct Pipeline {
    generator: InteractionGenerator,
    simulator: AppSimulator,
    analytics: AnalyticsEngine,
    visualizer: Visualizer,
}

impl Pipeline {
    pub fn new(generator: InteractionGenerator, simulator: AppSimulator) -> Self {
        Self {
            generator,
            simulator,
            analytics: AnalyticsEngine::new(),
            visualizer: Visualizer::new(),
        }
    }

    /// Run all four stages once, stopping at the first failure.
    pub async fn run(&self, count: usize) -> Result<PipelineRun, PipelineError> {
        info!(count, "Pipeline run starting");

        let batch = self
            .generator
            .generate(count)
            .await
            .map_err(|e| fail(Stage::Generate, e))?;

        let replay = self.replay(&batch).await?;

        info!(events = replay.summary.event_count, "Pipeline run complete");
        Ok(PipelineRun {
            batch,
            summary: replay.summary,
            chart: replay.chart,
        })
    }

    /// Simulate, analyze and render an existing batch.
    pub async fn replay(&self, batch: &InteractionBatch) -> Result<ReplayRun, PipelineError> {
        let response = self
            .simulator
            .simulate(batch)
            .await
            .map_err(|e| fail(Stage::Simulate, e))?;

        let summary = self
            .analytics
            .analyze(&response)
            .map_err(|e| fail(Stage::Analyze, e))?;
        drop(response);

        let chart = self
            .visualizer
            .render(&summary)
            .map_err(|e| fail(Stage::Render, e))?;

        Ok(ReplayRun { summary, chart })
    }

    /// Like [`Pipeline::run`], also producing a run record.
    pub async fn run_recorded(
        &self,
        count: usize,
    ) -> (RunRecord, Result<PipelineRun, PipelineError>) {
        let mut record = RunRecord::new(count);

        let batch = match self.generator.generate(count).await {
            Ok(batch) => batch,
            Err(e) => {
                let err = fail(Stage::Generate, e);
                record.finish(failed(&err, None));
                return (record, Err(err));
            }
        };

        match self.replay(&batch).await {
            Ok(ReplayRun { summary, chart }) => {
                record.finish(RunOutcome::Completed {
                    batch: batch.clone(),
                    summary: summary.clone(),
                    chart: chart.clone(),
                });
                (
                    record,
                    Ok(PipelineRun {
                        batch,
                        summary,
                        chart,
                    }),
                )
            }
            Err(err) => {
                record.finish(failed(&err, Some(batch)));
                (record, Err(err))
            }
        }
    }
}

fn fail(stage: Stage, source: crate::error::SimError) -> PipelineError {
    warn!(%stage, kind = source.kind(), error = %source, "Pipeline stage failed");
    PipelineError::new(stage, source)
}

fn failed(err: &PipelineError, batch: Option<InteractionBatch>) -> RunOutcome {
    RunOutcome::Failed {
        stage: err.stage,
        kind: err.source.kind().to_string(),
        error: err.source.to_string(),
        batch,
    }
}
