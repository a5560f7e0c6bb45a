//! Visualization: analytics summary → renderable chart definition.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::analytics::AnalyticsSummary;
use crate::error::{Result, SimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<DataPoint>,
}

/// Chart handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartArtifact {
    pub title: String,
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl ChartArtifact {
    /// Embeddable Vega-Lite definition with the data inlined.
    pub fn to_vega_lite(&self) -> serde_json::Value {
        let values: Vec<serde_json::Value> = self
            .series
            .iter()
            .flat_map(|s| {
                s.points.iter().enumerate().map(move |(i, p)| {
                    json!({ "series": s.name, "order": i, "label": p.label, "value": p.value })
                })
            })
            .collect();
        let mark = match self.kind {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
        };
        json!({
            "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
            "title": self.title,
            "data": { "values": values },
            "mark": mark,
            "encoding": {
                "x": { "field": "label", "type": "nominal", "sort": { "field": "order" }, "title": self.x_label },
                "y": { "field": "value", "type": "quantitative", "title": self.y_label },
                "color": { "field": "series", "type": "nominal" }
            }
        })
    }
}

impl fmt::Display for ChartArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({:?})", self.title, self.kind)?;
        for series in &self.series {
            writeln!(f, "  {} [{}]", series.name, self.y_label)?;
            for p in &series.points {
                writeln!(f, "    {:<32} {:>10.1}", p.label, p.value)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Visualizer;

impl Visualizer {
    pub fn new() -> Self {
        Self
    }

    /// Pure: identical summaries render identical charts.
    pub fn render(&self, summary: &AnalyticsSummary) -> Result<ChartArtifact> {
        if summary.timeline.is_empty() {
            return Err(SimError::Render("empty series: no events to plot".to_string()));
        }
        if summary.timeline.len() != summary.event_count {
            return Err(SimError::Render(format!(
                "timeline has {} points but event_count is {}",
                summary.timeline.len(),
                summary.event_count
            )));
        }

        let points: Vec<DataPoint> = summary
            .timeline
            .iter()
            .map(|p| DataPoint {
                label: format!("{}:{} {}", p.seq, p.event_type, p.element_id),
                value: p.latency_ms as f64,
            })
            .collect();

        let chart = ChartArtifact {
            title: format!(
                "Response latency per interaction ({} events, {} errors)",
                summary.event_count, summary.error_count
            ),
            kind: ChartKind::Bar,
            x_label: "interaction".to_string(),
            y_label: "latency (ms)".to_string(),
            series: vec![Series {
                name: "latency_ms".to_string(),
                points,
            }],
        };

        info!(points = summary.event_count, "Rendered chart");
        Ok(chart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::TimelinePoint;
    use crate::types::EventType;
    use std::collections::BTreeMap;

    fn summary(points: usize) -> AnalyticsSummary {
        let timeline: Vec<TimelinePoint> = (0..points)
            .map(|i| TimelinePoint {
                seq: i as u64 + 1,
                event_type: EventType::Click,
                element_id: format!("btn{i}"),
                latency_ms: 40,
            })
            .collect();
        AnalyticsSummary {
            event_count: points,
            counts_by_type: BTreeMap::new(),
            counts_by_element: BTreeMap::new(),
            error_count: 0,
            errors: vec![],
            total_latency_ms: 40 * points as u64,
            max_latency_ms: 40,
            mean_latency_ms: 40.0,
            page: None,
            timeline,
        }
    }

    #[test]
    fn one_series_with_a_point_per_event() {
        let chart = Visualizer::new().render(&summary(4)).unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].points.len(), 4);
        assert_eq!(chart.series[0].points[0].label, "1:click btn0");
    }

    #[test]
    fn empty_summary_is_a_render_error() {
        let err = Visualizer::new().render(&summary(0)).unwrap_err();
        assert!(matches!(err, SimError::Render(_)));
    }

    #[test]
    fn inconsistent_summary_is_a_render_error() {
        let mut s = summary(2);
        s.event_count = 5;
        assert!(matches!(
            Visualizer::new().render(&s).unwrap_err(),
            SimError::Render(_)
        ));
    }

    #[test]
    fn largest_latency_still_plots_as_a_finite_value() {
        let mut s = summary(1);
        s.timeline[0].latency_ms = u64::MAX;
        let chart = Visualizer::new().render(&s).unwrap();
        let value = chart.series[0].points[0].value;
        assert!(value.is_finite());
        assert_eq!(value, u64::MAX as f64);
    }

    #[test]
    fn rendering_is_deterministic() {
        let s = summary(3);
        let a = serde_json::to_string(&Visualizer::new().render(&s).unwrap()).unwrap();
        let b = serde_json::to_string(&Visualizer::new().render(&s).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn vega_lite_inlines_every_point() {
        let chart = Visualizer::new().render(&summary(3)).unwrap();
        let spec = chart.to_vega_lite();
        assert_eq!(spec["mark"], "bar");
        assert_eq!(spec["data"]["values"].as_array().unwrap().len(), 3);
    }
}
