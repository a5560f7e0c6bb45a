//! Analytics engine: derives a summary from a captured app response.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::{AppResponse, EventType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub seq: u64,
    pub event_type: EventType,
    pub element_id: String,
    pub latency_ms: u64,
}

/// Metrics describing one response. Ordered maps keep serialization stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub event_count: usize,
    pub counts_by_type: BTreeMap<EventType, usize>,
    pub counts_by_element: BTreeMap<String, usize>,
    pub error_count: usize,
    pub errors: Vec<String>,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
    pub mean_latency_ms: f64,
    pub page: Option<String>,
    pub timeline: Vec<TimelinePoint>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pure: the same response always yields the same summary.
    pub fn analyze(&self, response: &AppResponse) -> Result<AnalyticsSummary> {
        let state = response.parse()?;

        let mut counts_by_type = BTreeMap::new();
        let mut counts_by_element = BTreeMap::new();
        let mut timeline = Vec::with_capacity(state.event_log.len());
        for event in &state.event_log {
            *counts_by_type.entry(event.event_type).or_insert(0) += 1;
            *counts_by_element
                .entry(event.element_id.clone())
                .or_insert(0) += 1;
            timeline.push(TimelinePoint {
                seq: event.seq,
                event_type: event.event_type,
                element_id: event.element_id.clone(),
                latency_ms: event.latency_ms,
            });
        }

        let event_count = timeline.len();
        let total_latency_ms = timeline
            .iter()
            .fold(0u64, |total, p| total.saturating_add(p.latency_ms));
        let max_latency_ms = timeline.iter().map(|p| p.latency_ms).max().unwrap_or(0);
        // summed in f64 so the mean stays right when the total saturates
        let mean_latency_ms = if event_count == 0 {
            0.0
        } else {
            timeline.iter().map(|p| p.latency_ms as f64).sum::<f64>() / event_count as f64
        };

        let summary = AnalyticsSummary {
            event_count,
            counts_by_type,
            counts_by_element,
            error_count: state.errors.len(),
            errors: state.errors,
            total_latency_ms,
            max_latency_ms,
            mean_latency_ms,
            page: state.page,
            timeline,
        };

        info!(
            events = summary.event_count,
            errors = summary.error_count,
            mean_latency_ms = summary.mean_latency_ms,
            "Analyzed response"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::types::{AppState, LoggedEvent};

    fn event(seq: u64, event_type: EventType, id: &str, latency_ms: u64) -> LoggedEvent {
        LoggedEvent {
            seq,
            event_type,
            element_id: id.to_string(),
            value: None,
            latency_ms,
        }
    }

    fn response() -> AppResponse {
        AppResponse::from_state(&AppState {
            event_log: vec![
                event(1, EventType::Click, "btn1", 40),
                event(2, EventType::Click, "btn2", 40),
                event(3, EventType::Submit, "form1", 120),
            ],
            errors: vec!["submit 'form1': input 'email' is empty".to_string()],
            ..AppState::default()
        })
        .unwrap()
    }

    #[test]
    fn counts_and_latency() {
        let summary = AnalyticsEngine::new().analyze(&response()).unwrap();
        assert_eq!(summary.event_count, 3);
        assert_eq!(summary.counts_by_type[&EventType::Click], 2);
        assert_eq!(summary.counts_by_element["form1"], 1);
        assert_eq!(summary.error_count, 1);
        assert_eq!(summary.total_latency_ms, 200);
        assert_eq!(summary.max_latency_ms, 120);
        assert!((summary.mean_latency_ms - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn huge_latencies_saturate_the_total() {
        let response = AppResponse::from_state(&AppState {
            event_log: vec![
                event(1, EventType::Navigate, "about", u64::MAX),
                event(2, EventType::Navigate, "home", u64::MAX),
            ],
            ..AppState::default()
        })
        .unwrap();

        let summary = AnalyticsEngine::new().analyze(&response).unwrap();
        assert_eq!(summary.total_latency_ms, u64::MAX);
        assert_eq!(summary.max_latency_ms, u64::MAX);
        assert!((summary.mean_latency_ms / u64::MAX as f64 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn repeated_analysis_is_byte_identical() {
        let engine = AnalyticsEngine::new();
        let response = response();
        let a = serde_json::to_string(&engine.analyze(&response).unwrap()).unwrap();
        let b = serde_json::to_string(&engine.analyze(&response).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_response_yields_zero_summary() {
        let summary = AnalyticsEngine::new().analyze(&AppResponse::empty()).unwrap();
        assert_eq!(summary.event_count, 0);
        assert_eq!(summary.mean_latency_ms, 0.0);
        assert!(summary.timeline.is_empty());
    }

    #[test]
    fn unparseable_response_is_malformed() {
        let err = AnalyticsEngine::new()
            .analyze(&AppResponse::new("not json"))
            .unwrap_err();
        assert!(matches!(err, SimError::MalformedResponse(_)));
    }
}
