//! Dispatch-target boundary: the narrow interface the simulator drives.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use app_harness_client::{AppHarnessClient, EventPayload, HarnessError};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::types::{AppResponse, AppState, EventType, InteractionValue, LoggedEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("target unreachable: {0}")]
    Unreachable(String),

    #[error("{0}")]
    Rejected(String),
}

/// An application instance that accepts synthetic events.
#[async_trait]
pub trait DispatchTarget: Send + Sync {
    async fn dispatch(
        &self,
        event_type: EventType,
        element_id: &str,
        value: Option<&InteractionValue>,
    ) -> Result<(), DispatchError>;

    async fn current_state(&self) -> Result<AppResponse, DispatchError>;
}

/// Accepts everything and reports back exactly what it received.
#[derive(Default)]
pub struct EchoTarget {
    log: Mutex<Vec<LoggedEvent>>,
    contacts: AtomicUsize,
}

impl EchoTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls received on either method.
    pub fn contacts(&self) -> usize {
        self.contacts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchTarget for EchoTarget {
    async fn dispatch(
        &self,
        event_type: EventType,
        element_id: &str,
        value: Option<&InteractionValue>,
    ) -> Result<(), DispatchError> {
        self.contacts.fetch_add(1, Ordering::SeqCst);
        let mut log = self.log.lock().await;
        let seq = log.len() as u64 + 1;
        log.push(LoggedEvent {
            seq,
            event_type,
            element_id: element_id.to_string(),
            value: value.cloned(),
            latency_ms: 0,
        });
        Ok(())
    }

    async fn current_state(&self) -> Result<AppResponse, DispatchError> {
        self.contacts.fetch_add(1, Ordering::SeqCst);
        let state = AppState {
            event_log: self.log.lock().await.clone(),
            ..AppState::default()
        };
        AppResponse::from_state(&state).map_err(|e| DispatchError::Unreachable(e.to_string()))
    }
}

/// Remote app harness reached over HTTP.
pub struct HttpTarget {
    client: Arc<AppHarnessClient>,
}

impl HttpTarget {
    pub fn new(client: Arc<AppHarnessClient>) -> Self {
        Self { client }
    }
}

fn classify(err: HarnessError) -> DispatchError {
    if err.is_rejection() {
        DispatchError::Rejected(err.to_string())
    } else {
        DispatchError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl DispatchTarget for HttpTarget {
    async fn dispatch(
        &self,
        event_type: EventType,
        element_id: &str,
        value: Option<&InteractionValue>,
    ) -> Result<(), DispatchError> {
        let payload = EventPayload {
            event_type: event_type.as_str(),
            element_id,
            value: value.map(InteractionValue::to_json),
        };
        self.client.dispatch(&payload).await.map_err(classify)
    }

    async fn current_state(&self) -> Result<AppResponse, DispatchError> {
        let body = self.client.state().await.map_err(|e| {
            // a refused state read still means the app cannot be observed
            DispatchError::Unreachable(e.to_string())
        })?;
        Ok(AppResponse::new(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_reports_events_in_order() {
        let target = EchoTarget::new();
        target.dispatch(EventType::Click, "btn1", None).await.unwrap();
        target
            .dispatch(EventType::Scroll, "panel1", Some(&InteractionValue::Offset(5)))
            .await
            .unwrap();

        let state = target.current_state().await.unwrap().parse().unwrap();
        let seqs: Vec<u64> = state.event_log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(state.event_log[1].element_id, "panel1");
        assert_eq!(target.contacts(), 3);
    }

    #[test]
    fn harness_status_classification() {
        let rejected = classify(HarnessError::Api {
            status: 422,
            message: "no such element".to_string(),
        });
        assert!(matches!(rejected, DispatchError::Rejected(_)));

        let down = classify(HarnessError::Network("connection refused".to_string()));
        assert!(matches!(down, DispatchError::Unreachable(_)));
    }
}
