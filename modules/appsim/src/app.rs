//! SimulatedApp — an in-process web app that reacts to synthetic events.
//!
//! Holds an element registry and mutable UI state behind a lock so the
//! simulator can drive it like a remote target.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::history::HistoryProfile;
use crate::target::{DispatchError, DispatchTarget};
use crate::types::{
    AppResponse, AppState, ElementKind, ElementState, EventType, InteractionValue, LoggedEvent,
};

pub struct SimulatedApp {
    state: RwLock<AppState>,
    /// Event types recorded on each element, accepted regardless of kind.
    observed: BTreeMap<String, Vec<EventType>>,
}

impl SimulatedApp {
    pub fn new<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = (S, ElementKind)>,
        S: Into<String>,
    {
        let elements: BTreeMap<String, ElementState> = elements
            .into_iter()
            .map(|(id, kind)| (id.into(), ElementState::new(kind)))
            .collect();
        Self {
            state: RwLock::new(AppState {
                elements,
                ..AppState::default()
            }),
            observed: BTreeMap::new(),
        }
    }

    /// Register every element seen in the history, inferring its kind from
    /// the events recorded on it. Every recorded event type stays valid on
    /// its element even when the inferred kind would not allow it.
    pub fn from_history(profile: &HistoryProfile) -> Self {
        let usage = profile.element_usage();
        let mut app = Self::new(
            usage
                .iter()
                .map(|(id, types)| (id.to_string(), infer_kind(types))),
        );
        app.observed = usage
            .into_iter()
            .map(|(id, types)| (id.to_string(), types))
            .collect();
        app
    }

    fn allows(&self, element_id: &str, kind: ElementKind, event_type: EventType) -> bool {
        accepts(kind, event_type)
            || self
                .observed
                .get(element_id)
                .is_some_and(|types| types.contains(&event_type))
    }

    pub async fn snapshot(&self) -> AppState {
        self.state.read().await.clone()
    }
}

fn infer_kind(types: &[EventType]) -> ElementKind {
    if types.contains(&EventType::Type) {
        ElementKind::Input
    } else if types.contains(&EventType::Scroll) {
        ElementKind::Panel
    } else if types.contains(&EventType::Navigate) {
        ElementKind::Link
    } else if types.contains(&EventType::Submit) {
        ElementKind::Form
    } else {
        ElementKind::Button
    }
}

fn accepts(kind: ElementKind, event_type: EventType) -> bool {
    use ElementKind::*;
    match event_type {
        EventType::Click => matches!(kind, Button | Link | Input | Panel),
        EventType::Scroll => kind == Panel,
        EventType::Type => kind == Input,
        EventType::Hover => true,
        EventType::Submit => matches!(kind, Form | Button),
        EventType::Navigate => kind == Link,
    }
}

/// Simulated handling time in milliseconds.
fn latency_ms(event_type: EventType, value: Option<&InteractionValue>) -> u64 {
    match event_type {
        EventType::Click => 40,
        EventType::Scroll => 16,
        EventType::Type => {
            let chars = match value {
                Some(InteractionValue::Text(s)) => s.chars().count() as u64,
                _ => 0,
            };
            5 + 2 * chars
        }
        EventType::Hover => 4,
        EventType::Submit => 120,
        EventType::Navigate => 250,
    }
}

#[async_trait]
impl DispatchTarget for SimulatedApp {
    async fn dispatch(
        &self,
        event_type: EventType,
        element_id: &str,
        value: Option<&InteractionValue>,
    ) -> Result<(), DispatchError> {
        let mut state = self.state.write().await;

        let kind = state
            .elements
            .get(element_id)
            .map(|e| e.kind)
            .ok_or_else(|| DispatchError::Rejected(format!("unknown element '{element_id}'")))?;
        if !self.allows(element_id, kind, event_type) {
            return Err(DispatchError::Rejected(format!(
                "{event_type} is not valid on a {kind:?} element"
            )));
        }

        match (event_type, value) {
            (EventType::Click, _) => {
                if let Some(el) = state.elements.get_mut(element_id) {
                    el.clicks += 1;
                }
                if kind == ElementKind::Link {
                    state.page = Some(element_id.to_string());
                }
            }
            (EventType::Scroll, Some(InteractionValue::Offset(offset))) => {
                if let Some(el) = state.elements.get_mut(element_id) {
                    el.scroll_offset = (*offset).max(0);
                }
            }
            // recorded scrolls may carry no offset
            (EventType::Scroll, None) => {}
            (EventType::Scroll, Some(_)) => {
                return Err(DispatchError::Rejected("scroll offset must be a number".to_string()));
            }
            (EventType::Type, Some(InteractionValue::Text(text))) => {
                if let Some(el) = state.elements.get_mut(element_id) {
                    el.text = text.clone();
                }
            }
            (EventType::Type, None) => {
                if let Some(el) = state.elements.get_mut(element_id) {
                    el.text.clear();
                }
            }
            (EventType::Type, Some(_)) => {
                return Err(DispatchError::Rejected("type requires text".to_string()));
            }
            (EventType::Hover, _) => {
                for (id, el) in state.elements.iter_mut() {
                    el.hovered = id == element_id;
                }
            }
            (EventType::Submit, _) => {
                let empty: Vec<String> = state
                    .elements
                    .iter()
                    .filter(|(_, el)| el.kind == ElementKind::Input && el.text.is_empty())
                    .map(|(id, _)| id.clone())
                    .collect();
                for input in empty {
                    state
                        .errors
                        .push(format!("submit '{element_id}': input '{input}' is empty"));
                }
            }
            (EventType::Navigate, value) => {
                let page = match value {
                    Some(InteractionValue::Text(target)) => target.clone(),
                    _ => element_id.to_string(),
                };
                state.page = Some(page);
            }
        }

        let seq = state.event_log.len() as u64 + 1;
        let latency_ms = latency_ms(event_type, value);
        state.event_log.push(LoggedEvent {
            seq,
            event_type,
            element_id: element_id.to_string(),
            value: value.cloned(),
            latency_ms,
        });
        debug!(seq, %event_type, element_id, latency_ms, "SimulatedApp handled event");
        Ok(())
    }

    async fn current_state(&self) -> Result<AppResponse, DispatchError> {
        let state = self.state.read().await;
        AppResponse::from_state(&state)
            .map_err(|e| DispatchError::Unreachable(format!("state capture failed: {e}")))
    }
}
