//! Data model shared by every pipeline stage: synthetic interactions, the
//! batches they travel in, and the serialized app state a simulation captures.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// The closed set of interaction kinds a model can predict.
///
/// Ordinal order is the index order of every model output distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Click,
    Scroll,
    Type,
    Hover,
    Submit,
    Navigate,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::Click,
        EventType::Scroll,
        EventType::Type,
        EventType::Hover,
        EventType::Submit,
        EventType::Navigate,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::Scroll => "scroll",
            EventType::Type => "type",
            EventType::Hover => "hover",
            EventType::Submit => "submit",
            EventType::Navigate => "navigate",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown event type '{s}'"))
    }
}

/// Optional payload carried by an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractionValue {
    Offset(i64),
    Text(String),
}

impl InteractionValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            InteractionValue::Offset(n) => serde_json::Value::from(*n),
            InteractionValue::Text(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for InteractionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractionValue::Offset(n) => write!(f, "{n}"),
            InteractionValue::Text(s) => f.write_str(s),
        }
    }
}

/// One synthetic user action. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInteraction {
    event_type: EventType,
    element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<InteractionValue>,
}

impl UserInteraction {
    pub fn new(
        event_type: EventType,
        element_id: impl Into<String>,
        value: Option<InteractionValue>,
    ) -> Self {
        Self {
            event_type,
            element_id: element_id.into(),
            value,
        }
    }

    pub fn click(element_id: impl Into<String>) -> Self {
        Self::new(EventType::Click, element_id, None)
    }

    pub fn scroll(element_id: impl Into<String>, offset: i64) -> Self {
        Self::new(
            EventType::Scroll,
            element_id,
            Some(InteractionValue::Offset(offset)),
        )
    }

    pub fn typed(element_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            EventType::Type,
            element_id,
            Some(InteractionValue::Text(text.into())),
        )
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn value(&self) -> Option<&InteractionValue> {
        self.value.as_ref()
    }
}

/// Ordered interactions from one generation run. Order is replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionBatch {
    interactions: Vec<UserInteraction>,
}

impl InteractionBatch {
    pub fn new(interactions: Vec<UserInteraction>) -> Self {
        Self { interactions }
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UserInteraction> {
        self.interactions.iter()
    }

    pub fn as_slice(&self) -> &[UserInteraction] {
        &self.interactions
    }
}

impl<'a> IntoIterator for &'a InteractionBatch {
    type Item = &'a UserInteraction;
    type IntoIter = std::slice::Iter<'a, UserInteraction>;

    fn into_iter(self) -> Self::IntoIter {
        self.interactions.iter()
    }
}

/// Kind of a UI element in a simulated app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Panel,
    Input,
    Form,
    Link,
}

/// Observable state of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    pub kind: ElementKind,
    #[serde(default)]
    pub clicks: u32,
    #[serde(default)]
    pub scroll_offset: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub hovered: bool,
}

impl ElementState {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            clicks: 0,
            scroll_offset: 0,
            text: String::new(),
            hovered: false,
        }
    }
}

/// An event as the target app recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<InteractionValue>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl LoggedEvent {
    pub fn interaction(&self) -> UserInteraction {
        UserInteraction::new(self.event_type, self.element_id.clone(), self.value.clone())
    }
}

/// Structured form of an [`AppResponse`] body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub event_log: Vec<LoggedEvent>,
    #[serde(default)]
    pub elements: BTreeMap<String, ElementState>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

/// Captured output of the target app after a batch has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppResponse {
    pub body: String,
    pub captured_at: DateTime<Utc>,
}

impl AppResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            captured_at: Utc::now(),
        }
    }

    /// Response for a run that applied nothing to the target.
    pub fn empty() -> Self {
        Self::new("{}")
    }

    pub fn from_state(state: &AppState) -> Result<Self, SimError> {
        let body = serde_json::to_string(state)
            .map_err(|e| SimError::MalformedResponse(format!("state not serializable: {e}")))?;
        Ok(Self::new(body))
    }

    pub fn parse(&self) -> Result<AppState, SimError> {
        serde_json::from_str(&self.body).map_err(|e| SimError::MalformedResponse(e.to_string()))
    }
}
