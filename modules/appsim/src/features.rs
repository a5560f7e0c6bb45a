//! Fixed-width feature vectors fed to predictors.
//!
//! Layout (arity 10, every component in `[0, 1]`):
//!
//! | index | meaning |
//! |---|---|
//! | 0..6 | one-hot of the previous event type (all zero on the first step) |
//! | 6 | start flag |
//! | 7 | position in batch, `step / count` |
//! | 8 | mean historical scroll offset, normalized |
//! | 9 | mean historical text length, normalized |

use crate::error::{Result, SimError};
use crate::history::HistoryProfile;
use crate::types::EventType;

pub const FEATURE_ARITY: usize = 10;

const START: usize = EventType::COUNT;
const POSITION: usize = START + 1;
const SCROLL: usize = START + 2;
const TEXT: usize = START + 3;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f32; FEATURE_ARITY]);

impl FeatureVector {
    pub fn new(values: &[f32]) -> Result<Self> {
        let values: [f32; FEATURE_ARITY] = values.try_into().map_err(|_| {
            SimError::ModelInference(format!(
                "feature vector has arity {}, expected {FEATURE_ARITY}",
                values.len()
            ))
        })?;
        if let Some((i, v)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(*v))
        {
            return Err(SimError::ModelInference(format!(
                "feature {i} = {v} is outside [0, 1]"
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_start(&self) -> bool {
        self.0[START] > 0.5
    }

    /// Previous event type recovered from the one-hot block.
    pub fn previous_event(&self) -> Option<EventType> {
        self.0[..EventType::COUNT]
            .iter()
            .position(|&v| v > 0.5)
            .and_then(EventType::from_index)
    }
}

/// Encode the features for one generation step.
pub fn encode_step(
    step: usize,
    count: usize,
    previous: Option<EventType>,
    profile: &HistoryProfile,
) -> Result<FeatureVector> {
    let mut values = [0.0f32; FEATURE_ARITY];
    match previous {
        Some(t) => values[t.index()] = 1.0,
        None => values[START] = 1.0,
    }
    values[POSITION] = if count == 0 {
        0.0
    } else {
        step as f32 / count as f32
    };
    values[SCROLL] = profile.scroll_feature();
    values[TEXT] = profile.text_feature();
    FeatureVector::new(&values)
}
