//! Predictor boundary: anything that maps a feature vector to a probability
//! distribution over [`EventType`].

use async_trait::async_trait;
use rand::Rng;

use crate::error::{Result, SimError};
use crate::features::FeatureVector;
use crate::history::InteractionHistory;
use crate::types::EventType;

const SUM_TOLERANCE: f32 = 1e-3;

/// Probabilities indexed by [`EventType::index`].
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution(Vec<f32>);

impl Distribution {
    pub fn new(probabilities: Vec<f32>) -> Self {
        Self(probabilities)
    }

    /// Normalize raw non-negative weights. All-zero weights become uniform.
    pub fn from_weights(weights: &[f32]) -> Self {
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            let p = 1.0 / weights.len().max(1) as f32;
            return Self(vec![p; weights.len()]);
        }
        Self(weights.iter().map(|w| w / total).collect())
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.0
    }

    /// Check the output contract: one finite, non-negative probability per
    /// event type, summing to one.
    pub fn validate(&self) -> Result<()> {
        if self.0.len() != EventType::COUNT {
            return Err(SimError::ModelInference(format!(
                "distribution has {} entries, expected {}",
                self.0.len(),
                EventType::COUNT
            )));
        }
        if let Some(p) = self.0.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(SimError::ModelInference(format!("invalid probability {p}")));
        }
        let sum: f32 = self.0.iter().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(SimError::ModelInference(format!(
                "probabilities sum to {sum}"
            )));
        }
        Ok(())
    }

    /// Highest-probability event type; ties go to the lowest ordinal.
    pub fn argmax(&self) -> EventType {
        let mut best = 0;
        for (i, p) in self.0.iter().enumerate() {
            if *p > self.0[best] {
                best = i;
            }
        }
        EventType::from_index(best).unwrap_or(EventType::Click)
    }

    /// Event type drawn from the distribution.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> EventType {
        let r: f32 = rng.random();
        let mut acc = 0.0;
        for (i, p) in self.0.iter().enumerate() {
            acc += p;
            if r < acc {
                return EventType::from_index(i).unwrap_or(EventType::Click);
            }
        }
        // r landed in the rounding gap above the cumulative sum
        let last = self.0.iter().rposition(|p| *p > 0.0).unwrap_or(0);
        EventType::from_index(last).unwrap_or(EventType::Click)
    }
}

/// A model that predicts the next interaction type.
#[async_trait]
pub trait Predictor: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(&self, features: &FeatureVector) -> Result<Distribution>;
}

/// First-order Markov model over event types, fitted from recorded sessions.
#[derive(Debug, Clone)]
pub struct MarkovPredictor {
    start: Distribution,
    transitions: Vec<Distribution>,
}

impl MarkovPredictor {
    pub fn fit(history: &InteractionHistory) -> Self {
        let mut overall = [0.0f32; EventType::COUNT];
        let mut start = [0.0f32; EventType::COUNT];
        let mut transitions = [[0.0f32; EventType::COUNT]; EventType::COUNT];

        for session in history.sessions() {
            let types: Vec<EventType> = session
                .iter()
                .map(|r| r.interaction.event_type())
                .collect();
            for t in &types {
                overall[t.index()] += 1.0;
            }
            if let Some(first) = types.first() {
                start[first.index()] += 1.0;
            }
            for pair in types.windows(2) {
                transitions[pair[0].index()][pair[1].index()] += 1.0;
            }
        }

        let row = |counts: &[f32; EventType::COUNT]| {
            if counts.iter().sum::<f32>() > 0.0 {
                Distribution::from_weights(counts)
            } else {
                Distribution::from_weights(&overall)
            }
        };

        Self {
            start: row(&start),
            transitions: transitions.iter().map(row).collect(),
        }
    }

    pub fn start(&self) -> &Distribution {
        &self.start
    }

    pub fn transition(&self, from: EventType) -> &Distribution {
        &self.transitions[from.index()]
    }
}

#[async_trait]
impl Predictor for MarkovPredictor {
    fn name(&self) -> &str {
        "markov"
    }

    async fn predict(&self, features: &FeatureVector) -> Result<Distribution> {
        match features.previous_event() {
            Some(prev) if !features.is_start() => Ok(self.transition(prev).clone()),
            _ => Ok(self.start.clone()),
        }
    }
}
