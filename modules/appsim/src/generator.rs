//! Interaction generator: turns history plus a predictor into a batch of
//! synthetic interactions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::features;
use crate::history::{HistoryProfile, HistorySource};
use crate::predictor::{Distribution, Predictor};
use crate::types::{EventType, InteractionBatch, UserInteraction};

/// How a predicted distribution becomes a concrete interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Highest probability wins; fully deterministic.
    #[default]
    ArgMax,
    /// Draw from the distribution with a seeded RNG; reproducible per seed.
    Sample { seed: u64 },
}

impl fmt::Display for DecodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodePolicy::ArgMax => f.write_str("argmax"),
            DecodePolicy::Sample { seed } => write!(f, "sample(seed={seed})"),
        }
    }
}

impl FromStr for DecodePolicy {
    type Err = String;

    /// Accepts `argmax`, `sample` (seed 0) or `sample:<seed>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "argmax" => Ok(DecodePolicy::ArgMax),
            "sample" => Ok(DecodePolicy::Sample { seed: 0 }),
            other => match other.strip_prefix("sample:") {
                Some(seed) => seed
                    .parse()
                    .map(|seed| DecodePolicy::Sample { seed })
                    .map_err(|_| format!("invalid seed '{seed}'")),
                None => Err(format!("unknown decode policy '{s}'")),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub history: HistorySource,
    pub decode: DecodePolicy,
    pub inference_timeout: Duration,
}

impl GeneratorConfig {
    pub fn new(history: HistorySource) -> Self {
        Self {
            history,
            decode: DecodePolicy::default(),
            inference_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_decode(mut self, decode: DecodePolicy) -> Self {
        self.decode = decode;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }
}

pub struct InteractionGenerator {
    config: GeneratorConfig,
    predictor: Arc<dyn Predictor>,
}

impl InteractionGenerator {
    pub fn new(config: GeneratorConfig, predictor: Arc<dyn Predictor>) -> Self {
        Self { config, predictor }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate exactly `count` interactions, or fail without a partial batch.
    pub async fn generate(&self, count: usize) -> Result<InteractionBatch> {
        let history = self.config.history.load().await?;
        let profile = history.profile();

        let mut rng = match self.config.decode {
            DecodePolicy::ArgMax => None,
            DecodePolicy::Sample { seed } => Some(StdRng::seed_from_u64(seed)),
        };

        let mut interactions = Vec::with_capacity(count);
        let mut previous: Option<EventType> = None;

        for step in 0..count {
            let features = features::encode_step(step, count, previous, &profile)?;
            let distribution = self.infer(&features).await?;

            let event_type = match rng.as_mut() {
                Some(rng) => distribution.sample(rng),
                None => distribution.argmax(),
            };
            let interaction = decode_interaction(event_type, &profile, rng.as_mut())?;

            debug!(
                step,
                event_type = %interaction.event_type(),
                element_id = interaction.element_id(),
                "Generated interaction"
            );
            previous = Some(event_type);
            interactions.push(interaction);
        }

        info!(
            count,
            predictor = self.predictor.name(),
            decode = %self.config.decode,
            "Generated interaction batch"
        );
        Ok(InteractionBatch::new(interactions))
    }

    async fn infer(&self, features: &features::FeatureVector) -> Result<Distribution> {
        let timeout = self.config.inference_timeout;
        let distribution = tokio::time::timeout(timeout, self.predictor.predict(features))
            .await
            .map_err(|_| {
                warn!(predictor = self.predictor.name(), ?timeout, "Inference timed out");
                SimError::ModelInference(format!("no prediction within {timeout:?}"))
            })?
            .map_err(|e| match e {
                SimError::ModelInference(_) => e,
                other => SimError::ModelInference(other.to_string()),
            })?;
        distribution.validate()?;
        Ok(distribution)
    }
}

fn decode_interaction(
    event_type: EventType,
    profile: &HistoryProfile,
    rng: Option<&mut StdRng>,
) -> Result<UserInteraction> {
    let element_id = match rng {
        Some(rng) => profile.sample_element(event_type, rng),
        None => profile.most_frequent_element(event_type),
    }
    .ok_or_else(|| SimError::DataUnavailable("history has no elements".to_string()))?;

    let value = profile.last_value(event_type, element_id).cloned();
    Ok(UserInteraction::new(event_type, element_id, value))
}
