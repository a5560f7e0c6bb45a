//! Feed-forward network predictor with weights loaded from a JSON model file.
//!
//! Topology mirrors a small Keras-style classifier: `10 -> relu -> relu ->
//! softmax(6)`. Hidden widths are whatever the model file declares.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SimError};
use crate::features::{FeatureVector, FEATURE_ARITY};
use crate::predictor::{Distribution, Predictor};
use crate::types::EventType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Softmax,
}

/// One fully connected layer. `weights[o][i]` connects input `i` to output `o`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let z: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();
        match self.activation {
            Activation::Linear => z,
            Activation::Relu => z.into_iter().map(|v| v.max(0.0)).collect(),
            Activation::Softmax => softmax(&z),
        }
    }
}

fn softmax(z: &[f32]) -> Vec<f32> {
    let max = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = z.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self> {
        let network = Self { layers };
        network.check_shapes()?;
        Ok(network)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let network: Self = serde_json::from_str(json)
            .map_err(|e| SimError::ModelInference(format!("invalid model file: {e}")))?;
        network.check_shapes()?;
        Ok(network)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            SimError::ModelInference(format!("cannot read model {}: {e}", path.display()))
        })?;
        let network = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            layers = network.layers.len(),
            "Loaded dense network"
        );
        Ok(network)
    }

    fn check_shapes(&self) -> Result<()> {
        let bad = |msg: String| -> Result<()> { Err(SimError::ModelInference(msg)) };

        let Some(last) = self.layers.last() else {
            return bad("model has no layers".to_string());
        };
        if last.activation != Activation::Softmax {
            return bad("output layer must use softmax".to_string());
        }
        if last.outputs() != EventType::COUNT {
            return bad(format!(
                "output layer has {} units, expected {}",
                last.outputs(),
                EventType::COUNT
            ));
        }

        let mut width = FEATURE_ARITY;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.outputs() == 0 || layer.weights.iter().any(|row| row.len() != width) {
                return bad(format!("layer {i} does not accept {width} inputs"));
            }
            if layer.bias.len() != layer.outputs() {
                return bad(format!(
                    "layer {i} has {} biases for {} units",
                    layer.bias.len(),
                    layer.outputs()
                ));
            }
            width = layer.outputs();
        }
        Ok(())
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.layers
            .iter()
            .fold(input.to_vec(), |acc, layer| layer.forward(&acc))
    }
}

#[async_trait]
impl Predictor for DenseNetwork {
    fn name(&self) -> &str {
        "dense"
    }

    async fn predict(&self, features: &FeatureVector) -> Result<Distribution> {
        Ok(Distribution::new(self.forward(features.as_slice())))
    }
}
