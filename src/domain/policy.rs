//! Feed-forward policy network loaded from a trained artifact.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::decision::DecisionSource;
use super::error::TraderError;
use super::observation::{OBS_LEN, Observation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Tanh,
    Relu,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
        }
    }
}

/// One fully connected layer; `weights` is `[out][in]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    fn inputs(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect()
    }
}

/// Hidden layers apply `activation`; the last layer yields one logit per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpPolicy {
    pub layers: Vec<DenseLayer>,
    #[serde(default)]
    pub activation: Activation,
}

impl MlpPolicy {
    pub fn validate(&self) -> Result<(), String> {
        let Some(first) = self.layers.first() else {
            return Err("policy has no layers".to_string());
        };
        if first.inputs() != OBS_LEN {
            return Err(format!(
                "first layer expects {} inputs, observation has {OBS_LEN}",
                first.inputs()
            ));
        }
        let mut width = OBS_LEN;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.iter().any(|row| row.len() != width) {
                return Err(format!("layer {i}: every weight row must have {width} entries"));
            }
            if layer.bias.len() != layer.outputs() {
                return Err(format!(
                    "layer {i}: bias has {} entries for {} outputs",
                    layer.bias.len(),
                    layer.outputs()
                ));
            }
            width = layer.outputs();
        }
        if width != Action::COUNT {
            return Err(format!(
                "last layer yields {width} logits, expected {}",
                Action::COUNT
            ));
        }
        Ok(())
    }

    /// Raw action logits for an observation.
    pub fn logits(&self, observation: &Observation) -> Vec<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut activations = observation.values().to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations);
            if i < last {
                for a in activations.iter_mut() {
                    *a = self.activation.apply(*a);
                }
            }
        }
        activations
    }
}

impl DecisionSource for MlpPolicy {
    fn name(&self) -> &str {
        "mlp-policy"
    }

    fn predict(&self, observation: &Observation) -> Result<Action, TraderError> {
        let logits = self.logits(observation);
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(TraderError::Decision {
                source_name: self.name().to_string(),
                reason: format!("non-finite logits {logits:?}"),
            });
        }
        // First maximum wins ties.
        let best = logits
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, &l)| {
                if l > best.1 { (i, l) } else { best }
            })
            .0;
        Action::from_index(best).ok_or_else(|| TraderError::Decision {
            source_name: self.name().to_string(),
            reason: format!("policy produced {} logits", logits.len()),
        })
    }
}
