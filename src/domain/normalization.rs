//! Observation and reward rescaling with statistics frozen at training time.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::environment::{Environment, StepOutcome};
use super::error::TraderError;
use super::observation::{OBS_LEN, Observation};

fn default_clip() -> f64 {
    10.0
}

fn default_epsilon() -> f64 {
    1e-8
}

fn default_true() -> bool {
    true
}

/// Running mean/variance snapshot saved alongside a trained policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub obs_mean: Vec<f64>,
    pub obs_var: Vec<f64>,
    pub ret_var: f64,
    #[serde(default = "default_clip")]
    pub clip_obs: f64,
    #[serde(default = "default_clip")]
    pub clip_reward: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_true")]
    pub norm_obs: bool,
    #[serde(default = "default_true")]
    pub norm_reward: bool,
}

impl NormalizationStats {
    /// Pass-through statistics, for decision sources that read raw observations.
    pub fn identity() -> Self {
        NormalizationStats {
            obs_mean: vec![0.0; OBS_LEN],
            obs_var: vec![1.0; OBS_LEN],
            ret_var: 1.0,
            clip_obs: f64::INFINITY,
            clip_reward: f64::INFINITY,
            epsilon: 0.0,
            norm_obs: false,
            norm_reward: false,
        }
    }

    /// Checks shape and ranges; the error string names the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.obs_mean.len() != OBS_LEN || self.obs_var.len() != OBS_LEN {
            return Err(format!(
                "expected {OBS_LEN} observation statistics, got mean={} var={}",
                self.obs_mean.len(),
                self.obs_var.len()
            ));
        }
        if self.obs_mean.iter().any(|m| !m.is_finite()) {
            return Err("obs_mean contains non-finite values".to_string());
        }
        if self.obs_var.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("obs_var must be finite and non-negative".to_string());
        }
        if !(self.ret_var.is_finite() && self.ret_var >= 0.0) {
            return Err("ret_var must be finite and non-negative".to_string());
        }
        if self.epsilon < 0.0 || self.clip_obs <= 0.0 || self.clip_reward <= 0.0 {
            return Err("epsilon must be non-negative and clip bounds positive".to_string());
        }
        Ok(())
    }

    pub fn normalize_observation(&self, obs: &Observation) -> Observation {
        if !self.norm_obs {
            return *obs;
        }
        let mut out = [0.0; OBS_LEN];
        for (i, value) in obs.values().iter().enumerate() {
            let scaled = (value - self.obs_mean[i]) / (self.obs_var[i] + self.epsilon).sqrt();
            out[i] = scaled.clamp(-self.clip_obs, self.clip_obs);
        }
        Observation(out)
    }

    pub fn normalize_reward(&self, reward: f64) -> f64 {
        if !self.norm_reward {
            return reward;
        }
        (reward / (self.ret_var + self.epsilon).sqrt()).clamp(-self.clip_reward, self.clip_reward)
    }
}

/// Wraps an environment so the decision source only ever sees normalized values.
pub struct NormalizedEnv<E> {
    inner: E,
    stats: NormalizationStats,
}

impl<E: Environment> NormalizedEnv<E> {
    pub fn new(inner: E, stats: NormalizationStats) -> Result<Self, TraderError> {
        stats.validate().map_err(|reason| TraderError::ConfigInvalid {
            section: "models".to_string(),
            key: "normalization".to_string(),
            reason,
        })?;
        Ok(NormalizedEnv { inner, stats })
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Environment> Environment for NormalizedEnv<E> {
    fn reset(&mut self) -> Observation {
        let obs = self.inner.reset();
        self.stats.normalize_observation(&obs)
    }

    fn step(&mut self, action: Action) -> Result<StepOutcome, TraderError> {
        let mut outcome = self.inner.step(action)?;
        outcome.observation = self.stats.normalize_observation(&outcome.observation);
        outcome.reward = self.stats.normalize_reward(outcome.reward);
        Ok(outcome)
    }

    fn max_steps(&self) -> usize {
        self.inner.max_steps()
    }
}
