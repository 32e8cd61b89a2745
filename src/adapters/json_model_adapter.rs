//! JSON artifact adapter for trained policies and normalization statistics.
//!
//! Artifacts live in one directory, keyed by stock name:
//! `policy_<stock>.json` and `normalize_<stock>.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::error::TraderError;
use crate::domain::normalization::NormalizationStats;
use crate::domain::policy::MlpPolicy;
use crate::ports::model_port::ModelPort;

pub struct JsonModelAdapter {
    dir: PathBuf,
}

impl JsonModelAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn policy_path(&self, stock: &str) -> PathBuf {
        self.dir.join(format!("policy_{stock}.json"))
    }

    pub fn normalization_path(&self, stock: &str) -> PathBuf {
        self.dir.join(format!("normalize_{stock}.json"))
    }
}

fn require(path: &Path) -> Result<(), TraderError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TraderError::ArtifactMissing {
            path: path.to_path_buf(),
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, TraderError> {
    require(path)?;
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| TraderError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl ModelPort for JsonModelAdapter {
    fn ensure_artifacts(&self, stock: &str) -> Result<(), TraderError> {
        require(&self.policy_path(stock))?;
        require(&self.normalization_path(stock))
    }

    fn load_policy(&self, stock: &str) -> Result<MlpPolicy, TraderError> {
        let path = self.policy_path(stock);
        let policy: MlpPolicy = read_json(&path)?;
        policy
            .validate()
            .map_err(|reason| TraderError::ArtifactCorrupt {
                path: path.clone(),
                reason,
            })?;
        debug!(path = %path.display(), layers = policy.layers.len(), "loaded policy");
        Ok(policy)
    }

    fn load_normalization(&self, stock: &str) -> Result<NormalizationStats, TraderError> {
        let path = self.normalization_path(stock);
        let stats: NormalizationStats = read_json(&path)?;
        stats
            .validate()
            .map_err(|reason| TraderError::ArtifactCorrupt {
                path: path.clone(),
                reason,
            })?;
        debug!(path = %path.display(), "loaded normalization statistics");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observation::OBS_LEN;
    use tempfile::TempDir;

    fn policy_json() -> String {
        let rows: Vec<String> = (0..3)
            .map(|_| format!("[{}]", vec!["0.0"; OBS_LEN].join(",")))
            .collect();
        format!(
            r#"{{"layers":[{{"weights":[{}],"bias":[0.0,1.0,0.0]}}],"activation":"tanh"}}"#,
            rows.join(",")
        )
    }

    fn stats_json() -> String {
        format!(
            r#"{{"obs_mean":[{}],"obs_var":[{}],"ret_var":0.01}}"#,
            vec!["0.0"; OBS_LEN].join(","),
            vec!["1.0"; OBS_LEN].join(",")
        )
    }

    fn setup(policy: Option<&str>, stats: Option<&str>) -> (TempDir, JsonModelAdapter) {
        let dir = TempDir::new().unwrap();
        if let Some(p) = policy {
            fs::write(dir.path().join("policy_microsoft.json"), p).unwrap();
        }
        if let Some(s) = stats {
            fs::write(dir.path().join("normalize_microsoft.json"), s).unwrap();
        }
        let adapter = JsonModelAdapter::new(dir.path().to_path_buf());
        (dir, adapter)
    }

    #[test]
    fn loads_both_artifacts() {
        let (_dir, adapter) = setup(Some(&policy_json()), Some(&stats_json()));
        adapter.ensure_artifacts("microsoft").unwrap();
        let policy = adapter.load_policy("microsoft").unwrap();
        assert_eq!(policy.layers.len(), 1);
        let stats = adapter.load_normalization("microsoft").unwrap();
        assert!((stats.ret_var - 0.01).abs() < f64::EPSILON);
        assert!((stats.clip_obs - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_normalization_is_reported_before_parsing() {
        let (_dir, adapter) = setup(Some("not json"), None);
        let err = adapter.ensure_artifacts("microsoft").unwrap_err();
        match err {
            TraderError::ArtifactMissing { path } => {
                assert!(path.ends_with("normalize_microsoft.json"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_policy_is_reported() {
        let (_dir, adapter) = setup(None, Some(&stats_json()));
        let err = adapter.load_policy("microsoft").unwrap_err();
        assert!(matches!(err, TraderError::ArtifactMissing { .. }));
        assert!(err.to_string().contains("policy_microsoft.json"));
    }

    #[test]
    fn unparsable_policy_is_corrupt() {
        let (_dir, adapter) = setup(Some("{\"layers\": 3}"), Some(&stats_json()));
        assert!(matches!(
            adapter.load_policy("microsoft"),
            Err(TraderError::ArtifactCorrupt { .. })
        ));
    }

    #[test]
    fn wrong_shape_stats_are_corrupt() {
        let (_dir, adapter) = setup(
            Some(&policy_json()),
            Some(r#"{"obs_mean":[0.0],"obs_var":[1.0],"ret_var":1.0}"#),
        );
        assert!(matches!(
            adapter.load_normalization("microsoft"),
            Err(TraderError::ArtifactCorrupt { .. })
        ));
    }
}
