//! Trained artifact port trait: policy weights and normalization statistics.

use crate::domain::error::TraderError;
use crate::domain::normalization::NormalizationStats;
use crate::domain::policy::MlpPolicy;

pub trait ModelPort {
    /// Fails with `ArtifactMissing` before any parsing if either artifact
    /// for `stock` is absent.
    fn ensure_artifacts(&self, stock: &str) -> Result<(), TraderError>;

    fn load_policy(&self, stock: &str) -> Result<MlpPolicy, TraderError>;

    fn load_normalization(&self, stock: &str) -> Result<NormalizationStats, TraderError>;
}
