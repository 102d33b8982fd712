use serde::Serialize;
use tracing::debug;

use crate::artifacts::{ArtifactBundle, ArtifactInfo};
use crate::encoding::{stress_scale_code, EncodingError};
use crate::models::{FeatureVector, StudentProfile, FEATURE_NAMES, N_FEATURES};
use crate::shap::TreeExplainer;

/// Score points per grade step: the model predicts a 0-5 grade code and the
/// dashboard reports it on a 0-100 scale.
pub const SCORE_PER_GRADE: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub feature: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Raw model output (0-5 grade code).
    pub grade_code: f64,
    /// `grade_code` on the 0-100 dashboard scale.
    pub score: f64,
    /// Expected score over the training data, on the same scale.
    pub baseline: f64,
    /// One signed contribution per feature; `baseline + sum == score`.
    pub attributions: Vec<Attribution>,
}

/// Loaded artifacts plus the inference pipeline built on them.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    pub fn new(bundle: ArtifactBundle) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn info(&self) -> ArtifactInfo {
        self.bundle.info
    }

    /// Encodes a profile exactly the way the training rows were encoded.
    pub fn features(&self, profile: &StudentProfile) -> Result<FeatureVector, EncodingError> {
        let scaled = self
            .bundle
            .scaler
            .transform(&[f64::from(profile.age), f64::from(profile.study_hours)])?;
        let styles = style_columns(profile);
        if styles.len() != self.bundle.encoder.categories().len() {
            return Err(EncodingError::WidthMismatch {
                expected: self.bundle.encoder.categories().len(),
                actual: styles.len(),
            });
        }

        let values: [f64; N_FEATURES] = [
            scaled[0],
            scaled[1],
            flag(profile.participation),
            f64::from(profile.attendance),
            stress_scale_code(profile.stress),
            f64::from(profile.social_media),
            f64::from(profile.sleep),
            profile.gender.code(),
            styles[0],
            styles[1],
            styles[2],
        ];
        Ok(FeatureVector { values })
    }

    pub fn predict(&self, profile: &StudentProfile) -> Result<Prediction, EncodingError> {
        let features = self.features(profile)?;
        debug!(features = ?features.named().collect::<Vec<_>>(), "profile encoded");
        let forest = &self.bundle.model.forest;
        let grade_code = forest.predict(features.as_slice());
        let shap = TreeExplainer::new(forest)
            .explain(features.as_slice())
            .scaled(SCORE_PER_GRADE);

        let attributions = FEATURE_NAMES
            .iter()
            .zip(shap.values.iter())
            .map(|(feature, value)| Attribution {
                feature: *feature,
                value: *value,
            })
            .collect();

        Ok(Prediction {
            grade_code,
            score: grade_code * SCORE_PER_GRADE,
            baseline: shap.baseline,
            attributions,
        })
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Learning style flags in encoder column order (Kinesthetic, Reading/Writing, Visual).
fn style_columns(profile: &StudentProfile) -> Vec<f64> {
    vec![
        flag(profile.kinesthetic),
        flag(profile.reading_writing),
        flag(profile.visual),
    ]
}
