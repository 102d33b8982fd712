//! On-disk model artifacts.
//!
//! Three zstd-compressed JSON files live in one directory:
//! `model.json.zst`, `scaler.json.zst` and `encoder.json.zst`. Each carries a
//! small envelope (format version, kind, id, creation time) around its payload.
//! Loading checks the envelope and the feature layout, so a model trained on a
//! different column set is rejected before any prediction is made.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::encoding::{OneHotEncoder, StandardScaler};
use crate::forest::{ForestError, RandomForest};
use crate::metrics::RegressionMetrics;
use crate::models::{FEATURE_NAMES, N_FEATURES};

pub const FORMAT_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "model.json.zst";
pub const SCALER_FILE: &str = "scaler.json.zst";
pub const ENCODER_FILE: &str = "encoder.json.zst";

const MODEL_COMPRESSION: i32 = 3;
const PREPROCESSOR_COMPRESSION: i32 = 2;

/// Columns the scaler is fitted on.
pub const SCALED_COLUMNS: [&str; 2] = ["Age", "Study_Hours_per_Week"];
/// Prefix of the one-hot learning style columns.
pub const STYLE_PREFIX: &str = "Preferred_Learning_Style";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to (de)compress {path}: {source}")]
    Compression {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed artifact {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{path} holds a {found:?} artifact, expected {expected:?}")]
    WrongKind {
        path: PathBuf,
        expected: ArtifactKind,
        found: ArtifactKind,
    },
    #[error("{path} has format version {found}, this build reads version {}", FORMAT_VERSION)]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("{artifact} columns {found:?} do not match expected {expected:?}")]
    FeatureMismatch {
        artifact: &'static str,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("invalid model: {0}")]
    InvalidModel(#[from] ForestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Scaler,
    Encoder,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    format_version: u32,
    kind: ArtifactKind,
    id: Uuid,
    created_at: DateTime<Utc>,
    payload: T,
}

/// The fitted regressor plus what it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub forest: RandomForest,
    pub feature_names: Vec<String>,
    pub target: String,
    pub train_rows: usize,
    pub holdout: Option<RegressionMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArtifactInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join(MODEL_FILE),
            scaler: dir.join(SCALER_FILE),
            encoder: dir.join(ENCODER_FILE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub model: ModelArtifact,
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
    pub info: ArtifactInfo,
}

impl ArtifactBundle {
    pub fn new(model: ModelArtifact, scaler: StandardScaler, encoder: OneHotEncoder) -> Self {
        Self {
            model,
            scaler,
            encoder,
            info: ArtifactInfo {
                id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn save(&self, dir: &Path) -> Result<ArtifactPaths, ArtifactError> {
        fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let paths = ArtifactPaths::in_dir(dir);

        write_artifact(&paths.model, ArtifactKind::Model, self.info, &self.model, MODEL_COMPRESSION)?;
        write_artifact(
            &paths.scaler,
            ArtifactKind::Scaler,
            self.info,
            &self.scaler,
            PREPROCESSOR_COMPRESSION,
        )?;
        write_artifact(
            &paths.encoder,
            ArtifactKind::Encoder,
            self.info,
            &self.encoder,
            PREPROCESSOR_COMPRESSION,
        )?;

        info!(dir = %dir.display(), id = %self.info.id, "artifacts written");
        Ok(paths)
    }

    pub fn load(dir: &Path) -> Result<Self, ArtifactError> {
        let paths = ArtifactPaths::in_dir(dir);
        let (info, model) = read_artifact::<ModelArtifact>(&paths.model, ArtifactKind::Model)?;
        let (_, scaler) = read_artifact::<StandardScaler>(&paths.scaler, ArtifactKind::Scaler)?;
        let (_, encoder) = read_artifact::<OneHotEncoder>(&paths.encoder, ArtifactKind::Encoder)?;

        let bundle = Self {
            model,
            scaler,
            encoder,
            info,
        };
        bundle.check()?;
        info!(
            dir = %dir.display(),
            id = %bundle.info.id,
            trees = bundle.model.forest.trees().len(),
            "artifacts loaded"
        );
        Ok(bundle)
    }

    /// Verifies that the three artifacts agree with the inference column layout.
    pub fn check(&self) -> Result<(), ArtifactError> {
        expect_columns("model", &FEATURE_NAMES, &self.model.feature_names)?;
        if self.model.forest.n_features() != N_FEATURES {
            return Err(ArtifactError::InvalidModel(ForestError::InvalidParams(
                "forest feature count does not match the inference layout",
            )));
        }
        self.model.forest.validate()?;

        expect_columns("scaler", &SCALED_COLUMNS, self.scaler.columns())?;
        expect_columns(
            "encoder",
            &FEATURE_NAMES[8..],
            &self.encoder.feature_names(STYLE_PREFIX),
        )?;
        Ok(())
    }
}

fn expect_columns(
    artifact: &'static str,
    expected: &[&str],
    found: &[String],
) -> Result<(), ArtifactError> {
    if expected.iter().copied().eq(found.iter().map(String::as_str)) {
        return Ok(());
    }
    Err(ArtifactError::FeatureMismatch {
        artifact,
        expected: expected.iter().map(|s| s.to_string()).collect(),
        found: found.to_vec(),
    })
}

fn write_artifact<T: Serialize>(
    path: &Path,
    kind: ArtifactKind,
    info: ArtifactInfo,
    payload: &T,
    level: i32,
) -> Result<(), ArtifactError> {
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        kind,
        id: info.id,
        created_at: info.created_at,
        payload,
    };
    let json = serde_json::to_vec(&envelope).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let compressed =
        zstd::encode_all(json.as_slice(), level).map_err(|source| ArtifactError::Compression {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, compressed).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_artifact<T: DeserializeOwned>(
    path: &Path,
    expected: ArtifactKind,
) -> Result<(ArtifactInfo, T), ArtifactError> {
    let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let json = zstd::decode_all(bytes.as_slice()).map_err(|source| ArtifactError::Compression {
        path: path.to_path_buf(),
        source,
    })?;

    // Peek at the header first so a wrong file reports its kind, not a payload error.
    #[derive(Deserialize)]
    struct Header {
        format_version: u32,
        kind: ArtifactKind,
    }
    let header: Header = serde_json::from_slice(&json).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if header.format_version != FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: header.format_version,
        });
    }
    if header.kind != expected {
        return Err(ArtifactError::WrongKind {
            path: path.to_path_buf(),
            expected,
            found: header.kind,
        });
    }

    let envelope: Envelope<T> =
        serde_json::from_slice(&json).map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((
        ArtifactInfo {
            id: envelope.id,
            created_at: envelope.created_at,
        },
        envelope.payload,
    ))
}
