//! Offline training: CSV → encoded matrix → random forest → artifacts.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::artifacts::{ArtifactBundle, ArtifactPaths, ModelArtifact, SCALED_COLUMNS, STYLE_PREFIX};
use crate::encoding::{self, OneHotEncoder, StandardScaler};
use crate::forest::{Dataset, ForestParams, RandomForest};
use crate::metrics::{self, RegressionMetrics};
use crate::models::{TrainingRecord, FEATURE_NAMES, N_FEATURES};

pub const TARGET_NAME: &str = "Final_Grade_en";
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub csv: PathBuf,
    pub out_dir: PathBuf,
    pub forest: ForestParams,
    pub test_size: f64,
    pub split_seed: u64,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: RegressionMetrics,
    pub paths: ArtifactPaths,
}

/// Encoded dataset plus the preprocessors fitted on it.
pub struct Prepared {
    pub dataset: Dataset,
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
}

pub fn read_records(path: &Path) -> anyhow::Result<Vec<TrainingRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<TrainingRecord>().enumerate() {
        // header is line 1
        let record = result.with_context(|| format!("malformed row at line {}", index + 2))?;
        records.push(record);
    }
    Ok(records)
}

/// Encodes categories, one-hot encodes learning style and standardizes age and
/// study hours. Fails on the first row with an unseen category.
pub fn prepare(records: &[TrainingRecord]) -> anyhow::Result<Prepared> {
    anyhow::ensure!(!records.is_empty(), "training data has no rows");

    let encoder = OneHotEncoder::fit(records.iter().map(|r| r.learning_style.as_str()))?;
    let expected_styles = &FEATURE_NAMES[8..];
    let style_names = encoder.feature_names(STYLE_PREFIX);
    anyhow::ensure!(
        style_names.iter().map(String::as_str).eq(expected_styles.iter().copied()),
        "learning style columns {:?} do not match {:?}",
        style_names,
        expected_styles
    );

    let ages: Vec<f64> = records.iter().map(|r| r.age).collect();
    let hours: Vec<f64> = records.iter().map(|r| r.study_hours).collect();
    let scaler = StandardScaler::fit(&SCALED_COLUMNS, &[ages, hours])?;

    let mut features = Vec::with_capacity(records.len() * N_FEATURES);
    let mut targets = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let row = encode_record(record, &scaler, &encoder)
            .with_context(|| format!("failed to encode record {}", index + 1))?;
        features.extend_from_slice(&row);
        targets.push(encoding::grade_code(&record.final_grade)?);
    }

    Ok(Prepared {
        dataset: Dataset::new(N_FEATURES, features, targets)?,
        scaler,
        encoder,
    })
}

fn encode_record(
    record: &TrainingRecord,
    scaler: &StandardScaler,
    encoder: &OneHotEncoder,
) -> Result<[f64; N_FEATURES], encoding::EncodingError> {
    let scaled = scaler.transform(&[record.age, record.study_hours])?;
    let styles = encoder.transform(&record.learning_style)?;
    Ok([
        scaled[0],
        scaled[1],
        encoding::yes_no_code("Participation_in_Discussions", &record.participation)?,
        record.attendance,
        encoding::stress_code(&record.stress)?,
        record.social_media,
        record.sleep,
        encoding::gender_code(&record.gender)?,
        styles[0],
        styles[1],
        styles[2],
    ])
}

/// Shuffled `(train, test)` row indices; the test side gets `ceil(n * test_size)` rows.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64) * test_size.clamp(0.0, 1.0)).ceil() as usize;
    let train = indices.split_off(n_test.min(n));
    (train, indices)
}

pub fn run(options: &TrainingOptions) -> anyhow::Result<TrainingSummary> {
    let records = read_records(&options.csv)?;
    info!(rows = records.len(), csv = %options.csv.display(), "training data loaded");

    let prepared = prepare(&records)?;
    let (train_idx, test_idx) =
        train_test_split(prepared.dataset.n_rows(), options.test_size, options.split_seed);
    anyhow::ensure!(!train_idx.is_empty(), "training split is empty");
    let train = prepared.dataset.select(&train_idx);
    let test = prepared.dataset.select(&test_idx);

    let forest = RandomForest::fit(&train, &options.forest)?;
    let predictions = forest.predict_dataset(&test);
    let metrics = metrics::evaluate(&predictions, test.targets());
    info!(
        mae = metrics.mae,
        mse = metrics.mse,
        rmse = metrics.rmse,
        r2 = metrics.r2,
        test_rows = test.n_rows(),
        "holdout evaluation"
    );

    let model = ModelArtifact {
        forest,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        target: TARGET_NAME.to_string(),
        train_rows: train.n_rows(),
        holdout: (test.n_rows() > 0).then_some(metrics),
    };
    let bundle = ArtifactBundle::new(model, prepared.scaler, prepared.encoder);
    let paths = bundle
        .save(&options.out_dir)
        .with_context(|| format!("failed to write artifacts to {}", options.out_dir.display()))?;

    Ok(TrainingSummary {
        rows: records.len(),
        train_rows: train.n_rows(),
        test_rows: test.n_rows(),
        metrics,
        paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StudentProfile;
    use crate::predict::Predictor;
    use crate::sample;
    use tempfile::tempdir;

    fn record(style: &str, grade: &str) -> TrainingRecord {
        TrainingRecord {
            age: 20.0,
            gender: "Female".to_string(),
            study_hours: 12.0,
            learning_style: style.to_string(),
            participation: "Yes".to_string(),
            attendance: 88.0,
            stress: "Medium".to_string(),
            social_media: 4.0,
            sleep: 7.0,
            final_grade: grade.to_string(),
        }
    }

    fn all_styles() -> Vec<TrainingRecord> {
        vec![
            record("Auditory", "A"),
            record("Kinesthetic", "B"),
            record("Reading/Writing", "C"),
            record("Visual", "F"),
        ]
    }

    #[test]
    fn split_sizes_follow_test_fraction() {
        let (train, test) = train_test_split(10, 0.2, 42);
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);
        let (train, test) = train_test_split(11, 0.2, 42);
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn split_is_reproducible() {
        assert_eq!(train_test_split(50, 0.2, 42), train_test_split(50, 0.2, 42));
    }

    #[test]
    fn prepare_encodes_rows_in_feature_order() {
        let prepared = prepare(&all_styles()).unwrap();
        assert_eq!(prepared.dataset.n_rows(), 4);
        assert_eq!(prepared.encoder.dropped(), "Auditory");

        let visual = prepared.dataset.row(3);
        // constant age and hours standardize to zero
        assert_eq!(&visual[..2], &[0.0, 0.0]);
        assert_eq!(visual[2], 1.0);
        assert_eq!(visual[3], 88.0);
        assert_eq!(visual[4], 1.0);
        assert_eq!(visual[7], 1.0);
        assert_eq!(&visual[8..], &[0.0, 0.0, 1.0]);
        assert_eq!(prepared.dataset.targets(), &[5.0, 4.0, 3.0, 0.0]);
    }

    #[test]
    fn unseen_category_aborts() {
        let mut records = all_styles();
        records[2].stress = "Extreme".to_string();
        let err = prepare(&records).err().unwrap();
        assert!(format!("{err:#}").contains("Extreme"));
    }

    #[test]
    fn missing_learning_style_level_is_rejected() {
        let records = vec![record("Visual", "A"), record("Kinesthetic", "B")];
        assert!(prepare(&records).is_err());
    }

    #[test]
    fn end_to_end_training_produces_loadable_artifacts() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("students.csv");
        sample::write_csv(&csv, 300, 11).unwrap();

        let options = TrainingOptions {
            csv,
            out_dir: dir.path().join("artifacts"),
            forest: ForestParams {
                n_estimators: 10,
                max_depth: 8,
                seed: Some(3),
                ..ForestParams::default()
            },
            test_size: DEFAULT_TEST_SIZE,
            split_seed: DEFAULT_SPLIT_SEED,
        };
        let summary = run(&options).unwrap();
        assert_eq!(summary.rows, 300);
        assert_eq!(summary.test_rows, 60);
        assert_eq!(summary.train_rows, 240);
        assert!(summary.metrics.rmse.is_finite());

        let bundle = ArtifactBundle::load(&options.out_dir).unwrap();
        assert_eq!(bundle.model.forest.trees().len(), 10);
        assert!(bundle.model.holdout.is_some());

        let predictor = Predictor::new(bundle);
        let prediction = predictor.predict(&StudentProfile::default()).unwrap();
        assert!((0.0..=100.0).contains(&prediction.score));
        let total: f64 = prediction.attributions.iter().map(|a| a.value).sum();
        assert!((prediction.baseline + total - prediction.score).abs() < 1e-6);
    }

    #[test]
    fn malformed_csv_row_aborts_with_line_number() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("bad.csv");
        std::fs::write(
            &csv,
            "Age,Gender,Study_Hours_per_Week,Preferred_Learning_Style,Participation_in_Discussions,\
Attendance_Rate (%),Self_Reported_Stress_Level,Time_Spent_on_Social_Media (hours/week),\
Sleep_Hours_per_Night,Final_Grade\n\
20,Male,10,Visual,Yes,90,Low,5,7,A\n\
abc,Male,10,Visual,Yes,90,Low,5,7,A\n",
        )
        .unwrap();
        let err = read_records(&csv).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }
}
