//! Category codes, one-hot encoding and standardization for the student dataset.

use serde::{Deserialize, Serialize};

use crate::models::Gender;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodingError {
    #[error("unknown {column} value {value:?}")]
    UnknownCategory { column: &'static str, value: String },
    #[error("one-hot encoder needs at least one category")]
    NoCategories,
    #[error("expected {expected} columns, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[cfg(test)]
    #[error("row {0:?} is not a valid one-hot encoding")]
    InvalidOneHot(Vec<f64>),
}

fn unknown(column: &'static str, value: &str) -> EncodingError {
    EncodingError::UnknownCategory {
        column,
        value: value.to_string(),
    }
}

pub fn gender_code(value: &str) -> Result<f64, EncodingError> {
    match value.trim() {
        "Male" => Ok(0.0),
        "Female" => Ok(1.0),
        "Other" => Ok(2.0),
        other => Err(unknown("Gender", other)),
    }
}

impl Gender {
    pub fn code(self) -> f64 {
        match self {
            Gender::Male => 0.0,
            Gender::Female => 1.0,
            Gender::Other => 2.0,
        }
    }
}

pub fn yes_no_code(column: &'static str, value: &str) -> Result<f64, EncodingError> {
    match value.trim() {
        "No" => Ok(0.0),
        "Yes" => Ok(1.0),
        other => Err(unknown(column, other)),
    }
}

pub fn stress_code(value: &str) -> Result<f64, EncodingError> {
    match value.trim() {
        "Low" => Ok(0.0),
        "Medium" => Ok(1.0),
        "High" => Ok(2.0),
        other => Err(unknown("Self_Reported_Stress_Level", other)),
    }
}

/// Maps the 0-10 stress control onto the Low/Medium/High code the model saw.
pub fn stress_scale_code(level: u32) -> f64 {
    match level {
        0..=3 => 0.0,
        4..=6 => 1.0,
        _ => 2.0,
    }
}

pub fn grade_code(value: &str) -> Result<f64, EncodingError> {
    match value.trim() {
        "A" => Ok(5.0),
        "B" => Ok(4.0),
        "C" => Ok(3.0),
        "D" => Ok(2.0),
        "E" => Ok(1.0),
        "F" => Ok(0.0),
        other => Err(unknown("Final_Grade", other)),
    }
}

/// One-hot encoder that drops the first (sorted) category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    dropped: String,
    categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a, I>(values: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut distinct: Vec<String> = values.into_iter().map(|v| v.trim().to_string()).collect();
        distinct.sort();
        distinct.dedup();

        let mut iter = distinct.into_iter();
        let dropped = iter.next().ok_or(EncodingError::NoCategories)?;
        Ok(Self {
            dropped,
            categories: iter.collect(),
        })
    }

    /// Categories that get a column, in column order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn dropped(&self) -> &str {
        &self.dropped
    }

    pub fn feature_names(&self, prefix: &str) -> Vec<String> {
        self.categories
            .iter()
            .map(|category| format!("{prefix}_{category}"))
            .collect()
    }

    pub fn transform(&self, value: &str) -> Result<Vec<f64>, EncodingError> {
        let value = value.trim();
        if value == self.dropped {
            return Ok(vec![0.0; self.categories.len()]);
        }
        let position = self
            .categories
            .iter()
            .position(|category| category == value)
            .ok_or_else(|| unknown("Preferred_Learning_Style", value))?;

        let mut row = vec![0.0; self.categories.len()];
        row[position] = 1.0;
        Ok(row)
    }

    #[cfg(test)]
    pub fn inverse_transform(&self, row: &[f64]) -> Result<&str, EncodingError> {
        if row.len() != self.categories.len() {
            return Err(EncodingError::WidthMismatch {
                expected: self.categories.len(),
                actual: row.len(),
            });
        }

        let hot: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == 1.0)
            .map(|(i, _)| i)
            .collect();
        let cold = row.iter().filter(|v| **v == 0.0).count();

        match hot.as_slice() {
            [] if cold == row.len() => Ok(&self.dropped),
            [index] if cold == row.len() - 1 => Ok(&self.categories[*index]),
            _ => Err(EncodingError::InvalidOneHot(row.to_vec())),
        }
    }
}

/// Per-column standardization (population standard deviation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fits one mean/scale pair per column. All columns must be the same length.
    pub fn fit(names: &[&str], columns: &[Vec<f64>]) -> Result<Self, EncodingError> {
        if names.len() != columns.len() {
            return Err(EncodingError::WidthMismatch {
                expected: names.len(),
                actual: columns.len(),
            });
        }

        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for column in columns {
            let n = column.len().max(1) as f64;
            let mean = column.iter().sum::<f64>() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        Ok(Self {
            columns: names.iter().map(|n| n.to_string()).collect(),
            means,
            scales,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, EncodingError> {
        self.check_width(row)?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect())
    }

    #[cfg(test)]
    pub fn inverse_transform(&self, row: &[f64]) -> Result<Vec<f64>, EncodingError> {
        self.check_width(row)?;
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (mean, scale))| v * scale + mean)
            .collect())
    }

    fn check_width(&self, row: &[f64]) -> Result<(), EncodingError> {
        if row.len() != self.means.len() {
            return Err(EncodingError::WidthMismatch {
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles() -> OneHotEncoder {
        OneHotEncoder::fit(
            ["Visual", "Auditory", "Kinesthetic", "Reading/Writing", "Visual"]
                .iter()
                .copied(),
        )
        .unwrap()
    }

    #[test]
    fn one_hot_drops_first_sorted_category() {
        let encoder = styles();
        assert_eq!(encoder.dropped(), "Auditory");
        assert_eq!(
            encoder.feature_names("Preferred_Learning_Style"),
            vec![
                "Preferred_Learning_Style_Kinesthetic",
                "Preferred_Learning_Style_Reading/Writing",
                "Preferred_Learning_Style_Visual",
            ]
        );
    }

    #[test]
    fn one_hot_round_trips_every_category() {
        let encoder = styles();
        for category in ["Auditory", "Kinesthetic", "Reading/Writing", "Visual"] {
            let row = encoder.transform(category).unwrap();
            assert_eq!(encoder.inverse_transform(&row).unwrap(), category);
        }
        assert_eq!(encoder.transform("Auditory").unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(encoder.transform("Visual").unwrap(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn one_hot_rejects_unseen_and_malformed_input() {
        let encoder = styles();
        assert!(matches!(
            encoder.transform("Olfactory"),
            Err(EncodingError::UnknownCategory { .. })
        ));
        assert!(matches!(
            encoder.inverse_transform(&[1.0, 1.0, 0.0]),
            Err(EncodingError::InvalidOneHot(_))
        ));
        assert!(matches!(
            encoder.inverse_transform(&[1.0]),
            Err(EncodingError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn empty_fit_is_an_error() {
        let values: [&str; 0] = [];
        assert_eq!(
            OneHotEncoder::fit(values.iter().copied()),
            Err(EncodingError::NoCategories)
        );
    }

    #[test]
    fn scaler_standardizes_and_round_trips() {
        let ages = vec![18.0, 20.0, 22.0, 24.0];
        let hours = vec![10.0, 10.0, 10.0, 10.0];
        let scaler = StandardScaler::fit(&["Age", "Study_Hours_per_Week"], &[ages, hours]).unwrap();

        assert!((scaler.means()[0] - 21.0).abs() < 1e-12);
        assert!((scaler.scales()[0] - 5.0_f64.sqrt()).abs() < 1e-12);
        // constant column keeps unit scale
        assert_eq!(scaler.scales()[1], 1.0);

        let scaled = scaler.transform(&[23.0, 12.0]).unwrap();
        assert!((scaled[1] - 2.0).abs() < 1e-12);
        let restored = scaler.inverse_transform(&scaled).unwrap();
        assert!((restored[0] - 23.0).abs() < 1e-9);
        assert!((restored[1] - 12.0).abs() < 1e-9);
    }

    #[test]
    fn scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&["Age"], &[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0, 2.0]),
            Err(EncodingError::WidthMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn category_codes_follow_dataset_conventions() {
        assert_eq!(gender_code("Female").unwrap(), 1.0);
        assert_eq!(yes_no_code("Participation_in_Discussions", "Yes").unwrap(), 1.0);
        assert_eq!(stress_code("High").unwrap(), 2.0);
        assert_eq!(grade_code("A").unwrap(), 5.0);
        assert_eq!(grade_code("F").unwrap(), 0.0);
        assert!(grade_code("G").is_err());
        assert_eq!(Gender::Other.code(), 2.0);
    }

    #[test]
    fn stress_scale_maps_to_training_levels() {
        assert_eq!(stress_scale_code(0), 0.0);
        assert_eq!(stress_scale_code(3), 0.0);
        assert_eq!(stress_scale_code(4), 1.0);
        assert_eq!(stress_scale_code(6), 1.0);
        assert_eq!(stress_scale_code(7), 2.0);
        assert_eq!(stress_scale_code(10), 2.0);
    }
}
