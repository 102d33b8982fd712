use serde::{Deserialize, Serialize};

/// Number of model input columns.
pub const N_FEATURES: usize = 11;

/// Model input columns, in the order the forest was trained on.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "Age",
    "Study_Hours_per_Week",
    "Participation_in_Discussions_en",
    "Attendance_Rate (%)",
    "Self_Reported_Stress_Level_en",
    "Time_Spent_on_Social_Media (hours/week)",
    "Sleep_Hours_per_Night",
    "Gender_en",
    "Preferred_Learning_Style_Kinesthetic",
    "Preferred_Learning_Style_Reading/Writing",
    "Preferred_Learning_Style_Visual",
];

/// One row of the student performance dataset.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainingRecord {
    #[serde(rename = "Age")]
    pub age: f64,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Study_Hours_per_Week")]
    pub study_hours: f64,
    #[serde(rename = "Preferred_Learning_Style")]
    pub learning_style: String,
    #[serde(rename = "Participation_in_Discussions")]
    pub participation: String,
    #[serde(rename = "Attendance_Rate (%)")]
    pub attendance: f64,
    #[serde(rename = "Self_Reported_Stress_Level")]
    pub stress: String,
    #[serde(rename = "Time_Spent_on_Social_Media (hours/week)")]
    pub social_media: f64,
    #[serde(rename = "Sleep_Hours_per_Night")]
    pub sleep: f64,
    #[serde(rename = "Final_Grade")]
    pub final_grade: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

/// Dashboard input: the values a student sets on the controls.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StudentProfile {
    pub age: u32,
    pub gender: Gender,
    pub study_hours: u32,
    pub attendance: u32,
    pub participation: bool,
    pub stress: u32,
    pub sleep: u32,
    pub social_media: u32,
    pub kinesthetic: bool,
    pub reading_writing: bool,
    pub visual: bool,
}

impl Default for StudentProfile {
    fn default() -> Self {
        Self {
            age: 20,
            gender: Gender::Male,
            study_hours: 15,
            attendance: 90,
            participation: true,
            stress: 5,
            sleep: 7,
            social_media: 5,
            kinesthetic: false,
            reading_writing: true,
            visual: true,
        }
    }
}

/// Inclusive bounds of each numeric control.
pub const AGE_RANGE: (u32, u32) = (10, 100);
pub const STUDY_HOURS_RANGE: (u32, u32) = (0, 50);
pub const ATTENDANCE_RANGE: (u32, u32) = (0, 100);
pub const STRESS_RANGE: (u32, u32) = (0, 10);
pub const SLEEP_RANGE: (u32, u32) = (0, 12);
pub const SOCIAL_MEDIA_RANGE: (u32, u32) = (0, 50);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} must be between {min} and {max}, got {value}")]
pub struct ProfileError {
    pub field: &'static str,
    pub value: u32,
    pub min: u32,
    pub max: u32,
}

impl StudentProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let checks = [
            ("age", self.age, AGE_RANGE),
            ("study_hours", self.study_hours, STUDY_HOURS_RANGE),
            ("attendance", self.attendance, ATTENDANCE_RANGE),
            ("stress", self.stress, STRESS_RANGE),
            ("sleep", self.sleep, SLEEP_RANGE),
            ("social_media", self.social_media, SOCIAL_MEDIA_RANGE),
        ];

        for (field, value, (min, max)) in checks {
            if value < min || value > max {
                return Err(ProfileError {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// A single encoded model input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub values: [f64; N_FEATURES],
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Pairs each value with its column name.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}
