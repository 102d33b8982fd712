//! Synthetic student dataset with the same columns as the real survey export.

use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

const GENDERS: [&str; 3] = ["Male", "Female", "Other"];
const STYLES: [&str; 4] = ["Auditory", "Kinesthetic", "Reading/Writing", "Visual"];
const STRESS: [&str; 3] = ["Low", "Medium", "High"];

#[derive(Debug, Serialize)]
struct SampleRow {
    #[serde(rename = "Student_ID")]
    student_id: String,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Gender")]
    gender: &'static str,
    #[serde(rename = "Study_Hours_per_Week")]
    study_hours: u32,
    #[serde(rename = "Preferred_Learning_Style")]
    learning_style: &'static str,
    #[serde(rename = "Participation_in_Discussions")]
    participation: &'static str,
    #[serde(rename = "Attendance_Rate (%)")]
    attendance: u32,
    #[serde(rename = "Self_Reported_Stress_Level")]
    stress: &'static str,
    #[serde(rename = "Time_Spent_on_Social_Media (hours/week)")]
    social_media: u32,
    #[serde(rename = "Sleep_Hours_per_Night")]
    sleep: u32,
    #[serde(rename = "Exam_Score (%)")]
    exam_score: u32,
    #[serde(rename = "Final_Grade")]
    final_grade: &'static str,
}

fn letter(score: f64) -> &'static str {
    match score {
        s if s >= 85.0 => "A",
        s if s >= 75.0 => "B",
        s if s >= 65.0 => "C",
        s if s >= 55.0 => "D",
        s if s >= 45.0 => "E",
        _ => "F",
    }
}

fn sample_row(rng: &mut StdRng, index: usize) -> SampleRow {
    let study_hours: u32 = rng.random_range(5..=50);
    let attendance: u32 = rng.random_range(50..=100);
    let stress_level = rng.random_range(0..STRESS.len());
    let social_media: u32 = rng.random_range(0..=30);
    let sleep: u32 = rng.random_range(4..=10);
    let participation = rng.random_bool(0.5);

    let score = 40.0 + f64::from(study_hours) + 0.3 * (f64::from(attendance) - 60.0)
        - 4.0 * stress_level as f64
        + 2.0 * (f64::from(sleep) - 6.0)
        - 0.3 * f64::from(social_media)
        + if participation { 3.0 } else { 0.0 }
        + rng.random_range(-8.0_f64..8.0);
    let clamped = score.clamp(0.0, 100.0);

    SampleRow {
        student_id: format!("S{:05}", index + 1),
        age: rng.random_range(18..=30),
        gender: GENDERS[rng.random_range(0..GENDERS.len())],
        study_hours,
        learning_style: STYLES[rng.random_range(0..STYLES.len())],
        participation: if participation { "Yes" } else { "No" },
        attendance,
        stress: STRESS[stress_level],
        social_media,
        sleep,
        exam_score: clamped.round() as u32,
        final_grade: letter(clamped),
    }
}

/// Writes `rows` synthetic records to `path`; the same seed yields the same file.
pub fn write_csv(path: &Path, rows: usize, seed: u64) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    for index in 0..rows {
        writer.serialize(sample_row(&mut rng, index))?;
    }
    writer.flush()?;
    Ok(())
}
