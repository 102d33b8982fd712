//! Page and report rendering.
//!
//! HTML goes through minijinja templates whose `.html` names turn on
//! auto-escaping; numbers are formatted here so the templates stay logic-free.
//! The markdown report is written directly.

use std::fmt::Write;

use minijinja::{context, Environment};
use serde::Serialize;

use crate::artifacts::ArtifactInfo;
use crate::dashboard::{DashboardView, GAUGE_REFERENCE};
use crate::models::{
    Gender, StudentProfile, AGE_RANGE, ATTENDANCE_RANGE, SLEEP_RANGE, SOCIAL_MEDIA_RANGE,
    STRESS_RANGE, STUDY_HOURS_RANGE,
};

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../templates/base.html")),
    ("form.html", include_str!("../templates/form.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("error.html", include_str!("../templates/error.html")),
];

#[derive(Debug, Serialize)]
struct NumberField {
    name: &'static str,
    label: &'static str,
    value: u32,
    min: u32,
    max: u32,
}

impl NumberField {
    fn new(name: &'static str, label: &'static str, value: u32, range: (u32, u32)) -> Self {
        Self {
            name,
            label,
            value,
            min: range.0,
            max: range.1,
        }
    }
}

#[derive(Debug, Serialize)]
struct YesNoField {
    name: &'static str,
    label: &'static str,
    value: bool,
}

#[derive(Debug, Serialize)]
struct GenderOption {
    slug: &'static str,
    label: &'static str,
    selected: bool,
}

/// Form controls pre-filled with the current profile.
#[derive(Debug, Serialize)]
struct FormContext {
    age: NumberField,
    genders: Vec<GenderOption>,
    study: Vec<NumberField>,
    participation: YesNoField,
    lifestyle: Vec<NumberField>,
    styles: Vec<YesNoField>,
}

impl FormContext {
    fn new(profile: &StudentProfile) -> Self {
        Self {
            age: NumberField::new("age", "Age 🎂", profile.age, AGE_RANGE),
            genders: Gender::ALL
                .iter()
                .map(|&gender| GenderOption {
                    slug: gender.slug(),
                    label: gender.label(),
                    selected: gender == profile.gender,
                })
                .collect(),
            study: vec![
                NumberField::new(
                    "study_hours",
                    "Study Hours/Week",
                    profile.study_hours,
                    STUDY_HOURS_RANGE,
                ),
                NumberField::new(
                    "attendance",
                    "Attendance Rate (%)",
                    profile.attendance,
                    ATTENDANCE_RANGE,
                ),
            ],
            participation: YesNoField {
                name: "participation",
                label: "Participate in Discussions?",
                value: profile.participation,
            },
            lifestyle: vec![
                NumberField::new("stress", "Stress Level 😫", profile.stress, STRESS_RANGE),
                NumberField::new("sleep", "Sleep Hours/Night 💤", profile.sleep, SLEEP_RANGE),
                NumberField::new(
                    "social_media",
                    "Social Media Hours/Week 📱",
                    profile.social_media,
                    SOCIAL_MEDIA_RANGE,
                ),
            ],
            styles: vec![
                YesNoField {
                    name: "kinesthetic",
                    label: "Kinesthetic 👐",
                    value: profile.kinesthetic,
                },
                YesNoField {
                    name: "reading_writing",
                    label: "Reading/Writing 📖",
                    value: profile.reading_writing,
                },
                YesNoField {
                    name: "visual",
                    label: "Visual 🎨",
                    value: profile.visual,
                },
            ],
        }
    }
}

#[derive(Debug, Serialize)]
struct Numbers {
    score: String,
    delta: String,
    reference: String,
    target: String,
    baseline: String,
}

#[derive(Debug, Serialize)]
struct BarRow {
    feature: &'static str,
    value: String,
    width: String,
    color: &'static str,
}

/// Largest impact first, widths relative to the largest bar.
fn bar_rows(view: &DashboardView) -> Vec<BarRow> {
    let bars = &view.importance.bars;
    let max = bars.iter().map(|bar| bar.magnitude).fold(0.0_f64, f64::max);
    bars.iter()
        .rev()
        .map(|bar| BarRow {
            feature: bar.feature,
            value: format!("{:+.2}", bar.value),
            width: format!(
                "{:.1}",
                if max > 0.0 { bar.magnitude / max * 100.0 } else { 0.0 }
            ),
            color: bar.color,
        })
        .collect()
}

/// Compiled HTML templates, built once at startup.
#[derive(Debug)]
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    /// Full dashboard page: the profile form followed by the three tabs.
    pub fn dashboard_page(
        &self,
        profile: &StudentProfile,
        view: &DashboardView,
    ) -> Result<String, minijinja::Error> {
        let tab = &view.prediction;
        let numbers = Numbers {
            score: format!("{:.2}", tab.score),
            delta: format!("{:+.2}", tab.gauge.delta),
            reference: format!("{:.0}", GAUGE_REFERENCE),
            target: format!("{:.0}", tab.progress.target),
            baseline: format!("{:.2}", view.importance.baseline),
        };
        self.env.get_template("dashboard.html")?.render(context! {
            form => FormContext::new(profile),
            prediction => tab,
            recommendations => &view.recommendations,
            numbers => numbers,
            bars => bar_rows(view),
        })
    }

    /// Page shown when the submitted profile cannot be scored.
    pub fn error_page(
        &self,
        profile: &StudentProfile,
        message: &str,
    ) -> Result<String, minijinja::Error> {
        self.env.get_template("error.html")?.render(context! {
            form => FormContext::new(profile),
            message => message,
        })
    }
}

/// Markdown version of the dashboard for one profile.
pub fn markdown_report(
    profile: &StudentProfile,
    view: &DashboardView,
    info: &ArtifactInfo,
) -> String {
    let mut output = String::new();
    let tab = &view.prediction;

    let _ = writeln!(output, "# Personalized Learning Report");
    let _ = writeln!(
        output,
        "Model {} (trained {})",
        info.id,
        info.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Profile");
    let _ = writeln!(
        output,
        "- Age {}, {}, study {} h/week, attendance {}%",
        profile.age,
        profile.gender.label(),
        profile.study_hours,
        profile.attendance
    );
    let _ = writeln!(
        output,
        "- Stress {}/10, sleep {} h/night, social media {} h/week",
        profile.stress, profile.sleep, profile.social_media
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Prediction");
    let _ = writeln!(output, "- Predicted grade: {:.2} ({})", tab.score, tab.band_label);
    let _ = writeln!(
        output,
        "- Progress to next grade: {}% of {:.0}",
        tab.progress.percent, tab.progress.target
    );
    let _ = writeln!(output, "- {}", tab.feedback);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");
    let _ = writeln!(
        output,
        "Dominant learning style: {}",
        view.recommendations
            .dominant_style
            .unwrap_or("No preference")
    );
    if let Some(message) = view.recommendations.all_good {
        let _ = writeln!(output, "{message}");
    }
    for group in &view.recommendations.groups {
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} {}", group.icon, group.title);
        for message in &group.messages {
            let _ = writeln!(output, "- {message}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feature Importance");
    let _ = writeln!(output, "Baseline score {:.2}", view.importance.baseline);
    for bar in view.importance.bars.iter().rev() {
        let _ = writeln!(output, "- {}: {:+.2}", bar.feature, bar.value);
    }

    output
}
