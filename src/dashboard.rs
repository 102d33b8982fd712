//! View model for the three dashboard tabs. Everything here is a pure
//! function of the profile and its prediction.

use serde::Serialize;

use crate::models::StudentProfile;
use crate::predict::{Attribution, Prediction};
use crate::recommend::{self, RecommendationGroup};

/// Gauge delta reference point.
pub const GAUGE_REFERENCE: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeBand {
    NeedsImprovement,
    BelowAverage,
    Average,
    Good,
    Excellent,
}

impl GradeBand {
    /// Lower bounds are inclusive: exactly 90 is Excellent.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            GradeBand::Excellent
        } else if score >= 80.0 {
            GradeBand::Good
        } else if score >= 70.0 {
            GradeBand::Average
        } else if score >= 60.0 {
            GradeBand::BelowAverage
        } else {
            GradeBand::NeedsImprovement
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            GradeBand::Excellent => "#1a8f00",
            GradeBand::Good => "#4caf50",
            GradeBand::Average => "#ffb74d",
            GradeBand::BelowAverage => "#ff9800",
            GradeBand::NeedsImprovement => "#f44336",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeBand::Excellent => "🌟 Excellent!",
            GradeBand::Good => "👍 Good",
            GradeBand::Average => "🙂 Average",
            GradeBand::BelowAverage => "⚠️ Below Average",
            GradeBand::NeedsImprovement => "❌ Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeStep {
    pub from: f64,
    pub to: f64,
    pub color: &'static str,
}

pub const GAUGE_STEPS: [(f64, f64, &str); 5] = [
    (0.0, 60.0, "#e57373"),
    (60.0, 70.0, "#ffb74d"),
    (70.0, 80.0, "#ffd54f"),
    (80.0, 90.0, "#aed581"),
    (90.0, 100.0, "#388e3c"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gauge {
    pub value: f64,
    pub delta: f64,
    pub bar_color: &'static str,
    pub steps: Vec<GaugeStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub target: f64,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiCard {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceBar {
    pub feature: &'static str,
    pub magnitude: f64,
    pub value: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionTab {
    pub score: f64,
    pub band: GradeBand,
    pub band_label: &'static str,
    pub color: &'static str,
    pub gauge: Gauge,
    pub progress: Progress,
    pub kpis: Vec<KpiCard>,
    pub feedback: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationsTab {
    pub dominant_style: Option<&'static str>,
    pub groups: Vec<RecommendationGroup>,
    /// Shown instead of the groups when no rule fires.
    pub all_good: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceTab {
    pub baseline: f64,
    /// Ascending by magnitude.
    pub bars: Vec<ImportanceBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub prediction: PredictionTab,
    pub recommendations: RecommendationsTab,
    pub importance: ImportanceTab,
}

pub fn build_view(profile: &StudentProfile, prediction: &Prediction) -> DashboardView {
    DashboardView {
        prediction: prediction_tab(profile, prediction.score),
        recommendations: recommendations_tab(profile),
        importance: ImportanceTab {
            baseline: prediction.baseline,
            bars: importance_bars(&prediction.attributions),
        },
    }
}

fn prediction_tab(profile: &StudentProfile, score: f64) -> PredictionTab {
    let band = GradeBand::from_score(score);
    PredictionTab {
        score,
        band,
        band_label: band.label(),
        color: band.color(),
        gauge: gauge(score),
        progress: progress(score),
        kpis: kpi_cards(profile),
        feedback: feedback(score),
    }
}

pub fn gauge(score: f64) -> Gauge {
    Gauge {
        value: score,
        delta: score - GAUGE_REFERENCE,
        bar_color: GradeBand::from_score(score).color(),
        steps: GAUGE_STEPS
            .iter()
            .map(|&(from, to, color)| GaugeStep { from, to, color })
            .collect(),
    }
}

/// Percent of the way to the next band ceiling (90, then 100).
pub fn progress(score: f64) -> Progress {
    let target = if score < 90.0 { 90.0 } else { 100.0 };
    let percent = (score / target * 100.0).clamp(0.0, 100.0) as u32;
    Progress { target, percent }
}

pub fn feedback(score: f64) -> &'static str {
    if score < 70.0 {
        "💪 Keep pushing! Improve study habits to raise your grade."
    } else if score < 90.0 {
        "🚀 Great! Stay consistent to reach the next level."
    } else {
        "🏆 Excellent work! You're a top performer! 🎉🌟"
    }
}

pub fn kpi_cards(profile: &StudentProfile) -> Vec<KpiCard> {
    vec![
        KpiCard {
            label: "Study Hours/Week",
            value: profile.study_hours.to_string(),
        },
        KpiCard {
            label: "Attendance Rate (%)",
            value: profile.attendance.to_string(),
        },
        KpiCard {
            label: "Participation",
            value: if profile.participation { "Yes" } else { "No" }.to_string(),
        },
        KpiCard {
            label: "Stress Level",
            value: profile.stress.to_string(),
        },
    ]
}

pub fn importance_bars(attributions: &[Attribution]) -> Vec<ImportanceBar> {
    let mut bars: Vec<ImportanceBar> = attributions
        .iter()
        .map(|a| ImportanceBar {
            feature: a.feature,
            magnitude: a.value.abs(),
            value: a.value,
            color: if a.value > 0.0 { "#1f77b4" } else { "#ff7f0e" },
        })
        .collect();
    bars.sort_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
    bars
}

fn recommendations_tab(profile: &StudentProfile) -> RecommendationsTab {
    let recs = recommend::recommendations(profile);
    let groups = recommend::group(&recs);
    RecommendationsTab {
        dominant_style: recommend::dominant_style(profile).map(|style| style.label()),
        all_good: groups.is_empty().then_some(recommend::ALL_GOOD_MESSAGE),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_belong_to_the_higher_band() {
        assert_eq!(GradeBand::from_score(59.999), GradeBand::NeedsImprovement);
        assert_eq!(GradeBand::from_score(60.0), GradeBand::BelowAverage);
        assert_eq!(GradeBand::from_score(70.0), GradeBand::Average);
        assert_eq!(GradeBand::from_score(80.0), GradeBand::Good);
        assert_eq!(GradeBand::from_score(89.99), GradeBand::Good);
        assert_eq!(GradeBand::from_score(90.0), GradeBand::Excellent);
        assert_eq!(GradeBand::from_score(0.0), GradeBand::NeedsImprovement);
        assert_eq!(GradeBand::from_score(100.0), GradeBand::Excellent);
    }

    #[test]
    fn band_colors_match_the_gauge_palette() {
        assert_eq!(GradeBand::Excellent.color(), "#1a8f00");
        assert_eq!(GradeBand::NeedsImprovement.color(), "#f44336");
        assert_eq!(gauge(95.0).bar_color, "#1a8f00");
        assert_eq!(gauge(95.0).steps.len(), 5);
        assert_eq!(gauge(70.0).delta, -5.0);
    }

    #[test]
    fn progress_targets_the_next_ceiling() {
        assert_eq!(progress(45.0), Progress { target: 90.0, percent: 50 });
        assert_eq!(progress(89.9), Progress { target: 90.0, percent: 99 });
        assert_eq!(progress(90.0), Progress { target: 100.0, percent: 90 });
        assert_eq!(progress(100.0).percent, 100);
        assert_eq!(progress(-3.0).percent, 0);
    }

    #[test]
    fn feedback_has_three_tiers() {
        assert!(feedback(69.9).starts_with("💪"));
        assert!(feedback(70.0).starts_with("🚀"));
        assert!(feedback(90.0).starts_with("🏆"));
    }

    #[test]
    fn importance_bars_sort_ascending_and_keep_their_colour() {
        let attributions = vec![
            Attribution {
                feature: "Age",
                value: -3.0,
            },
            Attribution {
                feature: "Sleep_Hours_per_Night",
                value: 1.0,
            },
            Attribution {
                feature: "Gender_en",
                value: 0.0,
            },
        ];
        let bars = importance_bars(&attributions);
        let order: Vec<_> = bars.iter().map(|b| b.feature).collect();
        assert_eq!(order, vec!["Gender_en", "Sleep_Hours_per_Night", "Age"]);
        assert_eq!(bars[0].color, "#ff7f0e");
        assert_eq!(bars[1].color, "#1f77b4");
        assert_eq!(bars[2].color, "#ff7f0e");
        assert_eq!(bars[2].magnitude, 3.0);
    }

    #[test]
    fn view_shows_all_good_message_when_no_rule_fires() {
        let profile = StudentProfile {
            study_hours: 30,
            kinesthetic: false,
            reading_writing: false,
            visual: false,
            ..StudentProfile::default()
        };
        let prediction = Prediction {
            grade_code: 4.6,
            score: 92.0,
            baseline: 60.0,
            attributions: Vec::new(),
        };
        let view = build_view(&profile, &prediction);
        assert_eq!(view.prediction.band, GradeBand::Excellent);
        assert_eq!(view.recommendations.all_good, Some(recommend::ALL_GOOD_MESSAGE));
        assert!(view.recommendations.groups.is_empty());
        assert_eq!(view.recommendations.dominant_style, None);
        assert_eq!(view.prediction.kpis[2].value, "Yes");
    }
}
