//! Rule-based study advice.
//!
//! Each rule tests one profile value against a fixed threshold and, when it
//! fires, emits a message tagged with the category it belongs to.

use serde::Serialize;

use crate::models::StudentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    StudyHabits,
    StressLifestyle,
    LearningStyle,
}

impl Category {
    /// Display order of the recommendation buckets.
    pub const ALL: [Category; 3] = [
        Category::StudyHabits,
        Category::StressLifestyle,
        Category::LearningStyle,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Category::StudyHabits => "Study Habits",
            Category::StressLifestyle => "Stress & Lifestyle",
            Category::LearningStyle => "Learning Style Tips",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::StudyHabits => "📚",
            Category::StressLifestyle => "💆",
            Category::LearningStyle => "🎨",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub category: Category,
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LearningStyle {
    Kinesthetic,
    Visual,
    ReadingWriting,
}

impl LearningStyle {
    pub fn label(self) -> &'static str {
        match self {
            LearningStyle::Kinesthetic => "Kinesthetic",
            LearningStyle::Visual => "Visual",
            LearningStyle::ReadingWriting => "Reading/Writing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationGroup {
    pub category: Category,
    pub title: &'static str,
    pub icon: &'static str,
    pub messages: Vec<&'static str>,
}

pub const ALL_GOOD_MESSAGE: &str = "✅ Your current habits are strong! Keep it up! 🎉";

struct Rule {
    category: Category,
    message: &'static str,
    applies: fn(&StudentProfile) -> bool,
}

const RULES: [Rule; 8] = [
    Rule {
        category: Category::StudyHabits,
        message: "📚 Increase weekly study hours for better retention.",
        applies: |p| p.study_hours < 20,
    },
    Rule {
        category: Category::StudyHabits,
        message: "💬 Participate in discussions or forums.",
        applies: |p| !p.participation,
    },
    Rule {
        category: Category::StudyHabits,
        message: "🏫 Attend classes more consistently.",
        applies: |p| p.attendance < 90,
    },
    Rule {
        category: Category::StressLifestyle,
        message: "🧘 Reduce stress via mindfulness or breaks.",
        applies: |p| p.stress > 5,
    },
    Rule {
        category: Category::StressLifestyle,
        message: "📵 Limit social media while studying.",
        applies: |p| p.social_media > 10,
    },
    Rule {
        category: Category::LearningStyle,
        message: "👐 Include hands-on activities.",
        applies: |p| p.kinesthetic,
    },
    Rule {
        category: Category::LearningStyle,
        message: "🎨 Use diagrams, videos, and visual aids.",
        applies: |p| p.visual,
    },
    Rule {
        category: Category::LearningStyle,
        message: "📝 Read and summarize notes.",
        applies: |p| p.reading_writing,
    },
];

/// Evaluates every rule in order and keeps the ones that fire.
pub fn recommendations(profile: &StudentProfile) -> Vec<Recommendation> {
    RULES
        .iter()
        .filter(|rule| (rule.applies)(profile))
        .map(|rule| Recommendation {
            category: rule.category,
            message: rule.message,
        })
        .collect()
}

/// Arg-max over the style flags. Ties go to the earlier style in
/// Kinesthetic, Visual, Reading/Writing order; no flag set means no preference.
pub fn dominant_style(profile: &StudentProfile) -> Option<LearningStyle> {
    let scores = [
        (LearningStyle::Kinesthetic, u8::from(profile.kinesthetic)),
        (LearningStyle::Visual, u8::from(profile.visual)),
        (LearningStyle::ReadingWriting, u8::from(profile.reading_writing)),
    ];

    let mut best: Option<(LearningStyle, u8)> = None;
    for (style, score) in scores {
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((style, score));
        }
    }
    best.map(|(style, _)| style)
}

/// Buckets recommendations by category, keeping rule order inside a bucket.
pub fn group(recommendations: &[Recommendation]) -> Vec<RecommendationGroup> {
    Category::ALL
        .iter()
        .filter_map(|&category| {
            let messages: Vec<&'static str> = recommendations
                .iter()
                .filter(|r| r.category == category)
                .map(|r| r.message)
                .collect();
            (!messages.is_empty()).then(|| RecommendationGroup {
                category,
                title: category.title(),
                icon: category.icon(),
                messages,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_styles() -> StudentProfile {
        StudentProfile {
            kinesthetic: false,
            reading_writing: false,
            visual: false,
            ..StudentProfile::default()
        }
    }

    #[test]
    fn struggling_visual_learner_gets_five_tips_in_rule_order() {
        let profile = StudentProfile {
            study_hours: 10,
            attendance: 80,
            stress: 8,
            social_media: 15,
            participation: true,
            visual: true,
            ..no_styles()
        };
        let messages: Vec<_> = recommendations(&profile).iter().map(|r| r.message).collect();
        assert_eq!(
            messages,
            vec![
                "📚 Increase weekly study hours for better retention.",
                "🏫 Attend classes more consistently.",
                "🧘 Reduce stress via mindfulness or breaks.",
                "📵 Limit social media while studying.",
                "🎨 Use diagrams, videos, and visual aids.",
            ]
        );
    }

    #[test]
    fn thresholds_are_strict() {
        let profile = StudentProfile {
            study_hours: 20,
            attendance: 90,
            stress: 5,
            social_media: 10,
            participation: true,
            ..no_styles()
        };
        assert!(recommendations(&profile).is_empty());
        assert!(group(&recommendations(&profile)).is_empty());
    }

    #[test]
    fn every_rule_can_fire() {
        let profile = StudentProfile {
            study_hours: 0,
            participation: false,
            attendance: 0,
            stress: 10,
            social_media: 50,
            kinesthetic: true,
            reading_writing: true,
            visual: true,
            ..StudentProfile::default()
        };
        let recs = recommendations(&profile);
        assert_eq!(recs.len(), 8);
        assert_eq!(recs[1].message, "💬 Participate in discussions or forums.");
        assert_eq!(recs[7].message, "📝 Read and summarize notes.");
    }

    #[test]
    fn rules_tag_their_own_category() {
        let profile = StudentProfile {
            study_hours: 5,
            stress: 9,
            kinesthetic: true,
            ..no_styles()
        };
        let categories: Vec<_> = recommendations(&profile).iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::StudyHabits,
                Category::StressLifestyle,
                Category::LearningStyle,
            ]
        );
    }

    #[test]
    fn groups_follow_fixed_category_order_and_skip_empty_buckets() {
        let profile = StudentProfile {
            study_hours: 5,
            attendance: 50,
            stress: 2,
            social_media: 0,
            participation: true,
            reading_writing: true,
            visual: true,
            ..no_styles()
        };
        let groups = group(&recommendations(&profile));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "Study Habits");
        assert_eq!(groups[0].messages.len(), 2);
        assert_eq!(groups[1].title, "Learning Style Tips");
        assert_eq!(
            groups[1].messages,
            vec![
                "🎨 Use diagrams, videos, and visual aids.",
                "📝 Read and summarize notes.",
            ]
        );
    }

    #[test]
    fn single_flag_picks_that_style() {
        let profile = StudentProfile {
            kinesthetic: true,
            ..no_styles()
        };
        assert_eq!(dominant_style(&profile), Some(LearningStyle::Kinesthetic));

        let profile = StudentProfile {
            reading_writing: true,
            ..no_styles()
        };
        assert_eq!(dominant_style(&profile), Some(LearningStyle::ReadingWriting));
    }

    #[test]
    fn ties_go_to_the_earlier_style() {
        let profile = StudentProfile {
            reading_writing: true,
            visual: true,
            ..no_styles()
        };
        assert_eq!(dominant_style(&profile), Some(LearningStyle::Visual));

        let profile = StudentProfile {
            kinesthetic: true,
            reading_writing: true,
            visual: true,
            ..no_styles()
        };
        assert_eq!(dominant_style(&profile), Some(LearningStyle::Kinesthetic));
    }

    #[test]
    fn no_flags_means_no_preference() {
        assert_eq!(dominant_style(&no_styles()), None);
    }
}
