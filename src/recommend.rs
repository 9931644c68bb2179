//! Activity recommendations
//!
//! Maps a stress estimate (and optional sentiment) onto a filtered subset of a
//! compiled-in activity catalog. Filtering keeps catalog order and never
//! randomizes.

use crate::types::{ActivityType, Intensity, Recommendation, StressIndicators};

/// Mean stress above which only short, low-intensity relief is offered
const HIGH_STRESS_THRESHOLD: f64 = 70.0;

/// Mean stress above which a mix of short and medium activities is offered
const MODERATE_STRESS_THRESHOLD: f64 = 40.0;

/// Sentiment below which calming breathing exercises are appended
const NEGATIVE_SENTIMENT_THRESHOLD: f64 = 0.3;

/// Upper bound on recommendations once sentiment adjustments apply
const MAX_RECOMMENDATIONS: usize = 3;

/// Static activity catalog, in declaration order
pub static CATALOG: [Recommendation; 6] = [
    Recommendation {
        activity: ActivityType::Breathing,
        title: "Deep Breathing",
        description: "Take slow, deep breaths to calm your mind and reduce stress.",
        duration_minutes: 5,
        intensity: Intensity::Low,
    },
    Recommendation {
        activity: ActivityType::Breathing,
        title: "Box Breathing",
        description: "Inhale, hold, exhale, and hold again in equal counts.",
        duration_minutes: 10,
        intensity: Intensity::Medium,
    },
    Recommendation {
        activity: ActivityType::Meditation,
        title: "Mindful Pause",
        description: "Take a moment to observe your thoughts without judgment.",
        duration_minutes: 5,
        intensity: Intensity::Low,
    },
    Recommendation {
        activity: ActivityType::Meditation,
        title: "Body Scan",
        description: "Focus on different parts of your body, releasing tension.",
        duration_minutes: 15,
        intensity: Intensity::Medium,
    },
    Recommendation {
        activity: ActivityType::Exercise,
        title: "Quick Stretch",
        description: "Simple stretches to release physical tension.",
        duration_minutes: 5,
        intensity: Intensity::Low,
    },
    Recommendation {
        activity: ActivityType::Exercise,
        title: "Desk Yoga",
        description: "Gentle yoga poses you can do at your desk.",
        duration_minutes: 10,
        intensity: Intensity::Medium,
    },
];

/// Stress tier derived from the mean channel stress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressTier {
    /// mean > 70
    High,
    /// 40 < mean <= 70
    Moderate,
    /// mean <= 40
    Low,
}

impl StressTier {
    /// Tier for a mean stress score; a mean on a threshold falls into the lower tier
    pub fn from_mean(mean: f64) -> Self {
        if mean > HIGH_STRESS_THRESHOLD {
            StressTier::High
        } else if mean > MODERATE_STRESS_THRESHOLD {
            StressTier::Moderate
        } else {
            StressTier::Low
        }
    }

    fn accepts(&self, entry: &Recommendation) -> bool {
        match self {
            StressTier::High => entry.intensity == Intensity::Low && entry.duration_minutes <= 5,
            StressTier::Moderate => {
                entry.intensity == Intensity::Medium || entry.duration_minutes <= 10
            }
            StressTier::Low => {
                entry.intensity == Intensity::Medium && entry.duration_minutes >= 10
            }
        }
    }

    fn limit(&self) -> usize {
        match self {
            StressTier::High => 2,
            StressTier::Moderate => 3,
            StressTier::Low => 2,
        }
    }
}

/// Recommend activities for the given indicators
pub fn recommend(indicators: &StressIndicators) -> Vec<Recommendation> {
    recommend_from(&CATALOG, indicators)
}

/// Recommend from an arbitrary catalog; [`recommend`] uses [`CATALOG`]
pub(crate) fn recommend_from(catalog: &[Recommendation], indicators: &StressIndicators) -> Vec<Recommendation> {
    let tier = StressTier::from_mean(indicators.mean_stress());

    let mut picks: Vec<Recommendation> = catalog
        .iter()
        .filter(|entry| tier.accepts(entry))
        .take(tier.limit())
        .copied()
        .collect();

    if let Some(sentiment) = indicators.sentiment {
        if sentiment < NEGATIVE_SENTIMENT_THRESHOLD {
            picks.extend(catalog.iter().filter(|entry| {
                entry.activity == ActivityType::Breathing && entry.intensity == Intensity::Low
            }));
            picks.truncate(MAX_RECOMMENDATIONS);
        }
    }

    picks
}

/// Human-readable guidance for a mean stress level
pub fn describe_stress_level(mean: f64) -> &'static str {
    match StressTier::from_mean(mean) {
        StressTier::High => {
            "High stress level detected. Consider taking a break and practicing deep breathing."
        }
        StressTier::Moderate => "Moderate stress level. Try some gentle exercises or meditation.",
        StressTier::Low => "Stress level is manageable. Focus on maintaining good habits.",
    }
}
