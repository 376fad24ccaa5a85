//! Daily-to-hourly demand expansion
//!
//! Distributes a single daily total over 24 hours using fixed weekday and
//! weekend shape profiles. No rounding happens here; display rounding is
//! left to the caller.

use crate::models::HOURS_PER_DAY;
use once_cell::sync::Lazy;

/// Raw weekday weights: commute peaks at 08:00 and 17:00
pub const WEEKDAY_WEIGHTS: [f64; HOURS_PER_DAY] = [
    0.01, 0.005, 0.005, 0.005, 0.01, 0.02, 0.05, 0.08, 0.1, 0.06, 0.04, 0.035, 0.035, 0.04, 0.05,
    0.06, 0.08, 0.12, 0.11, 0.07, 0.035, 0.02, 0.01, 0.005,
];

/// Raw weekend weights: a single broad midday hump
pub const WEEKEND_WEIGHTS: [f64; HOURS_PER_DAY] = [
    0.01, 0.008, 0.008, 0.008, 0.01, 0.02, 0.03, 0.05, 0.07, 0.08, 0.09, 0.095, 0.095, 0.09, 0.08,
    0.07, 0.06, 0.05, 0.04, 0.03, 0.02, 0.015, 0.012, 0.01,
];

static WEEKDAY: Lazy<DemandProfile> = Lazy::new(|| DemandProfile::from_weights(WEEKDAY_WEIGHTS));
static WEEKEND: Lazy<DemandProfile> = Lazy::new(|| DemandProfile::from_weights(WEEKEND_WEIGHTS));

/// A 24-hour weight curve normalized to sum to 1
#[derive(Debug, Clone, PartialEq)]
pub struct DemandProfile {
    weights: [f64; HOURS_PER_DAY],
}

impl DemandProfile {
    /// Normalize raw weights; negative weights count as 0 and an all-zero
    /// curve becomes uniform
    pub fn from_weights(raw: [f64; HOURS_PER_DAY]) -> Self {
        let clipped = raw.map(|w| w.max(0.0));
        let sum: f64 = clipped.iter().sum();
        let weights = if sum > 0.0 {
            clipped.map(|w| w / sum)
        } else {
            [1.0 / HOURS_PER_DAY as f64; HOURS_PER_DAY]
        };
        Self { weights }
    }

    pub fn weekday() -> &'static DemandProfile {
        &WEEKDAY
    }

    pub fn weekend() -> &'static DemandProfile {
        &WEEKEND
    }

    pub fn for_day(is_weekend: bool) -> &'static DemandProfile {
        if is_weekend {
            Self::weekend()
        } else {
            Self::weekday()
        }
    }

    pub fn weights(&self) -> &[f64; HOURS_PER_DAY] {
        &self.weights
    }
}

/// A synthesized hourly curve
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyCurve {
    pub by_hour: Vec<f64>,
    pub average: f64,
}

/// Expands daily totals into hourly curves
#[derive(Debug, Clone, Copy, Default)]
pub struct DemandProfileSynthesizer;

impl DemandProfileSynthesizer {
    pub fn expand(total: f64, is_weekend: bool) -> HourlyCurve {
        let profile = DemandProfile::for_day(is_weekend);
        let by_hour: Vec<f64> = profile.weights().iter().map(|w| w * total).collect();
        let average = by_hour.iter().sum::<f64>() / HOURS_PER_DAY as f64;
        HourlyCurve { by_hour, average }
    }
}
