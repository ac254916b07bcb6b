//! Per-scenario classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Delta (percentage points) above which a scenario counts as improved
pub const IMPROVED_THRESHOLD: f64 = 10.0;
/// Delta below which a scenario counts as regressed
pub const REGRESSION_THRESHOLD: f64 = -10.0;
pub const EXCELLENT_THRESHOLD: f64 = 90.0;
pub const GOOD_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Classification {
    Improved,
    Regression,
    Excellent,
    Good,
    NeedsWork,
}

impl Classification {
    pub fn label(self) -> &'static str {
        match self {
            Classification::Improved => "IMPROVED",
            Classification::Regression => "REGRESSION",
            Classification::Excellent => "EXCELLENT",
            Classification::Good => "GOOD",
            Classification::NeedsWork => "NEEDS-WORK",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a shared scenario from its delta and the candidate's pass percentage.
///
/// Strict comparisons: a delta of exactly +10 or -10 falls through to the
/// absolute labels.
pub fn classify(delta: f64, candidate_pct: f64) -> Classification {
    if delta > IMPROVED_THRESHOLD {
        Classification::Improved
    } else if delta < REGRESSION_THRESHOLD {
        Classification::Regression
    } else {
        absolute(candidate_pct)
    }
}

/// Label from the candidate percentage alone
pub fn absolute(candidate_pct: f64) -> Classification {
    if candidate_pct >= EXCELLENT_THRESHOLD {
        Classification::Excellent
    } else if candidate_pct >= GOOD_THRESHOLD {
        Classification::Good
    } else {
        Classification::NeedsWork
    }
}
