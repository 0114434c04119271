//! Display bands for scores, presence and risk tiers.

use serde::Serialize;

use crate::models::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreBand {
    Exemplary,
    VeryGood,
    Good,
    Regular,
    Insufficient,
    Critical,
}

impl ScoreBand {
    pub fn for_score(score: f64) -> Self {
        if score >= 9.5 {
            Self::Exemplary
        } else if score >= 8.5 {
            Self::VeryGood
        } else if score >= 7.0 {
            Self::Good
        } else if score >= 6.0 {
            Self::Regular
        } else if score >= 4.0 {
            Self::Insufficient
        } else {
            Self::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Exemplary => "Exemplary",
            Self::VeryGood => "Very good",
            Self::Good => "Good",
            Self::Regular => "Regular",
            Self::Insufficient => "Insufficient",
            Self::Critical => "Critical",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Exemplary => "#1b5e20",
            Self::VeryGood => "#2e7d32",
            Self::Good => "#558b2f",
            Self::Regular => "#f9a825",
            Self::Insufficient => "#ef6c00",
            Self::Critical => "#c62828",
        }
    }
}

/// Four-tier presence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresenceBand {
    Excellent,
    Good,
    Regular,
    Critical,
}

impl PresenceBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 95.0 {
            Self::Excellent
        } else if percent >= 85.0 {
            Self::Good
        } else if percent >= 75.0 {
            Self::Regular
        } else {
            Self::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Regular => "Regular",
            Self::Critical => "Critical",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Excellent => "#2e7d32",
            Self::Good => "#558b2f",
            Self::Regular => "#f9a825",
            Self::Critical => "#c62828",
        }
    }
}

/// Five-tier presence table, with `Low` between 50% and 75%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetailedPresenceBand {
    Excellent,
    Good,
    Regular,
    Low,
    Critical,
}

impl DetailedPresenceBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 95.0 {
            Self::Excellent
        } else if percent >= 85.0 {
            Self::Good
        } else if percent >= 75.0 {
            Self::Regular
        } else if percent >= 50.0 {
            Self::Low
        } else {
            Self::Critical
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Regular => "Regular",
            Self::Low => "Low",
            Self::Critical => "Critical",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Excellent => "#2e7d32",
            Self::Good => "#558b2f",
            Self::Regular => "#f9a825",
            Self::Low => "#ef6c00",
            Self::Critical => "#c62828",
        }
    }
}

pub fn risk_label(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "Low",
        RiskLevel::Medium => "Medium",
        RiskLevel::High => "High",
        RiskLevel::Critical => "Critical",
    }
}

pub fn risk_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => "#2e7d32",
        RiskLevel::Medium => "#f9a825",
        RiskLevel::High => "#ef6c00",
        RiskLevel::Critical => "#c62828",
    }
}
