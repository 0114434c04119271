use std::path::Path;

use serde::Deserialize;

use crate::attendance::AttendanceWindow;
use crate::discipline::{ClassificationTable, KeywordRule, DEFAULT_BONUS_WINDOW_DAYS};
use crate::error::ConfigError;

pub const DEFAULT_SCHOOL_YEAR_START_MONTH: u32 = 2;
pub const DEFAULT_ROLLING_DAYS: i64 = 90;
pub const MAX_ROLLING_DAYS: i64 = 3660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    SchoolYear,
    Rolling,
}

/// Configuration as stored in TOML, every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub attendance: RawAttendanceConfig,

    #[serde(default)]
    pub discipline: RawDisciplineConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAttendanceConfig {
    pub window: Option<WindowKind>,
    pub school_year_start_month: Option<u32>,
    pub rolling_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDisciplineConfig {
    pub bonus_window_days: Option<i64>,
    pub keywords: Option<Vec<KeywordRule>>,
}

/// Settings consumed by the aggregators, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub window: AttendanceWindow,
    /// Kept even while a rolling window is active, for `--window school-year`.
    pub school_year_start_month: u32,
    pub bonus_window_days: i64,
    pub classification: ClassificationTable,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            window: AttendanceWindow::SchoolYear {
                start_month: DEFAULT_SCHOOL_YEAR_START_MONTH,
            },
            school_year_start_month: DEFAULT_SCHOOL_YEAR_START_MONTH,
            bonus_window_days: DEFAULT_BONUS_WINDOW_DAYS,
            classification: ClassificationTable::default(),
        }
    }
}

fn check_rolling_days(rolling_days: i64) -> Result<i64, ConfigError> {
    if !(1..=MAX_ROLLING_DAYS).contains(&rolling_days) {
        return Err(ConfigError::Invalid {
            key: "attendance.rolling_days",
            message: format!("{rolling_days} must be between 1 and {MAX_ROLLING_DAYS}"),
        });
    }
    Ok(rolling_days)
}

impl ScoringConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let start_month = raw
            .attendance
            .school_year_start_month
            .unwrap_or(DEFAULT_SCHOOL_YEAR_START_MONTH);
        if !(1..=12).contains(&start_month) {
            return Err(ConfigError::Invalid {
                key: "attendance.school_year_start_month",
                message: format!("{start_month} is not a month"),
            });
        }

        let rolling_days =
            check_rolling_days(raw.attendance.rolling_days.unwrap_or(DEFAULT_ROLLING_DAYS))?;

        let bonus_window_days = raw
            .discipline
            .bonus_window_days
            .unwrap_or(DEFAULT_BONUS_WINDOW_DAYS);
        if bonus_window_days < 0 {
            return Err(ConfigError::Invalid {
                key: "discipline.bonus_window_days",
                message: format!("{bonus_window_days} must not be negative"),
            });
        }

        let window = match raw.attendance.window.unwrap_or(WindowKind::SchoolYear) {
            WindowKind::SchoolYear => AttendanceWindow::SchoolYear { start_month },
            WindowKind::Rolling => AttendanceWindow::Rolling { days: rolling_days },
        };

        let classification = match raw.discipline.keywords {
            Some(rules) => ClassificationTable::new(rules),
            None => ClassificationTable::default(),
        };

        Ok(Self {
            window,
            school_year_start_month: start_month,
            bonus_window_days,
            classification,
        })
    }

    /// Applies `--window`/`--rolling-days` from the command line.
    pub fn with_window_override(
        mut self,
        kind: Option<WindowKind>,
        rolling_days: Option<i64>,
    ) -> Result<Self, ConfigError> {
        let current_days = match self.window {
            AttendanceWindow::Rolling { days } => days,
            AttendanceWindow::SchoolYear { .. } => DEFAULT_ROLLING_DAYS,
        };
        match (kind, rolling_days) {
            (Some(WindowKind::SchoolYear), _) => {
                self.window = AttendanceWindow::SchoolYear {
                    start_month: self.school_year_start_month,
                };
            }
            (Some(WindowKind::Rolling), days) | (None, days @ Some(_)) => {
                self.window = AttendanceWindow::Rolling {
                    days: check_rolling_days(days.unwrap_or(current_days))?,
                };
            }
            (None, None) => {}
        }
        Ok(self)
    }

    /// The `student_conduct_scores` view hard-codes the default keyword
    /// table, so its scores only apply while that table is in use.
    pub fn prefers_stored_scores(&self) -> bool {
        self.classification == ClassificationTable::default()
    }
}
