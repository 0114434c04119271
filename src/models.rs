use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ParseCaseStatusError;

pub type StudentId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub code: String,
    pub full_name: String,
    pub class_name: String,
}

/// Daily attendance mark. Values that do not map to a known status are kept
/// as `Unrecognized` so the aggregator can report and drop them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Justified,
    Absent,
    ControlledAbsence,
    Unrecognized(String),
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "present" | "presente" | "p" => Self::Present,
            "justified" | "justificada" | "falta_justificada" | "fj" => Self::Justified,
            "absent" | "falta" | "ausente" | "f" => Self::Absent,
            "controlled" | "controlled_absence" | "falta_controlada" | "fc" => {
                Self::ControlledAbsence
            }
            _ => Self::Unrecognized(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEvent {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisciplinaryEvent {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub measure_type: String,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Commendation,
    VerbalWarning,
    WrittenWarning,
    Suspension,
}

impl Severity {
    pub fn points(self) -> i32 {
        match self {
            Self::Commendation => -1,
            Self::VerbalWarning => 1,
            Self::WrittenWarning => 2,
            Self::Suspension => 3,
        }
    }
}

/// Workflow state owned by the external case-tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseStatus {
    #[default]
    None,
    Unset,
    AwaitingDeadline,
    Escalated,
}

impl CaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Unset => "unset",
            Self::AwaitingDeadline => "awaiting-deadline",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStatus {
    type Err = ParseCaseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "" | "none" | "nenhum" => Ok(Self::None),
            "unset" | "pendente" | "sem-status" => Ok(Self::Unset),
            "awaiting-deadline" | "aguardando-prazo" => Ok(Self::AwaitingDeadline),
            "escalated" | "conselho-tutelar" | "encaminhado-conselho" => Ok(Self::Escalated),
            _ => Err(ParseCaseStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceAggregate {
    pub total_records: u32,
    pub present_count: u32,
    pub justified_count: u32,
    /// Ordinary plus controlled absences.
    pub absent_count: u32,
    /// Subset of `absent_count`, reported separately for display.
    pub controlled_count: u32,
    pub max_consecutive_absences: u32,
}

impl AttendanceAggregate {
    pub fn operational_presence_percent(&self) -> f64 {
        if self.total_records == 0 {
            return 100.0;
        }
        f64::from(self.present_count + self.justified_count) * 100.0
            / f64::from(self.total_records)
    }

    pub fn total_absences(&self) -> u32 {
        self.absent_count
    }

    pub fn ordinary_absences(&self) -> u32 {
        self.absent_count - self.controlled_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreSource {
    Authoritative,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisciplinaryScore {
    pub score: f64,
    pub total_points: i32,
    /// Non-commendation events, classified or not.
    pub measure_count: u32,
    /// `None` when no negative event was ever recorded.
    pub days_since_last_negative: Option<i64>,
    pub bonus_active: bool,
    pub source: ScoreSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub points: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub profile: StudentProfile,
    pub attendance: AttendanceAggregate,
    pub discipline: DisciplinaryScore,
    pub case_status: CaseStatus,
    pub risk: RiskAssessment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attendance_status_accepts_both_vocabularies() {
        assert_eq!(AttendanceStatus::parse("Presente"), AttendanceStatus::Present);
        assert_eq!(AttendanceStatus::parse("justified"), AttendanceStatus::Justified);
        assert_eq!(AttendanceStatus::parse(" falta "), AttendanceStatus::Absent);
        assert_eq!(
            AttendanceStatus::parse("FALTA_CONTROLADA"),
            AttendanceStatus::ControlledAbsence
        );
        assert_eq!(
            AttendanceStatus::parse("late"),
            AttendanceStatus::Unrecognized("late".to_string())
        );
    }

    #[test]
    fn case_status_parses_aliases() {
        assert_eq!("".parse::<CaseStatus>().unwrap(), CaseStatus::None);
        assert_eq!("awaiting_deadline".parse::<CaseStatus>().unwrap(), CaseStatus::AwaitingDeadline);
        assert_eq!("Conselho Tutelar".replace(' ', "-").parse::<CaseStatus>().unwrap(), CaseStatus::Escalated);
        assert!("closed".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn empty_aggregate_reports_full_presence() {
        let aggregate = AttendanceAggregate::default();
        assert_eq!(aggregate.operational_presence_percent(), 100.0);
        assert_eq!(aggregate.total_absences(), 0);
    }

    #[test]
    fn severity_points_follow_measure_weight() {
        assert_eq!(Severity::Commendation.points(), -1);
        assert_eq!(Severity::Suspension.points(), 3);
    }
}
