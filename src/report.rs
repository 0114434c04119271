use std::fmt::Write;
use std::io;

use chrono::NaiveDate;
use serde::Serialize;

use crate::bands::{self, DetailedPresenceBand, ScoreBand};
use crate::models::{DisciplinaryEvent, RiskLevel, StudentSummary};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskMix {
    pub level: RiskLevel,
    pub count: usize,
    pub avg_points: f64,
}

pub fn summarize_by_level(summaries: &[StudentSummary]) -> Vec<RiskMix> {
    [
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
    ]
    .into_iter()
    .filter_map(|level| {
        let points: Vec<u32> = summaries
            .iter()
            .filter(|summary| summary.risk.level == level)
            .map(|summary| summary.risk.points)
            .collect();
        if points.is_empty() {
            return None;
        }
        let total: u32 = points.iter().sum();
        Some(RiskMix {
            level,
            count: points.len(),
            avg_points: f64::from(total) / points.len() as f64,
        })
    })
    .collect()
}

pub fn build_report(
    scope: Option<&str>,
    window_start: NaiveDate,
    today: NaiveDate,
    summaries: &[StudentSummary],
    recent_measures: &[DisciplinaryEvent],
) -> String {
    let mix = summarize_by_level(summaries);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all classes");

    let _ = writeln!(output, "# Student Conduct Early Warning Report");
    let _ = writeln!(
        output,
        "Generated for {} on {} (attendance since {})",
        scope_label, today, window_start
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if mix.is_empty() {
        let _ = writeln!(output, "No students recorded for this scope.");
    } else {
        for entry in mix.iter() {
            let _ = writeln!(
                output,
                "- {}: {} students (avg {:.1} points)",
                bands::risk_label(entry.level),
                entry.count,
                entry.avg_points
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Needing Attention");

    let flagged: Vec<&StudentSummary> = summaries
        .iter()
        .filter(|summary| summary.risk.level >= RiskLevel::Medium)
        .collect();

    if flagged.is_empty() {
        let _ = writeln!(output, "No students above low risk.");
    } else {
        for summary in flagged.iter().take(20) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) {} risk, {} points: presence {:.1}% ({}), conduct {:.1} ({}){}",
                summary.profile.full_name,
                summary.profile.code,
                summary.profile.class_name,
                bands::risk_label(summary.risk.level),
                summary.risk.points,
                summary.attendance.operational_presence_percent(),
                DetailedPresenceBand::for_percent(summary.attendance.operational_presence_percent())
                    .label(),
                summary.discipline.score,
                ScoreBand::for_score(summary.discipline.score).label(),
                if summary.discipline.bonus_active {
                    ", clean for over the bonus window"
                } else {
                    ""
                }
            );
            for reason in &summary.risk.reasons {
                let _ = writeln!(output, "  - {reason}");
            }
        }
    }

    let mut recent = recent_measures.to_vec();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Disciplinary Measures");

    if recent.is_empty() {
        let _ = writeln!(output, "No measures recorded.");
    } else {
        for measure in recent.iter().take(5) {
            let name = summaries
                .iter()
                .find(|summary| summary.profile.id == measure.student_id)
                .map(|summary| summary.profile.full_name.as_str())
                .unwrap_or("unknown student");
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {}",
                name, measure.measure_type, measure.date, measure.note
            );
        }
    }

    output
}

/// One exported row per student.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub student_code: &'a str,
    pub name: &'a str,
    pub class: &'a str,
    pub presence_percent: String,
    pub total_absences: u32,
    pub ordinary_absences: u32,
    pub controlled_absences: u32,
    pub justified_absences: u32,
    pub disciplinary_measures: u32,
    pub risk_level: &'static str,
    pub case_status: &'static str,
}

impl<'a> From<&'a StudentSummary> for ExportRow<'a> {
    fn from(summary: &'a StudentSummary) -> Self {
        Self {
            student_code: &summary.profile.code,
            name: &summary.profile.full_name,
            class: &summary.profile.class_name,
            presence_percent: format!("{:.1}", summary.attendance.operational_presence_percent()),
            total_absences: summary.attendance.total_absences(),
            ordinary_absences: summary.attendance.ordinary_absences(),
            controlled_absences: summary.attendance.controlled_count,
            justified_absences: summary.attendance.justified_count,
            disciplinary_measures: summary.discipline.measure_count,
            risk_level: bands::risk_label(summary.risk.level),
            case_status: summary.case_status.as_str(),
        }
    }
}

pub fn write_csv<W: io::Write>(writer: W, summaries: &[StudentSummary]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for summary in summaries {
        writer.serialize(ExportRow::from(summary))?;
    }
    writer.flush()?;
    Ok(())
}
