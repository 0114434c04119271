use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::attendance;
use crate::config::ScoringConfig;
use crate::discipline;
use crate::models::{
    AttendanceEvent, AttendanceStatus, CaseStatus, DisciplinaryEvent, StudentId, StudentProfile,
    StudentSummary,
};
use crate::risk::{self, RiskInputs};

/// A pushed change from the datastore, applied to the cache in arrival order.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    StudentUpserted(StudentProfile),
    StudentRemoved(StudentId),
    AttendanceUpserted(AttendanceEvent),
    MeasureInserted(DisciplinaryEvent),
    CaseStatusChanged {
        student_id: StudentId,
        status: CaseStatus,
    },
    StoredScoreChanged {
        student_id: StudentId,
        score: Option<f64>,
    },
}

/// In-memory snapshot of everything the aggregators read, keyed by student.
#[derive(Debug, Clone, Default)]
pub struct StudentCache {
    students: BTreeMap<StudentId, StudentProfile>,
    attendance: HashMap<StudentId, BTreeMap<NaiveDate, AttendanceStatus>>,
    measures: HashMap<StudentId, Vec<DisciplinaryEvent>>,
    case_statuses: HashMap<StudentId, CaseStatus>,
    stored_scores: HashMap<StudentId, f64>,
}

impl StudentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn student(&self, student_id: StudentId) -> Option<&StudentProfile> {
        self.students.get(&student_id)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&StudentProfile> {
        self.students.values().find(|profile| profile.code == code)
    }

    pub fn upsert_student(&mut self, profile: StudentProfile) {
        self.students.insert(profile.id, profile);
    }

    /// Keyed on student and date: a second mark for the same day replaces the first.
    pub fn upsert_attendance(&mut self, event: AttendanceEvent) {
        self.attendance
            .entry(event.student_id)
            .or_default()
            .insert(event.date, event.status);
    }

    pub fn insert_measure(&mut self, event: DisciplinaryEvent) {
        self.measures.entry(event.student_id).or_default().push(event);
    }

    pub fn set_case_status(&mut self, student_id: StudentId, status: CaseStatus) {
        self.case_statuses.insert(student_id, status);
    }

    pub fn set_stored_score(&mut self, student_id: StudentId, score: Option<f64>) {
        match score {
            Some(score) => {
                self.stored_scores.insert(student_id, score);
            }
            None => {
                self.stored_scores.remove(&student_id);
            }
        }
    }

    /// Drops every record held for one student.
    pub fn invalidate(&mut self, student_id: StudentId) {
        self.students.remove(&student_id);
        self.attendance.remove(&student_id);
        self.measures.remove(&student_id);
        self.case_statuses.remove(&student_id);
        self.stored_scores.remove(&student_id);
    }

    /// Forgets stored scores so summaries fall back to the local formula.
    pub fn invalidate_stored_scores(&mut self) {
        self.stored_scores.clear();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, change: ChangeEvent) {
        tracing::debug!(?change, "applying change");
        match change {
            ChangeEvent::StudentUpserted(profile) => self.upsert_student(profile),
            ChangeEvent::StudentRemoved(student_id) => self.invalidate(student_id),
            ChangeEvent::AttendanceUpserted(event) => self.upsert_attendance(event),
            ChangeEvent::MeasureInserted(event) => self.insert_measure(event),
            ChangeEvent::CaseStatusChanged { student_id, status } => {
                self.set_case_status(student_id, status)
            }
            ChangeEvent::StoredScoreChanged { student_id, score } => {
                self.set_stored_score(student_id, score)
            }
        }
    }

    pub fn attendance_events(&self, student_id: StudentId) -> Vec<AttendanceEvent> {
        self.attendance
            .get(&student_id)
            .map(|marks| {
                marks
                    .iter()
                    .map(|(date, status)| AttendanceEvent {
                        student_id,
                        date: *date,
                        status: status.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn measures(&self, student_id: StudentId) -> &[DisciplinaryEvent] {
        self.measures
            .get(&student_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn case_status(&self, student_id: StudentId) -> CaseStatus {
        self.case_statuses
            .get(&student_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn summarize(
        &self,
        student_id: StudentId,
        config: &ScoringConfig,
        today: NaiveDate,
    ) -> Option<StudentSummary> {
        let profile = self.students.get(&student_id)?.clone();

        let attendance = attendance::aggregate_in_window(
            &self.attendance_events(student_id),
            config.window,
            today,
        );
        let local = discipline::score_events(
            self.measures(student_id),
            &config.classification,
            today,
            config.bonus_window_days,
        );
        let stored = self
            .stored_scores
            .get(&student_id)
            .copied()
            .filter(|_| config.prefers_stored_scores());
        let discipline = discipline::resolve_score(local, stored);
        let case_status = self.case_status(student_id);
        let risk = risk::classify(&RiskInputs::from_aggregates(
            &attendance,
            &discipline,
            case_status,
        ));

        Some(StudentSummary {
            profile,
            attendance,
            discipline,
            case_status,
            risk,
        })
    }

    /// Summaries for every cached student, highest risk first.
    pub fn summaries(
        &self,
        config: &ScoringConfig,
        today: NaiveDate,
        class_name: Option<&str>,
    ) -> Vec<StudentSummary> {
        let mut summaries: Vec<StudentSummary> = self
            .students
            .values()
            .filter(|profile| class_name.map_or(true, |class| profile.class_name == class))
            .filter_map(|profile| self.summarize(profile.id, config, today))
            .collect();

        summaries.sort_by(|a, b| {
            b.risk
                .points
                .cmp(&a.risk.points)
                .then_with(|| {
                    a.discipline
                        .score
                        .partial_cmp(&b.discipline.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.profile.full_name.cmp(&b.profile.full_name))
        });
        summaries
    }
}
