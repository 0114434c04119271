use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{DisciplinaryEvent, DisciplinaryScore, ScoreSource, Severity};

pub const MAX_SCORE: f64 = 10.0;
pub const POINT_WEIGHT: f64 = 0.5;
pub const DEFAULT_BONUS_WINDOW_DAYS: i64 = 60;

/// Largest gap tolerated between the stored and the locally computed score
/// before the mismatch is reported.
const SCORE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub severity: Severity,
}

impl KeywordRule {
    pub fn new(keyword: &str, severity: Severity) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            severity,
        }
    }
}

/// Ordered keyword rules; the first rule whose keyword occurs in the
/// lowercased measure type wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationTable {
    rules: Vec<KeywordRule>,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::new(vec![
            KeywordRule::new("elogio", Severity::Commendation),
            KeywordRule::new("positivo", Severity::Commendation),
            KeywordRule::new("suspensão", Severity::Suspension),
            KeywordRule::new("suspensao", Severity::Suspension),
            KeywordRule::new("escrita", Severity::WrittenWarning),
            KeywordRule::new("advertência", Severity::VerbalWarning),
            KeywordRule::new("advertencia", Severity::VerbalWarning),
            KeywordRule::new("oral", Severity::VerbalWarning),
        ])
    }
}

impl ClassificationTable {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| KeywordRule::new(&rule.keyword, rule.severity))
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn classify(&self, measure_type: &str) -> Option<Severity> {
        let haystack = measure_type.to_lowercase();
        self.rules
            .iter()
            .find(|rule| haystack.contains(&rule.keyword))
            .map(|rule| rule.severity)
    }
}

pub fn score_from_points(total_points: i32) -> f64 {
    (MAX_SCORE - POINT_WEIGHT * f64::from(total_points)).clamp(0.0, MAX_SCORE)
}

/// Local computation of the conduct score for one student's full history.
pub fn score_events(
    events: &[DisciplinaryEvent],
    table: &ClassificationTable,
    today: NaiveDate,
    bonus_window_days: i64,
) -> DisciplinaryScore {
    let mut total_points = 0i32;
    let mut measure_count = 0u32;
    let mut last_negative: Option<NaiveDate> = None;

    for event in events {
        let severity = table.classify(&event.measure_type);
        if severity.is_none() {
            tracing::debug!(
                student_id = event.student_id,
                measure_type = %event.measure_type,
                "measure type matched no keyword"
            );
        }
        total_points += severity.map(Severity::points).unwrap_or(0);

        if severity != Some(Severity::Commendation) {
            measure_count += 1;
            last_negative = Some(last_negative.map_or(event.date, |last| last.max(event.date)));
        }
    }

    let days_since_last_negative = last_negative.map(|date| (today - date).num_days());
    let bonus_active = days_since_last_negative.map_or(true, |days| days > bonus_window_days);

    DisciplinaryScore {
        score: score_from_points(total_points),
        total_points,
        measure_count,
        days_since_last_negative,
        bonus_active,
        source: ScoreSource::Local,
    }
}

/// Prefers the score stored by the system of record and keeps the local
/// value only when none is available.
pub fn resolve_score(local: DisciplinaryScore, authoritative: Option<f64>) -> DisciplinaryScore {
    let Some(stored) = authoritative.filter(|value| value.is_finite()) else {
        return local;
    };

    if (stored - local.score).abs() > SCORE_TOLERANCE {
        tracing::warn!(
            stored,
            local = local.score,
            "stored conduct score disagrees with local formula"
        );
    }

    DisciplinaryScore {
        score: stored.clamp(0.0, MAX_SCORE),
        source: ScoreSource::Authoritative,
        ..local
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn measure(days_ago: i64, measure_type: &str) -> DisciplinaryEvent {
        DisciplinaryEvent {
            student_id: 3,
            date: today() - Duration::days(days_ago),
            measure_type: measure_type.to_string(),
            note: String::new(),
        }
    }

    fn score(events: &[DisciplinaryEvent]) -> DisciplinaryScore {
        score_events(events, &ClassificationTable::default(), today(), DEFAULT_BONUS_WINDOW_DAYS)
    }

    #[test]
    fn classification_is_case_insensitive_and_ordered() {
        let table = ClassificationTable::default();
        assert_eq!(table.classify("ELOGIO em sala"), Some(Severity::Commendation));
        assert_eq!(table.classify("Registro positivo"), Some(Severity::Commendation));
        assert_eq!(table.classify("Advertência Oral"), Some(Severity::VerbalWarning));
        assert_eq!(table.classify("ADVERTÊNCIA ESCRITA"), Some(Severity::WrittenWarning));
        assert_eq!(table.classify("Suspensão de 2 dias"), Some(Severity::Suspension));
        assert_eq!(table.classify("Conversa com coordenação"), None);
    }

    #[test]
    fn injected_table_replaces_defaults() {
        let table = ClassificationTable::new(vec![KeywordRule::new("Detention", Severity::Suspension)]);
        assert_eq!(table.classify("after-school detention"), Some(Severity::Suspension));
        assert_eq!(table.classify("Elogio"), None);
    }

    #[test]
    fn clean_record_scores_ten_with_bonus() {
        let result = score(&[]);
        assert_eq!(result.score, 10.0);
        assert_eq!(result.measure_count, 0);
        assert_eq!(result.days_since_last_negative, None);
        assert!(result.bonus_active);
    }

    #[test]
    fn three_written_warnings_score_seven() {
        let events = vec![
            measure(10, "Advertência escrita"),
            measure(20, "Advertência escrita"),
            measure(30, "Advertência escrita"),
        ];
        let result = score(&events);
        assert_eq!(result.total_points, 6);
        assert_eq!(result.score, 7.0);
        assert_eq!(result.measure_count, 3);
        assert_eq!(result.days_since_last_negative, Some(10));
    }

    #[test]
    fn score_is_clamped_to_bounds() {
        let heavy: Vec<_> = (0..10).map(|i| measure(i, "Suspensão")).collect();
        assert_eq!(score(&heavy).score, 0.0);

        let praised: Vec<_> = (0..4).map(|i| measure(i, "Elogio")).collect();
        let result = score(&praised);
        assert_eq!(result.total_points, -4);
        assert_eq!(result.score, 10.0);
        assert_eq!(result.measure_count, 0);
    }

    #[test]
    fn score_never_rises_with_more_negative_events() {
        let mut events = Vec::new();
        let mut previous = score(&events).score;
        for i in 0..25 {
            events.push(measure(i, if i % 2 == 0 { "Advertência oral" } else { "Suspensão" }));
            let current = score(&events).score;
            assert!(current <= previous);
            assert!((0.0..=10.0).contains(&current));
            previous = current;
        }
    }

    #[test]
    fn bonus_window_boundary() {
        assert!(score(&[measure(61, "Advertência oral")]).bonus_active);
        assert!(!score(&[measure(60, "Advertência oral")]).bonus_active);
        assert!(!score(&[measure(59, "Advertência oral")]).bonus_active);
    }

    #[test]
    fn commendations_do_not_reset_bonus_clock() {
        let events = vec![measure(90, "Suspensão"), measure(5, "Elogio")];
        let result = score(&events);
        assert_eq!(result.days_since_last_negative, Some(90));
        assert!(result.bonus_active);
    }

    #[test]
    fn unmatched_measures_count_but_add_no_points() {
        let result = score(&[measure(3, "Reunião com responsáveis")]);
        assert_eq!(result.total_points, 0);
        assert_eq!(result.score, 10.0);
        assert_eq!(result.measure_count, 1);
        assert!(!result.bonus_active);
    }

    #[test]
    fn stored_score_is_preferred() {
        let local = score(&[measure(3, "Advertência escrita")]);
        let resolved = resolve_score(local.clone(), Some(9.0));
        assert_eq!(resolved.source, ScoreSource::Authoritative);
        assert_eq!(resolved.score, 9.0);
        assert_eq!(resolved.measure_count, local.measure_count);

        let fallback = resolve_score(local.clone(), None);
        assert_eq!(fallback, local);

        let nan = resolve_score(local.clone(), Some(f64::NAN));
        assert_eq!(nan.source, ScoreSource::Local);
    }

    /// Points per measure type as assigned by the CASE in the
    /// `student_conduct_scores` view (migrations/0001_init.sql).
    const VIEW_POINTS: &[(&str, i32)] = &[
        ("Elogio", -1),
        ("Registro positivo", -1),
        ("Suspensão", 3),
        ("Suspensao", 3),
        ("Advertência escrita", 2),
        ("Advertencia Escrita", 2),
        ("Advertência", 1),
        ("advertencia", 1),
        ("Chamada oral", 1),
        ("Reunião com responsáveis", 0),
    ];

    #[test]
    fn default_table_matches_view_points() {
        let table = ClassificationTable::default();
        for (measure_type, expected) in VIEW_POINTS {
            let points = table.classify(measure_type).map(Severity::points).unwrap_or(0);
            assert_eq!(points, *expected, "{measure_type}");
        }

        let events: Vec<_> = VIEW_POINTS
            .iter()
            .enumerate()
            .map(|(i, (measure_type, _))| measure(i as i64, measure_type))
            .collect();
        let view_total: i32 = VIEW_POINTS.iter().map(|(_, points)| points).sum();
        let stored = (10.0 - 0.5 * f64::from(view_total)).clamp(0.0, 10.0);
        let local = score(&events);
        assert_eq!(local.total_points, view_total);
        assert_eq!(resolve_score(local.clone(), Some(stored)).score, local.score);
    }
}
