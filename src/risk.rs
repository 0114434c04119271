use crate::models::{AttendanceAggregate, CaseStatus, DisciplinaryScore, RiskAssessment, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    pub max_consecutive_absences: u32,
    pub presence_percent: f64,
    pub total_absences: u32,
    pub measure_count: u32,
    pub case_status: CaseStatus,
}

impl RiskInputs {
    pub fn from_aggregates(
        attendance: &AttendanceAggregate,
        discipline: &DisciplinaryScore,
        case_status: CaseStatus,
    ) -> Self {
        Self {
            max_consecutive_absences: attendance.max_consecutive_absences,
            presence_percent: attendance.operational_presence_percent(),
            total_absences: attendance.total_absences(),
            measure_count: discipline.measure_count,
            case_status,
        }
    }
}

/// Sums the points of every triggered condition. Reasons are appended in
/// evaluation order: streak, presence, absences, measures, case status.
pub fn classify(inputs: &RiskInputs) -> RiskAssessment {
    let mut points = 0u32;
    let mut reasons = Vec::new();
    let mut add = |value: u32, reason: String| {
        points += value;
        reasons.push(reason);
    };

    let streak = inputs.max_consecutive_absences;
    if streak >= 5 {
        add(3, format!("{streak} consecutive absences (5 or more)"));
    } else if streak >= 3 {
        add(2, format!("{streak} consecutive absences"));
    }

    let presence = inputs.presence_percent;
    if presence < 60.0 {
        add(3, format!("presence {presence:.1}% below 60%"));
    } else if presence < 75.0 {
        add(2, format!("presence {presence:.1}% below 75%"));
    }

    let absences = inputs.total_absences;
    if absences >= 10 {
        add(3, format!("{absences} absences (10 or more)"));
    } else if absences >= 5 {
        add(1, format!("{absences} absences"));
    }

    let measures = inputs.measure_count;
    if measures >= 5 {
        add(3, format!("{measures} disciplinary measures (5 or more)"));
    } else if measures >= 3 {
        add(2, format!("{measures} disciplinary measures"));
    } else if measures >= 1 {
        add(1, format!("{measures} disciplinary measure(s)"));
    }

    match inputs.case_status {
        CaseStatus::Escalated => add(4, "case escalated to council".to_string()),
        CaseStatus::AwaitingDeadline => add(2, "case awaiting deadline".to_string()),
        CaseStatus::Unset => add(1, "case opened without status".to_string()),
        CaseStatus::None => {}
    }

    RiskAssessment {
        level: level_for_points(points),
        points,
        reasons,
    }
}

pub fn level_for_points(points: u32) -> RiskLevel {
    match points {
        8.. => RiskLevel::Critical,
        5..=7 => RiskLevel::High,
        2..=4 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> RiskInputs {
        RiskInputs {
            max_consecutive_absences: 0,
            presence_percent: 100.0,
            total_absences: 0,
            measure_count: 0,
            case_status: CaseStatus::None,
        }
    }

    #[test]
    fn thresholds_follow_point_tiers() {
        assert_eq!(level_for_points(0), RiskLevel::Low);
        assert_eq!(level_for_points(1), RiskLevel::Low);
        assert_eq!(level_for_points(2), RiskLevel::Medium);
        assert_eq!(level_for_points(4), RiskLevel::Medium);
        assert_eq!(level_for_points(5), RiskLevel::High);
        assert_eq!(level_for_points(7), RiskLevel::High);
        assert_eq!(level_for_points(8), RiskLevel::Critical);
        assert_eq!(level_for_points(16), RiskLevel::Critical);
    }

    #[test]
    fn quiet_student_is_low_without_reasons() {
        let assessment = classify(&quiet());
        assert_eq!(assessment.level, RiskLevel::Low);
        assert_eq!(assessment.points, 0);
        assert!(assessment.reasons.is_empty());
    }

    #[test]
    fn ninety_percent_presence_with_two_absences_is_low() {
        let inputs = RiskInputs {
            presence_percent: 90.0,
            total_absences: 2,
            max_consecutive_absences: 2,
            ..quiet()
        };
        let assessment = classify(&inputs);
        assert_eq!(assessment.points, 0);
        assert_eq!(assessment.level, RiskLevel::Low);
    }

    #[test]
    fn escalated_case_with_poor_attendance_is_critical_in_order() {
        let inputs = RiskInputs {
            max_consecutive_absences: 6,
            presence_percent: 55.0,
            total_absences: 4,
            measure_count: 4,
            case_status: CaseStatus::Escalated,
        };
        let assessment = classify(&inputs);
        assert_eq!(assessment.points, 12);
        assert_eq!(assessment.level, RiskLevel::Critical);
        assert_eq!(
            assessment.reasons,
            vec![
                "6 consecutive absences (5 or more)".to_string(),
                "presence 55.0% below 60%".to_string(),
                "4 disciplinary measures".to_string(),
                "case escalated to council".to_string(),
            ]
        );
    }

    #[test]
    fn every_rule_fires_together() {
        let inputs = RiskInputs {
            max_consecutive_absences: 3,
            presence_percent: 70.0,
            total_absences: 5,
            measure_count: 1,
            case_status: CaseStatus::Unset,
        };
        let assessment = classify(&inputs);
        assert_eq!(assessment.points, 2 + 2 + 1 + 1 + 1);
        assert_eq!(assessment.level, RiskLevel::High);
        assert_eq!(assessment.reasons.len(), 5);
        assert!(assessment.reasons[0].contains("consecutive"));
        assert!(assessment.reasons[1].contains("75%"));
        assert!(assessment.reasons[2].starts_with("5 absences"));
        assert!(assessment.reasons[3].contains("disciplinary"));
        assert!(assessment.reasons[4].contains("case"));
    }

    #[test]
    fn boundaries_use_half_open_ranges() {
        let at = |presence: f64| {
            classify(&RiskInputs {
                presence_percent: presence,
                ..quiet()
            })
            .points
        };
        assert_eq!(at(75.0), 0);
        assert_eq!(at(74.9), 2);
        assert_eq!(at(60.0), 2);
        assert_eq!(at(59.9), 3);

        let streak = |n: u32| {
            classify(&RiskInputs {
                max_consecutive_absences: n,
                ..quiet()
            })
            .points
        };
        assert_eq!(streak(2), 0);
        assert_eq!(streak(3), 2);
        assert_eq!(streak(5), 3);
    }

    #[test]
    fn level_never_drops_as_inputs_worsen() {
        let cases = [
            CaseStatus::None,
            CaseStatus::Unset,
            CaseStatus::AwaitingDeadline,
            CaseStatus::Escalated,
        ];
        let mut previous = RiskLevel::Low;
        for case_status in cases {
            let level = classify(&RiskInputs { case_status, ..quiet() }).level;
            assert!(level >= previous);
            previous = level;
        }

        for field in 0..4 {
            let mut previous = 0u32;
            for n in 0..15u32 {
                let mut inputs = quiet();
                match field {
                    0 => inputs.max_consecutive_absences = n,
                    1 => inputs.total_absences = n,
                    2 => inputs.measure_count = n,
                    _ => inputs.presence_percent = 100.0 - f64::from(n) * 7.0,
                }
                let points = classify(&inputs).points;
                assert!(points >= previous, "field {field} dropped at {n}");
                previous = points;
            }
        }
    }
}
