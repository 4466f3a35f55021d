//! Eligibility rules for matching students against drive criteria.
//!
//! `evaluate` is pure: each rule either passes or appends a reason and subtracts
//! a fixed penalty from a score that starts at 100. A student is eligible only
//! when no rule produced a reason; the score is a ranking aid.

pub mod scans;

use serde::Serialize;

use crate::models::drive::Drive;
use crate::models::parse_leading_int;
use crate::models::student::Student;

const CGPA_PENALTY: i32 = 30;
const BRANCH_PENALTY: i32 = 40;
const YEAR_PENALTY: i32 = 30;
const BACKLOG_PENALTY: i32 = 50;
const PLACED_PENALTY: i32 = 100;
const SCHOOL_MARKS_PENALTY: i32 = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reasons: Vec<String>,
    pub score: u32,
}

pub fn evaluate(student: &Student, drive: &Drive) -> Eligibility {
    let mut reasons = Vec::new();
    let mut score: i32 = 100;
    let mut fail = |reason: String, penalty: i32| {
        reasons.push(reason);
        score -= penalty;
    };

    if let Some(min) = drive.min_cgpa.filter(|m| *m > 0.0) {
        let cgpa = student.cgpa_value().unwrap_or(0.0);
        if cgpa < min {
            fail(
                format!("CGPA {cgpa:.2} is below minimum requirement of {min}"),
                CGPA_PENALTY,
            );
        }
    }

    if !drive.eligible_branches.is_empty() && !branch_matches(&student.branch, &drive.eligible_branches)
    {
        fail(
            format!("Branch '{}' is not eligible for this drive", student.branch),
            BRANCH_PENALTY,
        );
    }

    if !drive.eligible_years.is_empty() && !year_matches(&student.year, &drive.eligible_years) {
        let year = if student.year.trim().is_empty() {
            "unspecified"
        } else {
            student.year.as_str()
        };
        fail(
            format!(
                "Year {year} is not eligible (required: {})",
                drive.eligible_years.join(", ")
            ),
            YEAR_PENALTY,
        );
    }

    if drive.no_backlogs_required && student.active_backlogs > 0 {
        fail(
            format!(
                "Active backlogs ({}) not allowed for this drive",
                student.active_backlogs
            ),
            BACKLOG_PENALTY,
        );
    }

    if drive.no_already_placed && student.is_placed {
        fail(
            "Already placed students are not eligible for this drive".to_string(),
            PLACED_PENALTY,
        );
    }

    for (label, min, actual) in [
        ("10th", drive.min_10th_percentage, student.percentage_10th),
        ("12th", drive.min_12th_percentage, student.percentage_12th),
    ] {
        if let Some(min) = min.filter(|m| *m > 0.0) {
            let actual = actual.unwrap_or(0.0);
            if actual < min {
                fail(
                    format!("{label} percentage {actual}% is below minimum {min}%"),
                    SCHOOL_MARKS_PENALTY,
                );
            }
        }
    }

    Eligibility {
        eligible: reasons.is_empty(),
        reasons,
        score: score.max(0) as u32,
    }
}

/// Case-insensitive substring match in either direction. A student without a
/// branch on record is not filtered out.
fn branch_matches(branch: &str, eligible: &[String]) -> bool {
    let branch = branch.trim().to_lowercase();
    if branch.is_empty() {
        return true;
    }
    eligible.iter().any(|candidate| {
        let candidate = candidate.trim().to_lowercase();
        branch.contains(&candidate) || candidate.contains(&branch)
    })
}

/// Matches the leading integer of the student's year against the listed years.
fn year_matches(year: &str, eligible: &[String]) -> bool {
    let numeric = parse_leading_int(year).unwrap_or(0).to_string();
    eligible.iter().any(|y| y.trim() == numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: "21CS001".into(),
            branch: "CS".into(),
            year: "4".into(),
            cgpa: "8.0".into(),
            ..Student::default()
        }
    }

    fn drive() -> Drive {
        Drive {
            id: "d1".into(),
            company_name: "Acme".into(),
            ..Drive::default()
        }
    }

    #[test]
    fn test_no_criteria_means_eligible_with_full_score() {
        let result = evaluate(&student(), &drive());
        assert!(result.eligible);
        assert!(result.reasons.is_empty());
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_low_cgpa_scenario() {
        let s = Student {
            cgpa: "6.0".into(),
            ..student()
        };
        let d = Drive {
            min_cgpa: Some(7.0),
            eligible_branches: vec!["CS".into()],
            eligible_years: vec!["4".into()],
            ..drive()
        };
        let result = evaluate(&s, &d);
        assert!(!result.eligible);
        assert_eq!(
            result.reasons,
            vec!["CGPA 6.00 is below minimum requirement of 7".to_string()]
        );
        assert_eq!(result.score, 70);
    }

    #[test]
    fn test_cgpa_boundary_is_inclusive() {
        let d = Drive {
            min_cgpa: Some(8.0),
            ..drive()
        };
        assert!(evaluate(&student(), &d).eligible);
    }

    #[test]
    fn test_single_reason_makes_ineligible_despite_high_score() {
        let d = Drive {
            min_10th_percentage: Some(80.0),
            ..drive()
        };
        let s = Student {
            percentage_10th: Some(75.5),
            ..student()
        };
        let result = evaluate(&s, &d);
        assert_eq!(result.score, 85);
        assert!(!result.eligible);
        assert_eq!(
            result.reasons[0],
            "10th percentage 75.5% is below minimum 80%"
        );
    }

    #[test]
    fn test_branch_match_is_substring_either_way() {
        let d = Drive {
            eligible_branches: vec!["Computer Science".into(), "IT".into()],
            ..drive()
        };
        let s = Student {
            branch: "computer science and engineering".into(),
            ..student()
        };
        assert!(evaluate(&s, &d).eligible);

        let s = Student {
            branch: "Mechanical".into(),
            ..student()
        };
        let result = evaluate(&s, &d);
        assert_eq!(result.score, 60);
        assert_eq!(
            result.reasons,
            vec!["Branch 'Mechanical' is not eligible for this drive".to_string()]
        );
    }

    #[test]
    fn test_missing_branch_is_not_filtered() {
        let d = Drive {
            eligible_branches: vec!["CS".into()],
            ..drive()
        };
        let s = Student {
            branch: String::new(),
            ..student()
        };
        assert!(evaluate(&s, &d).eligible);
    }

    #[test]
    fn test_year_uses_leading_integer() {
        let d = Drive {
            eligible_years: vec!["3".into(), "4".into()],
            ..drive()
        };
        let s = Student {
            year: "4th".into(),
            ..student()
        };
        assert!(evaluate(&s, &d).eligible);

        let s = Student {
            year: String::new(),
            ..student()
        };
        let result = evaluate(&s, &d);
        assert_eq!(
            result.reasons,
            vec!["Year unspecified is not eligible (required: 3, 4)".to_string()]
        );
    }

    #[test]
    fn test_score_is_floored_at_zero() {
        let d = Drive {
            min_cgpa: Some(9.0),
            eligible_branches: vec!["EE".into()],
            no_backlogs_required: true,
            no_already_placed: true,
            ..drive()
        };
        let s = Student {
            active_backlogs: 2,
            is_placed: true,
            ..student()
        };
        let result = evaluate(&s, &d);
        assert_eq!(result.reasons.len(), 4);
        assert_eq!(result.score, 0);
        assert!(result.reasons.contains(&"Active backlogs (2) not allowed for this drive".to_string()));
    }

    #[test]
    fn test_eligible_iff_no_reasons() {
        let drives = [
            drive(),
            Drive { min_cgpa: Some(8.5), ..drive() },
            Drive { eligible_years: vec!["2".into()], ..drive() },
            Drive { no_already_placed: true, ..drive() },
        ];
        let students = [
            student(),
            Student { is_placed: true, cgpa: "9.1".into(), ..student() },
            Student { year: "2".into(), ..student() },
        ];
        for d in &drives {
            for s in &students {
                let result = evaluate(s, d);
                assert_eq!(result.eligible, result.reasons.is_empty());
            }
        }
    }
}
