use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::drive::Drive;
use super::student::Student;
use super::{parse_leading_f64, string_or_number};
use crate::enrollment::status::EnrollmentStatus;

/// One entry of an enrollment's append-only status log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: EnrollmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<EnrollmentStatus>,
    pub timestamp: DateTime<Utc>,
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// A student's application to one drive.
///
/// Student and company fields are a snapshot taken at enrollment time and are not
/// refreshed when the source documents change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub drive_id: String,
    pub student_name: String,
    pub student_roll_number: String,
    pub student_branch: String,
    #[serde(rename = "studentCGPA", deserialize_with = "string_or_number", default)]
    pub student_cgpa: String,
    pub company_name: String,
    #[serde(deserialize_with = "string_or_number", default)]
    pub ctc: String,
    pub status: EnrollmentStatus,
    pub status_history: Vec<StatusChange>,
    pub enrolled_at: DateTime<Utc>,
    pub enrolled_by: String,
    pub eligibility_score: u32,
    #[serde(default)]
    pub current_round: u32,
    #[serde(default)]
    pub rounds_cleared: BTreeSet<u32>,
    #[serde(default)]
    pub remarks: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; used for optimistic concurrency.
    #[serde(default)]
    pub revision: u64,
}

impl Enrollment {
    /// Builds a fresh `enrolled` record from the current student and drive documents.
    pub fn snapshot(
        id: String,
        student: &Student,
        drive: &Drive,
        eligibility_score: u32,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Enrollment {
            id,
            student_id: student.id.clone(),
            drive_id: drive.id.clone(),
            student_name: student.name.clone(),
            student_roll_number: student.roll_number.clone(),
            student_branch: student.branch.clone(),
            student_cgpa: student.cgpa.clone(),
            company_name: drive.company_name.clone(),
            ctc: drive.ctc.clone(),
            status: EnrollmentStatus::Enrolled,
            status_history: vec![StatusChange {
                status: EnrollmentStatus::Enrolled,
                previous_status: None,
                timestamp: now,
                updated_by: actor.to_string(),
                remarks: None,
            }],
            enrolled_at: now,
            enrolled_by: actor.to_string(),
            eligibility_score,
            current_round: 0,
            rounds_cleared: BTreeSet::new(),
            remarks: String::new(),
            withdrawn_at: None,
            withdrawn_by: None,
            withdrawal_reason: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Moves to `status`, appending to the history so its last entry always
    /// matches the current status.
    pub fn record_status(
        &mut self,
        status: EnrollmentStatus,
        actor: &str,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.status_history.push(StatusChange {
            status,
            previous_status: Some(self.status),
            timestamp: now,
            updated_by: actor.to_string(),
            remarks,
        });
        self.status = status;
        self.updated_at = now;
    }

    /// True if any recorded status, past or present, belongs to the placed family.
    pub fn has_reached_placement(&self) -> bool {
        self.status.in_placed_family()
            || self.status_history.iter().any(|c| c.status.in_placed_family())
    }

    pub fn cgpa_value(&self) -> Option<f64> {
        parse_leading_f64(&self.student_cgpa)
    }

    pub fn ctc_value(&self) -> Option<f64> {
        parse_leading_f64(&self.ctc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Enrollment {
        let student = Student {
            id: "21CS042".into(),
            name: "Asha".into(),
            cgpa: "8.1".into(),
            ..Student::default()
        };
        let drive = Drive {
            id: "d1".into(),
            company_name: "Acme".into(),
            ctc: "12".into(),
            ..Drive::default()
        };
        Enrollment::snapshot("e1".into(), &student, &drive, 85, "faculty-1", Utc::now())
    }

    #[test]
    fn test_snapshot_starts_enrolled_with_one_history_entry() {
        let enrollment = sample();
        assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);
        assert_eq!(enrollment.status_history.len(), 1);
        assert_eq!(enrollment.company_name, "Acme");
        assert_eq!(enrollment.student_cgpa, "8.1");
    }

    #[test]
    fn test_record_status_keeps_history_tail_in_sync() {
        let mut enrollment = sample();
        enrollment.record_status(EnrollmentStatus::Shortlisted, "f", None, Utc::now());
        enrollment.record_status(EnrollmentStatus::Selected, "f", Some("strong".into()), Utc::now());
        assert_eq!(enrollment.status_history.len(), 3);
        let last = enrollment.status_history.last().unwrap();
        assert_eq!(last.status, enrollment.status);
        assert_eq!(last.previous_status, Some(EnrollmentStatus::Shortlisted));
        assert!(enrollment.has_reached_placement());
    }

    #[test]
    fn test_wire_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["studentCGPA"], "8.1");
        assert_eq!(value["status"], "enrolled");
        assert_eq!(value["statusHistory"][0]["updatedBy"], "faculty-1");
        assert!(value["roundsCleared"].as_array().unwrap().is_empty());
    }
}
