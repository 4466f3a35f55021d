use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    nullable_number, opt_number_or_string, opt_string_list, opt_string_or_number, parse_leading_f64,
    string_list, string_or_number,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveStatus {
    #[default]
    Upcoming,
    Ongoing,
    Closed,
    #[serde(rename = "Results Published")]
    ResultsPublished,
}

impl DriveStatus {
    pub const ACTIVE: [DriveStatus; 2] = [DriveStatus::Upcoming, DriveStatus::Ongoing];

    pub fn as_str(self) -> &'static str {
        match self {
            DriveStatus::Upcoming => "Upcoming",
            DriveStatus::Ongoing => "Ongoing",
            DriveStatus::Closed => "Closed",
            DriveStatus::ResultsPublished => "Results Published",
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, DriveStatus::Upcoming | DriveStatus::Ongoing)
    }
}

/// A company's recruitment drive.
///
/// `enrolled_students` and `placed_students` are maintained by enrollment writes only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    pub company_name: String,
    pub role: String,
    pub description: String,
    #[serde(deserialize_with = "string_or_number")]
    pub ctc: String,
    pub drive_date: Option<String>,
    pub registration_deadline: Option<String>,
    #[serde(rename = "minCGPA", deserialize_with = "opt_number_or_string")]
    pub min_cgpa: Option<f64>,
    #[serde(deserialize_with = "string_list")]
    pub eligible_branches: Vec<String>,
    #[serde(alias = "eligibleYear", deserialize_with = "string_list")]
    pub eligible_years: Vec<String>,
    pub no_backlogs_required: bool,
    pub no_already_placed: bool,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub min_10th_percentage: Option<f64>,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub min_12th_percentage: Option<f64>,
    #[serde(deserialize_with = "string_list")]
    pub required_skills: Vec<String>,
    pub status: DriveStatus,
    #[serde(deserialize_with = "string_list")]
    pub rounds: Vec<String>,
    pub enrolled_students: i64,
    pub placed_students: i64,
    pub eligible_student_count: Option<i64>,
    pub eligibility_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Drive {
    pub fn ctc_value(&self) -> Option<f64> {
        parse_leading_f64(&self.ctc)
    }

    pub fn accepts_enrollments(&self) -> bool {
        !matches!(
            self.status,
            DriveStatus::Closed | DriveStatus::ResultsPublished
        )
    }
}

/// Faculty-supplied drive fields, for creation and partial updates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriveInput {
    pub company_name: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub ctc: Option<String>,
    pub drive_date: Option<String>,
    pub registration_deadline: Option<String>,
    /// `Some(None)` clears the threshold.
    #[serde(rename = "minCGPA", deserialize_with = "nullable_number")]
    pub min_cgpa: Option<Option<f64>>,
    #[serde(deserialize_with = "opt_string_list")]
    pub eligible_branches: Option<Vec<String>>,
    #[serde(alias = "eligibleYear", deserialize_with = "opt_string_list")]
    pub eligible_years: Option<Vec<String>>,
    pub no_backlogs_required: Option<bool>,
    pub no_already_placed: Option<bool>,
    #[serde(deserialize_with = "nullable_number")]
    pub min_10th_percentage: Option<Option<f64>>,
    #[serde(deserialize_with = "nullable_number")]
    pub min_12th_percentage: Option<Option<f64>>,
    #[serde(deserialize_with = "opt_string_list")]
    pub required_skills: Option<Vec<String>>,
    pub status: Option<DriveStatus>,
    #[serde(deserialize_with = "opt_string_list")]
    pub rounds: Option<Vec<String>>,
}

impl DriveInput {
    /// True when the update touches a field the eligibility evaluator reads.
    pub fn changes_criteria(&self) -> bool {
        self.min_cgpa.is_some()
            || self.eligible_branches.is_some()
            || self.eligible_years.is_some()
            || self.no_backlogs_required.is_some()
            || self.no_already_placed.is_some()
            || self.min_10th_percentage.is_some()
            || self.min_12th_percentage.is_some()
    }

    pub fn apply_to(&self, drive: &mut Drive) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        set(&mut drive.company_name, &self.company_name);
        set(&mut drive.role, &self.role);
        set(&mut drive.description, &self.description);
        set(&mut drive.ctc, &self.ctc);
        if self.drive_date.is_some() {
            drive.drive_date = self.drive_date.clone();
        }
        if self.registration_deadline.is_some() {
            drive.registration_deadline = self.registration_deadline.clone();
        }
        set(&mut drive.min_cgpa, &self.min_cgpa);
        set(&mut drive.eligible_branches, &self.eligible_branches);
        set(&mut drive.eligible_years, &self.eligible_years);
        set(&mut drive.no_backlogs_required, &self.no_backlogs_required);
        set(&mut drive.no_already_placed, &self.no_already_placed);
        set(&mut drive.min_10th_percentage, &self.min_10th_percentage);
        set(&mut drive.min_12th_percentage, &self.min_12th_percentage);
        set(&mut drive.required_skills, &self.required_skills);
        set(&mut drive.status, &self.status);
        set(&mut drive.rounds, &self.rounds);
    }
}
