use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    count, opt_count, opt_number_or_string, opt_string_or_number, opt_text_or_list, parse_leading_f64,
    string_or_number, text_or_list,
};

/// A student document, keyed by the normalized roll number.
///
/// `is_placed` and the `placed_*` fields are owned by enrollment writes; profile
/// updates never change them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub roll_number: String,
    pub name: String,
    pub email: String,
    /// Identity-provider uid linked to this record, if the student has signed up.
    pub user_id: Option<String>,
    pub branch: String,
    #[serde(deserialize_with = "string_or_number")]
    pub year: String,
    /// Kept as entered (decimal string); parsed leniently where compared.
    #[serde(deserialize_with = "string_or_number")]
    pub cgpa: String,
    pub section: String,
    #[serde(deserialize_with = "string_or_number")]
    pub phone: String,
    #[serde(deserialize_with = "text_or_list")]
    pub skills: String,
    #[serde(deserialize_with = "text_or_list")]
    pub projects: String,
    #[serde(deserialize_with = "text_or_list")]
    pub internships: String,
    #[serde(deserialize_with = "text_or_list")]
    pub certifications: String,
    #[serde(deserialize_with = "text_or_list")]
    pub achievements: String,
    #[serde(rename = "linkedIn", alias = "linkedin")]
    pub linked_in: String,
    pub github: String,
    pub portfolio: String,
    pub resume: String,
    #[serde(deserialize_with = "count")]
    pub active_backlogs: u32,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub percentage_10th: Option<f64>,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub percentage_12th: Option<f64>,
    pub is_placed: bool,
    pub placed_company: Option<String>,
    #[serde(rename = "placedCTC", deserialize_with = "opt_string_or_number")]
    pub placed_ctc: Option<String>,
    pub placement_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Student {
    pub fn cgpa_value(&self) -> Option<f64> {
        parse_leading_f64(&self.cgpa)
    }

    pub fn placed_ctc_value(&self) -> Option<f64> {
        self.placed_ctc.as_deref().and_then(parse_leading_f64)
    }
}

/// Collapses whitespace runs in a roll number into `_` so it can serve as a document id.
pub fn normalize_roll_number(roll_number: &str) -> String {
    let mut id = String::with_capacity(roll_number.len());
    let mut in_space = false;
    for c in roll_number.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                id.push('_');
            }
            in_space = true;
        } else {
            id.push(c);
            in_space = false;
        }
    }
    id
}

/// Faculty-supplied student fields. Used both for creation and as a partial update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentInput {
    #[serde(deserialize_with = "opt_string_or_number")]
    pub roll_number: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub branch: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub year: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub cgpa: Option<String>,
    pub section: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub skills: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub projects: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub internships: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub certifications: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub achievements: Option<String>,
    #[serde(rename = "linkedIn", alias = "linkedin")]
    pub linked_in: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub resume: Option<String>,
    #[serde(deserialize_with = "opt_count")]
    pub active_backlogs: Option<u32>,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub percentage_10th: Option<f64>,
    #[serde(deserialize_with = "opt_number_or_string")]
    pub percentage_12th: Option<f64>,
}

impl StudentInput {
    /// Overwrites every field present in the input. Id, roll number and placement
    /// state are left alone.
    pub fn apply_to(&self, student: &mut Student) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        set(&mut student.name, &self.name);
        set(&mut student.email, &self.email);
        if self.user_id.is_some() {
            student.user_id = self.user_id.clone();
        }
        set(&mut student.branch, &self.branch);
        set(&mut student.year, &self.year);
        set(&mut student.cgpa, &self.cgpa);
        set(&mut student.section, &self.section);
        set(&mut student.phone, &self.phone);
        set(&mut student.skills, &self.skills);
        set(&mut student.projects, &self.projects);
        set(&mut student.internships, &self.internships);
        set(&mut student.certifications, &self.certifications);
        set(&mut student.achievements, &self.achievements);
        set(&mut student.linked_in, &self.linked_in);
        set(&mut student.github, &self.github);
        set(&mut student.portfolio, &self.portfolio);
        set(&mut student.resume, &self.resume);
        set(&mut student.active_backlogs, &self.active_backlogs);
        if self.percentage_10th.is_some() {
            student.percentage_10th = self.percentage_10th;
        }
        if self.percentage_12th.is_some() {
            student.percentage_12th = self.percentage_12th;
        }
    }
}

/// The subset of profile fields a student may edit on their own record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub phone: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub skills: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub projects: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub internships: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub certifications: Option<String>,
    #[serde(deserialize_with = "opt_text_or_list")]
    pub achievements: Option<String>,
    #[serde(rename = "linkedIn", alias = "linkedin")]
    pub linked_in: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub resume: Option<String>,
}

impl From<ProfileUpdate> for StudentInput {
    fn from(update: ProfileUpdate) -> Self {
        StudentInput {
            name: update.name,
            phone: update.phone,
            skills: update.skills,
            projects: update.projects,
            internships: update.internships,
            certifications: update.certifications,
            achievements: update.achievements,
            linked_in: update.linked_in,
            github: update.github,
            portfolio: update.portfolio,
            resume: update.resume,
            ..StudentInput::default()
        }
    }
}
