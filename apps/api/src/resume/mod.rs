//! Résumé tooling: shaping profile data for the client-side templates and
//! ATS scoring of résumé text through the LLM client.

pub mod ats;
pub mod handlers;
pub mod prompts;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::models::{opt_string_or_number, string_list};

/// Array fields are passed through to the templates as-is; any other shape is dropped.
fn array_or_empty<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactInput {
    pub full_name: Option<String>,
}

/// Free-form student data posted by the résumé builder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudentResumeInput {
    pub name: Option<String>,
    pub contact: Option<ContactInput>,
    pub email: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub phone: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "linkedIn")]
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub portfolio: Option<String>,
    pub summary: Option<String>,
    pub about: Option<String>,
    pub department: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub cgpa: Option<String>,
    pub degree: Option<String>,
    pub college: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub start_year: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub graduation_year: Option<String>,
    #[serde(deserialize_with = "array_or_empty")]
    pub education: Vec<Value>,
    #[serde(deserialize_with = "array_or_empty")]
    pub experience: Vec<Value>,
    #[serde(deserialize_with = "array_or_empty")]
    pub projects: Vec<Value>,
    #[serde(deserialize_with = "string_list")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "array_or_empty")]
    pub certifications: Vec<Value>,
}

impl StudentResumeInput {
    /// `name`, or `contact.fullName` when the builder sends the nested shape.
    pub fn display_name(&self) -> Option<&str> {
        non_empty(&self.name).or_else(|| {
            self.contact
                .as_ref()
                .and_then(|c| non_empty(&c.full_name))
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DriveTargetInput {
    pub company_name: Option<String>,
    pub role: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub required_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeContact {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub github: String,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeTarget {
    pub target_company: Option<String>,
    pub target_role: Option<String>,
    pub required_skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeData {
    pub contact: ResumeContact,
    pub summary: String,
    pub education: Vec<Value>,
    pub experience: Vec<Value>,
    pub projects: Vec<Value>,
    pub skills: Vec<String>,
    pub certifications: Vec<Value>,
    #[serde(flatten)]
    pub target: Option<ResumeTarget>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn or_default(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or(default).to_string()
}

/// Shapes builder input into the structure both templates render.
///
/// Missing sections get placeholders: a generated summary and a single
/// education entry built from the flat profile fields.
pub fn transform_student_to_resume(
    student: &StudentResumeInput,
    drive: Option<&DriveTargetInput>,
) -> ResumeData {
    let department = or_default(&student.department, "Computer Science");

    let summary = non_empty(&student.summary)
        .or_else(|| non_empty(&student.about))
        .map(str::to_string)
        .unwrap_or_else(|| {
            format!(
                "{department} student with {} academic record, seeking opportunities in {}.",
                or_default(&student.cgpa, "strong"),
                drive
                    .and_then(|d| non_empty(&d.role))
                    .unwrap_or("software development"),
            )
        });

    let education = if student.education.is_empty() {
        vec![json!({
            "degree": or_default(&student.degree, "Bachelor of Technology"),
            "field": department,
            "institution": or_default(&student.college, "University"),
            "location": or_default(&student.location, ""),
            "startYear": or_default(&student.start_year, "2020"),
            "endYear": or_default(&student.graduation_year, "2024"),
            "gpa": non_empty(&student.cgpa).map(|c| format!("{c}/10.0")).unwrap_or_default(),
        })]
    } else {
        student.education.clone()
    };

    ResumeData {
        contact: ResumeContact {
            full_name: student.display_name().unwrap_or_default().to_string(),
            email: or_default(&student.email, ""),
            phone: or_default(&student.phone, ""),
            location: or_default(&student.location, ""),
            linkedin: or_default(&student.linkedin, ""),
            github: or_default(&student.github, ""),
            website: or_default(&student.portfolio, ""),
        },
        summary,
        education,
        experience: student.experience.clone(),
        projects: student.projects.clone(),
        skills: student.skills.clone(),
        certifications: student.certifications.clone(),
        target: drive.map(|d| ResumeTarget {
            target_company: non_empty(&d.company_name).map(str::to_string),
            target_role: non_empty(&d.role).map(str::to_string),
            required_skills: d.required_skills.clone(),
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResumeTemplate {
    #[serde(rename = "ats-classic")]
    AtsClassic,
    #[serde(rename = "modern-professional")]
    ModernProfessional,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    pub id: ResumeTemplate,
    pub name: &'static str,
    pub description: &'static str,
    pub recommended: bool,
}

impl ResumeTemplate {
    pub const ALL: [ResumeTemplate; 2] =
        [ResumeTemplate::AtsClassic, ResumeTemplate::ModernProfessional];

    /// Unknown ids fall back to the ATS-friendly layout.
    pub fn from_id(id: Option<&str>) -> Self {
        match id.map(str::trim) {
            Some("modern-professional") => ResumeTemplate::ModernProfessional,
            _ => ResumeTemplate::AtsClassic,
        }
    }

    pub fn info(self) -> TemplateInfo {
        match self {
            ResumeTemplate::AtsClassic => TemplateInfo {
                id: self,
                name: "ATS Classic",
                description: "Simple, single-column, black & white ATS-friendly format",
                recommended: true,
            },
            ResumeTemplate::ModernProfessional => TemplateInfo {
                id: self,
                name: "Modern Professional",
                description: "Clean professional template with accent colors",
                recommended: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(raw: Value) -> StudentResumeInput {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_sparse_profile_gets_placeholders() {
        let student = input(json!({ "name": "Asha Rao", "cgpa": 8.4, "skills": "Rust, SQL , " }));
        let resume = transform_student_to_resume(&student, None);

        assert_eq!(resume.contact.full_name, "Asha Rao");
        assert_eq!(
            resume.summary,
            "Computer Science student with 8.4 academic record, seeking opportunities in software development."
        );
        assert_eq!(resume.skills, vec!["Rust", "SQL"]);
        assert_eq!(resume.education.len(), 1);
        assert_eq!(resume.education[0]["gpa"], "8.4/10.0");
        assert_eq!(resume.education[0]["degree"], "Bachelor of Technology");
        assert!(resume.target.is_none());
    }

    #[test]
    fn test_explicit_sections_pass_through() {
        let student = input(json!({
            "name": "Asha",
            "about": "Systems programmer.",
            "education": [{ "degree": "M.Tech" }],
            "projects": "not a list",
            "skills": ["Go", "Rust"],
            "linkedIn": "in/asha",
        }));
        let resume = transform_student_to_resume(&student, None);

        assert_eq!(resume.summary, "Systems programmer.");
        assert_eq!(resume.education[0]["degree"], "M.Tech");
        assert!(resume.projects.is_empty());
        assert_eq!(resume.skills, vec!["Go", "Rust"]);
        assert_eq!(resume.contact.linkedin, "in/asha");
    }

    #[test]
    fn test_drive_targeting_is_flattened() {
        let student = input(json!({ "name": "Asha" }));
        let drive: DriveTargetInput = serde_json::from_value(json!({
            "companyName": "Acme",
            "role": "Backend Engineer",
            "requiredSkills": ["Rust"],
        }))
        .unwrap();
        let resume = transform_student_to_resume(&student, Some(&drive));
        assert!(resume.summary.ends_with("seeking opportunities in Backend Engineer."));

        let json = serde_json::to_value(&resume).unwrap();
        assert_eq!(json["targetCompany"], "Acme");
        assert_eq!(json["requiredSkills"][0], "Rust");
        assert_eq!(json["contact"]["fullName"], "Asha");
    }

    #[test]
    fn test_display_name_falls_back_to_contact() {
        let student = input(json!({ "contact": { "fullName": "Asha Rao" } }));
        assert_eq!(student.display_name(), Some("Asha Rao"));
        assert_eq!(input(json!({ "name": "  " })).display_name(), None);
    }

    #[test]
    fn test_unknown_template_defaults_to_ats_classic() {
        assert_eq!(ResumeTemplate::from_id(Some("creative")), ResumeTemplate::AtsClassic);
        assert_eq!(
            ResumeTemplate::from_id(Some("modern-professional")),
            ResumeTemplate::ModernProfessional
        );
        let json = serde_json::to_value(ResumeTemplate::AtsClassic.info()).unwrap();
        assert_eq!(json["id"], "ats-classic");
        assert_eq!(json["recommended"], true);
    }
}
