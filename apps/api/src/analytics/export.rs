use std::fmt;
use std::str::FromStr;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::enrollment::EnrollmentStatus;
use crate::errors::AppError;
use crate::models::drive::Drive;
use crate::models::enrollment::Enrollment;
use crate::models::student::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    All,
    Students,
    Drives,
    Enrollments,
}

impl ExportType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportType::All => "all",
            ExportType::Students => "students",
            ExportType::Drives => "drives",
            ExportType::Enrollments => "enrollments",
        }
    }

    pub fn includes(self, part: ExportType) -> bool {
        self == ExportType::All || self == part
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(ExportType::All),
            "students" => Ok(ExportType::Students),
            "drives" => Ok(ExportType::Drives),
            "enrollments" => Ok(ExportType::Enrollments),
            other => Err(AppError::Validation(format!(
                "Unknown export type '{other}'. Use all, students, drives or enrollments"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub roll_number: String,
    pub name: String,
    pub branch: String,
    pub year: String,
    pub cgpa: String,
    pub is_placed: bool,
    pub placed_company: String,
    #[serde(rename = "placedCTC")]
    pub placed_ctc: String,
}

impl From<&Student> for StudentRow {
    fn from(s: &Student) -> Self {
        StudentRow {
            roll_number: s.roll_number.clone(),
            name: s.name.clone(),
            branch: s.branch.clone(),
            year: s.year.clone(),
            cgpa: s.cgpa.clone(),
            is_placed: s.is_placed,
            placed_company: s.placed_company.clone().unwrap_or_default(),
            placed_ctc: s.placed_ctc.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveRow {
    pub company_name: String,
    pub ctc: String,
    pub drive_date: Option<String>,
    pub status: String,
    pub enrolled_students: i64,
    pub placed_students: i64,
}

impl From<&Drive> for DriveRow {
    fn from(d: &Drive) -> Self {
        DriveRow {
            company_name: d.company_name.clone(),
            ctc: d.ctc.clone(),
            drive_date: d.drive_date.clone(),
            status: d.status.as_str().to_string(),
            enrolled_students: d.enrolled_students,
            placed_students: d.placed_students,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRow {
    pub student_name: String,
    pub roll_number: String,
    pub company: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

impl From<&Enrollment> for EnrollmentRow {
    fn from(e: &Enrollment) -> Self {
        EnrollmentRow {
            student_name: e.student_name.clone(),
            roll_number: e.student_roll_number.clone(),
            company: e.company_name.clone(),
            status: e.status,
            enrolled_at: e.enrolled_at,
        }
    }
}

/// Flattened report rows. Sections not selected by `type` are omitted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub exported_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub export_type: ExportType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<StudentRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drives: Option<Vec<DriveRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollments: Option<Vec<EnrollmentRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_key: Option<String>,
}

pub fn build_export(
    export_type: ExportType,
    students: &[Student],
    drives: &[Drive],
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
) -> ExportData {
    ExportData {
        exported_at: now,
        export_type,
        students: export_type
            .includes(ExportType::Students)
            .then(|| students.iter().map(StudentRow::from).collect()),
        drives: export_type
            .includes(ExportType::Drives)
            .then(|| drives.iter().map(DriveRow::from).collect()),
        enrollments: export_type
            .includes(ExportType::Enrollments)
            .then(|| enrollments.iter().map(EnrollmentRow::from).collect()),
        archive_key: None,
    }
}

pub fn archive_key(export: &ExportData) -> String {
    format!(
        "exports/{}/{}.json",
        export.export_type,
        export.exported_at.format("%Y%m%dT%H%M%SZ")
    )
}

/// S3 bucket that keeps a copy of every archived export.
#[derive(Clone)]
pub struct ExportArchive {
    client: S3Client,
    bucket: String,
}

impl ExportArchive {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Uploads the export as JSON and returns the object key.
    pub async fn upload(&self, export: &ExportData) -> Result<String, AppError> {
        let key = archive_key(export);
        let body = serde_json::to_vec_pretty(export)
            .map_err(|e| anyhow::anyhow!("Failed to serialize export: {e}"))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("S3 upload failed: {e}")))?;

        info!("Archived export to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_type_selects_sections() {
        let students = vec![Student {
            roll_number: "21CS001".into(),
            placed_company: Some("Acme".into()),
            ..Student::default()
        }];
        let drives = vec![Drive::default()];
        let now = Utc::now();

        let export = build_export(ExportType::Students, &students, &drives, &[], now);
        assert!(export.drives.is_none());
        assert!(export.enrollments.is_none());
        let rows = export.students.unwrap();
        assert_eq!(rows[0].placed_company, "Acme");
        assert_eq!(rows[0].placed_ctc, "");

        let export = build_export(ExportType::All, &students, &drives, &[], now);
        assert!(export.students.is_some());
        assert_eq!(export.drives.unwrap().len(), 1);
        assert_eq!(export.enrollments.unwrap().len(), 0);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert_eq!("".parse::<ExportType>().unwrap(), ExportType::All);
        assert_eq!("Drives".parse::<ExportType>().unwrap(), ExportType::Drives);
        assert!(matches!(
            "placements".parse::<ExportType>(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_archive_key_layout() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let export = build_export(ExportType::Drives, &[], &[], &[], now);
        assert_eq!(archive_key(&export), "exports/drives/20240501T093000Z.json");

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["type"], "drives");
        assert!(json.get("students").is_none());
    }
}
