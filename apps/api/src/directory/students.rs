use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::enrollment::manager::BulkResult;
use crate::errors::AppError;
use crate::models::enrollment::Enrollment;
use crate::models::parse_leading_f64;
use crate::models::student::{normalize_roll_number, Student, StudentInput};
use crate::store::{EnrollmentQuery, PlacementStore, StudentQuery};

/// Query-string filters for the faculty student list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilters {
    pub branch: Option<String>,
    pub year: Option<String>,
    pub placed: Option<String>,
    pub section: Option<String>,
    #[serde(rename = "minCGPA")]
    pub min_cgpa: Option<String>,
    #[serde(rename = "maxCGPA")]
    pub max_cgpa: Option<String>,
    pub search: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl StudentFilters {
    /// The equality filters the store can apply itself.
    fn store_query(&self) -> StudentQuery {
        StudentQuery {
            branch: present(&self.branch).map(str::to_string),
            year: present(&self.year).map(str::to_string),
            placed: present(&self.placed).map(|p| p == "true"),
        }
    }

    /// Section, CGPA range and free-text search. A bound that does not parse
    /// is ignored; a student whose CGPA does not parse never satisfies a bound.
    fn matches(&self, student: &Student) -> bool {
        if let Some(section) = present(&self.section) {
            if !student.section.eq_ignore_ascii_case(section) {
                return false;
            }
        }
        let cgpa = student.cgpa_value();
        if let Some(min) = present(&self.min_cgpa).and_then(parse_leading_f64) {
            if !cgpa.is_some_and(|c| c >= min) {
                return false;
            }
        }
        if let Some(max) = present(&self.max_cgpa).and_then(parse_leading_f64) {
            if !cgpa.is_some_and(|c| c <= max) {
                return false;
            }
        }
        if let Some(search) = present(&self.search) {
            let needle = search.to_lowercase();
            let hit = [&student.name, &student.roll_number, &student.email]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub enrollments: Vec<Enrollment>,
}

pub async fn list_students(
    store: &dyn PlacementStore,
    filters: &StudentFilters,
) -> Result<Vec<Student>, AppError> {
    let students = store.list_students(&filters.store_query()).await?;
    Ok(students.into_iter().filter(|s| filters.matches(s)).collect())
}

pub async fn student_detail(
    store: &dyn PlacementStore,
    id: &str,
) -> Result<StudentDetail, AppError> {
    let query = EnrollmentQuery::for_student(id);
    let (student, enrollments) = tokio::try_join!(
        store.get_student(id),
        store.list_enrollments(&query),
    )?;
    let student = student.ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    Ok(StudentDetail {
        student,
        enrollments,
    })
}

fn required_identity(input: &StudentInput) -> Option<(&str, &str)> {
    let roll_number = present(&input.roll_number)?;
    let name = present(&input.name)?;
    Some((roll_number, name))
}

fn new_student(input: &StudentInput, roll_number: &str, actor: &str) -> Student {
    let now = Utc::now();
    let mut student = Student {
        id: normalize_roll_number(roll_number),
        roll_number: roll_number.to_string(),
        created_at: now,
        updated_at: now,
        created_by: Some(actor.to_string()),
        ..Student::default()
    };
    input.apply_to(&mut student);
    student
}

pub async fn create_student(
    store: &dyn PlacementStore,
    input: &StudentInput,
    actor: &str,
) -> Result<Student, AppError> {
    let (roll_number, _) = required_identity(input).ok_or_else(|| {
        AppError::Validation("Roll number and name are required".to_string())
    })?;
    let student = new_student(input, roll_number, actor);
    store.insert_student(&student).await?;
    info!("Student {} created by {actor}", student.id);
    Ok(student)
}

pub async fn update_student(
    store: &dyn PlacementStore,
    id: &str,
    input: &StudentInput,
    actor: &str,
) -> Result<Student, AppError> {
    let mut student = store
        .get_student(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    input.apply_to(&mut student);
    student.updated_at = Utc::now();
    student.updated_by = Some(actor.to_string());
    store.update_student(&student).await?;
    Ok(student)
}

pub async fn delete_student(store: &dyn PlacementStore, id: &str) -> Result<(), AppError> {
    store.delete_student(id).await?;
    info!("Student {id} deleted");
    Ok(())
}

/// Upserts every valid row. Rows for existing students merge into the stored
/// record, so placement state and untouched fields survive a re-upload.
pub async fn bulk_upload(
    store: &dyn PlacementStore,
    rows: &[StudentInput],
    actor: &str,
) -> Result<BulkResult, AppError> {
    if rows.is_empty() {
        return Err(AppError::Validation("Students array is required".to_string()));
    }

    let mut result = BulkResult::default();
    let mut batch = Vec::with_capacity(rows.len());
    for row in rows {
        let Some((roll_number, _)) = required_identity(row) else {
            result.failed += 1;
            result
                .errors
                .push("Missing roll number or name for a student".to_string());
            continue;
        };
        let id = normalize_roll_number(roll_number);
        let student = match store.get_student(&id).await? {
            Some(mut existing) => {
                row.apply_to(&mut existing);
                existing.updated_at = Utc::now();
                existing.updated_by = Some(actor.to_string());
                existing
            }
            None => new_student(row, roll_number, actor),
        };
        batch.push(student);
    }

    store.upsert_students(&batch).await?;
    result.success = batch.len();
    info!(
        "Bulk upload by {actor}: {} stored, {} rejected",
        result.success, result.failed
    );
    Ok(result)
}
