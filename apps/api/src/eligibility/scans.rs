use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::evaluate;
use crate::errors::AppError;
use crate::models::drive::Drive;
use crate::models::student::Student;
use crate::store::{DriveQuery, PlacementStore, StudentQuery};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredStudent {
    #[serde(flatten)]
    pub student: Student,
    pub eligibility_score: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eligibility_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredDrive {
    #[serde(flatten)]
    pub drive: Drive,
    pub eligibility_score: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub eligibility_reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEligibilityStats {
    pub total_students: usize,
    pub eligible_count: usize,
    pub not_eligible_count: usize,
    pub eligibility_rate: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEligibility {
    pub drive: Drive,
    pub eligible: Vec<ScoredStudent>,
    pub not_eligible: Vec<ScoredStudent>,
    pub stats: DriveEligibilityStats,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEligibilityStats {
    pub total_drives: usize,
    pub eligible_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEligibility {
    pub student: Student,
    pub eligible_drives: Vec<ScoredDrive>,
    pub not_eligible_drives: Vec<ScoredDrive>,
    pub stats: StudentEligibilityStats,
}

/// Splits `students` by eligibility for `drive`; eligible ones come back best score first.
pub fn partition_students(drive: Drive, students: Vec<Student>) -> DriveEligibility {
    let total_students = students.len();
    let (mut eligible, not_eligible): (Vec<_>, Vec<_>) = students
        .into_iter()
        .map(|student| {
            let result = evaluate(&student, &drive);
            (
                result.eligible,
                ScoredStudent {
                    student,
                    eligibility_score: result.score,
                    eligibility_reasons: result.reasons,
                },
            )
        })
        .partition(|(ok, _)| *ok);
    eligible.sort_by(|a, b| b.1.eligibility_score.cmp(&a.1.eligibility_score));

    let eligible: Vec<ScoredStudent> = eligible.into_iter().map(|(_, s)| s).collect();
    let not_eligible: Vec<ScoredStudent> = not_eligible.into_iter().map(|(_, s)| s).collect();
    let eligibility_rate = if total_students == 0 {
        0.0
    } else {
        eligible.len() as f64 / total_students as f64 * 100.0
    };

    DriveEligibility {
        drive,
        stats: DriveEligibilityStats {
            total_students,
            eligible_count: eligible.len(),
            not_eligible_count: not_eligible.len(),
            eligibility_rate: format!("{eligibility_rate:.2}"),
        },
        eligible,
        not_eligible,
    }
}

pub async fn eligible_students_for_drive(
    store: &dyn PlacementStore,
    drive_id: &str,
) -> Result<DriveEligibility, AppError> {
    let drive = store
        .get_drive(drive_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Drive not found".to_string()))?;
    let students = store.list_students(&StudentQuery::default()).await?;
    Ok(partition_students(drive, students))
}

/// Evaluates a student against every Upcoming or Ongoing drive.
pub async fn eligible_drives_for_student(
    store: &dyn PlacementStore,
    student_id: &str,
) -> Result<StudentEligibility, AppError> {
    let student = store
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    let drives = store.list_drives(&DriveQuery::active()).await?;
    Ok(partition_drives(student, drives))
}

pub fn partition_drives(student: Student, drives: Vec<Drive>) -> StudentEligibility {
    let total_drives = drives.len();
    let mut eligible_drives = Vec::new();
    let mut not_eligible_drives = Vec::new();
    for drive in drives {
        let result = evaluate(&student, &drive);
        let scored = ScoredDrive {
            drive,
            eligibility_score: result.score,
            eligibility_reasons: result.reasons,
        };
        if result.eligible {
            eligible_drives.push(scored);
        } else {
            not_eligible_drives.push(scored);
        }
    }
    StudentEligibility {
        student,
        stats: StudentEligibilityStats {
            total_drives,
            eligible_count: eligible_drives.len(),
        },
        eligible_drives,
        not_eligible_drives,
    }
}

/// Recomputes and stores how many students currently qualify for the drive.
pub async fn refresh_drive_eligibility_count(
    store: &dyn PlacementStore,
    drive_id: &str,
) -> Result<usize, AppError> {
    let result = eligible_students_for_drive(store, drive_id).await?;
    let count = result.eligible.len();
    store
        .set_drive_eligibility(drive_id, count as i64, Utc::now())
        .await?;
    info!(
        "Updated eligibility count for drive {} ({}): {count}",
        drive_id, result.drive.company_name
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drive::DriveStatus;
    use crate::store::MemoryStore;

    fn student(id: &str, cgpa: &str) -> Student {
        Student {
            id: id.to_string(),
            roll_number: id.to_string(),
            cgpa: cgpa.to_string(),
            branch: "CS".to_string(),
            ..Student::default()
        }
    }

    async fn store_with(drive: Drive) -> MemoryStore {
        let store = MemoryStore::new();
        for (id, cgpa) in [("s1", "6.5"), ("s2", "8.2"), ("s3", "9.0")] {
            store.insert_student(&student(id, cgpa)).await.unwrap();
        }
        store.insert_drive(&drive).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_drive_scan_partitions_and_counts() {
        let drive = Drive {
            id: "d1".into(),
            company_name: "Acme".into(),
            min_cgpa: Some(7.0),
            ..Drive::default()
        };
        let store = store_with(drive).await;

        let result = eligible_students_for_drive(&store, "d1").await.unwrap();
        assert_eq!(result.stats.total_students, 3);
        assert_eq!(result.stats.eligible_count, 2);
        assert_eq!(result.stats.eligibility_rate, "66.67");
        assert_eq!(result.not_eligible[0].student.id, "s1");
        assert_eq!(result.not_eligible[0].eligibility_reasons.len(), 1);

        let count = refresh_drive_eligibility_count(&store, "d1").await.unwrap();
        assert_eq!(count, 2);
        let stored = store.get_drive("d1").await.unwrap().unwrap();
        assert_eq!(stored.eligible_student_count, Some(2));
        assert!(stored.eligibility_updated_at.is_some());
    }

    #[tokio::test]
    async fn test_student_scan_skips_inactive_drives() {
        let store = store_with(Drive {
            id: "open".into(),
            status: DriveStatus::Ongoing,
            ..Drive::default()
        })
        .await;
        store
            .insert_drive(&Drive {
                id: "closed".into(),
                status: DriveStatus::Closed,
                ..Drive::default()
            })
            .await
            .unwrap();
        store
            .insert_drive(&Drive {
                id: "strict".into(),
                min_cgpa: Some(9.5),
                ..Drive::default()
            })
            .await
            .unwrap();

        let result = eligible_drives_for_student(&store, "s2").await.unwrap();
        assert_eq!(result.stats.total_drives, 2);
        assert_eq!(result.eligible_drives.len(), 1);
        assert_eq!(result.eligible_drives[0].drive.id, "open");
        assert_eq!(result.not_eligible_drives[0].drive.id, "strict");
    }

    #[tokio::test]
    async fn test_missing_drive_is_not_found() {
        let store = MemoryStore::new();
        let err = eligible_students_for_drive(&store, "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_empty_population_has_zero_rate() {
        let result = partition_students(Drive::default(), Vec::new());
        assert_eq!(result.stats.eligibility_rate, "0.00");
    }
}
