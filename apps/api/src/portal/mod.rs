//! Student self-service: the signed-in student's own profile, drives and
//! enrollments.
//!
//! A caller is linked to a student record by `userId`, falling back to a
//! case-insensitive email match for records created before the student
//! signed up.

pub mod handlers;

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;

use crate::auth::Identity;
use crate::eligibility::evaluate;
use crate::eligibility::scans::{partition_drives, ScoredDrive, StudentEligibilityStats};
use crate::eligibility::Eligibility;
use crate::enrollment::manager::{self, StatusUpdate};
use crate::errors::AppError;
use crate::models::drive::{Drive, DriveStatus};
use crate::models::enrollment::Enrollment;
use crate::models::student::{ProfileUpdate, Student, StudentInput};
use crate::store::{DriveQuery, EnrollmentQuery, PlacementStore};

const RECENT_ENROLLMENTS: usize = 5;

pub async fn resolve_student(
    store: &dyn PlacementStore,
    caller: &Identity,
) -> Result<Option<Student>, AppError> {
    if let Some(student) = store.find_student_by_user_id(&caller.uid).await? {
        return Ok(Some(student));
    }
    match caller.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => Ok(store.find_student_by_email(email).await?),
        None => Ok(None),
    }
}

async fn require_student(
    store: &dyn PlacementStore,
    caller: &Identity,
    message: &str,
) -> Result<Student, AppError> {
    resolve_student(store, caller)
        .await?
        .ok_or_else(|| AppError::NotFound(message.to_string()))
}

pub async fn profile(store: &dyn PlacementStore, caller: &Identity) -> Result<Student, AppError> {
    require_student(
        store,
        caller,
        "Student profile not found. Please contact administrator.",
    )
    .await
}

/// Applies the student-editable subset of fields to the caller's own record.
pub async fn update_profile(
    store: &dyn PlacementStore,
    caller: &Identity,
    update: ProfileUpdate,
) -> Result<Student, AppError> {
    let mut student = profile(store, caller).await?;
    StudentInput::from(update).apply_to(&mut student);
    student.updated_at = Utc::now();
    student.updated_by = Some(caller.uid.clone());
    store.update_student(&student).await?;
    Ok(student)
}

/// The fields of an active drive shown to signed-out visitors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDrive {
    pub id: String,
    pub company_name: String,
    pub ctc: String,
    pub drive_date: Option<String>,
    #[serde(rename = "minCGPA")]
    pub min_cgpa: Option<f64>,
    pub eligible_branches: Vec<String>,
    pub required_skills: Vec<String>,
    pub status: DriveStatus,
}

impl From<Drive> for PublicDrive {
    fn from(drive: Drive) -> Self {
        PublicDrive {
            id: drive.id,
            company_name: drive.company_name,
            ctc: drive.ctc,
            drive_date: drive.drive_date,
            min_cgpa: drive.min_cgpa,
            eligible_branches: drive.eligible_branches,
            required_skills: drive.required_skills,
            status: drive.status,
        }
    }
}

pub async fn public_drives(store: &dyn PlacementStore) -> Result<Vec<PublicDrive>, AppError> {
    let drives = store.list_drives(&DriveQuery::active()).await?;
    Ok(drives.into_iter().map(PublicDrive::from).collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveListing {
    #[serde(flatten)]
    pub drive: Drive,
    pub eligibility: Eligibility,
    pub is_enrolled: bool,
}

async fn enrolled_drive_ids(
    store: &dyn PlacementStore,
    student_id: &str,
) -> Result<HashSet<String>, AppError> {
    let enrollments = store
        .list_enrollments(&EnrollmentQuery::for_student(student_id))
        .await?;
    Ok(enrollments.into_iter().map(|e| e.drive_id).collect())
}

/// Active drives annotated for the caller. Without a linked student record
/// every drive is reported eligible and nothing is enrolled.
pub async fn drives_for(
    store: &dyn PlacementStore,
    caller: &Identity,
) -> Result<Vec<DriveListing>, AppError> {
    let student = resolve_student(store, caller).await?;
    let drives = store.list_drives(&DriveQuery::active()).await?;
    let enrolled = match &student {
        Some(s) => enrolled_drive_ids(store, &s.id).await?,
        None => HashSet::new(),
    };

    Ok(drives
        .into_iter()
        .map(|drive| {
            let eligibility = match &student {
                Some(s) => evaluate(s, &drive),
                None => Eligibility {
                    eligible: true,
                    reasons: Vec::new(),
                    score: 100,
                },
            };
            DriveListing {
                is_enrolled: enrolled.contains(&drive.id),
                eligibility,
                drive,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedDrive {
    #[serde(flatten)]
    pub drive: ScoredDrive,
    pub is_enrolled: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleDrives {
    pub student: Student,
    pub eligible_drives: Vec<MarkedDrive>,
    pub not_eligible_drives: Vec<ScoredDrive>,
    pub stats: StudentEligibilityStats,
}

pub async fn eligible_drives(
    store: &dyn PlacementStore,
    caller: &Identity,
) -> Result<EligibleDrives, AppError> {
    let student = require_student(store, caller, "Student profile not found").await?;
    let (drives, enrolled) = tokio::try_join!(
        async { Ok::<_, AppError>(store.list_drives(&DriveQuery::active()).await?) },
        enrolled_drive_ids(store, &student.id),
    )?;
    let scan = partition_drives(student, drives);
    Ok(EligibleDrives {
        eligible_drives: scan
            .eligible_drives
            .into_iter()
            .map(|drive| MarkedDrive {
                is_enrolled: enrolled.contains(&drive.drive.id),
                drive,
            })
            .collect(),
        student: scan.student,
        not_eligible_drives: scan.not_eligible_drives,
        stats: scan.stats,
    })
}

pub async fn enroll(
    store: &dyn PlacementStore,
    caller: &Identity,
    drive_id: &str,
) -> Result<Enrollment, AppError> {
    if drive_id.trim().is_empty() {
        return Err(AppError::Validation("Drive ID is required".to_string()));
    }
    let student = require_student(
        store,
        caller,
        "Please complete your profile before enrolling",
    )
    .await?;
    manager::enroll_student(store, &student.id, drive_id, &caller.uid).await
}

pub async fn enrollments(
    store: &dyn PlacementStore,
    caller: &Identity,
) -> Result<manager::StudentEnrollments, AppError> {
    let student = require_student(store, caller, "Student profile not found").await?;
    manager::student_enrollments(store, &student.id).await
}

/// Loads the enrollment and checks it belongs to the caller.
pub async fn own_enrollment(
    store: &dyn PlacementStore,
    caller: &Identity,
    enrollment_id: &str,
) -> Result<Enrollment, AppError> {
    let enrollment = store
        .get_enrollment(enrollment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;
    let owner = resolve_student(store, caller).await?;
    if owner.map_or(true, |s| s.id != enrollment.student_id) {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }
    Ok(enrollment)
}

pub async fn withdraw(
    store: &dyn PlacementStore,
    caller: &Identity,
    enrollment_id: &str,
    reason: Option<String>,
) -> Result<StatusUpdate, AppError> {
    own_enrollment(store, caller, enrollment_id).await?;
    manager::withdraw(store, enrollment_id, &caller.uid, reason).await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub name: String,
    pub roll_number: String,
    pub branch: String,
    pub cgpa: String,
    pub is_placed: bool,
    pub placed_company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub active_enrollments: usize,
    pub total_enrollments: usize,
    pub eligible_drives: usize,
    pub upcoming_drives: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub has_profile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<ProfileSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DashboardCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_enrollments: Option<Vec<Enrollment>>,
}

/// A caller without a linked record gets `hasProfile: false` rather than a 404.
pub async fn dashboard(
    store: &dyn PlacementStore,
    caller: &Identity,
) -> Result<StudentDashboard, AppError> {
    let Some(student) = resolve_student(store, caller).await? else {
        return Ok(StudentDashboard {
            has_profile: false,
            message: Some("Please complete your profile"),
            student: None,
            stats: None,
            recent_enrollments: None,
        });
    };

    let (enrollments, drives) = tokio::try_join!(
        manager::student_enrollments(store, &student.id),
        async { Ok::<_, AppError>(store.list_drives(&DriveQuery::active()).await?) },
    )?;
    let upcoming_drives = drives
        .iter()
        .filter(|d| d.status == DriveStatus::Upcoming)
        .count();
    let eligible_drives = drives
        .iter()
        .filter(|d| evaluate(&student, d).eligible)
        .count();

    Ok(StudentDashboard {
        has_profile: true,
        message: None,
        stats: Some(DashboardCounts {
            active_enrollments: enrollments.active_enrollments,
            total_enrollments: enrollments.total,
            eligible_drives,
            upcoming_drives,
        }),
        recent_enrollments: Some(
            enrollments
                .enrollments
                .into_iter()
                .take(RECENT_ENROLLMENTS)
                .collect(),
        ),
        student: Some(ProfileSummary {
            name: student.name,
            roll_number: student.roll_number,
            branch: student.branch,
            cgpa: student.cgpa,
            is_placed: student.is_placed,
            placed_company: student.placed_company,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::status::EnrollmentStatus;
    use crate::models::user::Role;
    use crate::store::MemoryStore;

    fn caller(uid: &str, email: Option<&str>) -> Identity {
        Identity {
            uid: uid.to_string(),
            email: email.map(str::to_string),
            name: None,
            role: Some(Role::Student),
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, user_id, email, cgpa) in [
            ("S1", Some("uid-1"), "asha@college.edu", "8.2"),
            ("S2", None, "bilal@college.edu", "6.0"),
        ] {
            store
                .insert_student(&Student {
                    id: id.to_string(),
                    roll_number: id.to_string(),
                    name: format!("Student {id}"),
                    user_id: user_id.map(str::to_string),
                    email: email.to_string(),
                    cgpa: cgpa.to_string(),
                    ..Student::default()
                })
                .await
                .unwrap();
        }
        for (id, status, min_cgpa) in [
            ("D1", DriveStatus::Upcoming, Some(7.0)),
            ("D2", DriveStatus::Ongoing, None),
            ("D3", DriveStatus::Closed, None),
        ] {
            store
                .insert_drive(&Drive {
                    id: id.to_string(),
                    company_name: format!("Company {id}"),
                    ctc: "10".to_string(),
                    status,
                    min_cgpa,
                    ..Drive::default()
                })
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_resolves_by_user_id_then_email() {
        let store = seeded().await;
        let by_uid = resolve_student(&store, &caller("uid-1", None)).await.unwrap();
        assert_eq!(by_uid.map(|s| s.id), Some("S1".to_string()));

        let by_email = resolve_student(&store, &caller("uid-2", Some("Bilal@College.edu")))
            .await
            .unwrap();
        assert_eq!(by_email.map(|s| s.id), Some("S2".to_string()));

        assert!(resolve_student(&store, &caller("uid-3", Some("")))
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            profile(&store, &caller("uid-3", None)).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_profile_update_keeps_academic_fields() {
        let store = seeded().await;
        let update: ProfileUpdate =
            serde_json::from_value(serde_json::json!({ "github": "gh/asha", "cgpa": "10" })).unwrap();
        let updated = update_profile(&store, &caller("uid-1", None), update)
            .await
            .unwrap();
        assert_eq!(updated.github, "gh/asha");
        assert_eq!(updated.cgpa, "8.2");
        assert_eq!(updated.updated_by.as_deref(), Some("uid-1"));
    }

    #[tokio::test]
    async fn test_drive_listing_marks_enrollment_and_eligibility() {
        let store = seeded().await;
        let bilal = caller("uid-2", Some("bilal@college.edu"));
        enroll(&store, &bilal, "D2").await.unwrap();

        let listing = drives_for(&store, &bilal).await.unwrap();
        assert_eq!(listing.len(), 2);
        let d1 = listing.iter().find(|d| d.drive.id == "D1").unwrap();
        assert!(!d1.eligibility.eligible);
        assert!(!d1.is_enrolled);
        let d2 = listing.iter().find(|d| d.drive.id == "D2").unwrap();
        assert!(d2.is_enrolled);

        let anonymous = drives_for(&store, &caller("uid-9", None)).await.unwrap();
        assert!(anonymous.iter().all(|d| d.eligibility.eligible && !d.is_enrolled));

        let eligible = eligible_drives(&store, &bilal).await.unwrap();
        assert_eq!(eligible.stats.total_drives, 2);
        assert_eq!(eligible.eligible_drives.len(), 1);
        assert!(eligible.eligible_drives[0].is_enrolled);
    }

    #[tokio::test]
    async fn test_enroll_requires_drive_and_profile() {
        let store = seeded().await;
        assert!(matches!(
            enroll(&store, &caller("uid-1", None), " ").await.unwrap_err(),
            AppError::Validation(_)
        ));
        let err = enroll(&store, &caller("uid-9", None), "D2").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(m) if m.contains("complete your profile")));
    }

    #[tokio::test]
    async fn test_other_students_enrollments_are_forbidden() {
        let store = seeded().await;
        let asha = caller("uid-1", None);
        let bilal = caller("uid-2", Some("bilal@college.edu"));
        let enrollment = enroll(&store, &asha, "D1").await.unwrap();

        assert!(matches!(
            own_enrollment(&store, &bilal, &enrollment.id).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            withdraw(&store, &bilal, &enrollment.id, None).await.unwrap_err(),
            AppError::Forbidden(_)
        ));
        assert!(matches!(
            own_enrollment(&store, &asha, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let update = withdraw(&store, &asha, &enrollment.id, Some("Changed plans".to_string()))
            .await
            .unwrap();
        assert_eq!(update.new_status, EnrollmentStatus::Withdrawn);
    }

    #[tokio::test]
    async fn test_dashboard_with_and_without_profile() {
        let store = seeded().await;
        let missing = dashboard(&store, &caller("uid-9", None)).await.unwrap();
        assert!(!missing.has_profile);
        let json = serde_json::to_value(&missing).unwrap();
        assert_eq!(json["message"], "Please complete your profile");
        assert!(json.get("stats").is_none());

        let asha = caller("uid-1", None);
        enroll(&store, &asha, "D1").await.unwrap();
        let board = dashboard(&store, &asha).await.unwrap();
        let stats = board.stats.unwrap();
        assert_eq!(stats.total_enrollments, 1);
        assert_eq!(stats.active_enrollments, 1);
        assert_eq!(stats.eligible_drives, 2);
        assert_eq!(stats.upcoming_drives, 1);
        assert_eq!(board.recent_enrollments.unwrap().len(), 1);
        assert_eq!(board.student.unwrap().roll_number, "S1");
    }

    #[tokio::test]
    async fn test_public_drives_only_lists_active() {
        let store = seeded().await;
        let drives = public_drives(&store).await.unwrap();
        assert_eq!(drives.len(), 2);
        let json = serde_json::to_value(&drives[0]).unwrap();
        assert!(json.get("enrolledStudents").is_none());
        assert!(json.get("companyName").is_some());
    }
}
