use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    DriveQuery, EnrollmentQuery, EnrollmentWrite, PlacementStore, StoreError, StudentQuery,
};
use crate::models::drive::Drive;
use crate::models::enrollment::Enrollment;
use crate::models::student::Student;
use crate::models::user::UserProfile;

#[derive(Default)]
struct Collections {
    students: BTreeMap<String, Student>,
    drives: BTreeMap<String, Drive>,
    enrollments: BTreeMap<String, Enrollment>,
    users: BTreeMap<String, UserProfile>,
}

/// In-process store used for local development and tests.
/// A single write lock makes every multi-document write atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn keep_placement(existing: &Student, incoming: &Student) -> Student {
    Student {
        is_placed: existing.is_placed,
        placed_company: existing.placed_company.clone(),
        placed_ctc: existing.placed_ctc.clone(),
        placement_date: existing.placement_date,
        created_at: existing.created_at,
        created_by: existing.created_by.clone(),
        ..incoming.clone()
    }
}

#[async_trait]
impl PlacementStore for MemoryStore {
    async fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        Ok(self.inner.read().await.students.get(id).cloned())
    }

    async fn find_student_by_user_id(&self, user_id: &str) -> Result<Option<Student>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .values()
            .find(|s| s.user_id.as_deref() == Some(user_id))
            .cloned())
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .values()
            .find(|s| s.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_students(&self, query: &StudentQuery) -> Result<Vec<Student>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .students
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect())
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.students.contains_key(&student.id) {
            return Err(StoreError::Duplicate(
                "Student with this roll number already exists".to_string(),
            ));
        }
        inner.students.insert(student.id.clone(), student.clone());
        Ok(())
    }

    async fn update_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .students
            .get_mut(&student.id)
            .ok_or(StoreError::NotFound("Student"))?;
        *existing = keep_placement(existing, student);
        Ok(())
    }

    async fn upsert_students(&self, students: &[Student]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        for student in students {
            let merged = match inner.students.get(&student.id) {
                Some(existing) => keep_placement(existing, student),
                None => student.clone(),
            };
            inner.students.insert(student.id.clone(), merged);
        }
        Ok(())
    }

    async fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.students.contains_key(id) {
            return Err(StoreError::NotFound("Student"));
        }
        if inner.enrollments.values().any(|e| e.student_id == id) {
            return Err(StoreError::HasDependents(
                "Student has existing enrollments. Please remove enrollments first.".to_string(),
            ));
        }
        inner.students.remove(id);
        Ok(())
    }

    async fn get_drive(&self, id: &str) -> Result<Option<Drive>, StoreError> {
        Ok(self.inner.read().await.drives.get(id).cloned())
    }

    async fn list_drives(&self, query: &DriveQuery) -> Result<Vec<Drive>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .drives
            .values()
            .filter(|d| query.matches(d))
            .cloned()
            .collect())
    }

    async fn insert_drive(&self, drive: &Drive) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.drives.contains_key(&drive.id) {
            return Err(StoreError::Duplicate(format!("Drive {} already exists", drive.id)));
        }
        inner.drives.insert(drive.id.clone(), drive.clone());
        Ok(())
    }

    async fn update_drive(&self, drive: &Drive) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let existing = inner
            .drives
            .get_mut(&drive.id)
            .ok_or(StoreError::NotFound("Drive"))?;
        *existing = Drive {
            enrolled_students: existing.enrolled_students,
            placed_students: existing.placed_students,
            eligible_student_count: existing.eligible_student_count,
            eligibility_updated_at: existing.eligibility_updated_at,
            created_at: existing.created_at,
            created_by: existing.created_by.clone(),
            ..drive.clone()
        };
        Ok(())
    }

    async fn set_drive_eligibility(
        &self,
        id: &str,
        eligible_count: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let drive = inner.drives.get_mut(id).ok_or(StoreError::NotFound("Drive"))?;
        drive.eligible_student_count = Some(eligible_count);
        drive.eligibility_updated_at = Some(at);
        Ok(())
    }

    async fn delete_drive(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.drives.contains_key(id) {
            return Err(StoreError::NotFound("Drive"));
        }
        if inner.enrollments.values().any(|e| e.drive_id == id) {
            return Err(StoreError::HasDependents(
                "Drive has existing enrollments. Please remove all enrollments first.".to_string(),
            ));
        }
        inner.drives.remove(id);
        Ok(())
    }

    async fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.inner.read().await.enrollments.get(id).cloned())
    }

    async fn list_enrollments(&self, query: &EnrollmentQuery) -> Result<Vec<Enrollment>, StoreError> {
        let inner = self.inner.read().await;
        let mut enrollments: Vec<Enrollment> = inner
            .enrollments
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        enrollments.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(enrollments)
    }

    async fn apply_enrollment_write(&self, write: EnrollmentWrite) -> Result<Enrollment, StoreError> {
        let EnrollmentWrite {
            mut enrollment,
            expected_revision,
            drive_delta,
            placement,
        } = write;
        let mut inner = self.inner.write().await;

        // Validate everything before mutating so a failure leaves no partial write.
        if !inner.drives.contains_key(&enrollment.drive_id) {
            return Err(StoreError::NotFound("Drive"));
        }
        if let Some(p) = &placement {
            if !inner.students.contains_key(&p.student_id) {
                return Err(StoreError::NotFound("Student"));
            }
        }
        match expected_revision {
            None => {
                if inner.enrollments.values().any(|e| {
                    e.student_id == enrollment.student_id && e.drive_id == enrollment.drive_id
                }) {
                    return Err(StoreError::Duplicate(
                        "Student is already enrolled in this drive".to_string(),
                    ));
                }
                enrollment.revision = 0;
            }
            Some(expected) => {
                let stored = inner
                    .enrollments
                    .get(&enrollment.id)
                    .ok_or(StoreError::NotFound("Enrollment"))?;
                if stored.revision != expected {
                    return Err(StoreError::StaleRevision(enrollment.id.clone()));
                }
                enrollment.revision = expected + 1;
            }
        }

        if !drive_delta.is_zero() {
            if let Some(drive) = inner.drives.get_mut(&enrollment.drive_id) {
                drive.enrolled_students = (drive.enrolled_students + drive_delta.enrolled).max(0);
                drive.placed_students = (drive.placed_students + drive_delta.placed).max(0);
                drive.updated_at = enrollment.updated_at;
            }
        }
        if let Some(p) = placement {
            if let Some(student) = inner.students.get_mut(&p.student_id) {
                student.is_placed = true;
                student.placed_company = Some(p.company);
                student.placed_ctc = Some(p.ctc);
                student.placement_date = Some(p.placed_at);
                student.updated_at = p.placed_at;
            }
        }
        inner
            .enrollments
            .insert(enrollment.id.clone(), enrollment.clone());
        Ok(enrollment)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn upsert_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(())
    }
}
