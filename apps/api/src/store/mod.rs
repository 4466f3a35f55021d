pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::enrollment::status::EnrollmentStatus;
use crate::models::drive::{Drive, DriveStatus};
use crate::models::enrollment::Enrollment;
use crate::models::student::Student;
use crate::models::user::UserProfile;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A document with the same key already exists.
    #[error("{0}")]
    Duplicate(String),

    /// Delete refused because other documents still reference the target.
    #[error("{0}")]
    HasDependents(String),

    #[error("Enrollment {0} was modified concurrently")]
    StaleRevision(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Equality filters applied by the store; everything else is filtered in memory.
#[derive(Debug, Clone, Default)]
pub struct StudentQuery {
    pub branch: Option<String>,
    pub year: Option<String>,
    pub placed: Option<bool>,
}

impl StudentQuery {
    pub fn matches(&self, student: &Student) -> bool {
        self.branch.as_ref().map_or(true, |b| &student.branch == b)
            && self.year.as_ref().map_or(true, |y| &student.year == y)
            && self.placed.map_or(true, |p| student.is_placed == p)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DriveQuery {
    /// Empty means any status.
    pub statuses: Vec<DriveStatus>,
}

impl DriveQuery {
    pub fn active() -> Self {
        DriveQuery {
            statuses: DriveStatus::ACTIVE.to_vec(),
        }
    }

    pub fn matches(&self, drive: &Drive) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&drive.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentQuery {
    pub drive_id: Option<String>,
    pub student_id: Option<String>,
    pub status: Option<EnrollmentStatus>,
}

impl EnrollmentQuery {
    pub fn for_drive(drive_id: &str) -> Self {
        EnrollmentQuery {
            drive_id: Some(drive_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_student(student_id: &str) -> Self {
        EnrollmentQuery {
            student_id: Some(student_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, enrollment: &Enrollment) -> bool {
        self.drive_id.as_ref().map_or(true, |d| &enrollment.drive_id == d)
            && self
                .student_id
                .as_ref()
                .map_or(true, |s| &enrollment.student_id == s)
            && self.status.map_or(true, |s| enrollment.status == s)
    }
}

/// Signed adjustments to a drive's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub enrolled: i64,
    pub placed: i64,
}

impl CounterDelta {
    pub fn is_zero(&self) -> bool {
        self.enrolled == 0 && self.placed == 0
    }
}

/// Marks a student as placed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRecord {
    pub student_id: String,
    pub company: String,
    pub ctc: String,
    pub placed_at: DateTime<Utc>,
}

/// Everything one enrollment mutation touches, committed as a single unit.
#[derive(Debug, Clone)]
pub struct EnrollmentWrite {
    pub enrollment: Enrollment,
    /// `None` creates the enrollment; `Some(rev)` updates it only if the stored
    /// revision still equals `rev`.
    pub expected_revision: Option<u64>,
    pub drive_delta: CounterDelta,
    pub placement: Option<PlacementRecord>,
}

/// Document storage for students, drives, enrollments and user profiles.
///
/// Profile writes (`update_student`, `upsert_students`, `update_drive`) never
/// overwrite placement fields or drive counters; only `apply_enrollment_write`
/// changes those.
#[async_trait]
pub trait PlacementStore: Send + Sync {
    async fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError>;
    async fn find_student_by_user_id(&self, user_id: &str) -> Result<Option<Student>, StoreError>;
    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError>;
    async fn list_students(&self, query: &StudentQuery) -> Result<Vec<Student>, StoreError>;
    /// Fails with `Duplicate` if the id is taken.
    async fn insert_student(&self, student: &Student) -> Result<(), StoreError>;
    async fn update_student(&self, student: &Student) -> Result<(), StoreError>;
    /// Creates or merges every student in one batch.
    async fn upsert_students(&self, students: &[Student]) -> Result<(), StoreError>;
    async fn delete_student(&self, id: &str) -> Result<(), StoreError>;

    async fn get_drive(&self, id: &str) -> Result<Option<Drive>, StoreError>;
    async fn list_drives(&self, query: &DriveQuery) -> Result<Vec<Drive>, StoreError>;
    async fn insert_drive(&self, drive: &Drive) -> Result<(), StoreError>;
    async fn update_drive(&self, drive: &Drive) -> Result<(), StoreError>;
    async fn set_drive_eligibility(
        &self,
        id: &str,
        eligible_count: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn delete_drive(&self, id: &str) -> Result<(), StoreError>;

    async fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, StoreError>;
    /// Newest enrollment first.
    async fn list_enrollments(&self, query: &EnrollmentQuery) -> Result<Vec<Enrollment>, StoreError>;
    /// Atomically writes the enrollment, adjusts the drive counters and records
    /// the placement. Returns the enrollment as stored, with its new revision.
    async fn apply_enrollment_write(&self, write: EnrollmentWrite) -> Result<Enrollment, StoreError>;

    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;
    async fn upsert_user(&self, user: &UserProfile) -> Result<(), StoreError>;
}
