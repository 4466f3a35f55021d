use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{
    CounterDelta, DriveQuery, EnrollmentQuery, EnrollmentWrite, PlacementRecord, PlacementStore,
    StoreError, StudentQuery,
};
use crate::models::drive::Drive;
use crate::models::enrollment::Enrollment;
use crate::models::student::Student;
use crate::models::user::UserProfile;

/// Postgres-backed store. Each document lives in a JSONB `doc` column next to
/// the key columns used for filtering and uniqueness.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// JSONB object that carries the placement fields of `source` over a new document.
fn keep_placement_sql(source: &str) -> String {
    format!(
        "jsonb_build_object(\
            'isPlaced', COALESCE({source}->'isPlaced', 'false'::jsonb), \
            'placedCompany', COALESCE({source}->'placedCompany', 'null'::jsonb), \
            'placedCTC', COALESCE({source}->'placedCTC', 'null'::jsonb), \
            'placementDate', COALESCE({source}->'placementDate', 'null'::jsonb), \
            'createdBy', COALESCE({source}->'createdBy', 'null'::jsonb))"
    )
}

async fn adjust_drive_counters(
    tx: &mut Transaction<'_, Postgres>,
    drive_id: &str,
    delta: CounterDelta,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE drives SET doc = doc || jsonb_build_object(
            'enrolledStudents', GREATEST(COALESCE((doc->>'enrolledStudents')::bigint, 0) + $2, 0),
            'placedStudents', GREATEST(COALESCE((doc->>'placedStudents')::bigint, 0) + $3, 0),
            'updatedAt', $4::text)
        WHERE id = $1
        "#,
    )
    .bind(drive_id)
    .bind(delta.enrolled)
    .bind(delta.placed)
    .bind(at.to_rfc3339())
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("Drive"));
    }
    Ok(())
}

async fn record_placement(
    tx: &mut Transaction<'_, Postgres>,
    placement: &PlacementRecord,
) -> Result<(), StoreError> {
    let placed_at = placement.placed_at.to_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE students SET doc = doc || jsonb_build_object(
            'isPlaced', true,
            'placedCompany', $2::text,
            'placedCTC', $3::text,
            'placementDate', $4::text,
            'updatedAt', $4::text)
        WHERE id = $1
        "#,
    )
    .bind(&placement.student_id)
    .bind(&placement.company)
    .bind(&placement.ctc)
    .bind(&placed_at)
    .execute(&mut **tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("Student"));
    }
    Ok(())
}

#[async_trait]
impl PlacementStore for PgStore {
    async fn get_student(&self, id: &str) -> Result<Option<Student>, StoreError> {
        let doc: Option<Json<Student>> =
            sqlx::query_scalar("SELECT doc FROM students WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(s)| s))
    }

    async fn find_student_by_user_id(&self, user_id: &str) -> Result<Option<Student>, StoreError> {
        let doc: Option<Json<Student>> =
            sqlx::query_scalar("SELECT doc FROM students WHERE user_id = $1 LIMIT 1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(s)| s))
    }

    async fn find_student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        let doc: Option<Json<Student>> =
            sqlx::query_scalar("SELECT doc FROM students WHERE lower(email) = lower($1) LIMIT 1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(s)| s))
    }

    async fn list_students(&self, query: &StudentQuery) -> Result<Vec<Student>, StoreError> {
        let docs: Vec<Json<Student>> = sqlx::query_scalar(
            r#"
            SELECT doc FROM students
            WHERE ($1::text IS NULL OR doc->>'branch' = $1)
              AND ($2::text IS NULL OR doc->>'year' = $2)
              AND ($3::boolean IS NULL OR COALESCE((doc->>'isPlaced')::boolean, false) = $3)
            ORDER BY id
            "#,
        )
        .bind(&query.branch)
        .bind(&query.year)
        .bind(query.placed)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(s)| s).collect())
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO students (id, user_id, email, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&student.id)
        .bind(&student.user_id)
        .bind(&student.email)
        .bind(Json(student))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(
                "Student with this roll number already exists".to_string(),
            ));
        }
        Ok(())
    }

    async fn update_student(&self, student: &Student) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE students SET user_id = $2, email = $3, \
             doc = $4::jsonb || {} || jsonb_build_object('createdAt', COALESCE(doc->'createdAt', $4::jsonb->'createdAt')) \
             WHERE id = $1",
            keep_placement_sql("doc")
        );
        let result = sqlx::query(&sql)
            .bind(&student.id)
            .bind(&student.user_id)
            .bind(&student.email)
            .bind(Json(student))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Student"));
        }
        Ok(())
    }

    async fn upsert_students(&self, students: &[Student]) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO students (id, user_id, email, doc) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET user_id = EXCLUDED.user_id, email = EXCLUDED.email, \
             doc = EXCLUDED.doc || {} || jsonb_build_object('createdAt', COALESCE(students.doc->'createdAt', EXCLUDED.doc->'createdAt'))",
            keep_placement_sql("students.doc")
        );
        let mut tx = self.pool.begin().await?;
        for student in students {
            sqlx::query(&sql)
                .bind(&student.id)
                .bind(&student.user_id)
                .bind(&student.email)
                .bind(Json(student))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!("Upserted {} students", students.len());
        Ok(())
    }

    async fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM students
            WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM enrollments WHERE student_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get_student(id).await? {
            None => Err(StoreError::NotFound("Student")),
            Some(_) => Err(StoreError::HasDependents(
                "Student has existing enrollments. Please remove enrollments first.".to_string(),
            )),
        }
    }

    async fn get_drive(&self, id: &str) -> Result<Option<Drive>, StoreError> {
        let doc: Option<Json<Drive>> = sqlx::query_scalar("SELECT doc FROM drives WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(d)| d))
    }

    async fn list_drives(&self, query: &DriveQuery) -> Result<Vec<Drive>, StoreError> {
        let statuses: Vec<String> = query
            .statuses
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let docs: Vec<Json<Drive>> = sqlx::query_scalar(
            r#"
            SELECT doc FROM drives
            WHERE cardinality($1::text[]) = 0 OR status = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(d)| d).collect())
    }

    async fn insert_drive(&self, drive: &Drive) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO drives (id, status, doc) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&drive.id)
        .bind(drive.status.as_str())
        .bind(Json(drive))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(format!("Drive {} already exists", drive.id)));
        }
        Ok(())
    }

    async fn update_drive(&self, drive: &Drive) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE drives SET status = $2, doc = $3::jsonb || jsonb_build_object(
                'enrolledStudents', COALESCE(doc->'enrolledStudents', '0'::jsonb),
                'placedStudents', COALESCE(doc->'placedStudents', '0'::jsonb),
                'eligibleStudentCount', COALESCE(doc->'eligibleStudentCount', 'null'::jsonb),
                'eligibilityUpdatedAt', COALESCE(doc->'eligibilityUpdatedAt', 'null'::jsonb),
                'createdBy', COALESCE(doc->'createdBy', 'null'::jsonb),
                'createdAt', COALESCE(doc->'createdAt', $3::jsonb->'createdAt'))
            WHERE id = $1
            "#,
        )
        .bind(&drive.id)
        .bind(drive.status.as_str())
        .bind(Json(drive))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Drive"));
        }
        Ok(())
    }

    async fn set_drive_eligibility(
        &self,
        id: &str,
        eligible_count: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE drives SET doc = doc || jsonb_build_object(
                'eligibleStudentCount', $2::bigint,
                'eligibilityUpdatedAt', $3::text)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(eligible_count)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Drive"));
        }
        Ok(())
    }

    async fn delete_drive(&self, id: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM drives
            WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM enrollments WHERE drive_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.get_drive(id).await? {
            None => Err(StoreError::NotFound("Drive")),
            Some(_) => Err(StoreError::HasDependents(
                "Drive has existing enrollments. Please remove all enrollments first.".to_string(),
            )),
        }
    }

    async fn get_enrollment(&self, id: &str) -> Result<Option<Enrollment>, StoreError> {
        let doc: Option<Json<Enrollment>> =
            sqlx::query_scalar("SELECT doc FROM enrollments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(e)| e))
    }

    async fn list_enrollments(&self, query: &EnrollmentQuery) -> Result<Vec<Enrollment>, StoreError> {
        let docs: Vec<Json<Enrollment>> = sqlx::query_scalar(
            r#"
            SELECT doc FROM enrollments
            WHERE ($1::text IS NULL OR drive_id = $1)
              AND ($2::text IS NULL OR student_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY enrolled_at DESC
            "#,
        )
        .bind(&query.drive_id)
        .bind(&query.student_id)
        .bind(query.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(e)| e).collect())
    }

    async fn apply_enrollment_write(&self, write: EnrollmentWrite) -> Result<Enrollment, StoreError> {
        let EnrollmentWrite {
            mut enrollment,
            expected_revision,
            drive_delta,
            placement,
        } = write;
        let mut tx = self.pool.begin().await?;

        match expected_revision {
            None => {
                // Serializes concurrent enrollments into the same drive.
                let locked: Option<String> =
                    sqlx::query_scalar("SELECT id FROM drives WHERE id = $1 FOR UPDATE")
                        .bind(&enrollment.drive_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if locked.is_none() {
                    return Err(StoreError::NotFound("Drive"));
                }
                enrollment.revision = 0;
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO enrollments (id, student_id, drive_id, status, revision, enrolled_at, doc)
                    VALUES ($1, $2, $3, $4, 0, $5, $6)
                    ON CONFLICT (student_id, drive_id) DO NOTHING
                    "#,
                )
                .bind(&enrollment.id)
                .bind(&enrollment.student_id)
                .bind(&enrollment.drive_id)
                .bind(enrollment.status.as_str())
                .bind(enrollment.enrolled_at)
                .bind(Json(&enrollment))
                .execute(&mut *tx)
                .await?;
                if inserted.rows_affected() == 0 {
                    return Err(StoreError::Duplicate(
                        "Student is already enrolled in this drive".to_string(),
                    ));
                }
            }
            Some(expected) => {
                enrollment.revision = expected + 1;
                let updated = sqlx::query(
                    r#"
                    UPDATE enrollments SET status = $2, revision = $3, doc = $4
                    WHERE id = $1 AND revision = $5
                    "#,
                )
                .bind(&enrollment.id)
                .bind(enrollment.status.as_str())
                .bind(enrollment.revision as i64)
                .bind(Json(&enrollment))
                .bind(expected as i64)
                .execute(&mut *tx)
                .await?;
                if updated.rows_affected() == 0 {
                    let exists: Option<String> =
                        sqlx::query_scalar("SELECT id FROM enrollments WHERE id = $1")
                            .bind(&enrollment.id)
                            .fetch_optional(&mut *tx)
                            .await?;
                    return Err(match exists {
                        None => StoreError::NotFound("Enrollment"),
                        Some(_) => StoreError::StaleRevision(enrollment.id.clone()),
                    });
                }
            }
        }

        if !drive_delta.is_zero() {
            adjust_drive_counters(&mut tx, &enrollment.drive_id, drive_delta, enrollment.updated_at)
                .await?;
        }
        if let Some(placement) = &placement {
            record_placement(&mut tx, placement).await?;
        }

        tx.commit().await?;
        Ok(enrollment)
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        let doc: Option<Json<UserProfile>> =
            sqlx::query_scalar("SELECT doc FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(u)| u))
    }

    async fn upsert_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, doc) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc
            "#,
        )
        .bind(&user.id)
        .bind(Json(user))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
