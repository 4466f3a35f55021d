use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::status::EnrollmentStatus;
use crate::eligibility::evaluate;
use crate::errors::AppError;
use crate::models::enrollment::Enrollment;
use crate::store::{
    CounterDelta, EnrollmentQuery, EnrollmentWrite, PlacementRecord, PlacementStore, StoreError,
};

/// Attempts per mutation before a concurrent-modification conflict is reported.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

/// A planned mutation of one enrollment and its side effects.
#[derive(Debug, Clone)]
pub struct Transition {
    pub previous: EnrollmentStatus,
    pub enrollment: Enrollment,
    pub drive_delta: CounterDelta,
    pub placement: Option<PlacementRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub enrollment_id: String,
    pub previous_status: EnrollmentStatus,
    pub new_status: EnrollmentStatus,
    pub message: String,
    pub enrollment: Enrollment,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveEnrollments {
    pub drive_id: String,
    pub enrollments: Vec<Enrollment>,
    pub total: usize,
    pub status_counts: BTreeMap<EnrollmentStatus, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<EnrollmentStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEnrollments {
    pub student_id: String,
    pub enrollments: Vec<Enrollment>,
    pub total: usize,
    pub active_enrollments: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

/// Plans a move to `next`. Counters follow the enrollment: leaving for `withdrawn`
/// releases the drive seat, and the first entry into the placed family counts one
/// placement and marks the student placed.
pub fn plan_status_change(
    current: &Enrollment,
    next: EnrollmentStatus,
    actor: &str,
    remarks: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    if next == EnrollmentStatus::Withdrawn && current.status.blocks_withdrawal() {
        return Err(AppError::InvalidTransition(
            "Cannot withdraw after selection".to_string(),
        ));
    }
    if !current.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition(format!(
            "Cannot move enrollment from {} to {next}",
            current.status
        )));
    }
    Ok(apply_status(current, next, actor, remarks, now))
}

fn apply_status(
    current: &Enrollment,
    next: EnrollmentStatus,
    actor: &str,
    remarks: Option<String>,
    now: DateTime<Utc>,
) -> Transition {
    let first_placement = next.in_placed_family() && !current.has_reached_placement();
    let mut drive_delta = CounterDelta::default();
    if next == EnrollmentStatus::Withdrawn && current.status != EnrollmentStatus::Withdrawn {
        drive_delta.enrolled = -1;
    }
    if first_placement {
        drive_delta.placed = 1;
    }

    let mut enrollment = current.clone();
    let remarks = remarks.filter(|r| !r.trim().is_empty());
    if let Some(r) = &remarks {
        enrollment.remarks = r.clone();
    }
    enrollment.record_status(next, actor, remarks.clone(), now);
    if next == EnrollmentStatus::Withdrawn {
        enrollment.withdrawn_at = Some(now);
        enrollment.withdrawn_by = Some(actor.to_string());
        enrollment.withdrawal_reason = Some(remarks.unwrap_or_default());
    }

    let placement = first_placement.then(|| PlacementRecord {
        student_id: current.student_id.clone(),
        company: current.company_name.clone(),
        ctc: current.ctc.clone(),
        placed_at: now,
    });

    Transition {
        previous: current.status,
        enrollment,
        drive_delta,
        placement,
    }
}

/// Clearing round N moves to the matching round status; failing any round rejects.
pub fn plan_round_update(
    current: &Enrollment,
    round: u32,
    cleared: bool,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Transition, AppError> {
    if round == 0 {
        return Err(AppError::Validation(
            "Round number must be at least 1".to_string(),
        ));
    }
    if !cleared {
        return plan_status_change(
            current,
            EnrollmentStatus::Rejected,
            actor,
            Some(format!("Rejected at round {round}")),
            now,
        );
    }

    let next = EnrollmentStatus::for_cleared_round(round);
    let remarks = Some(format!("Cleared round {round}"));
    // Rounds past the third all map to the final round; record them without a status move.
    let mut transition = if next == EnrollmentStatus::FinalRound && current.status == next {
        apply_status(current, next, actor, remarks, now)
    } else {
        plan_status_change(current, next, actor, remarks, now)?
    };
    transition.enrollment.current_round = round;
    transition.enrollment.rounds_cleared.insert(round);
    Ok(transition)
}

/// Selected enrollments first, then by eligibility score, highest first.
pub fn rank_for_drive(enrollments: &mut [Enrollment]) {
    enrollments.sort_by(|a, b| {
        let a_selected = a.status == EnrollmentStatus::Selected;
        let b_selected = b.status == EnrollmentStatus::Selected;
        b_selected
            .cmp(&a_selected)
            .then_with(|| b.eligibility_score.cmp(&a.eligibility_score))
    });
}

pub fn count_by_status(enrollments: &[Enrollment]) -> BTreeMap<EnrollmentStatus, usize> {
    let mut counts = BTreeMap::new();
    for e in enrollments {
        *counts.entry(e.status).or_insert(0) += 1;
    }
    counts
}

// ────────────────────────────────────────────────────────────────────────────
// Operations
// ────────────────────────────────────────────────────────────────────────────

pub async fn enroll_student(
    store: &dyn PlacementStore,
    student_id: &str,
    drive_id: &str,
    actor: &str,
) -> Result<Enrollment, AppError> {
    if student_id.trim().is_empty() || drive_id.trim().is_empty() {
        return Err(AppError::Validation(
            "Student ID and Drive ID are required".to_string(),
        ));
    }

    let student = store
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;
    let drive = store
        .get_drive(drive_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Drive not found".to_string()))?;

    if !drive.accepts_enrollments() {
        return Err(AppError::Conflict(
            "Drive is no longer accepting enrollments".to_string(),
        ));
    }

    let eligibility = evaluate(&student, &drive);
    if !eligibility.eligible {
        return Err(AppError::Ineligible(eligibility.reasons));
    }

    let enrollment = Enrollment::snapshot(
        Uuid::new_v4().to_string(),
        &student,
        &drive,
        eligibility.score,
        actor,
        Utc::now(),
    );
    let stored = store
        .apply_enrollment_write(EnrollmentWrite {
            enrollment,
            expected_revision: None,
            drive_delta: CounterDelta {
                enrolled: 1,
                placed: 0,
            },
            placement: None,
        })
        .await?;

    info!(
        "Enrolled student {} in drive {} ({}) as {}",
        stored.student_id, stored.drive_id, drive.company_name, stored.id
    );
    Ok(stored)
}

/// Loads the enrollment, plans against it and commits, re-reading and re-planning
/// when another writer got there first.
async fn commit_with_retry<F>(
    store: &dyn PlacementStore,
    enrollment_id: &str,
    mut plan: F,
) -> Result<Transition, AppError>
where
    F: FnMut(&Enrollment) -> Result<Transition, AppError> + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let current = store
            .get_enrollment(enrollment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))?;
        let transition = plan(&current)?;
        let write = EnrollmentWrite {
            enrollment: transition.enrollment.clone(),
            expected_revision: Some(current.revision),
            drive_delta: transition.drive_delta,
            placement: transition.placement.clone(),
        };
        match store.apply_enrollment_write(write).await {
            Ok(stored) => {
                return Ok(Transition {
                    enrollment: stored,
                    ..transition
                })
            }
            Err(StoreError::StaleRevision(id)) => {
                warn!("Enrollment {id} changed during update (attempt {attempt}/{MAX_WRITE_ATTEMPTS})");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::Conflict(format!(
        "Enrollment {enrollment_id} is being modified concurrently; try again"
    )))
}

fn status_update(transition: Transition) -> StatusUpdate {
    let new_status = transition.enrollment.status;
    StatusUpdate {
        enrollment_id: transition.enrollment.id.clone(),
        previous_status: transition.previous,
        new_status,
        message: format!(
            "Status updated from {} to {new_status}",
            transition.previous
        ),
        enrollment: transition.enrollment,
    }
}

pub async fn update_status(
    store: &dyn PlacementStore,
    enrollment_id: &str,
    next: EnrollmentStatus,
    actor: &str,
    remarks: Option<String>,
) -> Result<StatusUpdate, AppError> {
    let transition = commit_with_retry(store, enrollment_id, |current| {
        plan_status_change(current, next, actor, remarks.clone(), Utc::now())
    })
    .await?;
    info!(
        "Enrollment {enrollment_id}: {} -> {}",
        transition.previous, transition.enrollment.status
    );
    Ok(status_update(transition))
}

pub async fn update_round(
    store: &dyn PlacementStore,
    enrollment_id: &str,
    round: u32,
    cleared: bool,
    actor: &str,
) -> Result<StatusUpdate, AppError> {
    let transition = commit_with_retry(store, enrollment_id, |current| {
        plan_round_update(current, round, cleared, actor, Utc::now())
    })
    .await?;
    info!(
        "Enrollment {enrollment_id}: round {round} {}",
        if cleared { "cleared" } else { "not cleared" }
    );
    Ok(status_update(transition))
}

pub async fn withdraw(
    store: &dyn PlacementStore,
    enrollment_id: &str,
    actor: &str,
    reason: Option<String>,
) -> Result<StatusUpdate, AppError> {
    let transition = commit_with_retry(store, enrollment_id, |current| {
        plan_status_change(
            current,
            EnrollmentStatus::Withdrawn,
            actor,
            reason.clone(),
            Utc::now(),
        )
    })
    .await?;
    info!("Enrollment {enrollment_id} withdrawn by {actor}");
    let mut update = status_update(transition);
    update.message = "Enrollment withdrawn successfully".to_string();
    Ok(update)
}

/// Applies the same status to every id, collecting failures instead of stopping.
pub async fn bulk_update_status(
    store: &dyn PlacementStore,
    enrollment_ids: &[String],
    next: EnrollmentStatus,
    actor: &str,
    remarks: Option<String>,
) -> BulkResult {
    let mut result = BulkResult::default();
    for id in enrollment_ids {
        match update_status(store, id, next, actor, remarks.clone()).await {
            Ok(_) => result.success += 1,
            Err(e) => {
                result.failed += 1;
                result.errors.push(format!("{id}: {}", client_message(&e)));
            }
        }
    }
    result
}

fn client_message(err: &AppError) -> String {
    match err {
        AppError::Validation(m)
        | AppError::NotFound(m)
        | AppError::Conflict(m)
        | AppError::InvalidTransition(m) => m.clone(),
        other => other.to_string(),
    }
}

pub async fn drive_enrollments(
    store: &dyn PlacementStore,
    drive_id: &str,
    status: Option<EnrollmentStatus>,
) -> Result<DriveEnrollments, AppError> {
    let query = EnrollmentQuery {
        status,
        ..EnrollmentQuery::for_drive(drive_id)
    };
    let mut enrollments = store.list_enrollments(&query).await?;
    rank_for_drive(&mut enrollments);
    Ok(DriveEnrollments {
        drive_id: drive_id.to_string(),
        total: enrollments.len(),
        status_counts: count_by_status(&enrollments),
        status_filter: status,
        enrollments,
    })
}

pub async fn student_enrollments(
    store: &dyn PlacementStore,
    student_id: &str,
) -> Result<StudentEnrollments, AppError> {
    let enrollments = store
        .list_enrollments(&EnrollmentQuery::for_student(student_id))
        .await?;
    Ok(StudentEnrollments {
        student_id: student_id.to_string(),
        total: enrollments.len(),
        active_enrollments: enrollments.iter().filter(|e| e.status.is_active()).count(),
        enrollments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drive::{Drive, DriveStatus};
    use crate::models::student::Student;
    use crate::store::MemoryStore;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_student(&Student {
                id: "s1".into(),
                roll_number: "S1".into(),
                name: "Asha".into(),
                branch: "CS".into(),
                year: "4".into(),
                cgpa: "8.4".into(),
                ..Student::default()
            })
            .await
            .unwrap();
        store
            .insert_student(&Student {
                id: "s2".into(),
                roll_number: "S2".into(),
                name: "Ravi".into(),
                branch: "ME".into(),
                year: "4".into(),
                cgpa: "6.1".into(),
                ..Student::default()
            })
            .await
            .unwrap();
        store
            .insert_drive(&Drive {
                id: "d1".into(),
                company_name: "Acme".into(),
                ctc: "12".into(),
                min_cgpa: Some(7.0),
                ..Drive::default()
            })
            .await
            .unwrap();
        store
    }

    async fn drive_counts(store: &MemoryStore) -> (i64, i64) {
        let d = store.get_drive("d1").await.unwrap().unwrap();
        (d.enrolled_students, d.placed_students)
    }

    #[tokio::test]
    async fn test_enroll_twice_conflicts_and_counts_once() {
        let store = seeded().await;
        let enrollment = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);
        assert_eq!(enrollment.company_name, "Acme");

        let err = enroll_student(&store, "s1", "d1", "faculty").await.unwrap_err();
        match err {
            AppError::Conflict(msg) => assert_eq!(msg, "Student is already enrolled in this drive"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(drive_counts(&store).await, (1, 0));
    }

    #[tokio::test]
    async fn test_racing_enrollments_for_one_pair_commit_once() {
        let store = seeded().await;
        let (a, b) = tokio::join!(
            enroll_student(&store, "s1", "d1", "faculty"),
            enroll_student(&store, "s1", "d1", "student"),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
        assert_eq!(drive_counts(&store).await, (1, 0));
        let listed = store
            .list_enrollments(&EnrollmentQuery::for_drive("d1"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_enrollments_across_threads_commit_once() {
        let store = std::sync::Arc::new(seeded().await);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    enroll_student(store.as_ref(), "s1", "d1", &format!("actor-{i}")).await
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(drive_counts(&store).await, (1, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_selection_counts_one_placement() {
        let store = std::sync::Arc::new(seeded().await);
        let e = enroll_student(store.as_ref(), "s1", "d1", "faculty").await.unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let id = e.id.clone();
                tokio::spawn(async move {
                    update_status(store.as_ref(), &id, EnrollmentStatus::Selected, "faculty", None)
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(AppError::InvalidTransition(_)) | Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(drive_counts(&store).await, (1, 1));
        let stored = store.get_enrollment(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EnrollmentStatus::Selected);
        assert_eq!(stored.status_history.len(), 2);
    }

    #[tokio::test]
    async fn test_enroll_into_closed_drive_fails_without_counting() {
        let store = seeded().await;
        let mut drive = store.get_drive("d1").await.unwrap().unwrap();
        drive.status = DriveStatus::Closed;
        store.update_drive(&drive).await.unwrap();

        let err = enroll_student(&store, "s1", "d1", "faculty").await.unwrap_err();
        match err {
            AppError::Conflict(msg) => assert_eq!(msg, "Drive is no longer accepting enrollments"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(drive_counts(&store).await, (0, 0));
    }

    #[tokio::test]
    async fn test_ineligible_student_gets_reasons() {
        let store = seeded().await;
        let err = enroll_student(&store, "s2", "d1", "faculty").await.unwrap_err();
        match err {
            AppError::Ineligible(reasons) => {
                assert_eq!(reasons, vec!["CGPA 6.10 is below minimum requirement of 7"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_student_is_not_found() {
        let store = seeded().await;
        let err = enroll_student(&store, "ghost", "d1", "faculty").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_selection_marks_student_placed() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        let update = update_status(&store, &e.id, EnrollmentStatus::Selected, "faculty", None)
            .await
            .unwrap();
        assert_eq!(update.previous_status, EnrollmentStatus::Enrolled);

        let student = store.get_student("s1").await.unwrap().unwrap();
        assert!(student.is_placed);
        assert_eq!(student.placed_company.as_deref(), Some("Acme"));
        assert_eq!(student.placed_ctc.as_deref(), Some("12"));
        assert!(student.placement_date.is_some());
        assert_eq!(drive_counts(&store).await, (1, 1));
    }

    #[tokio::test]
    async fn test_offer_after_selection_counts_one_placement() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        update_status(&store, &e.id, EnrollmentStatus::Selected, "f", None)
            .await
            .unwrap();
        update_status(&store, &e.id, EnrollmentStatus::OfferAccepted, "f", None)
            .await
            .unwrap();
        update_status(&store, &e.id, EnrollmentStatus::Joined, "f", None)
            .await
            .unwrap();
        assert_eq!(drive_counts(&store).await, (1, 1));
    }

    #[tokio::test]
    async fn test_withdraw_rules() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        let update = withdraw(&store, &e.id, "s1-user", Some("Not interested".into()))
            .await
            .unwrap();
        assert_eq!(update.new_status, EnrollmentStatus::Withdrawn);
        assert_eq!(
            update.enrollment.withdrawal_reason.as_deref(),
            Some("Not interested")
        );
        assert_eq!(drive_counts(&store).await, (0, 0));

        // Withdrawn is terminal.
        let err = withdraw(&store, &e.id, "s1-user", None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(drive_counts(&store).await, (0, 0));
    }

    #[tokio::test]
    async fn test_cannot_withdraw_after_selection() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        update_status(&store, &e.id, EnrollmentStatus::Selected, "f", None)
            .await
            .unwrap();
        let err = withdraw(&store, &e.id, "s1-user", None).await.unwrap_err();
        match err {
            AppError::InvalidTransition(msg) => assert_eq!(msg, "Cannot withdraw after selection"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(drive_counts(&store).await, (1, 1));
    }

    #[tokio::test]
    async fn test_history_grows_by_one_per_update() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        update_status(&store, &e.id, EnrollmentStatus::Shortlisted, "f", None)
            .await
            .unwrap();
        update_round(&store, &e.id, 1, true, "f").await.unwrap();
        update_round(&store, &e.id, 2, true, "f").await.unwrap();
        let last = update_round(&store, &e.id, 3, false, "f").await.unwrap();

        let stored = store.get_enrollment(&e.id).await.unwrap().unwrap();
        assert_eq!(stored.status_history.len(), 5);
        assert_eq!(stored.status_history.last().unwrap().status, stored.status);
        assert_eq!(stored.status, EnrollmentStatus::Rejected);
        assert_eq!(last.new_status, EnrollmentStatus::Rejected);
        assert_eq!(stored.rounds_cleared.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(stored.current_round, 2);
    }

    #[tokio::test]
    async fn test_backward_status_is_rejected() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        update_round(&store, &e.id, 2, true, "f").await.unwrap();
        let err = update_round(&store, &e.id, 1, true, "f").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_rounds_past_three_stay_in_final_round() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        update_round(&store, &e.id, 4, true, "f").await.unwrap();
        let update = update_round(&store, &e.id, 5, true, "f").await.unwrap();
        assert_eq!(update.new_status, EnrollmentStatus::FinalRound);
        assert_eq!(update.enrollment.current_round, 5);
    }

    #[tokio::test]
    async fn test_drive_listing_puts_selected_first() {
        let store = seeded().await;
        for (id, score, status) in [
            ("e1", 90, EnrollmentStatus::Enrolled),
            ("e2", 70, EnrollmentStatus::Selected),
            ("e3", 95, EnrollmentStatus::Shortlisted),
        ] {
            let student = Student {
                id: format!("x-{id}"),
                ..Student::default()
            };
            let drive = store.get_drive("d1").await.unwrap().unwrap();
            let mut e = Enrollment::snapshot(id.into(), &student, &drive, score, "f", Utc::now());
            e.status = status;
            store
                .apply_enrollment_write(EnrollmentWrite {
                    enrollment: e,
                    expected_revision: None,
                    drive_delta: CounterDelta::default(),
                    placement: None,
                })
                .await
                .unwrap();
        }
        let listing = drive_enrollments(&store, "d1", None).await.unwrap();
        let order: Vec<_> = listing.enrollments.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["e2", "e3", "e1"]);
        assert_eq!(listing.status_counts[&EnrollmentStatus::Selected], 1);
        assert_eq!(listing.total, 3);
    }

    #[tokio::test]
    async fn test_student_listing_counts_active() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        let listing = student_enrollments(&store, "s1").await.unwrap();
        assert_eq!(listing.active_enrollments, 1);
        withdraw(&store, &e.id, "s1", None).await.unwrap();
        let listing = student_enrollments(&store, "s1").await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.active_enrollments, 0);
    }

    #[tokio::test]
    async fn test_bulk_update_reports_each_failure() {
        let store = seeded().await;
        let e = enroll_student(&store, "s1", "d1", "faculty").await.unwrap();
        let ids = vec![e.id.clone(), "missing".to_string()];
        let result =
            bulk_update_status(&store, &ids, EnrollmentStatus::Shortlisted, "f", None).await;
        assert_eq!(result.success, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors, vec!["missing: Enrollment not found".to_string()]);
    }

    #[test]
    fn test_plan_does_not_double_count_placement() {
        let student = Student {
            id: "s".into(),
            ..Student::default()
        };
        let drive = Drive {
            id: "d".into(),
            ..Drive::default()
        };
        let e = Enrollment::snapshot("e".into(), &student, &drive, 100, "f", Utc::now());
        let selected = plan_status_change(&e, EnrollmentStatus::Selected, "f", None, Utc::now())
            .unwrap();
        assert_eq!(selected.drive_delta.placed, 1);
        assert!(selected.placement.is_some());
        let accepted = plan_status_change(
            &selected.enrollment,
            EnrollmentStatus::OfferAccepted,
            "f",
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(accepted.drive_delta, CounterDelta::default());
        assert!(accepted.placement.is_none());
    }
}
