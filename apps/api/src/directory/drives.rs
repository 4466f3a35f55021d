use std::cmp::Reverse;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::analytics::{self, aggregates::DriveAnalytics};
use crate::eligibility::scans::refresh_drive_eligibility_count;
use crate::errors::AppError;
use crate::models::drive::{Drive, DriveInput, DriveStatus};
use crate::store::{DriveQuery, PlacementStore};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveDetail {
    #[serde(flatten)]
    pub drive: Drive,
    pub analytics: DriveAnalytics,
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates.
fn drive_date_key(drive: &Drive) -> Option<NaiveDateTime> {
    let raw = drive.drive_date.as_deref()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Latest drive date first; drives without a usable date go last.
pub fn sort_by_drive_date(drives: &mut [Drive]) {
    drives.sort_by_key(|d| {
        let key = drive_date_key(d);
        (key.is_none(), Reverse(key))
    });
}

pub async fn list_drives(
    store: &dyn PlacementStore,
    status: Option<DriveStatus>,
) -> Result<Vec<Drive>, AppError> {
    let query = DriveQuery {
        statuses: status.into_iter().collect(),
    };
    let mut drives = store.list_drives(&query).await?;
    sort_by_drive_date(&mut drives);
    Ok(drives)
}

pub async fn drive_detail(store: &dyn PlacementStore, id: &str) -> Result<DriveDetail, AppError> {
    let analytics = analytics::drive_analytics(store, id).await?;
    Ok(DriveDetail {
        drive: analytics.drive.clone(),
        analytics,
    })
}

/// Creates the drive with zeroed counters, then stores its eligible-student count.
pub async fn create_drive(
    store: &dyn PlacementStore,
    input: &DriveInput,
    actor: &str,
) -> Result<Drive, AppError> {
    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if !has(&input.company_name) || !has(&input.ctc) {
        return Err(AppError::Validation(
            "Company name and CTC are required".to_string(),
        ));
    }

    let now = Utc::now();
    let mut drive = Drive {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        created_by: Some(actor.to_string()),
        ..Drive::default()
    };
    input.apply_to(&mut drive);
    drive.enrolled_students = 0;
    drive.placed_students = 0;

    store.insert_drive(&drive).await?;
    info!("Drive {} ({}) created by {actor}", drive.id, drive.company_name);

    let count = refresh_drive_eligibility_count(store, &drive.id).await?;
    drive.eligible_student_count = Some(count as i64);
    Ok(drive)
}

pub async fn update_drive(
    store: &dyn PlacementStore,
    id: &str,
    input: &DriveInput,
    actor: &str,
) -> Result<Drive, AppError> {
    let mut drive = store
        .get_drive(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Drive not found".to_string()))?;
    input.apply_to(&mut drive);
    drive.updated_at = Utc::now();
    drive.updated_by = Some(actor.to_string());
    store.update_drive(&drive).await?;

    if input.changes_criteria() {
        let count = refresh_drive_eligibility_count(store, id).await?;
        drive.eligible_student_count = Some(count as i64);
    }
    Ok(drive)
}

pub async fn delete_drive(store: &dyn PlacementStore, id: &str) -> Result<(), AppError> {
    store.delete_drive(id).await?;
    info!("Drive {id} deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::student::Student;
    use crate::store::MemoryStore;

    fn dated(id: &str, date: Option<&str>) -> Drive {
        Drive {
            id: id.to_string(),
            drive_date: date.map(str::to_string),
            ..Drive::default()
        }
    }

    fn input(raw: serde_json::Value) -> DriveInput {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_sort_puts_latest_first_and_undated_last() {
        let mut drives = vec![
            dated("old", Some("2024-01-10")),
            dated("none", None),
            dated("new", Some("2024-03-01T09:30:00Z")),
            dated("junk", Some("next week")),
            dated("mid", Some("2024-02-15")),
        ];
        sort_by_drive_date(&mut drives);
        let ids: Vec<&str> = drives.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(&ids[..3], &["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_create_requires_company_and_ctc() {
        let store = MemoryStore::new();
        let err = create_drive(&store, &input(serde_json::json!({ "companyName": "Acme" })), "fac")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "Company name and CTC are required"));
    }

    #[tokio::test]
    async fn test_create_counts_eligible_students() {
        let store = MemoryStore::new();
        for (id, cgpa) in [("S1", "8.0"), ("S2", "6.0")] {
            store
                .insert_student(&Student {
                    id: id.to_string(),
                    roll_number: id.to_string(),
                    cgpa: cgpa.to_string(),
                    ..Student::default()
                })
                .await
                .unwrap();
        }

        let drive = create_drive(
            &store,
            &input(serde_json::json!({ "companyName": "Acme", "ctc": 12, "minCGPA": 7 })),
            "fac",
        )
        .await
        .unwrap();
        assert_eq!(drive.status, DriveStatus::Upcoming);
        assert_eq!(drive.eligible_student_count, Some(1));

        let stored = store.get_drive(&drive.id).await.unwrap().unwrap();
        assert_eq!(stored.eligible_student_count, Some(1));
        assert_eq!(stored.enrolled_students, 0);

        let updated = update_drive(
            &store,
            &drive.id,
            &input(serde_json::json!({ "minCGPA": 5.5 })),
            "fac",
        )
        .await
        .unwrap();
        assert_eq!(updated.eligible_student_count, Some(2));
    }

    #[tokio::test]
    async fn test_status_filter_and_detail() {
        let store = MemoryStore::new();
        let created = create_drive(
            &store,
            &input(serde_json::json!({ "companyName": "Acme", "ctc": "10", "status": "Closed" })),
            "fac",
        )
        .await
        .unwrap();

        assert_eq!(list_drives(&store, Some(DriveStatus::Closed)).await.unwrap().len(), 1);
        assert!(list_drives(&store, Some(DriveStatus::Ongoing)).await.unwrap().is_empty());

        let detail = drive_detail(&store, &created.id).await.unwrap();
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["companyName"], "Acme");
        assert_eq!(json["analytics"]["enrollmentStats"]["total"], 0);

        delete_drive(&store, &created.id).await.unwrap();
        assert!(matches!(
            drive_detail(&store, &created.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
