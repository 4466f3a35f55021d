use std::collections::BTreeMap;

use chrono::{DateTime, Months, Utc};
use serde::Serialize;

use crate::enrollment::EnrollmentStatus;
use crate::models::drive::Drive;
use crate::models::enrollment::Enrollment;
use crate::models::student::Student;

const UNKNOWN: &str = "Unknown";

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `num / den` as a two-decimal string, `"0.00"` for an empty denominator.
fn fixed2(num: f64, den: f64) -> String {
    if den > 0.0 {
        format!("{:.2}", num / den)
    } else {
        "0.00".to_string()
    }
}

fn percent(part: usize, whole: usize) -> String {
    fixed2(part as f64 * 100.0, whole as f64)
}

fn label(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Dashboard ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_students: usize,
    pub placed_students: usize,
    pub unplaced_students: usize,
    pub placement_rate: f64,
    pub total_drives: usize,
    pub active_drives: usize,
    pub completed_drives: usize,
    pub total_placements: i64,
    pub total_enrollments: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtcStats {
    #[serde(rename = "avgCTC")]
    pub avg_ctc: f64,
    #[serde(rename = "highestCTC")]
    pub highest_ctc: f64,
    #[serde(rename = "lowestCTC")]
    pub lowest_ctc: f64,
    pub total_offered: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub branch_wise: BTreeMap<String, usize>,
    pub year_wise: BTreeMap<String, usize>,
    pub enrollment_status: BTreeMap<EnrollmentStatus, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRow {
    pub id: String,
    pub company: String,
    pub ctc: String,
    pub enrolled: i64,
    pub placed: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub overview: Overview,
    pub ctc_stats: CtcStats,
    pub distribution: Distribution,
    pub company_wise: Vec<CompanyRow>,
    pub last_updated: DateTime<Utc>,
}

/// Folds the three collections into the faculty dashboard.
///
/// CTC figures are taken over drives that placed at least one student, with the
/// average weighted by how many students each drive placed.
pub fn dashboard(
    students: &[Student],
    drives: &[Drive],
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
) -> DashboardStats {
    let total_students = students.len();
    let placed_students = students.iter().filter(|s| s.is_placed).count();
    let mut branch_wise = BTreeMap::new();
    let mut year_wise = BTreeMap::new();
    for student in students {
        *branch_wise.entry(label(&student.branch)).or_insert(0) += 1;
        *year_wise.entry(label(&student.year)).or_insert(0) += 1;
    }

    let active_drives = drives.iter().filter(|d| d.status.is_active()).count();
    let mut total_placements = 0i64;
    let mut total_offered = 0.0;
    let mut highest: Option<f64> = None;
    let mut lowest: Option<f64> = None;
    let mut company_wise = Vec::with_capacity(drives.len());
    for drive in drives {
        let placed = drive.placed_students.max(0);
        total_placements += placed;
        if let Some(ctc) = drive.ctc_value().filter(|c| *c > 0.0) {
            if placed > 0 {
                total_offered += ctc * placed as f64;
                highest = Some(highest.map_or(ctc, |h: f64| h.max(ctc)));
                lowest = Some(lowest.map_or(ctc, |l: f64| l.min(ctc)));
            }
        }
        company_wise.push(CompanyRow {
            id: drive.id.clone(),
            company: drive.company_name.clone(),
            ctc: drive.ctc.clone(),
            enrolled: drive.enrolled_students.max(0),
            placed,
            status: drive.status.as_str().to_string(),
        });
    }
    company_wise.sort_by(|a, b| b.placed.cmp(&a.placed));

    let mut enrollment_status = BTreeMap::new();
    for enrollment in enrollments {
        *enrollment_status.entry(enrollment.status).or_insert(0) += 1;
    }

    let avg_ctc = if total_placements > 0 {
        round2(total_offered / total_placements as f64)
    } else {
        0.0
    };
    let placement_rate = if total_students > 0 {
        round2(placed_students as f64 / total_students as f64 * 100.0)
    } else {
        0.0
    };

    DashboardStats {
        overview: Overview {
            total_students,
            placed_students,
            unplaced_students: total_students - placed_students,
            placement_rate,
            total_drives: drives.len(),
            active_drives,
            completed_drives: drives.len() - active_drives,
            total_placements,
            total_enrollments: enrollments.len(),
        },
        ctc_stats: CtcStats {
            avg_ctc,
            highest_ctc: highest.unwrap_or(0.0),
            lowest_ctc: lowest.unwrap_or(0.0),
            total_offered: format!("{total_offered:.2}"),
        },
        distribution: Distribution {
            branch_wise,
            year_wise,
            enrollment_status,
        },
        company_wise,
        last_updated: now,
    }
}

// ── Branch breakdown ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchAnalytics {
    pub branch: String,
    pub total: usize,
    pub placed: usize,
    pub unplaced: usize,
    pub placement_rate: String,
    #[serde(rename = "avgCGPA")]
    pub avg_cgpa: String,
    #[serde(rename = "avgCTC")]
    pub avg_ctc: String,
    #[serde(rename = "highestCTC")]
    pub highest_ctc: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchReport {
    pub branch_analytics: Vec<BranchAnalytics>,
    pub total_branches: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Default)]
struct BranchTally {
    total: usize,
    placed: usize,
    total_cgpa: f64,
    total_ctc: f64,
    highest_ctc: f64,
}

/// Per-branch placement figures, largest branch first.
pub fn branch_breakdown(students: &[Student], now: DateTime<Utc>) -> BranchReport {
    let mut tallies: BTreeMap<String, BranchTally> = BTreeMap::new();
    for student in students {
        let tally = tallies.entry(label(&student.branch)).or_default();
        tally.total += 1;
        tally.total_cgpa += student.cgpa_value().unwrap_or(0.0);
        if student.is_placed {
            tally.placed += 1;
            if let Some(ctc) = student.placed_ctc_value() {
                tally.total_ctc += ctc;
                tally.highest_ctc = tally.highest_ctc.max(ctc);
            }
        }
    }

    let mut branch_analytics: Vec<BranchAnalytics> = tallies
        .into_iter()
        .map(|(branch, t)| BranchAnalytics {
            branch,
            total: t.total,
            placed: t.placed,
            unplaced: t.total - t.placed,
            placement_rate: percent(t.placed, t.total),
            avg_cgpa: fixed2(t.total_cgpa, t.total as f64),
            avg_ctc: fixed2(t.total_ctc, t.placed as f64),
            highest_ctc: t.highest_ctc,
        })
        .collect();
    branch_analytics.sort_by(|a, b| b.total.cmp(&a.total));

    BranchReport {
        total_branches: branch_analytics.len(),
        branch_analytics,
        last_updated: now,
    }
}

// ── Drive breakdown ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStats {
    pub total: usize,
    pub status_counts: BTreeMap<EnrollmentStatus, usize>,
    pub selected: usize,
    pub selection_rate: String,
    #[serde(rename = "avgCGPA")]
    pub avg_cgpa: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSelection {
    pub branch: String,
    pub enrolled: usize,
    pub selected: usize,
    pub selection_rate: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoundWise {
    pub round1: usize,
    pub round2: usize,
    pub round3: usize,
    #[serde(rename = "final")]
    pub final_round: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveAnalytics {
    pub drive: Drive,
    pub enrollment_stats: EnrollmentStats,
    pub branch_wise: Vec<BranchSelection>,
    pub round_wise: RoundWise,
    pub last_updated: DateTime<Utc>,
}

/// Status, branch and round breakdown for one drive. An enrollment counts as
/// selected once it has entered the placed family of statuses.
pub fn drive_breakdown(
    drive: Drive,
    enrollments: &[Enrollment],
    now: DateTime<Utc>,
) -> DriveAnalytics {
    let mut status_counts = BTreeMap::new();
    let mut branches: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut round_wise = RoundWise::default();
    let mut total_cgpa = 0.0;
    let mut selected = 0;

    for enrollment in enrollments {
        *status_counts.entry(enrollment.status).or_insert(0) += 1;
        let is_selected = enrollment.status.in_placed_family();
        if is_selected {
            selected += 1;
        }

        let branch = branches.entry(label(&enrollment.student_branch)).or_default();
        branch.0 += 1;
        if is_selected {
            branch.1 += 1;
        }

        let cleared = &enrollment.rounds_cleared;
        round_wise.round1 += usize::from(cleared.contains(&1));
        round_wise.round2 += usize::from(cleared.contains(&2));
        round_wise.round3 += usize::from(cleared.contains(&3));
        if is_selected || enrollment.status == EnrollmentStatus::FinalRound {
            round_wise.final_round += 1;
        }

        total_cgpa += enrollment.cgpa_value().unwrap_or(0.0);
    }

    let total = enrollments.len();
    DriveAnalytics {
        drive,
        enrollment_stats: EnrollmentStats {
            total,
            status_counts,
            selected,
            selection_rate: percent(selected, total),
            avg_cgpa: fixed2(total_cgpa, total as f64),
        },
        branch_wise: branches
            .into_iter()
            .map(|(branch, (enrolled, selected))| BranchSelection {
                branch,
                enrolled,
                selected,
                selection_rate: percent(selected, enrolled),
            })
            .collect(),
        round_wise,
        last_updated: now,
    }
}

// ── Trends ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlacements {
    pub month: String,
    pub placement_count: usize,
    #[serde(rename = "avgCTC")]
    pub avg_ctc: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementTrends {
    pub trends: Vec<MonthlyPlacements>,
    pub period: String,
    pub last_updated: DateTime<Utc>,
}

pub const DEFAULT_TREND_MONTHS: u32 = 12;

/// Placed students bucketed by `YYYY-MM` of their placement date over the
/// trailing `months`, oldest month first.
pub fn placement_trends(students: &[Student], months: u32, now: DateTime<Utc>) -> PlacementTrends {
    let cutoff = now
        .checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut buckets: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for student in students.iter().filter(|s| s.is_placed) {
        let Some(date) = student.placement_date else {
            continue;
        };
        if date < cutoff {
            continue;
        }
        let bucket = buckets.entry(date.format("%Y-%m").to_string()).or_default();
        bucket.0 += 1;
        bucket.1 += student.placed_ctc_value().unwrap_or(0.0);
    }

    PlacementTrends {
        trends: buckets
            .into_iter()
            .map(|(month, (count, total_ctc))| MonthlyPlacements {
                month,
                placement_count: count,
                avg_ctc: fixed2(total_ctc, count as f64),
            })
            .collect(),
        period: format!("Last {months} months"),
        last_updated: now,
    }
}
