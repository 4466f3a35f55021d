//! Enrollment lifecycle: creation behind the eligibility gate, status and round
//! transitions, withdrawal, and the drive/student side effects they carry.
//!
//! Every mutation is planned as a pure function over the current enrollment and
//! committed with a single `apply_enrollment_write` call, retried on a stale
//! revision.

pub mod handlers;
pub mod manager;
pub mod status;

pub use status::EnrollmentStatus;
