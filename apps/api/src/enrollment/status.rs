use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a student's application to a drive.
///
/// Pipeline order is the declaration order of the first ten variants; `Rejected`
/// and `Withdrawn` are side exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    Shortlisted,
    #[serde(rename = "round_1_cleared")]
    Round1Cleared,
    #[serde(rename = "round_2_cleared")]
    Round2Cleared,
    #[serde(rename = "round_3_cleared")]
    Round3Cleared,
    FinalRound,
    Selected,
    OfferReceived,
    OfferAccepted,
    Joined,
    Rejected,
    Withdrawn,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 12] = [
        EnrollmentStatus::Enrolled,
        EnrollmentStatus::Shortlisted,
        EnrollmentStatus::Round1Cleared,
        EnrollmentStatus::Round2Cleared,
        EnrollmentStatus::Round3Cleared,
        EnrollmentStatus::FinalRound,
        EnrollmentStatus::Selected,
        EnrollmentStatus::OfferReceived,
        EnrollmentStatus::OfferAccepted,
        EnrollmentStatus::Joined,
        EnrollmentStatus::Rejected,
        EnrollmentStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::Shortlisted => "shortlisted",
            EnrollmentStatus::Round1Cleared => "round_1_cleared",
            EnrollmentStatus::Round2Cleared => "round_2_cleared",
            EnrollmentStatus::Round3Cleared => "round_3_cleared",
            EnrollmentStatus::FinalRound => "final_round",
            EnrollmentStatus::Selected => "selected",
            EnrollmentStatus::OfferReceived => "offer_received",
            EnrollmentStatus::OfferAccepted => "offer_accepted",
            EnrollmentStatus::Joined => "joined",
            EnrollmentStatus::Rejected => "rejected",
            EnrollmentStatus::Withdrawn => "withdrawn",
        }
    }

    /// Upper-case key used by the status listing (`ROUND_1_CLEARED`).
    pub fn key(self) -> String {
        self.as_str().to_ascii_uppercase()
    }

    /// Position along the selection pipeline; `None` for the side exits.
    fn stage(self) -> Option<usize> {
        match self {
            EnrollmentStatus::Rejected | EnrollmentStatus::Withdrawn => None,
            other => Some(other as usize),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Joined | EnrollmentStatus::Rejected | EnrollmentStatus::Withdrawn
        )
    }

    /// Counts toward a student's active enrollments.
    pub fn is_active(self) -> bool {
        !matches!(self, EnrollmentStatus::Rejected | EnrollmentStatus::Withdrawn)
    }

    /// Statuses that mark the student as placed.
    pub fn in_placed_family(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Selected
                | EnrollmentStatus::OfferReceived
                | EnrollmentStatus::OfferAccepted
                | EnrollmentStatus::Joined
        )
    }

    pub fn blocks_withdrawal(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Selected | EnrollmentStatus::OfferAccepted | EnrollmentStatus::Joined
        )
    }

    /// Status reached by clearing the given round; anything past round 3 is the final round.
    pub fn for_cleared_round(round: u32) -> EnrollmentStatus {
        match round {
            1 => EnrollmentStatus::Round1Cleared,
            2 => EnrollmentStatus::Round2Cleared,
            3 => EnrollmentStatus::Round3Cleared,
            _ => EnrollmentStatus::FinalRound,
        }
    }

    pub fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }
        match (self.stage(), next.stage()) {
            (_, None) => true,
            (Some(from), Some(to)) => to > from,
            (None, Some(_)) => false,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown enrollment status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for EnrollmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        EnrollmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Comma separated list of every status, used in validation messages.
pub fn valid_statuses() -> String {
    EnrollmentStatus::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_moves_and_skips_are_allowed() {
        use EnrollmentStatus::*;
        assert!(Enrolled.can_transition_to(Shortlisted));
        assert!(Enrolled.can_transition_to(Selected));
        assert!(Selected.can_transition_to(OfferAccepted));
        assert!(OfferAccepted.can_transition_to(Joined));
    }

    #[test]
    fn test_backward_and_self_moves_are_rejected() {
        use EnrollmentStatus::*;
        assert!(!Round2Cleared.can_transition_to(Round1Cleared));
        assert!(!Shortlisted.can_transition_to(Shortlisted));
        assert!(!Selected.can_transition_to(Enrolled));
    }

    #[test]
    fn test_side_exits_from_non_terminal_states_only() {
        use EnrollmentStatus::*;
        assert!(FinalRound.can_transition_to(Rejected));
        assert!(Selected.can_transition_to(Withdrawn));
        for terminal in [Joined, Rejected, Withdrawn] {
            for next in EnrollmentStatus::ALL {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_round_mapping() {
        assert_eq!(EnrollmentStatus::for_cleared_round(1), EnrollmentStatus::Round1Cleared);
        assert_eq!(EnrollmentStatus::for_cleared_round(3), EnrollmentStatus::Round3Cleared);
        assert_eq!(EnrollmentStatus::for_cleared_round(4), EnrollmentStatus::FinalRound);
        assert_eq!(EnrollmentStatus::for_cleared_round(0), EnrollmentStatus::FinalRound);
    }

    #[test]
    fn test_parse_and_wire_format_agree() {
        for status in EnrollmentStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<EnrollmentStatus>().unwrap(), status);
        }
        assert_eq!("SELECTED".parse::<EnrollmentStatus>(), Ok(EnrollmentStatus::Selected));
        assert!("hired".parse::<EnrollmentStatus>().is_err());
    }

    #[test]
    fn test_withdrawal_blocked_after_selection() {
        assert!(EnrollmentStatus::Selected.blocks_withdrawal());
        assert!(EnrollmentStatus::Joined.blocks_withdrawal());
        assert!(!EnrollmentStatus::OfferReceived.blocks_withdrawal());
        assert!(!EnrollmentStatus::Enrolled.blocks_withdrawal());
    }
}
