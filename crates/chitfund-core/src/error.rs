// crates/chitfund-core/src/error.rs

use thiserror::Error;

use crate::fund::FundId;
use crate::identity::Identity;

/// Engine-wide error type for chit-fund operations.
///
/// Every variant carries the offending field, fund, or identity so the
/// display layer can present an actionable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChitFundError {
    /// A monetary string could not be converted to subunits.
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },

    /// A fund creation parameter failed validation.
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameters { field: &'static str, reason: String },

    /// No fund exists with the given id.
    #[error("Fund {0} not found")]
    NotFound(FundId),

    /// The enrollment deadline has passed.
    #[error("Enrollment for fund {fund_id} closed at {deadline}")]
    EnrollmentClosed { fund_id: FundId, deadline: i64 },

    /// The identity is already a participant of the fund.
    #[error("{identity} is already enrolled in fund {fund_id}")]
    AlreadyEnrolled { fund_id: FundId, identity: Identity },

    /// Every seat in the fund is taken.
    #[error("Fund {fund_id} is full ({capacity} participants)")]
    CapacityReached { fund_id: FundId, capacity: u32 },

    /// The ledger already holds a fund under this id.
    #[error("Fund {0} already exists on the ledger")]
    DuplicateFund(FundId),

    /// The operation requires a caller identity and none is available.
    #[error("No identity available; connect an account first")]
    Unauthenticated,

    /// The ledger collaborator failed. Callers may retry.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ChitFundError {
    /// Whether retrying the same call could succeed.
    ///
    /// Only ledger failures are transient; domain validation failures will
    /// fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChitFundError::LedgerUnavailable(_))
    }

    /// Shorthand for an `InvalidParameters` error naming `field`.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ChitFundError::InvalidParameters {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ChitFundError {
    fn from(e: serde_json::Error) -> Self {
        ChitFundError::Serialization(e.to_string())
    }
}
