// crates/chitfund-core/src/fund.rs
//
// The chit fund entity and its raw ledger representation.
//
// A `ChitFund` is created once and afterwards only mutated by successful
// joins, which append to `participants` (and stamp `filled_at` when the last
// seat is taken). Funds are never removed; closure is derived from time and
// enrollment by the lifecycle engine.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::{is_exact_multiple, AmountConverter};
use crate::error::ChitFundError;
use crate::identity::Identity;

/// Smallest capacity a fund may be created with.
pub const MIN_PARTICIPANT_CAPACITY: u32 = 2;

/// Opaque, monotonically increasing fund identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundId(pub u64);

impl fmt::Display for FundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Creation request as submitted by a caller. Amounts are display strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFundRequest {
    pub title: String,
    pub description: String,
    /// Total pool value over the fund's term, e.g. `"6"`.
    pub total_amount: String,
    /// Per-cycle contribution of each participant, e.g. `"1"`.
    pub installment_amount: String,
    pub installment_period_secs: u64,
    pub participant_capacity: u32,
    /// Enrollment deadline, seconds since the Unix epoch.
    pub deadline: i64,
}

/// A chit fund: immutable parameters plus the append-only participant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChitFund {
    pub id: FundId,
    pub creator: Identity,
    pub title: String,
    pub description: String,
    /// Total pool value in subunits.
    pub total_amount: u128,
    /// Per-cycle installment in subunits.
    pub installment_amount: u128,
    pub installment_period_secs: u64,
    pub participant_capacity: u32,
    pub deadline: i64,
    pub created_at: i64,
    /// Enrolled identities in join order. Unique, never longer than capacity.
    pub participants: Vec<Identity>,
    /// When the last seat was taken, if the fund filled up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<i64>,
}

impl ChitFund {
    pub fn enrolled(&self) -> usize {
        self.participants.len()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.participant_capacity as usize
    }

    /// Zero-based position of `identity` among the participants.
    pub fn participant_index(&self, identity: &Identity) -> Option<usize> {
        self.participants.iter().position(|p| p == identity)
    }

    pub fn is_participant(&self, identity: &Identity) -> bool {
        self.participant_index(identity).is_some()
    }

    pub fn is_creator(&self, identity: &Identity) -> bool {
        self.creator == *identity
    }

    /// Check the invariants every stored fund must satisfy.
    ///
    /// Used when hydrating records from the ledger, which the engine does not
    /// trust blindly.
    pub fn check_invariants(&self) -> Result<(), ChitFundError> {
        if self.title.trim().is_empty() {
            return Err(ChitFundError::invalid("title", "must not be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(ChitFundError::invalid("description", "must not be empty"));
        }
        if self.installment_amount == 0 {
            return Err(ChitFundError::invalid(
                "installment_amount",
                "must be greater than zero",
            ));
        }
        if self.installment_amount > self.total_amount {
            return Err(ChitFundError::invalid(
                "installment_amount",
                "must not exceed total_amount",
            ));
        }
        if !is_exact_multiple(self.total_amount, self.installment_amount) {
            return Err(ChitFundError::invalid(
                "total_amount",
                "must be an exact multiple of installment_amount",
            ));
        }
        if self.installment_period_secs == 0 {
            return Err(ChitFundError::invalid(
                "installment_period_secs",
                "must be greater than zero",
            ));
        }
        if self.participant_capacity < MIN_PARTICIPANT_CAPACITY {
            return Err(ChitFundError::invalid(
                "participant_capacity",
                format!("must be at least {}", MIN_PARTICIPANT_CAPACITY),
            ));
        }
        if self.participants.len() > self.participant_capacity as usize {
            return Err(ChitFundError::invalid(
                "participants",
                "more participants than capacity",
            ));
        }
        let mut seen = HashSet::with_capacity(self.participants.len());
        if let Some(dup) = self.participants.iter().find(|p| !seen.insert(*p)) {
            return Err(ChitFundError::invalid(
                "participants",
                format!("{} appears more than once", dup),
            ));
        }
        if self.filled_at.is_some() && !self.is_full() {
            return Err(ChitFundError::invalid(
                "filled_at",
                "set on a fund that still has open seats",
            ));
        }
        Ok(())
    }

    /// Hydrate a fund from its raw ledger record and validate it.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidAmount` if an amount string is
    /// malformed and `ChitFundError::InvalidParameters` if the record breaks
    /// a fund invariant.
    pub fn from_record(record: FundRecord, converter: &AmountConverter) -> Result<Self, ChitFundError> {
        let fund = ChitFund {
            id: record.id,
            creator: record.creator,
            title: record.title,
            description: record.description,
            total_amount: converter.to_subunit(&record.total_amount)?,
            installment_amount: converter.to_subunit(&record.installment_amount)?,
            installment_period_secs: record.installment_period_secs,
            participant_capacity: record.participant_capacity,
            deadline: record.deadline,
            created_at: record.created_at,
            participants: record.participants,
            filled_at: record.filled_at,
        };
        fund.check_invariants()?;
        Ok(fund)
    }

    /// Produce the raw ledger record for this fund.
    pub fn to_record(&self, converter: &AmountConverter) -> FundRecord {
        FundRecord {
            id: self.id,
            creator: self.creator.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            total_amount: converter.to_display(self.total_amount),
            installment_amount: converter.to_display(self.installment_amount),
            installment_period_secs: self.installment_period_secs,
            participant_capacity: self.participant_capacity,
            deadline: self.deadline,
            created_at: self.created_at,
            participants: self.participants.clone(),
            filled_at: self.filled_at,
        }
    }
}

/// The fund as the ledger stores it: amounts as decimal strings, timestamps
/// as integer seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundRecord {
    pub id: FundId,
    pub creator: Identity,
    pub title: String,
    pub description: String,
    pub total_amount: String,
    pub installment_amount: String,
    pub installment_period_secs: u64,
    pub participant_capacity: u32,
    pub deadline: i64,
    pub created_at: i64,
    #[serde(default)]
    pub participants: Vec<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<i64>,
}

impl FundRecord {
    /// Append `identity` to the participant list, enforcing the enrollment
    /// rules against this record.
    ///
    /// Ledgers call this inside their own critical section so that joins from
    /// independent engines cannot overfill a fund. Checks run in the same
    /// order as the engine's: deadline, duplicate, capacity. Taking the last
    /// seat stamps `filled_at` with `joined_at`.
    pub fn apply_join(&mut self, identity: &Identity, joined_at: i64) -> Result<usize, ChitFundError> {
        if joined_at > self.deadline {
            return Err(ChitFundError::EnrollmentClosed {
                fund_id: self.id,
                deadline: self.deadline,
            });
        }
        if self.participants.contains(identity) {
            return Err(ChitFundError::AlreadyEnrolled {
                fund_id: self.id,
                identity: identity.clone(),
            });
        }
        if self.participants.len() >= self.participant_capacity as usize {
            return Err(ChitFundError::CapacityReached {
                fund_id: self.id,
                capacity: self.participant_capacity,
            });
        }
        self.participants.push(identity.clone());
        if self.participants.len() >= self.participant_capacity as usize {
            self.filled_at = Some(joined_at);
        }
        Ok(self.participants.len() - 1)
    }
}
