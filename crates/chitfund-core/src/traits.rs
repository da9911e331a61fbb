// crates/chitfund-core/src/traits.rs

use async_trait::async_trait;

use crate::error::ChitFundError;
use crate::fund::{FundId, FundRecord};
use crate::identity::Identity;

/// External ledger that durably records funds and enrollments.
///
/// Implemented by chitfund-engine (`InMemoryLedger`) and chitfund-cli
/// (`FileLedger`). Implementations report transport or storage failures as
/// `ChitFundError::LedgerUnavailable`; the engine never retries.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Record a newly created fund.
    ///
    /// Fails with `ChitFundError::DuplicateFund` if the id is already taken.
    async fn submit_create(&self, record: &FundRecord) -> Result<(), ChitFundError>;

    /// Record that `identity` joined fund `id` at `joined_at`, returning the
    /// record as stored after the join.
    ///
    /// The ledger is the final authority on enrollment: it must apply
    /// [`FundRecord::apply_join`] atomically with the write, so a full, closed,
    /// or already-joined fund is rejected even when the caller's view was
    /// stale.
    async fn submit_join(
        &self,
        id: FundId,
        identity: &Identity,
        joined_at: i64,
    ) -> Result<FundRecord, ChitFundError>;

    /// Fetch the raw record of a single fund.
    async fn query_fund(&self, id: FundId) -> Result<Option<FundRecord>, ChitFundError>;

    /// Fetch every fund record, in creation order.
    async fn query_all_funds(&self) -> Result<Vec<FundRecord>, ChitFundError>;
}

/// Supplies the caller's current account identity, if one is connected.
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// Wall-clock source, in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}
