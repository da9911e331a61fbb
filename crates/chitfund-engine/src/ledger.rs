// crates/chitfund-engine/src/ledger.rs
//
// In-memory ledger implementing the `Ledger` trait.
//
// Keeps raw fund records in a BTreeMap keyed by fund id. Used for local
// development, tests, and as the reference behaviour for persistent
// ledgers. It can be switched offline to exercise the engine's
// `LedgerUnavailable` paths, and given an artificial latency so concurrent
// callers genuinely overlap.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use chitfund_core::error::ChitFundError;
use chitfund_core::fund::{FundId, FundRecord};
use chitfund_core::identity::Identity;
use chitfund_core::traits::Ledger;

#[derive(Debug)]
pub struct InMemoryLedger {
    records: RwLock<BTreeMap<FundId, FundRecord>>,
    available: AtomicBool,
    latency: Option<Duration>,
}

impl InMemoryLedger {
    /// Create a new empty, available ledger.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Seed the ledger with existing records, e.g. to test hydration.
    pub fn with_records(records: impl IntoIterator<Item = FundRecord>) -> Self {
        let ledger = Self::new();
        {
            let mut map = ledger.records.write().unwrap_or_else(PoisonError::into_inner);
            for record in records {
                map.insert(record.id, record);
            }
        }
        ledger
    }

    /// Delay every submission by `latency` before applying it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Toggle availability. While unavailable every call fails with
    /// `LedgerUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), ChitFundError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChitFundError::LedgerUnavailable(
                "in-memory ledger is offline".to_string(),
            ))
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn submit_create(&self, record: &FundRecord) -> Result<(), ChitFundError> {
        self.ensure_available()?;
        self.simulate_latency().await;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.id) {
            return Err(ChitFundError::DuplicateFund(record.id));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn submit_join(
        &self,
        id: FundId,
        identity: &Identity,
        joined_at: i64,
    ) -> Result<FundRecord, ChitFundError> {
        self.ensure_available()?;
        self.simulate_latency().await;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records.get_mut(&id).ok_or(ChitFundError::NotFound(id))?;
        record.apply_join(identity, joined_at)?;
        Ok(record.clone())
    }

    async fn query_fund(&self, id: FundId) -> Result<Option<FundRecord>, ChitFundError> {
        self.ensure_available()?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&id).cloned())
    }

    async fn query_all_funds(&self) -> Result<Vec<FundRecord>, ChitFundError> {
        self.ensure_available()?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, capacity: u32) -> FundRecord {
        FundRecord {
            id: FundId(id),
            creator: Identity::new("0xCreator").unwrap(),
            title: "t".to_string(),
            description: "d".to_string(),
            total_amount: "6".to_string(),
            installment_amount: "1".to_string(),
            installment_period_secs: 60,
            participant_capacity: capacity,
            deadline: 1_000,
            created_at: 0,
            participants: Vec::new(),
            filled_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_query() {
        let ledger = InMemoryLedger::new();
        ledger.submit_create(&record(0, 2)).await.unwrap();
        ledger.submit_create(&record(1, 2)).await.unwrap();

        assert_eq!(ledger.len(), 2);
        assert!(ledger.query_fund(FundId(1)).await.unwrap().is_some());
        assert!(ledger.query_fund(FundId(9)).await.unwrap().is_none());
        let all = ledger.query_all_funds().await.unwrap();
        assert_eq!(all.iter().map(|r| r.id.0).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let ledger = InMemoryLedger::new();
        ledger.submit_create(&record(0, 2)).await.unwrap();
        let err = ledger.submit_create(&record(0, 2)).await.unwrap_err();
        assert_eq!(err, ChitFundError::DuplicateFund(FundId(0)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_join_stamps_filled_at() {
        let ledger = InMemoryLedger::new();
        ledger.submit_create(&record(0, 2)).await.unwrap();
        let a = Identity::new("0xA").unwrap();
        let b = Identity::new("0xB").unwrap();

        let after_a = ledger.submit_join(FundId(0), &a, 10).await.unwrap();
        assert_eq!(after_a.filled_at, None);

        let after_b = ledger.submit_join(FundId(0), &b, 20).await.unwrap();
        assert_eq!(after_b.participants, vec![a, b]);
        assert_eq!(after_b.filled_at, Some(20));
        assert_eq!(ledger.query_fund(FundId(0)).await.unwrap(), Some(after_b));
    }

    #[tokio::test]
    async fn test_join_enforces_capacity_and_deadline() {
        let ledger = InMemoryLedger::new();
        ledger.submit_create(&record(0, 2)).await.unwrap();
        let late = ledger
            .submit_join(FundId(0), &Identity::new("0xLate").unwrap(), 1_001)
            .await;
        assert!(matches!(late, Err(ChitFundError::EnrollmentClosed { .. })));

        for who in ["0xA", "0xB"] {
            ledger
                .submit_join(FundId(0), &Identity::new(who).unwrap(), 10)
                .await
                .unwrap();
        }
        let over = ledger
            .submit_join(FundId(0), &Identity::new("0xC").unwrap(), 10)
            .await;
        assert!(matches!(over, Err(ChitFundError::CapacityReached { capacity: 2, .. })));
        let stored = ledger.query_fund(FundId(0)).await.unwrap().unwrap();
        assert_eq!(stored.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_join_is_already_enrolled() {
        let ledger = InMemoryLedger::new();
        ledger.submit_create(&record(0, 3)).await.unwrap();
        let a = Identity::new("0xA").unwrap();
        ledger.submit_join(FundId(0), &a, 10).await.unwrap();
        let retried = ledger.submit_join(FundId(0), &a, 11).await;
        assert!(matches!(retried, Err(ChitFundError::AlreadyEnrolled { .. })));
    }

    #[tokio::test]
    async fn test_seeded_records_are_queryable() {
        let ledger = InMemoryLedger::with_records(vec![record(4, 2), record(2, 2)]);
        let ids: Vec<u64> = ledger
            .query_all_funds()
            .await
            .unwrap()
            .iter()
            .map(|r| r.id.0)
            .collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_offline_ledger_fails() {
        let ledger = InMemoryLedger::new();
        ledger.set_available(false);
        let err = ledger.submit_create(&record(0, 2)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(ledger.query_all_funds().await.is_err());

        ledger.set_available(true);
        assert!(ledger.submit_create(&record(0, 2)).await.is_ok());
    }
}
