// crates/chitfund-engine/src/enrollment.rs
//
// EnrollmentManager: validates and applies join requests.
//
// Preconditions are checked in a fixed order and the first failure wins:
//   1. the fund exists                          -> NotFound
//   2. now <= deadline                          -> EnrollmentClosed
//   3. identity not already a participant       -> AlreadyEnrolled
//   4. fewer participants than capacity         -> CapacityReached
//
// The whole refresh / check / ledger-submit / adopt sequence runs under the
// fund's write gate, so two concurrent joins in this process can never both
// pass the capacity or duplicate checks. The fund is re-read from the ledger
// first because other engines may have enrolled people since it was cached,
// and the ledger applies the same rules again when it records the join.

use std::sync::Arc;

use chitfund_core::error::ChitFundError;
use chitfund_core::fund::{ChitFund, FundId};
use chitfund_core::identity::Identity;

use crate::registry::ChitFundRegistry;

/// Applies participant joins to funds held by a registry.
#[derive(Clone)]
pub struct EnrollmentManager {
    registry: Arc<ChitFundRegistry>,
}

impl EnrollmentManager {
    pub fn new(registry: Arc<ChitFundRegistry>) -> Self {
        Self { registry }
    }

    /// Enroll `identity` in fund `fund_id`, returning its zero-based index.
    ///
    /// Nothing is mutated unless every precondition holds and the ledger
    /// accepts the join.
    pub async fn join(
        &self,
        fund_id: FundId,
        identity: Identity,
        now: i64,
    ) -> Result<usize, ChitFundError> {
        let slot = self.registry.slot(fund_id)?;
        let _gate = slot.lock_for_write().await;

        let fund = self.registry.refresh(fund_id, &slot).await?;
        check_join(&fund, &identity, now).inspect_err(|e| {
            tracing::debug!("Rejected join of {} to fund {}: {}", identity, fund_id, e);
        })?;

        let stored = self
            .registry
            .ledger()
            .submit_join(fund_id, &identity, now)
            .await
            .inspect_err(|e| {
                tracing::warn!("Ledger rejected join of {} to fund {}: {}", identity, fund_id, e);
            })?;

        let fund = self.registry.store(&slot, stored)?;
        let index = fund.participant_index(&identity).ok_or_else(|| {
            ChitFundError::LedgerUnavailable(format!(
                "ledger accepted the join of {} to fund {} but did not record it",
                identity, fund_id
            ))
        })?;
        let filled = fund.is_full();

        tracing::info!(
            "{} joined fund {} at index {}{}",
            identity,
            fund_id,
            index,
            if filled { " (fund now full)" } else { "" }
        );
        Ok(index)
    }
}

/// Check join preconditions against a fund snapshot without mutating it.
pub fn check_join(fund: &ChitFund, identity: &Identity, now: i64) -> Result<(), ChitFundError> {
    if now > fund.deadline {
        return Err(ChitFundError::EnrollmentClosed {
            fund_id: fund.id,
            deadline: fund.deadline,
        });
    }
    if fund.is_participant(identity) {
        return Err(ChitFundError::AlreadyEnrolled {
            fund_id: fund.id,
            identity: identity.clone(),
        });
    }
    if fund.is_full() {
        return Err(ChitFundError::CapacityReached {
            fund_id: fund.id,
            capacity: fund.participant_capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use chitfund_core::Ledger;
    use chitfund_core::amount::AmountConverter;
    use chitfund_core::fund::CreateFundRequest;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn id(s: &str) -> Identity {
        Identity::new(s).unwrap()
    }

    async fn setup(capacity: u32) -> (EnrollmentManager, Arc<ChitFundRegistry>, Arc<InMemoryLedger>, FundId) {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = Arc::new(ChitFundRegistry::new(ledger.clone(), AmountConverter::default()));
        let request = CreateFundRequest {
            title: "Office chit".to_string(),
            description: "Quarterly".to_string(),
            total_amount: "4".to_string(),
            installment_amount: "1".to_string(),
            installment_period_secs: 60,
            participant_capacity: capacity,
            deadline: NOW + DAY,
        };
        let fund_id = registry.create(&request, id("0xCreator"), NOW).await.unwrap();
        (EnrollmentManager::new(registry.clone()), registry, ledger, fund_id)
    }

    #[tokio::test]
    async fn test_join_returns_sequential_indices() {
        let (manager, registry, ledger, fund_id) = setup(3).await;
        assert_eq!(manager.join(fund_id, id("0xA"), NOW).await.unwrap(), 0);
        assert_eq!(manager.join(fund_id, id("0xB"), NOW).await.unwrap(), 1);

        let fund = registry.get(fund_id).unwrap();
        assert_eq!(fund.participants, vec![id("0xA"), id("0xB")]);
        assert_eq!(fund.filled_at, None);

        let recorded = ledger.query_all_funds().await.unwrap();
        assert_eq!(recorded[0].participants.len(), 2);
    }

    #[tokio::test]
    async fn test_join_unknown_fund() {
        let (manager, _, _, _) = setup(2).await;
        let err = manager.join(FundId(99), id("0xA"), NOW).await.unwrap_err();
        assert_eq!(err, ChitFundError::NotFound(FundId(99)));
    }

    #[tokio::test]
    async fn test_join_at_deadline_allowed_after_rejected() {
        let (manager, registry, _, fund_id) = setup(3).await;
        assert!(manager.join(fund_id, id("0xA"), NOW + DAY).await.is_ok());
        let err = manager.join(fund_id, id("0xB"), NOW + DAY + 1).await.unwrap_err();
        assert!(matches!(err, ChitFundError::EnrollmentClosed { .. }));
        assert_eq!(registry.get(fund_id).unwrap().enrolled(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_join_case_insensitive() {
        let (manager, registry, _, fund_id) = setup(3).await;
        manager.join(fund_id, id("0xAbC"), NOW).await.unwrap();
        let err = manager.join(fund_id, id("0xabc"), NOW).await.unwrap_err();
        assert!(matches!(err, ChitFundError::AlreadyEnrolled { .. }));
        assert_eq!(registry.get(fund_id).unwrap().enrolled(), 1);
    }

    #[tokio::test]
    async fn test_capacity_reached_and_filled_at() {
        let (manager, registry, _, fund_id) = setup(2).await;
        manager.join(fund_id, id("0xA"), NOW).await.unwrap();
        manager.join(fund_id, id("0xB"), NOW + 5).await.unwrap();
        let err = manager.join(fund_id, id("0xC"), NOW + 6).await.unwrap_err();
        assert_eq!(
            err,
            ChitFundError::CapacityReached {
                fund_id,
                capacity: 2
            }
        );
        assert_eq!(registry.get(fund_id).unwrap().filled_at, Some(NOW + 5));
    }

    #[tokio::test]
    async fn test_closed_checked_before_duplicate() {
        let (manager, _, _, fund_id) = setup(2).await;
        manager.join(fund_id, id("0xA"), NOW).await.unwrap();
        let err = manager.join(fund_id, id("0xA"), NOW + 2 * DAY).await.unwrap_err();
        assert!(matches!(err, ChitFundError::EnrollmentClosed { .. }));
    }

    #[tokio::test]
    async fn test_ledger_failure_leaves_participants_unchanged() {
        let (manager, registry, ledger, fund_id) = setup(3).await;
        ledger.set_available(false);
        let err = manager.join(fund_id, id("0xA"), NOW).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(registry.get(fund_id).unwrap().enrolled(), 0);

        ledger.set_available(true);
        assert_eq!(manager.join(fund_id, id("0xA"), NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_join_sees_enrollments_from_another_registry() {
        let (manager, registry, ledger, fund_id) = setup(2).await;
        // A second engine over the same ledger caches the fund while it is empty.
        let other = Arc::new(ChitFundRegistry::new(ledger.clone(), AmountConverter::default()));
        other.hydrate(ledger.query_all_funds().await.unwrap()).await;
        let other_manager = EnrollmentManager::new(other.clone());

        manager.join(fund_id, id("0xA"), NOW).await.unwrap();
        manager.join(fund_id, id("0xB"), NOW + 1).await.unwrap();

        let err = other_manager.join(fund_id, id("0xC"), NOW + 2).await.unwrap_err();
        assert!(matches!(err, ChitFundError::CapacityReached { capacity: 2, .. }));
        let err = other_manager.join(fund_id, id("0xa"), NOW + 2).await.unwrap_err();
        assert!(matches!(err, ChitFundError::AlreadyEnrolled { .. }));

        // The stale cache was replaced by the ledger's view.
        let seen = other.get(fund_id).unwrap();
        assert_eq!(seen.participants, vec![id("0xA"), id("0xB")]);
        assert_eq!(seen.filled_at, Some(NOW + 1));
        assert_eq!(registry.get(fund_id).unwrap().enrolled(), 2);
        assert_eq!(ledger.query_all_funds().await.unwrap()[0].participants.len(), 2);
    }

    #[tokio::test]
    async fn test_join_index_comes_from_ledger() {
        let (manager, _, ledger, fund_id) = setup(3).await;
        let other = Arc::new(ChitFundRegistry::new(ledger.clone(), AmountConverter::default()));
        other.hydrate(ledger.query_all_funds().await.unwrap()).await;

        manager.join(fund_id, id("0xA"), NOW).await.unwrap();
        let index = EnrollmentManager::new(other)
            .join(fund_id, id("0xB"), NOW)
            .await
            .unwrap();
        assert_eq!(index, 1);
    }
}
