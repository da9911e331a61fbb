// crates/chitfund-engine/src/service.rs
//
// ChitFundService: the engine's public facade.
//
// Constructed once with its collaborators (ledger, identity provider,
// clock) and an amount converter, then shared by callers. It resolves the
// caller identity and the current time, delegates writes to the registry and
// enrollment manager, and answers read-side queries through the lifecycle
// engine.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chitfund_core::amount::AmountConverter;
use chitfund_core::clock::format_timestamp;
use chitfund_core::error::ChitFundError;
use chitfund_core::fund::{ChitFund, CreateFundRequest, FundId};
use chitfund_core::identity::Identity;
use chitfund_core::traits::{Clock, IdentityProvider, Ledger};

use crate::enrollment::EnrollmentManager;
use crate::lifecycle::{CycleAccounting, CycleSlot, FundStatus, LifecycleEngine, ParticipantView, Phase};
use crate::registry::ChitFundRegistry;

/// A fund formatted for display: amounts as decimal strings, dates as
/// RFC 3339, and flags relative to the current identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundDetails {
    pub id: FundId,
    pub title: String,
    pub description: String,
    pub creator: Identity,
    pub total_amount: String,
    pub installment_amount: String,
    pub installment_period_secs: u64,
    pub enrolled: usize,
    pub capacity: u32,
    pub deadline: String,
    pub created_at: String,
    pub phase: Phase,
    pub current_cycle: u64,
    pub total_cycles: u64,
    pub is_creator: bool,
    pub is_participant: bool,
}

/// Chit-fund engine with injected collaborators.
#[derive(Clone)]
pub struct ChitFundService {
    registry: Arc<ChitFundRegistry>,
    enrollment: EnrollmentManager,
    lifecycle: LifecycleEngine,
    ledger: Arc<dyn Ledger>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
}

impl ChitFundService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        converter: AmountConverter,
    ) -> Self {
        let registry = Arc::new(ChitFundRegistry::new(ledger.clone(), converter));
        Self {
            enrollment: EnrollmentManager::new(registry.clone()),
            lifecycle: LifecycleEngine::new(converter),
            registry,
            ledger,
            identity,
            clock,
        }
    }

    /// A handle on the same engine acting for a different caller.
    ///
    /// The registry, ledger and clock are shared; only the identity differs.
    pub fn for_identity(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            identity,
            ..self.clone()
        }
    }

    pub fn registry(&self) -> &Arc<ChitFundRegistry> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleEngine {
        &self.lifecycle
    }

    pub fn converter(&self) -> &AmountConverter {
        self.registry.converter()
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// The connected identity, or `Unauthenticated`.
    pub fn require_identity(&self) -> Result<Identity, ChitFundError> {
        self.identity
            .current_identity()
            .ok_or(ChitFundError::Unauthenticated)
    }

    /// Load every valid fund the ledger knows about. Returns the number
    /// added; invalid records are logged and skipped.
    pub async fn hydrate(&self) -> Result<usize, ChitFundError> {
        let records = self.ledger.query_all_funds().await?;
        Ok(self.registry.hydrate(records).await)
    }

    /// Create a fund owned by the current identity.
    pub async fn create_fund(&self, request: &CreateFundRequest) -> Result<FundId, ChitFundError> {
        let creator = self.require_identity()?;
        self.registry.create(request, creator, self.clock.now()).await
    }

    /// Enroll the current identity in a fund. Returns its participant index.
    pub async fn join_fund(&self, id: FundId) -> Result<usize, ChitFundError> {
        let identity = self.require_identity()?;
        self.ensure_loaded(id).await?;
        self.enrollment.join(id, identity, self.clock.now()).await
    }

    /// Snapshot of a fund. Funds unknown locally are fetched from the ledger.
    pub async fn fund(&self, id: FundId) -> Result<ChitFund, ChitFundError> {
        self.ensure_loaded(id).await?;
        self.registry.get(id)
    }

    /// Every fund, in creation order.
    pub fn funds(&self) -> Vec<ChitFund> {
        self.registry.list().collect()
    }

    /// Funds the current identity participates in.
    pub fn my_funds(&self) -> Result<Vec<ChitFund>, ChitFundError> {
        let me = self.require_identity()?;
        Ok(self.registry.list_by_participant(&me).collect())
    }

    /// Funds the current identity created.
    pub fn created_funds(&self) -> Result<Vec<ChitFund>, ChitFundError> {
        let me = self.require_identity()?;
        Ok(self.registry.list_by_creator(&me).collect())
    }

    /// Participants of a fund, flagged relative to the current identity.
    pub async fn participants(&self, id: FundId) -> Result<Vec<ParticipantView>, ChitFundError> {
        let fund = self.fund(id).await?;
        let me = self.identity.current_identity();
        Ok(self.lifecycle.participant_view(&fund, me.as_ref()))
    }

    pub async fn status(&self, id: FundId) -> Result<FundStatus, ChitFundError> {
        let fund = self.fund(id).await?;
        Ok(self.lifecycle.status(&fund, self.clock.now()))
    }

    /// The first `limit` cycles of the disbursement schedule.
    pub async fn schedule(&self, id: FundId, limit: usize) -> Result<Vec<CycleSlot>, ChitFundError> {
        let fund = self.fund(id).await?;
        Ok(self.lifecycle.cycle_schedule(&fund).take(limit).collect())
    }

    /// Accounting for the current cycle given a received amount in display
    /// units.
    pub async fn cycle_accounting(
        &self,
        id: FundId,
        received: &str,
    ) -> Result<Option<CycleAccounting>, ChitFundError> {
        let received = self.converter().to_subunit(received)?;
        let fund = self.fund(id).await?;
        Ok(self.lifecycle.cycle_accounting(&fund, self.clock.now(), received))
    }

    pub async fn fund_details(&self, id: FundId) -> Result<FundDetails, ChitFundError> {
        let fund = self.fund(id).await?;
        Ok(self.details_of(&fund))
    }

    /// Format an already-fetched fund for display.
    pub fn details_of(&self, fund: &ChitFund) -> FundDetails {
        let converter = self.converter();
        let status = self.lifecycle.status(fund, self.clock.now());
        let me = self.identity.current_identity();
        FundDetails {
            id: fund.id,
            title: fund.title.clone(),
            description: fund.description.clone(),
            creator: fund.creator.clone(),
            total_amount: converter.to_display(fund.total_amount),
            installment_amount: converter.to_display(fund.installment_amount),
            installment_period_secs: fund.installment_period_secs,
            enrolled: status.enrolled,
            capacity: status.capacity,
            deadline: format_timestamp(fund.deadline),
            created_at: format_timestamp(fund.created_at),
            phase: status.phase,
            current_cycle: status.current_cycle,
            total_cycles: status.total_cycles,
            is_creator: me.as_ref().is_some_and(|m| fund.is_creator(m)),
            is_participant: me.as_ref().is_some_and(|m| fund.is_participant(m)),
        }
    }

    /// Pull a single fund from the ledger if the registry does not have it.
    async fn ensure_loaded(&self, id: FundId) -> Result<(), ChitFundError> {
        if self.registry.contains(id) {
            return Ok(());
        }
        match self.ledger.query_fund(id).await? {
            Some(record) => {
                tracing::debug!("Fetched fund {} from ledger", id);
                self.registry.load(record).await
            }
            None => Err(ChitFundError::NotFound(id)),
        }
    }
}
