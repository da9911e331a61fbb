// crates/chitfund-engine/src/registry.rs
//
// ChitFundRegistry: the authoritative in-memory store of chit funds.
//
// Layout:
//   funds:   BTreeMap<FundId, Arc<FundSlot>>, ordered by id (= creation order)
//   next_id: async mutex guarding id allocation; held across the ledger
//            write so ids are handed out gap-free and in order
//
// Each FundSlot pairs the fund's state (a std RwLock, only ever held for a
// clone or a swap) with an async write gate. Writers take the gate first and
// keep it across their ledger calls, so readers never wait on the ledger and
// at most one mutation per fund is in flight in this process. Other engines
// may share the ledger, so writers re-read the fund from it under the gate
// and adopt whatever record the ledger returns.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, MutexGuard};

/// How many times `create` re-reads the ledger after an id collision before
/// giving up.
const MAX_ID_RESYNCS: usize = 3;

use chitfund_core::amount::{is_exact_multiple, AmountConverter};
use chitfund_core::error::ChitFundError;
use chitfund_core::fund::{ChitFund, CreateFundRequest, FundId, FundRecord, MIN_PARTICIPANT_CAPACITY};
use chitfund_core::identity::Identity;
use chitfund_core::traits::Ledger;

/// Storage cell for one fund.
#[derive(Debug)]
pub(crate) struct FundSlot {
    write_gate: Mutex<()>,
    state: RwLock<ChitFund>,
}

impl FundSlot {
    fn new(fund: ChitFund) -> Self {
        Self {
            write_gate: Mutex::new(()),
            state: RwLock::new(fund),
        }
    }

    /// Acquire exclusive mutation rights for this fund.
    pub(crate) async fn lock_for_write(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().await
    }

    /// Clone the current state.
    pub(crate) fn snapshot(&self) -> ChitFund {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the cached state. Callers must hold the write gate.
    fn replace(&self, fund: ChitFund) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = fund;
    }
}

/// Amounts and fields of a creation request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedParams {
    pub total_amount: u128,
    pub installment_amount: u128,
}

/// Owns all funds, allocates ids, and answers queries.
pub struct ChitFundRegistry {
    converter: AmountConverter,
    ledger: Arc<dyn Ledger>,
    funds: RwLock<BTreeMap<FundId, Arc<FundSlot>>>,
    next_id: Mutex<u64>,
}

impl ChitFundRegistry {
    /// Create an empty registry that writes through to `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>, converter: AmountConverter) -> Self {
        Self {
            converter,
            ledger,
            funds: RwLock::new(BTreeMap::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn converter(&self) -> &AmountConverter {
        &self.converter
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Validate a creation request against the current time.
    ///
    /// Checks run in a fixed order and the first failure is reported.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidParameters` naming the failing field.
    pub fn validate(
        &self,
        request: &CreateFundRequest,
        now: i64,
    ) -> Result<ValidatedParams, ChitFundError> {
        if request.title.trim().is_empty() {
            return Err(ChitFundError::invalid("title", "must not be empty"));
        }
        if request.description.trim().is_empty() {
            return Err(ChitFundError::invalid("description", "must not be empty"));
        }

        let total_amount = self
            .converter
            .to_subunit(&request.total_amount)
            .map_err(|e| ChitFundError::invalid("total_amount", e.to_string()))?;
        let installment_amount = self
            .converter
            .to_subunit(&request.installment_amount)
            .map_err(|e| ChitFundError::invalid("installment_amount", e.to_string()))?;

        if installment_amount == 0 {
            return Err(ChitFundError::invalid(
                "installment_amount",
                "must be greater than zero",
            ));
        }
        if installment_amount > total_amount {
            return Err(ChitFundError::invalid(
                "installment_amount",
                format!(
                    "{} exceeds total_amount {}",
                    self.converter.to_display(installment_amount),
                    self.converter.to_display(total_amount)
                ),
            ));
        }
        if !is_exact_multiple(total_amount, installment_amount) {
            return Err(ChitFundError::invalid(
                "total_amount",
                "must be an exact multiple of installment_amount",
            ));
        }
        if request.installment_period_secs == 0 {
            return Err(ChitFundError::invalid(
                "installment_period_secs",
                "must be greater than zero",
            ));
        }
        if request.participant_capacity < MIN_PARTICIPANT_CAPACITY {
            return Err(ChitFundError::invalid(
                "participant_capacity",
                format!("must be at least {}", MIN_PARTICIPANT_CAPACITY),
            ));
        }
        if request.deadline <= now {
            return Err(ChitFundError::invalid(
                "deadline",
                "must be in the future",
            ));
        }

        Ok(ValidatedParams {
            total_amount,
            installment_amount,
        })
    }

    /// Validate and store a new fund, returning its id.
    ///
    /// The fund is recorded on the ledger before it becomes visible here. If
    /// validation or the ledger write fails nothing is stored and no id is
    /// consumed. When another engine sharing the ledger has already used the
    /// next id, the registry loads the ledger's funds and tries the next free
    /// id instead.
    pub async fn create(
        &self,
        request: &CreateFundRequest,
        creator: Identity,
        now: i64,
    ) -> Result<FundId, ChitFundError> {
        let params = self.validate(request, now).inspect_err(|e| {
            tracing::debug!("Rejected fund creation by {}: {}", creator, e);
        })?;

        let mut next_id = self.next_id.lock().await;
        let mut resyncs = 0;
        loop {
            let fund = ChitFund {
                id: FundId(*next_id),
                creator: creator.clone(),
                title: request.title.trim().to_string(),
                description: request.description.trim().to_string(),
                total_amount: params.total_amount,
                installment_amount: params.installment_amount,
                installment_period_secs: request.installment_period_secs,
                participant_capacity: request.participant_capacity,
                deadline: request.deadline,
                created_at: now,
                participants: Vec::new(),
                filled_at: None,
            };

            match self.ledger.submit_create(&fund.to_record(&self.converter)).await {
                Ok(()) => {
                    let id = fund.id;
                    tracing::info!(
                        "Created fund {} '{}' by {} ({} seats, deadline {})",
                        id,
                        fund.title,
                        fund.creator,
                        fund.participant_capacity,
                        fund.deadline
                    );
                    self.write_funds().insert(id, Arc::new(FundSlot::new(fund)));
                    *next_id += 1;
                    return Ok(id);
                }
                Err(ChitFundError::DuplicateFund(taken)) if resyncs < MAX_ID_RESYNCS => {
                    resyncs += 1;
                    tracing::info!("Fund id {} already on the ledger, resyncing ids", taken);
                    let records = self.ledger.query_all_funds().await?;
                    self.insert_records(&mut next_id, records);
                    // A ledger that reports the id taken but does not list it
                    // must still not hand out the same id again.
                    *next_id = (*next_id).max(taken.0.saturating_add(1));
                }
                Err(e) => {
                    tracing::warn!("Ledger rejected fund {}: {}", fund.id, e);
                    return Err(e);
                }
            }
        }
    }

    /// Load ledger records into the registry.
    ///
    /// Records that fail validation are logged and skipped so one corrupt
    /// entry does not hide the rest of the ledger. Records whose id is already
    /// present are skipped too. Returns the number of funds added.
    pub async fn hydrate(&self, records: Vec<FundRecord>) -> usize {
        let mut next_id = self.next_id.lock().await;
        let added = self.insert_records(&mut next_id, records);
        tracing::info!("Hydrated {} funds from ledger (next id {})", added, *next_id);
        added
    }

    /// Load a single ledger record, failing if it is invalid.
    pub(crate) async fn load(&self, record: FundRecord) -> Result<(), ChitFundError> {
        let fund = ChitFund::from_record(record, &self.converter)?;
        let mut next_id = self.next_id.lock().await;
        *next_id = (*next_id).max(fund.id.0.saturating_add(1));
        self.write_funds()
            .entry(fund.id)
            .or_insert_with(|| Arc::new(FundSlot::new(fund)));
        Ok(())
    }

    /// Re-read fund `id` from the ledger into `slot` and return it.
    /// Callers must hold the slot's write gate.
    pub(crate) async fn refresh(&self, id: FundId, slot: &FundSlot) -> Result<ChitFund, ChitFundError> {
        let record = self
            .ledger
            .query_fund(id)
            .await?
            .ok_or(ChitFundError::NotFound(id))?;
        self.store(slot, record)
    }

    /// Validate a ledger record and make it the slot's state.
    /// Callers must hold the slot's write gate.
    pub(crate) fn store(&self, slot: &FundSlot, record: FundRecord) -> Result<ChitFund, ChitFundError> {
        let fund = ChitFund::from_record(record, &self.converter)?;
        slot.replace(fund.clone());
        Ok(fund)
    }

    fn insert_records(&self, next_id: &mut u64, records: Vec<FundRecord>) -> usize {
        let mut map = self.write_funds();
        let mut added = 0;
        for record in records {
            let id = record.id;
            *next_id = (*next_id).max(id.0.saturating_add(1));
            if map.contains_key(&id) {
                continue;
            }
            match ChitFund::from_record(record, &self.converter) {
                Ok(fund) => {
                    map.insert(id, Arc::new(FundSlot::new(fund)));
                    added += 1;
                }
                Err(e) => tracing::warn!("Skipping invalid ledger record for fund {}: {}", id, e),
            }
        }
        added
    }

    /// Get a snapshot of the fund with the given id.
    pub fn get(&self, id: FundId) -> Result<ChitFund, ChitFundError> {
        self.slot(id).map(|slot| slot.snapshot())
    }

    /// Whether a fund with this id is stored.
    pub fn contains(&self, id: FundId) -> bool {
        self.read_funds().contains_key(&id)
    }

    /// All funds in creation order.
    ///
    /// The set of funds is fixed when this is called; each fund's state is
    /// read lazily as the iterator advances. Call again to restart.
    pub fn list(&self) -> FundIter {
        FundIter {
            slots: self.read_funds().values().cloned().collect::<Vec<_>>().into_iter(),
        }
    }

    /// Funds in which `identity` is enrolled (case-insensitive).
    pub fn list_by_participant<'a>(&self, identity: &'a Identity) -> impl Iterator<Item = ChitFund> + 'a {
        self.list().filter(move |fund| fund.is_participant(identity))
    }

    /// Funds created by `identity` (case-insensitive).
    pub fn list_by_creator<'a>(&self, identity: &'a Identity) -> impl Iterator<Item = ChitFund> + 'a {
        self.list().filter(move |fund| fund.is_creator(identity))
    }

    pub fn len(&self) -> usize {
        self.read_funds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn slot(&self, id: FundId) -> Result<Arc<FundSlot>, ChitFundError> {
        self.read_funds()
            .get(&id)
            .cloned()
            .ok_or(ChitFundError::NotFound(id))
    }

    fn read_funds(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<FundId, Arc<FundSlot>>> {
        self.funds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_funds(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<FundId, Arc<FundSlot>>> {
        self.funds.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lazy iterator over fund snapshots in creation order.
pub struct FundIter {
    slots: std::vec::IntoIter<Arc<FundSlot>>,
}

impl Iterator for FundIter {
    type Item = ChitFund;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next().map(|slot| slot.snapshot())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.slots.size_hint()
    }
}

impl ExactSizeIterator for FundIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    fn request() -> CreateFundRequest {
        CreateFundRequest {
            title: "Neighbourhood chit".to_string(),
            description: "Six month rotation".to_string(),
            total_amount: "6".to_string(),
            installment_amount: "1".to_string(),
            installment_period_secs: 2_592_000,
            participant_capacity: 3,
            deadline: NOW + DAY,
        }
    }

    fn creator() -> Identity {
        Identity::new("0xCreator").unwrap()
    }

    fn registry() -> (ChitFundRegistry, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = ChitFundRegistry::new(ledger.clone(), AmountConverter::default());
        (registry, ledger)
    }

    fn invalid_field(result: Result<FundId, ChitFundError>) -> &'static str {
        match result {
            Err(ChitFundError::InvalidParameters { field, .. }) => field,
            other => panic!("expected InvalidParameters, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let (registry, ledger) = registry();
        let a = registry.create(&request(), creator(), NOW).await.unwrap();
        let b = registry.create(&request(), creator(), NOW).await.unwrap();
        assert_eq!(a, FundId(0));
        assert_eq!(b, FundId(1));
        assert_eq!(registry.len(), 2);
        assert_eq!(ledger.len(), 2);

        let fund = registry.get(a).unwrap();
        assert_eq!(fund.total_amount, 6 * registry.converter().scale());
        assert_eq!(fund.created_at, NOW);
        assert!(fund.participants.is_empty());
    }

    #[tokio::test]
    async fn test_create_validation_order() {
        let (registry, _) = registry();

        let mut r = request();
        r.title = "  ".to_string();
        r.description = String::new();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "title");

        let mut r = request();
        r.description = String::new();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "description");

        let mut r = request();
        r.total_amount = "lots".to_string();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "total_amount");

        let mut r = request();
        r.installment_amount = "0".to_string();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "installment_amount");

        let mut r = request();
        r.installment_amount = "7".to_string();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "installment_amount");

        let mut r = request();
        r.installment_amount = "4".to_string();
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "total_amount");

        let mut r = request();
        r.installment_period_secs = 0;
        assert_eq!(
            invalid_field(registry.create(&r, creator(), NOW).await),
            "installment_period_secs"
        );

        let mut r = request();
        r.participant_capacity = 1;
        assert_eq!(
            invalid_field(registry.create(&r, creator(), NOW).await),
            "participant_capacity"
        );

        let mut r = request();
        r.deadline = NOW;
        assert_eq!(invalid_field(registry.create(&r, creator(), NOW).await), "deadline");

        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_stores_nothing_and_keeps_id() {
        let (registry, ledger) = registry();
        ledger.set_available(false);
        let err = registry.create(&request(), creator(), NOW).await.unwrap_err();
        assert!(matches!(err, ChitFundError::LedgerUnavailable(_)));
        assert!(registry.is_empty());

        ledger.set_available(true);
        let id = registry.create(&request(), creator(), NOW).await.unwrap();
        assert_eq!(id, FundId(0));
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let (registry, _) = registry();
        assert_eq!(registry.get(FundId(42)), Err(ChitFundError::NotFound(FundId(42))));
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_restartable() {
        let (registry, _) = registry();
        for title in ["first", "second", "third"] {
            let mut r = request();
            r.title = title.to_string();
            registry.create(&r, creator(), NOW).await.unwrap();
        }
        let titles: Vec<String> = registry.list().map(|f| f.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
        assert_eq!(registry.list().len(), 3);
        assert_eq!(registry.list().count(), 3);
    }

    #[tokio::test]
    async fn test_list_by_creator_case_insensitive() {
        let (registry, _) = registry();
        registry.create(&request(), creator(), NOW).await.unwrap();
        registry
            .create(&request(), Identity::new("0xOther").unwrap(), NOW)
            .await
            .unwrap();
        let mine = Identity::new("0XCREATOR").unwrap();
        let created: Vec<FundId> = registry.list_by_creator(&mine).map(|f| f.id).collect();
        assert_eq!(created, vec![FundId(0)]);
    }

    #[tokio::test]
    async fn test_hydrate_advances_next_id() {
        let (source, _) = registry();
        source.create(&request(), creator(), NOW).await.unwrap();
        source.create(&request(), creator(), NOW).await.unwrap();
        let records: Vec<FundRecord> = source
            .list()
            .map(|f| f.to_record(source.converter()))
            .collect();

        let (registry, _) = registry();
        assert_eq!(registry.hydrate(records.clone()).await, 2);
        // Re-hydrating the same records adds nothing.
        assert_eq!(registry.hydrate(records).await, 0);

        let next = registry.create(&request(), creator(), NOW).await.unwrap();
        assert_eq!(next, FundId(2));
    }

    fn stored_record(id: u64) -> FundRecord {
        FundRecord {
            id: FundId(id),
            creator: creator(),
            title: "ok".to_string(),
            description: "ok".to_string(),
            total_amount: "6".to_string(),
            installment_amount: "1".to_string(),
            installment_period_secs: 60,
            participant_capacity: 3,
            deadline: NOW,
            created_at: NOW - DAY,
            participants: Vec::new(),
            filled_at: None,
        }
    }

    #[tokio::test]
    async fn test_hydrate_skips_invalid_records() {
        let (registry, _) = registry();
        let mut bad = stored_record(1);
        bad.participant_capacity = 1;
        let mut corrupt = stored_record(2);
        corrupt.total_amount = "lots".to_string();

        let added = registry
            .hydrate(vec![stored_record(0), bad, corrupt, stored_record(3)])
            .await;
        assert_eq!(added, 2);
        let ids: Vec<FundId> = registry.list().map(|f| f.id).collect();
        assert_eq!(ids, vec![FundId(0), FundId(3)]);

        // Skipped ids are still never reused.
        let next = registry.create(&request(), creator(), NOW).await.unwrap();
        assert_eq!(next, FundId(4));
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_record() {
        let (registry, _) = registry();
        let mut bad = stored_record(0);
        bad.title = String::new();
        assert!(registry.load(bad).await.is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_create_resyncs_after_id_collision() {
        let ledger = Arc::new(InMemoryLedger::new());
        let first = ChitFundRegistry::new(ledger.clone(), AmountConverter::default());
        let second = ChitFundRegistry::new(ledger.clone(), AmountConverter::default());
        first.create(&request(), creator(), NOW).await.unwrap();
        first.create(&request(), creator(), NOW).await.unwrap();

        // `second` never hydrated, so its counter still starts at 0.
        let id = second.create(&request(), creator(), NOW).await.unwrap();
        assert_eq!(id, FundId(2));
        assert_eq!(ledger.len(), 3);
        // The resync also picked up the other engine's funds.
        assert_eq!(second.len(), 3);
        assert_eq!(second.create(&request(), creator(), NOW).await.unwrap(), FundId(3));
    }
}
