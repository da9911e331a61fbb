// crates/chitfund-engine/src/lifecycle.rs
//
// Lifecycle derivation for chit funds.
//
// Nothing here is stored. Phase, cycle numbers, participant views and the
// disbursement schedule are all computed from a fund snapshot and a
// timestamp, so every function is idempotent for a fixed (fund, now) pair.
//
// Lifecycle: Enrolling -> Active -> Completed.
//
//   close          = filled_at if the fund filled before its deadline, else deadline
//   planned cycles = total_amount / installment_amount
//   elapsed cycles = floor((now - close) / period), clamped to >= 0

use std::fmt;

use serde::{Deserialize, Serialize};

use chitfund_core::amount::AmountConverter;
use chitfund_core::fund::ChitFund;
use chitfund_core::identity::Identity;

/// Derived lifecycle phase of a fund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Seats are open and the deadline has not passed.
    Enrolling,
    /// Enrollment closed; installment cycles are running.
    Active,
    /// Every planned cycle has elapsed.
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Enrolling => write!(f, "Enrolling"),
            Phase::Active => write!(f, "Active"),
            Phase::Completed => write!(f, "Completed"),
        }
    }
}

/// A participant as seen from a particular requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub identity: Identity,
    /// Zero-based join position.
    pub index: usize,
    pub is_creator: bool,
    /// Whether this participant is the account asking.
    pub is_requester: bool,
}

/// One installment cycle of the disbursement schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSlot {
    /// 1-based cycle number.
    pub cycle: u64,
    pub starts_at: i64,
    pub ends_at: i64,
    /// Pool collected this cycle: installment * enrolled participants.
    pub expected_contribution: u128,
    /// Who receives the pool. Participants take turns in join order.
    pub recipient: Option<Identity>,
}

/// Expected versus received contributions for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleAccounting {
    pub cycle: u64,
    pub expected: u128,
    pub received: u128,
    /// `expected - received`, floored at zero.
    pub outstanding: u128,
}

/// Display-ready summary of a fund's derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundStatus {
    pub phase: Phase,
    pub current_cycle: u64,
    pub total_cycles: u64,
    pub enrolled: usize,
    pub capacity: u32,
    pub enrollment_closes_at: i64,
}

/// Pure, read-only derivations over fund snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleEngine {
    converter: AmountConverter,
}

impl LifecycleEngine {
    pub fn new(converter: AmountConverter) -> Self {
        Self { converter }
    }

    /// Number of cycles the fund runs for: total / installment.
    pub fn total_cycles_planned(&self, fund: &ChitFund) -> u64 {
        self.converter
            .to_canonical_cycle_unit(fund.total_amount, fund.installment_amount)
            .map(|cycles| u64::try_from(cycles).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }

    /// When enrollment closed (or will close, absent further joins).
    pub fn enrollment_close_time(&self, fund: &ChitFund) -> i64 {
        match fund.filled_at {
            Some(filled) if fund.is_full() => filled.min(fund.deadline),
            _ => fund.deadline,
        }
    }

    /// Whole cycles elapsed since enrollment closed.
    pub fn elapsed_cycles(&self, fund: &ChitFund, now: i64) -> u64 {
        let close = self.enrollment_close_time(fund);
        if now <= close || fund.installment_period_secs == 0 {
            return 0;
        }
        let elapsed = (i128::from(now) - i128::from(close)) / i128::from(fund.installment_period_secs);
        u64::try_from(elapsed).unwrap_or(u64::MAX)
    }

    pub fn phase(&self, fund: &ChitFund, now: i64) -> Phase {
        if now <= fund.deadline && !fund.is_full() {
            return Phase::Enrolling;
        }
        if self.elapsed_cycles(fund, now) >= self.total_cycles_planned(fund) {
            Phase::Completed
        } else {
            Phase::Active
        }
    }

    /// 1-based cycle in progress: 0 while enrolling, the last cycle once
    /// completed.
    pub fn current_cycle(&self, fund: &ChitFund, now: i64) -> u64 {
        let planned = self.total_cycles_planned(fund);
        match self.phase(fund, now) {
            Phase::Enrolling => 0,
            Phase::Active => self.elapsed_cycles(fund, now).saturating_add(1).min(planned),
            Phase::Completed => planned,
        }
    }

    /// Participants in join order, flagged relative to the creator and the
    /// optional requester.
    pub fn participant_view(&self, fund: &ChitFund, requester: Option<&Identity>) -> Vec<ParticipantView> {
        fund.participants
            .iter()
            .enumerate()
            .map(|(index, identity)| ParticipantView {
                identity: identity.clone(),
                index,
                is_creator: fund.is_creator(identity),
                is_requester: requester.is_some_and(|r| r == identity),
            })
            .collect()
    }

    /// Lazily yields one slot per planned cycle.
    ///
    /// While the fund is still enrolling the timing assumes enrollment
    /// closes at the deadline and the pool reflects current enrollment.
    pub fn cycle_schedule<'a>(&self, fund: &'a ChitFund) -> impl Iterator<Item = CycleSlot> + 'a {
        let close = self.enrollment_close_time(fund);
        let period = i64::try_from(fund.installment_period_secs).unwrap_or(i64::MAX);
        let pool = fund
            .installment_amount
            .saturating_mul(fund.participants.len() as u128);
        let planned = self.total_cycles_planned(fund);

        (0..planned).map(move |k| {
            let offset = i64::try_from(k).unwrap_or(i64::MAX).saturating_mul(period);
            let starts_at = close.saturating_add(offset);
            let recipient = if fund.participants.is_empty() {
                None
            } else {
                let turn = (k % fund.participants.len() as u64) as usize;
                Some(fund.participants[turn].clone())
            };
            CycleSlot {
                cycle: k + 1,
                starts_at,
                ends_at: starts_at.saturating_add(period),
                expected_contribution: pool,
                recipient,
            }
        })
    }

    /// Contribution accounting for the cycle in progress.
    ///
    /// Returns `None` unless the fund is active.
    pub fn cycle_accounting(&self, fund: &ChitFund, now: i64, received: u128) -> Option<CycleAccounting> {
        if self.phase(fund, now) != Phase::Active {
            return None;
        }
        let expected = fund
            .installment_amount
            .saturating_mul(fund.participants.len() as u128);
        Some(CycleAccounting {
            cycle: self.current_cycle(fund, now),
            expected,
            received,
            outstanding: expected.saturating_sub(received),
        })
    }

    pub fn status(&self, fund: &ChitFund, now: i64) -> FundStatus {
        FundStatus {
            phase: self.phase(fund, now),
            current_cycle: self.current_cycle(fund, now),
            total_cycles: self.total_cycles_planned(fund),
            enrolled: fund.enrolled(),
            capacity: fund.participant_capacity,
            enrollment_closes_at: self.enrollment_close_time(fund),
        }
    }
}
