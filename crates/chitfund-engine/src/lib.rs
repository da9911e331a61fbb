// crates/chitfund-engine/src/lib.rs
//
// chitfund-engine: the chit-fund domain engine.
//
// The registry stores funds and allocates ids, the enrollment manager
// applies joins under a per-fund write gate, and the lifecycle engine derives
// phase, cycle and schedule information on read. `ChitFundService` ties them
// together behind injected ledger, identity, and clock collaborators.

pub mod enrollment;
pub mod ledger;
pub mod lifecycle;
pub mod registry;
pub mod service;

// Re-export key types for ergonomic access from downstream crates.
pub use enrollment::{check_join, EnrollmentManager};
pub use ledger::InMemoryLedger;
pub use lifecycle::{CycleAccounting, CycleSlot, FundStatus, LifecycleEngine, ParticipantView, Phase};
pub use registry::{ChitFundRegistry, FundIter, ValidatedParams};
pub use service::{ChitFundService, FundDetails};
