// crates/chitfund-core/src/lib.rs
//
// chitfund-core: Core types, amount conversion, and collaborator traits for
// the Chitfund engine.
//
// This is the leaf crate every other crate in the workspace depends on. It
// defines the fund entity and its ledger record, the error type, exact
// decimal/subunit conversion, and the Ledger / IdentityProvider / Clock
// interfaces the engine is constructed with.

pub mod amount;
pub mod clock;
pub mod error;
pub mod fund;
pub mod identity;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use chitfund_core::ChitFund;`

pub use amount::{is_exact_multiple, AmountConverter, DEFAULT_DECIMALS, MAX_DECIMALS};
pub use clock::{format_timestamp, ManualClock, SystemClock};
pub use error::ChitFundError;
pub use fund::{ChitFund, CreateFundRequest, FundId, FundRecord, MIN_PARTICIPANT_CAPACITY};
pub use identity::{Identity, StaticIdentity};
pub use traits::{Clock, IdentityProvider, Ledger};
