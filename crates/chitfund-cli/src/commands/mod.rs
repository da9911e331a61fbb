// crates/chitfund-cli/src/commands/mod.rs
//
// Command module declarations for the chitfund CLI.

pub mod convert;
pub mod fund;
