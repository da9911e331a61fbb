// crates/chitfund-cli/src/output.rs
//
// Output formatting utilities for the chitfund CLI.
// Supports table and JSON output modes.

use serde::Serialize;
use tabled::{Table, Tabled};

use chitfund_engine::{CycleSlot, FundDetails, ParticipantView};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed table output (default).
    Table,
    /// JSON output for machine consumption.
    Json,
}

/// Format a slice of Tabled items as a table string.
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    Table::new(data).to_string()
}

/// Format a serializable value as a pretty-printed JSON string.
pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}

/// Print `data` as JSON, or as a table of `rows` built from it.
pub fn emit<T: Serialize, R: Tabled>(format: OutputFormat, data: &T, rows: &[R]) {
    match format {
        OutputFormat::Json => println!("{}", format_json(data)),
        OutputFormat::Table if rows.is_empty() => println!("(none)"),
        OutputFormat::Table => println!("{}", format_table(rows)),
    }
}

/// A row in the fund listing table.
#[derive(Tabled)]
pub struct FundRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Installment")]
    installment: String,
    #[tabled(rename = "Seats")]
    seats: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Cycle")]
    cycle: String,
    #[tabled(rename = "Deadline")]
    deadline: String,
    #[tabled(rename = "Mine")]
    mine: String,
}

impl From<&FundDetails> for FundRow {
    fn from(d: &FundDetails) -> Self {
        let mine = match (d.is_creator, d.is_participant) {
            (true, true) => "creator, joined",
            (true, false) => "creator",
            (false, true) => "joined",
            (false, false) => "",
        };
        Self {
            id: d.id.0,
            title: d.title.clone(),
            total: d.total_amount.clone(),
            installment: d.installment_amount.clone(),
            seats: format!("{}/{}", d.enrolled, d.capacity),
            phase: d.phase.to_string(),
            cycle: format!("{}/{}", d.current_cycle, d.total_cycles),
            deadline: d.deadline.clone(),
            mine: mine.to_string(),
        }
    }
}

/// A row in the participants table.
#[derive(Tabled)]
pub struct ParticipantRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Identity")]
    identity: String,
    #[tabled(rename = "Role")]
    role: String,
}

impl From<&ParticipantView> for ParticipantRow {
    fn from(p: &ParticipantView) -> Self {
        let mut role = Vec::new();
        if p.is_creator {
            role.push("creator");
        }
        if p.is_requester {
            role.push("you");
        }
        Self {
            index: p.index,
            identity: p.identity.to_string(),
            role: role.join(", "),
        }
    }
}

/// A row in the disbursement schedule table.
#[derive(Tabled)]
pub struct CycleRow {
    #[tabled(rename = "Cycle")]
    cycle: u64,
    #[tabled(rename = "Starts")]
    starts: String,
    #[tabled(rename = "Ends")]
    ends: String,
    #[tabled(rename = "Pool")]
    pool: String,
    #[tabled(rename = "Recipient")]
    recipient: String,
}

impl CycleRow {
    pub fn new(slot: &CycleSlot, pool: String) -> Self {
        Self {
            cycle: slot.cycle,
            starts: chitfund_core::format_timestamp(slot.starts_at),
            ends: chitfund_core::format_timestamp(slot.ends_at),
            pool,
            recipient: slot
                .recipient
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "--".to_string()),
        }
    }
}
