// crates/chitfund-cli/src/commands/fund.rs
//
// Fund commands: create, join, show, list, participants, schedule, and
// accounting. Each one runs a single service call against the hydrated
// engine and prints the result as a table or JSON.

use clap::Args;

use chitfund_core::{CreateFundRequest, FundId};
use chitfund_engine::{ChitFundService, FundDetails, ParticipantView};

use crate::output::{emit, format_json, CycleRow, FundRow, OutputFormat, ParticipantRow};

const SECONDS_PER_DAY: u64 = 86_400;

/// Arguments for `chitfund create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Fund name.
    #[arg(long)]
    pub title: String,
    /// Short description shown to prospective participants.
    #[arg(long)]
    pub description: String,
    /// Total fund value in display units, e.g. 1.5.
    #[arg(long)]
    pub total: String,
    /// Per-cycle installment in display units, e.g. 0.3.
    #[arg(long)]
    pub installment: String,
    /// Cycle length in days.
    #[arg(long, default_value_t = 30)]
    pub period_days: u64,
    /// Maximum number of participants.
    #[arg(long)]
    pub participants: u32,
    /// Enrollment deadline: RFC 3339 timestamp or YYYY-MM-DD (UTC midnight).
    #[arg(long)]
    pub deadline: String,
}

/// Filters for `chitfund list`.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only funds the current identity has joined.
    #[arg(long, conflicts_with = "created")]
    pub mine: bool,
    /// Only funds the current identity created.
    #[arg(long)]
    pub created: bool,
}

pub async fn create(
    service: &ChitFundService,
    args: &CreateArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = CreateFundRequest {
        title: args.title.clone(),
        description: args.description.clone(),
        total_amount: args.total.clone(),
        installment_amount: args.installment.clone(),
        installment_period_secs: args
            .period_days
            .checked_mul(SECONDS_PER_DAY)
            .ok_or("period is too long")?,
        participant_capacity: args.participants,
        deadline: parse_deadline(&args.deadline)?,
    };
    let id = service.create_fund(&request).await?;
    match format {
        OutputFormat::Json => println!("{}", format_json(&serde_json::json!({ "id": id }))),
        OutputFormat::Table => println!("Created fund {}", id),
    }
    Ok(())
}

pub async fn join(
    service: &ChitFundService,
    id: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let index = service.join_fund(FundId(id)).await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            format_json(&serde_json::json!({ "id": id, "index": index }))
        ),
        OutputFormat::Table => println!("Joined fund #{} as participant {}", id, index),
    }
    Ok(())
}

pub async fn show(
    service: &ChitFundService,
    id: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let details = service.fund_details(FundId(id)).await?;
    match format {
        OutputFormat::Json => println!("{}", format_json(&details)),
        OutputFormat::Table => print_details(&details),
    }
    Ok(())
}

pub async fn list(
    service: &ChitFundService,
    args: &ListArgs,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let funds = if args.mine {
        service.my_funds()?
    } else if args.created {
        service.created_funds()?
    } else {
        service.funds()
    };
    let details: Vec<FundDetails> = funds.iter().map(|f| service.details_of(f)).collect();
    let rows: Vec<FundRow> = details.iter().map(FundRow::from).collect();
    emit(format, &details, &rows);
    Ok(())
}

pub async fn participants(
    service: &ChitFundService,
    id: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let view: Vec<ParticipantView> = service.participants(FundId(id)).await?;
    let rows: Vec<ParticipantRow> = view.iter().map(ParticipantRow::from).collect();
    emit(format, &view, &rows);
    Ok(())
}

pub async fn schedule(
    service: &ChitFundService,
    id: u64,
    limit: usize,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let slots = service.schedule(FundId(id), limit).await?;
    let converter = service.converter();
    let rows: Vec<CycleRow> = slots
        .iter()
        .map(|s| CycleRow::new(s, converter.to_display(s.expected_contribution)))
        .collect();
    emit(format, &slots, &rows);
    Ok(())
}

pub async fn accounting(
    service: &ChitFundService,
    id: u64,
    received: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let accounting = service.cycle_accounting(FundId(id), received).await?;
    match (format, accounting) {
        (OutputFormat::Json, acct) => println!("{}", format_json(&acct)),
        (OutputFormat::Table, None) => println!("Fund #{} is not in an active cycle.", id),
        (OutputFormat::Table, Some(acct)) => {
            let c = service.converter();
            println!("Cycle {} of fund #{}", acct.cycle, id);
            println!("  Expected:    {}", c.to_display(acct.expected));
            println!("  Received:    {}", c.to_display(acct.received));
            println!("  Outstanding: {}", c.to_display(acct.outstanding));
        }
    }
    Ok(())
}

fn print_details(d: &FundDetails) {
    println!("Fund {}: {}", d.id, d.title);
    println!("{}", "-".repeat(d.title.len() + 8));
    println!("  {}", d.description);
    println!();
    println!("  Creator:      {}{}", d.creator, if d.is_creator { " (you)" } else { "" });
    println!("  Total:        {}", d.total_amount);
    println!("  Installment:  {}", d.installment_amount);
    println!("  Period:       {} days", d.installment_period_secs / SECONDS_PER_DAY);
    println!("  Seats:        {}/{}", d.enrolled, d.capacity);
    println!("  Deadline:     {}", d.deadline);
    println!("  Created:      {}", d.created_at);
    println!("  Phase:        {}", d.phase);
    println!("  Cycle:        {}/{}", d.current_cycle, d.total_cycles);
    if d.is_participant {
        println!("  You are enrolled in this fund.");
    }
}

/// Parse a deadline given as RFC 3339 or a bare `YYYY-MM-DD` date.
pub fn parse_deadline(input: &str) -> Result<i64, String> {
    let input = input.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp());
    }
    chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| format!("invalid deadline {:?}: expected RFC 3339 or YYYY-MM-DD", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_deadline_date() {
        assert_eq!(parse_deadline("2024-01-01").unwrap(), 1_704_067_200);
    }

    #[test]
    fn test_parse_deadline_rfc3339() {
        assert_eq!(parse_deadline("2024-01-01T01:00:00+01:00").unwrap(), 1_704_067_200);
    }

    #[test]
    fn test_parse_deadline_rejects_garbage() {
        assert!(parse_deadline("next tuesday").is_err());
    }
}
