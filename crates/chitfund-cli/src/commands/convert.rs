// crates/chitfund-cli/src/commands/convert.rs
//
// `chitfund convert {to-subunit, to-display}`: amount conversion helpers.

use clap::Subcommand;

use chitfund_core::AmountConverter;

/// Amount conversion subcommands.
#[derive(Debug, Subcommand)]
pub enum ConvertCmd {
    /// Convert a display amount (e.g. "1.5") to integer subunits.
    ToSubunit {
        /// Decimal amount in display units.
        amount: String,
    },
    /// Convert integer subunits to a display amount.
    ToDisplay {
        /// Amount in subunits.
        subunits: u128,
    },
}

/// Run the convert subcommand.
pub fn run(cmd: &ConvertCmd, converter: &AmountConverter) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConvertCmd::ToSubunit { amount } => {
            println!("{}", converter.to_subunit(amount)?);
        }
        ConvertCmd::ToDisplay { subunits } => {
            println!("{}", converter.to_display(*subunits));
        }
    }
    Ok(())
}
