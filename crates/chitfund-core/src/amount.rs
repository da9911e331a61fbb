// crates/chitfund-core/src/amount.rs
//
// Exact conversion between display amounts and integer subunits.
//
// Display amounts are decimal strings ("1.5"), subunits are u128 integers
// (with the default 18 decimals, 1 unit = 10^18 subunits, the ETH/wei
// relationship). All arithmetic is integer arithmetic; no floating point is
// involved anywhere on the conversion path.

use serde::{Deserialize, Serialize};

use crate::error::ChitFundError;

/// Decimal places used when none are configured (ETH/wei).
pub const DEFAULT_DECIMALS: u32 = 18;

/// Largest supported decimal precision. 10^38 still fits in a u128.
pub const MAX_DECIMALS: u32 = 38;

/// Converts between display amounts, subunits, and per-cycle units.
///
/// Serializes as its bare decimal count; deserializing goes through
/// [`AmountConverter::new`] so the precision bound always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AmountConverter {
    decimals: u32,
}

impl AmountConverter {
    /// Create a converter with the given number of fractional decimal places.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidParameters` if `decimals` exceeds
    /// `MAX_DECIMALS`.
    pub fn new(decimals: u32) -> Result<Self, ChitFundError> {
        if decimals > MAX_DECIMALS {
            return Err(ChitFundError::invalid(
                "decimals",
                format!("at most {} decimal places are supported", MAX_DECIMALS),
            ));
        }
        Ok(Self { decimals })
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Number of subunits in one display unit (10^decimals).
    pub fn scale(&self) -> u128 {
        10u128.pow(self.decimals)
    }

    /// Parse a non-negative decimal display string into subunits.
    ///
    /// Accepts `"12"`, `"12.5"`, `"12."` and `".5"`. Trailing fractional zeros
    /// beyond the configured precision are tolerated (`"1.500"` with 2
    /// decimals is fine); any non-zero digit beyond it is rejected.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidAmount` for malformed input, excess
    /// precision, or values that overflow a u128.
    pub fn to_subunit(&self, display: &str) -> Result<u128, ChitFundError> {
        let input = display.trim();
        let fail = |reason: &str| ChitFundError::InvalidAmount {
            input: display.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(fail("empty amount"));
        }

        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(fail("no digits"));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(fail("expected a non-negative decimal number"));
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > self.decimals as usize {
            return Err(fail(&format!(
                "more than {} decimal places",
                self.decimals
            )));
        }

        let overflow = || fail("amount too large");

        let whole_value = parse_digits(whole).ok_or_else(overflow)?;
        let frac_value = parse_digits(frac).ok_or_else(overflow)?;
        // Pad the fractional digits out to the full precision.
        let frac_scale = 10u128.pow(self.decimals - frac.len() as u32);

        whole_value
            .checked_mul(self.scale())
            .and_then(|w| w.checked_add(frac_value * frac_scale))
            .ok_or_else(overflow)
    }

    /// Render subunits as a decimal display string.
    ///
    /// Trailing fractional zeros are trimmed; whole amounts have no decimal
    /// point at all (`1_500_000_000_000_000_000` renders as `"1.5"`,
    /// `2 * 10^18` as `"2"`).
    pub fn to_display(&self, subunit: u128) -> String {
        let whole = subunit / self.scale();
        let frac = subunit % self.scale();
        if frac == 0 {
            return whole.to_string();
        }
        let frac_str = format!("{:0width$}", frac, width = self.decimals as usize);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }

    /// Express a subunit amount as a count of `reference_subunit_per_unit`
    /// units, rounding down.
    ///
    /// With the installment amount as the reference this yields the number of
    /// cycles a total amount covers.
    ///
    /// # Errors
    /// Returns `ChitFundError::InvalidAmount` if the reference unit is zero.
    pub fn to_canonical_cycle_unit(
        &self,
        subunit: u128,
        reference_subunit_per_unit: u128,
    ) -> Result<u128, ChitFundError> {
        if reference_subunit_per_unit == 0 {
            return Err(ChitFundError::InvalidAmount {
                input: self.to_display(subunit),
                reason: "reference unit must be greater than zero".to_string(),
            });
        }
        Ok(subunit / reference_subunit_per_unit)
    }
}

impl TryFrom<u32> for AmountConverter {
    type Error = ChitFundError;

    fn try_from(decimals: u32) -> Result<Self, Self::Error> {
        Self::new(decimals)
    }
}

impl From<AmountConverter> for u32 {
    fn from(converter: AmountConverter) -> Self {
        converter.decimals
    }
}

impl Default for AmountConverter {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
        }
    }
}

/// Whether `value` is a whole, non-zero-unit multiple of `unit`.
pub fn is_exact_multiple(value: u128, unit: u128) -> bool {
    unit != 0 && value % unit == 0
}

/// Parse ASCII digits into a u128, returning `None` on overflow.
/// An empty string parses as zero.
fn parse_digits(digits: &str) -> Option<u128> {
    digits.bytes().try_fold(0u128, |acc, b| {
        acc.checked_mul(10)?.checked_add(u128::from(b - b'0'))
    })
}
