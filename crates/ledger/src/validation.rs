//! Double-entry validation rules

use crate::entry::Posting;
use crate::error::LedgerError;
use navfund_core::Side;
use rust_decimal::Decimal;

/// Validation result with detailed error
pub type ValidationResult = Result<(), LedgerError>;

/// Check that a set of lines can be committed as one entry:
/// at least two lines, every amount positive, both sides present,
/// and debit total equal to credit total.
pub fn validate_lines(lines: &[Posting]) -> ValidationResult {
    if lines.len() < 2 {
        return Err(LedgerError::InsufficientLines(lines.len()));
    }

    for (idx, line) in lines.iter().enumerate() {
        if line.amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount {
                line_no: idx + 1,
                amount: line.amount,
            });
        }
    }

    let has_debit = lines.iter().any(|l| l.side == Side::Debit);
    let has_credit = lines.iter().any(|l| l.side == Side::Credit);
    if !has_debit || !has_credit {
        return Err(LedgerError::MissingSide);
    }

    validate_balance(lines)
}

/// Debit total must equal credit total
pub fn validate_balance(lines: &[Posting]) -> ValidationResult {
    let (debits, credits) = side_totals(lines.iter().map(|l| (l.side, l.amount)));
    if debits != credits {
        return Err(LedgerError::Unbalanced { debits, credits });
    }
    Ok(())
}

/// Sum amounts per side
pub fn side_totals(lines: impl IntoIterator<Item = (Side, Decimal)>) -> (Decimal, Decimal) {
    lines
        .into_iter()
        .fold((Decimal::ZERO, Decimal::ZERO), |(dr, cr), (side, amount)| match side {
            Side::Debit => (dr + amount, cr),
            Side::Credit => (dr, cr + amount),
        })
}
