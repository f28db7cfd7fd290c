//! Ledger entries and their lines
//!
//! A line posts one amount to one side of one account. An entry groups
//! lines whose debit and credit totals are equal.

use crate::error::{LedgerError, LedgerResult};
use crate::validation::validate_lines;
use chrono::{DateTime, Utc};
use navfund_core::Side;
use navfund_persistence::{parse_decimal, LedgerEntryRow, LedgerLineRow, PersistenceError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reference type stamped on reversal entries
pub const REVERSAL_REFERENCE: &str = "REVERSAL";

/// A line to be posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub account_id: String,
    pub side: Side,
    pub amount: Decimal,
    /// Attributes a shared account's movement to one investor
    pub user_id: Option<String>,
    pub description: Option<String>,
}

impl Posting {
    pub fn debit(account_id: impl Into<String>, amount: Decimal) -> Self {
        Self::new(account_id, Side::Debit, amount)
    }

    pub fn credit(account_id: impl Into<String>, amount: Decimal) -> Self {
        Self::new(account_id, Side::Credit, amount)
    }

    fn new(account_id: impl Into<String>, side: Side, amount: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            side,
            amount,
            user_id: None,
            description: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A validated entry ready to be posted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub description: String,
    pub reference_type: String,
    pub reference_id: String,
    pub created_by: String,
    pub reversal_of_id: Option<String>,
    pub lines: Vec<Posting>,
}

impl NewEntry {
    /// Re-run line validation; used by the posting engine before any write
    pub fn validate(&self) -> LedgerResult<()> {
        if self.description.trim().is_empty() {
            return Err(LedgerError::EmptyDescription);
        }
        validate_lines(&self.lines)
    }
}

/// Builder for [`NewEntry`]
#[derive(Debug, Default)]
pub struct EntryBuilder {
    description: String,
    reference_type: String,
    reference_id: String,
    created_by: String,
    reversal_of_id: Option<String>,
    lines: Vec<Posting>,
}

impl EntryBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = reference_type.into();
        self.reference_id = reference_id.into();
        self
    }

    pub fn created_by(mut self, actor_id: impl Into<String>) -> Self {
        self.created_by = actor_id.into();
        self
    }

    pub fn reversal_of(mut self, entry_id: impl Into<String>) -> Self {
        self.reversal_of_id = Some(entry_id.into());
        self
    }

    pub fn line(mut self, posting: Posting) -> Self {
        self.lines.push(posting);
        self
    }

    pub fn debit(self, account_id: impl Into<String>, amount: Decimal) -> Self {
        self.line(Posting::debit(account_id, amount))
    }

    pub fn credit(self, account_id: impl Into<String>, amount: Decimal) -> Self {
        self.line(Posting::credit(account_id, amount))
    }

    pub fn build(self) -> LedgerResult<NewEntry> {
        let entry = NewEntry {
            description: self.description,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            created_by: self.created_by,
            reversal_of_id: self.reversal_of_id,
            lines: self.lines,
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// A committed line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub line_no: i64,
    pub account_id: String,
    pub side: Side,
    pub amount: Decimal,
    pub user_id: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<LedgerLineRow> for LedgerLine {
    type Error = LedgerError;

    fn try_from(row: LedgerLineRow) -> Result<Self, Self::Error> {
        let side = Side::from_str(&row.side)
            .map_err(|_| PersistenceError::invalid_enum("side", &row.side))?;
        Ok(Self {
            amount: parse_decimal("amount", &row.amount)?,
            side,
            line_no: row.line_no,
            account_id: row.account_id,
            user_id: row.user_id,
            description: row.description,
        })
    }
}

/// A committed, immutable entry with its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub description: String,
    pub reference_type: String,
    pub reference_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub reversal_of_id: Option<String>,
    pub lines: Vec<LedgerLine>,
}

impl LedgerEntry {
    pub fn from_rows(entry: LedgerEntryRow, lines: Vec<LedgerLineRow>) -> LedgerResult<Self> {
        Ok(Self {
            lines: lines
                .into_iter()
                .map(LedgerLine::try_from)
                .collect::<LedgerResult<_>>()?,
            id: entry.id,
            description: entry.description,
            reference_type: entry.reference_type,
            reference_id: entry.reference_id,
            created_by: entry.created_by,
            created_at: entry.created_at,
            reversal_of_id: entry.reversal_of_id,
        })
    }

    pub fn total_debits(&self) -> Decimal {
        self.total_for(Side::Debit)
    }

    pub fn total_credits(&self) -> Decimal {
        self.total_for(Side::Credit)
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    fn total_for(&self, side: Side) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.side == side)
            .map(|l| l.amount)
            .sum()
    }

    /// Lines of the compensating entry: same accounts, sides swapped
    pub fn reversed_postings(&self) -> Vec<Posting> {
        self.lines
            .iter()
            .map(|line| Posting {
                account_id: line.account_id.clone(),
                side: line.side.opposite(),
                amount: line.amount,
                user_id: line.user_id.clone(),
                description: line.description.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_valid_entry() {
        let entry = EntryBuilder::new("Deposit approved")
            .reference("DEPOSIT", "dep-1")
            .created_by("admin")
            .line(Posting::debit("bank", dec!(1000.00)).for_user("alice"))
            .line(Posting::credit("equity", dec!(1000.00)).for_user("alice"))
            .build()
            .unwrap();

        assert_eq!(entry.lines.len(), 2);
        assert_eq!(entry.lines[0].user_id.as_deref(), Some("alice"));
        assert!(entry.reversal_of_id.is_none());
    }

    #[test]
    fn test_builder_rejects_unbalanced() {
        let result = EntryBuilder::new("Broken")
            .debit("bank", dec!(100))
            .credit("equity", dec!(99.99))
            .build();

        assert!(matches!(
            result,
            Err(LedgerError::Unbalanced { debits, credits })
                if debits == dec!(100) && credits == dec!(99.99)
        ));
    }

    #[test]
    fn test_builder_rejects_empty_description() {
        let result = EntryBuilder::new("  ")
            .debit("bank", dec!(1))
            .credit("equity", dec!(1))
            .build();
        assert!(matches!(result, Err(LedgerError::EmptyDescription)));
    }

    #[test]
    fn test_reversed_postings_swap_sides() {
        let entry = LedgerEntry {
            id: "e-1".to_string(),
            description: "Withdrawal".to_string(),
            reference_type: "WITHDRAWAL".to_string(),
            reference_id: "wd-1".to_string(),
            created_by: "admin".to_string(),
            created_at: Utc::now(),
            reversal_of_id: None,
            lines: vec![
                LedgerLine {
                    line_no: 1,
                    account_id: "equity".to_string(),
                    side: Side::Debit,
                    amount: dec!(200),
                    user_id: Some("alice".to_string()),
                    description: None,
                },
                LedgerLine {
                    line_no: 2,
                    account_id: "bank".to_string(),
                    side: Side::Credit,
                    amount: dec!(200),
                    user_id: Some("alice".to_string()),
                    description: None,
                },
            ],
        };
        assert!(entry.is_balanced());

        let reversed = entry.reversed_postings();
        assert_eq!(reversed[0].side, Side::Credit);
        assert_eq!(reversed[1].side, Side::Debit);
        assert_eq!(reversed[0].user_id.as_deref(), Some("alice"));
    }
}
