//! NavFund Ledger - Double-entry accounting core
//!
//! Every cash movement of the fund is recorded here. Balances are never
//! stored by hand; they are derived from committed lines.
//!
//! # Key Types
//! - `AccountRegistry`: get-or-create chart of accounts
//! - `NewEntry` / `EntryBuilder`: an entry before posting
//! - `LedgerEntry` / `LedgerLine`: committed, immutable records
//! - `LedgerService`: pool-level facade, one transaction per call

pub mod engine;
pub mod entry;
pub mod error;
pub mod registry;
pub mod service;
pub mod validation;

pub use engine::{
    account_balance, balance_sheet, get_entry, list_entries, normal_balance, post_entry,
    reverse_entry, verify_integrity, AccountBalance, BalanceDrift, BalanceSheet,
    BalanceSheetLine, BalanceSheetSection, EntryImbalance, IntegrityReport,
};
pub use entry::{EntryBuilder, LedgerEntry, LedgerLine, NewEntry, Posting, REVERSAL_REFERENCE};
pub use error::{LedgerError, LedgerResult};
pub use registry::AccountRegistry;
pub use service::LedgerService;
pub use validation::{validate_balance, validate_lines};
