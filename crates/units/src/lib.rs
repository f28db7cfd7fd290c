//! NavFund Units - NAV and ownership accounting
//!
//! Converts cash movements into units:
//! - deposits issue `amount / NAV` units when approved
//! - withdrawals burn `gross amount / NAV` units when approved
//!
//! Unit balances are derived from the write-once snapshots stored on
//! deposit and withdrawal records; there is no separate units table.

pub mod error;
pub mod issuance;
pub mod nav;
pub mod service;

pub use error::{UnitsError, UnitsResult};
pub use issuance::{burn_units, issue_units, Burn, Issuance, DEPOSIT_REFERENCE};
pub use nav::{
    calculate_nav, equity_balance, get_investor_units, investor_units_balance,
    total_units_outstanding, InvestorUnits, NavSnapshot,
};
pub use service::UnitsService;
