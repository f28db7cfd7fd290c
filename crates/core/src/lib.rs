//! NavFund Core - Domain types
//!
//! Fundamental types shared by every NavFund crate:
//! - `Amount`: Non-negative fixed-point decimal for cash and unit quantities
//! - Status enums for accounts, deposits and withdrawals
//! - `Clock`: injectable time source
//! - Persisted records: `Account`, `Investor`, `Deposit`, `Withdrawal`, `AuditLogEntry`
//! - `FundConfig`: fund-level tunables (baseline NAV, cooldown, reason length)

pub mod amount;
pub mod clock;
pub mod config;
pub mod records;
pub mod types;

pub use amount::{
    round_cash, round_nav, round_pct, round_units, Amount, AmountError, CASH_SCALE, NAV_SCALE,
    PCT_SCALE, UNIT_SCALE,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, FundConfig};
pub use records::{Account, AuditLogEntry, Deposit, Investor, Withdrawal};
pub use types::{AccountType, DepositStatus, FeeMode, Origin, Side, WithdrawalStatus};
