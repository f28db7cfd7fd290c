//! NavFund Workflow - admin-driven state machines over the fund core
//!
//! Each workflow call validates its command, runs every mutation in one
//! transaction and appends an audit record in that same transaction.
//!
//! # Services
//! - `InvestorService`: registry of investors
//! - `DepositWorkflow`: create, approve (issues units), reject
//! - `WithdrawalWorkflow`: create (locks fee quote), approve (two-phase
//!   payout), reject, mark paid
//! - `CorrectionService`: manual entries and reversals
//! - `FundQueries`: balances, NAV, integrity, balance sheet, audit log
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = FundContext::new(&db, FundConfig::default(), FeeConfig::default());
//! let deposit = ctx.deposits().create(cmd, &Origin::system()).await?;
//! ctx.deposits()
//!     .approve(ApproveDeposit { deposit_id: deposit.id, actor_id: "admin".into() }, &origin)
//!     .await?;
//! ```

pub mod commands;
pub mod context;
pub mod corrections;
pub mod deposits;
pub mod error;
pub mod gateway;
pub mod investors;
pub mod metrics;
pub mod queries;
pub mod withdrawals;

pub use commands::{
    ApproveDeposit, ApproveWithdrawal, CreateDeposit, CreateWithdrawal, ManualEntry, ManualLine,
    MarkWithdrawalPaid, RegisterInvestor, RejectDeposit, RejectWithdrawal, ReverseEntry,
    SetInvestorActive,
};
pub use context::FundContext;
pub use corrections::{CorrectionService, MANUAL_REFERENCE};
pub use deposits::{DepositApproval, DepositWorkflow};
pub use error::{WorkflowError, WorkflowResult};
pub use gateway::{
    ManualPayout, PayoutError, PayoutGateway, PayoutReceipt, PayoutRequest, ScriptedOutcome,
    ScriptedPayout,
};
pub use investors::InvestorService;
pub use metrics::{read_platform_metrics, FixedMetrics, MetricsSource, StoreMetrics};
pub use queries::{FundIntegrityReport, FundQueries};
pub use withdrawals::{WithdrawalApproval, WithdrawalWorkflow, WITHDRAWAL_REFERENCE};
