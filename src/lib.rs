//! Atomic conditional-token arbitrage execution core.
//!
//! Executes caller-supplied multi-leg trading plans against external
//! liquidity venues and a conditional-token split/merge mechanism, as
//! all-or-nothing atomic units. Per-leg outputs are unknown until
//! execution, so payloads are patched at byte offsets with amounts
//! discovered mid-run, and correctness is enforced purely by before/after
//! balance accounting — never by trusting a called venue's return value.
//!
//! The crate decides nothing about whether a trade is a good idea: it runs
//! the plan it is given and rejects it if the realized deltas violate the
//! caller's bounds.

mod batch;

pub mod chain;
pub mod config;
pub mod error;
pub mod executor;
pub mod patch;
pub mod report;
pub mod sim;
pub mod types;
pub mod venue;

pub use config::ArbConfig;
pub use error::{ExecError, VenueError};
pub use executor::Executor;
pub use patch::{min_out_from_slippage, patch_payload, patch_template};
pub use report::{print_buy_report, print_sell_report, BuyReport, SellReport};
pub use types::{
    BuyArgs, CallDescriptor, Leg, LegSwap, PatchTemplate, SellArgs, TradeBatch, BATCH_CAPACITY,
    BPS_DENOMINATOR,
};
pub use venue::{ensure_allowance, Checkpoint, Venue};
