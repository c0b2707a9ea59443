//! Run reports.
//!
//! Every intermediate quantity of a pipeline run, so an operator can audit
//! the accounting of a completed arbitrage without re-deriving it from
//! venue state.

use alloy::primitives::{I256, U256};
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::types::Leg;

/// Outcome of one SELL run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellReport {
    pub amount_in: U256,
    /// Trade asset bought by the opening batch.
    pub company_bought: U256,
    pub yes_minted: U256,
    pub no_minted: U256,
    /// Settlement-leg receipts of the per-leg swaps.
    pub yes_out: U256,
    pub no_out: U256,
    pub merged: U256,
    pub leftover_leg: Option<Leg>,
    pub leftover: U256,
    pub leftover_liquidated: U256,
    /// Signed settlement-asset net change across the run.
    pub net: I256,
    pub elapsed_ms: u128,
}

/// Outcome of one BUY run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyReport {
    pub amount_in: U256,
    pub yes_minted: U256,
    pub no_minted: U256,
    /// Trade-asset-leg receipts of the per-leg swaps.
    pub yes_out: U256,
    pub no_out: U256,
    pub merged: U256,
    /// Settlement received by the closing liquidation batch.
    pub settlement_received: U256,
    /// Trade-asset leg stranded after the merge; this flow does not
    /// liquidate it.
    pub leftover_leg: Option<Leg>,
    pub leftover: U256,
    pub net: I256,
    pub elapsed_ms: u128,
}

pub fn print_sell_report(report: &SellReport) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    println!();
    println!("===============================================================");
    println!("  SELL FLOW REPORT | {}", timestamp);
    println!("===============================================================");
    println!();
    println!("  Settlement In:   {}", report.amount_in);
    println!("  Company Bought:  {}", report.company_bought);
    println!("  Split Minted:    YES {} / NO {}", report.yes_minted, report.no_minted);
    println!("  Leg Swaps Out:   YES {} / NO {}", report.yes_out, report.no_out);
    println!("  Merged:          {}", report.merged);
    match report.leftover_leg {
        Some(leg) => println!(
            "  Leftover:        {} on {} leg, liquidated for {}",
            report.leftover, leg, report.leftover_liquidated
        ),
        None => println!("  Leftover:        none"),
    }
    println!();
    let sign = if report.net >= I256::ZERO { "+" } else { "" };
    println!("  Net:             {}{}", sign, report.net);
    println!("  Time:            {} ms", report.elapsed_ms);
    println!();
    println!("===============================================================");
}

pub fn print_buy_report(report: &BuyReport) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");

    println!();
    println!("===============================================================");
    println!("  BUY FLOW REPORT | {}", timestamp);
    println!("===============================================================");
    println!();
    println!("  Settlement In:   {}", report.amount_in);
    println!("  Split Minted:    YES {} / NO {}", report.yes_minted, report.no_minted);
    println!("  Leg Swaps Out:   YES {} / NO {}", report.yes_out, report.no_out);
    println!("  Merged:          {}", report.merged);
    println!("  Settlement Out:  {}", report.settlement_received);
    match report.leftover_leg {
        Some(leg) => println!(
            "  Leftover:        {} stranded on {} leg (not liquidated by this flow)",
            report.leftover, leg
        ),
        None => println!("  Leftover:        none"),
    }
    println!();
    let sign = if report.net >= I256::ZERO { "+" } else { "" };
    println!("  Net:             {}{}", sign, report.net);
    println!("  Time:            {} ms", report.elapsed_ms);
    println!();
    println!("===============================================================");
}
