//! Data model for batch plans and arbitrage runs.
//!
//! All quantities are raw `U256` token units; the core never converts to
//! human denominations. Plans are fully serde-serializable so an off-chain
//! planner can hand the executor a JSON plan.

use alloy::primitives::{Address, Bytes, I256, U256};
use serde::{Deserialize, Serialize};

/// Maximum number of calls a batch may carry.
pub const BATCH_CAPACITY: usize = 10;

/// Basis-point denominator: 10_000 = 100.00%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Width of an ABI word.
pub const WORD_BYTES: usize = 32;

/// One side of a conditional pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leg {
    Yes,
    No,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Yes => write!(f, "YES"),
            Leg::No => write!(f, "NO"),
        }
    }
}

/// One slot of a batch: a target and the payload to send it.
///
/// A zero target marks an unused slot; the runner skips it without error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub target: Address,
    pub payload: Bytes,
}

impl CallDescriptor {
    pub fn new(target: Address, payload: Bytes) -> Self {
        Self { target, payload }
    }

    /// An unused slot, skipped by the runner.
    pub fn empty() -> Self {
        Self {
            target: Address::ZERO,
            payload: Bytes::new(),
        }
    }

    pub fn is_empty_slot(&self) -> bool {
        self.target == Address::ZERO
    }
}

/// A delta-verified batch plan: an ordered call list plus the accounting
/// bounds the realized balance deltas must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeBatch {
    pub calls: Vec<CallDescriptor>,
    /// Token the batch is expected to consume, exactly.
    pub token_in: Address,
    /// Token the batch is expected to produce.
    pub token_out: Address,
    /// Spender granted allowance over `token_in` before the batch runs.
    /// Zero skips the allowance step.
    pub spender: Address,
    /// Default input amount; overridable per execution.
    pub amount_in: U256,
    /// Absolute floor on the realized output. Zero disables it.
    pub min_out: U256,
    /// Index of the call whose payload receives the runtime amount.
    pub patch_index: Option<usize>,
    /// Byte offset of the amount word inside the patched payload.
    pub amount_offset: usize,
    /// Byte offset of the minimum-output word, when the payload carries one.
    pub min_out_offset: Option<usize>,
    /// Slippage tolerance in hundredths of a percent, `[0, 10000)`.
    pub slippage_bps: u32,
}

/// Template for a single-leg swap whose amount is only known mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchTemplate {
    pub target: Address,
    pub payload: Bytes,
    /// Native value forwarded with the call.
    pub value: U256,
    pub amount_offset: usize,
    pub min_out_offset: Option<usize>,
    pub slippage_bps: u32,
}

/// A patched single-leg swap plus its local accounting bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegSwap {
    /// Spender granted allowance over the input token. Zero skips it.
    pub spender: Address,
    pub swap: PatchTemplate,
    /// Absolute floor on the realized output. Zero disables it.
    pub min_out: U256,
}

/// Plan for one SELL run: settlement -> trade asset -> split -> per-leg
/// swaps -> merge -> leftover liquidation, under a signed profit floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellArgs {
    /// Settlement-asset amount fed to the opening batch.
    pub amount_in: U256,
    /// Batch converting settlement asset into the trade asset.
    pub buy_company: TradeBatch,
    /// Position-management venue spender for split/merge allowances.
    pub position_router: Address,
    pub market: Address,
    /// Trade asset ("company token").
    pub company: Address,
    /// Settlement asset profitability is measured in.
    pub settlement: Address,
    pub yes_company: Address,
    pub no_company: Address,
    pub yes_settlement: Address,
    pub no_settlement: Address,
    /// yes_company -> yes_settlement
    pub swap_yes: LegSwap,
    /// no_company -> no_settlement
    pub swap_no: LegSwap,
    /// Leftover yes_settlement -> settlement, sized at run time.
    pub liquidate_yes: LegSwap,
    /// Leftover no_settlement -> settlement, sized at run time.
    pub liquidate_no: LegSwap,
    /// Signed floor on the settlement-asset net change. May be negative
    /// for bounded-loss testing.
    pub min_net: I256,
}

/// Plan for one BUY run: split settlement -> per-leg swaps into the trade
/// asset's legs -> merge -> patched liquidation batch, same profit floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyArgs {
    /// Settlement-asset amount split into legs.
    pub amount_in: U256,
    pub position_router: Address,
    pub market: Address,
    pub company: Address,
    pub settlement: Address,
    pub yes_company: Address,
    pub no_company: Address,
    pub yes_settlement: Address,
    pub no_settlement: Address,
    /// yes_settlement -> yes_company
    pub swap_yes: LegSwap,
    /// no_settlement -> no_company
    pub swap_no: LegSwap,
    /// Batch converting the merged trade asset back to settlement; its
    /// amount is overridden with the merge quantity.
    pub sell_company: TradeBatch,
    pub min_net: I256,
}

/// `after - before` as a signed quantity. Saturates at the `I256` range
/// ends, which is far beyond any real token supply.
pub fn signed_delta(before: U256, after: U256) -> I256 {
    if after >= before {
        I256::try_from(after - before).unwrap_or(I256::MAX)
    } else {
        I256::try_from(before - after)
            .map(|v| -v)
            .unwrap_or(I256::MIN)
    }
}
