//! Error taxonomy for the execution core.
//!
//! Every failure mode the pipeline can hit is a distinct variant so that an
//! off-chain retry/alerting layer can classify root cause without parsing
//! free text. Revert payloads from called venues are carried through
//! unmodified.

use alloy::primitives::{Address, Bytes, I256, U256};
use alloy::sol_types::SolValue;
use thiserror::Error;

use crate::types::Leg;

/// Failure surfaced by a [`Venue`](crate::venue::Venue) implementation.
#[derive(Debug, Error)]
pub enum VenueError {
    /// The called target reverted. `data` is the child's failure payload,
    /// byte-for-byte as the venue returned it.
    #[error("call to {target} reverted: {}", render_revert(.data))]
    Reverted { target: Address, data: Bytes },

    /// An `approve` call did not succeed.
    #[error("approve({spender}, ..) on token {token} failed")]
    ApproveFailed { token: Address, spender: Address },

    /// The venue backend itself failed (transport, RPC, serialization).
    #[error("venue transport error: {0}")]
    Transport(String),

    /// `revert_to` was given a checkpoint the venue does not know.
    #[error("unknown checkpoint {0}")]
    UnknownCheckpoint(U256),
}

/// Failure raised by the execution pipeline itself.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("trade amount is zero")]
    ZeroAmount,

    #[error("batch has {count} calls, capacity is {capacity}")]
    BatchOverflow { count: usize, capacity: usize },

    #[error("patch index {index} out of range for batch of {count} calls")]
    PatchIndexOutOfRange { index: usize, count: usize },

    #[error("patch index {index} names an empty call slot")]
    PatchTargetEmpty { index: usize },

    #[error("payload of {len} bytes too short to hold a word at offset {offset}")]
    PayloadTooShort { offset: usize, len: usize },

    #[error("slippage {bps} bps is outside [0, 10000)")]
    SlippageOutOfRange { bps: u32 },

    #[error("spent {spent} of the input token, intended exactly {intended}")]
    SpendMismatch { intended: U256, spent: I256 },

    #[error("output token balance decreased during batch (before {before}, after {after})")]
    OutputDecreased { before: U256, after: U256 },

    #[error("received {received} of the output token, minimum is {min_out}")]
    OutputBelowMinimum { received: U256, min_out: U256 },

    #[error("{leg} leg minted {minted}, split of {amount} requires at least that much")]
    SplitUnderMinted { leg: Leg, minted: U256, amount: U256 },

    #[error("nothing to merge (yes={yes_amount}, no={no_amount})")]
    ZeroMerge { yes_amount: U256, no_amount: U256 },

    #[error("net change {net} below required floor {floor}")]
    ProfitBelowFloor { net: I256, floor: I256 },

    #[error(transparent)]
    Venue(#[from] VenueError),
}

/// Best-effort human rendering of a revert payload: decodes the standard
/// `Error(string)` shape, otherwise hex-dumps the raw bytes.
fn render_revert(data: &Bytes) -> String {
    if data.is_empty() {
        return "call failed (no revert data)".to_string();
    }
    // Error(string) selector
    if data.len() > 4 && data[..4] == [0x08, 0xc3, 0x79, 0xa0] {
        if let Ok(reason) = <String as SolValue>::abi_decode(&data[4..]) {
            return reason;
        }
    }
    format!("0x{}", hex::encode(data))
}
