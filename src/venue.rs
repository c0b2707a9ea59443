//! The venue boundary: every external surface the core touches.
//!
//! All verification in this crate is balance-delta based. The core never
//! trusts a callee's return payload; it re-reads balances through this
//! trait immediately before and after every dispatch that might change
//! them. Implementations must not cache balance reads.

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tracing::debug;

use crate::error::VenueError;

/// Opaque handle to a venue state snapshot. Reverting to a checkpoint
/// discards every state change made after it was taken, including
/// allowance changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(pub U256);

/// External interface consumed by the execution core.
///
/// The implementation knows the orchestrating identity: balances and
/// allowances are always those of that identity, and dispatched calls are
/// sent from it.
#[async_trait]
pub trait Venue: Send {
    /// Current balance of `token` held by the orchestrating identity.
    async fn balance_of(&self, token: Address) -> Result<U256, VenueError>;

    /// Current allowance granted by the orchestrating identity to `spender`.
    async fn allowance(&self, token: Address, spender: Address) -> Result<U256, VenueError>;

    /// Set the allowance for `spender` to exactly `amount`.
    async fn approve(
        &mut self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), VenueError>;

    /// Dispatch `payload` to `target` with native `value` attached. The
    /// return payload is surfaced but never interpreted by the core; on
    /// failure the child's revert payload is carried back unmodified.
    async fn execute(
        &mut self,
        target: Address,
        payload: &Bytes,
        value: U256,
    ) -> Result<Bytes, VenueError>;

    /// Split `amount` of `collateral` into its conditional pair at the
    /// position venue reached through `router`.
    async fn split_position(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError>;

    /// Merge equal `amount`s of both conditional legs back into `collateral`.
    async fn merge_positions(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError>;

    /// Snapshot the venue state.
    async fn checkpoint(&mut self) -> Result<Checkpoint, VenueError>;

    /// Restore the state captured by `checkpoint`.
    async fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), VenueError>;

    /// Discard `checkpoint` without restoring it, once the run it guarded
    /// has committed. Venues whose backend cannot drop a snapshot without
    /// reverting may leave this a no-op.
    async fn release(&mut self, _checkpoint: Checkpoint) -> Result<(), VenueError> {
        Ok(())
    }
}

/// Idempotent ensure-sufficient-allowance for a (token, spender) pair.
///
/// No-op when the current allowance covers `need`. Otherwise resets a
/// nonzero allowance to zero before raising it to `U256::MAX` — some
/// venues reject a direct nonzero-to-nonzero change.
pub async fn ensure_allowance<V: Venue>(
    venue: &mut V,
    token: Address,
    spender: Address,
    need: U256,
) -> Result<(), VenueError> {
    let current = venue.allowance(token, spender).await?;
    if current >= need {
        return Ok(());
    }
    if !current.is_zero() {
        debug!(%token, %spender, %current, "resetting allowance to zero first");
        venue.approve(token, spender, U256::ZERO).await?;
    }
    debug!(%token, %spender, "raising allowance to max");
    venue.approve(token, spender, U256::MAX).await?;
    Ok(())
}
