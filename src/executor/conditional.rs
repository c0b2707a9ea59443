//! Split/merge accounting against the position-management venue.
//!
//! Splitting `n` units of collateral must mint at least `n` units of each
//! conditional leg (venues may over-mint from rounding, never under-mint).
//! Merging consumes equal amounts of both legs at the lesser of the two;
//! liquidating the leftover on the other leg is the caller's job.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::error::ExecError;
use crate::types::Leg;
use crate::venue::{ensure_allowance, Venue};

/// Split `amount` of `collateral` into its conditional pair. Returns the
/// measured minted deltas `(yes, no)`.
pub(crate) async fn split<V: Venue>(
    venue: &mut V,
    router: Address,
    market: Address,
    collateral: Address,
    yes: Address,
    no: Address,
    amount: U256,
) -> Result<(U256, U256), ExecError> {
    if amount.is_zero() {
        return Err(ExecError::ZeroAmount);
    }
    ensure_allowance(venue, collateral, router, amount).await?;

    let yes_before = venue.balance_of(yes).await?;
    let no_before = venue.balance_of(no).await?;
    venue
        .split_position(router, market, collateral, amount)
        .await?;
    let yes_minted = venue.balance_of(yes).await?.saturating_sub(yes_before);
    let no_minted = venue.balance_of(no).await?.saturating_sub(no_before);

    if yes_minted < amount {
        return Err(ExecError::SplitUnderMinted {
            leg: Leg::Yes,
            minted: yes_minted,
            amount,
        });
    }
    if no_minted < amount {
        return Err(ExecError::SplitUnderMinted {
            leg: Leg::No,
            minted: no_minted,
            amount,
        });
    }
    debug!(%amount, %yes_minted, %no_minted, "split complete");
    Ok((yes_minted, no_minted))
}

/// Merge both legs back into `collateral` at the lesser of the two leg
/// amounts. Returns the merged quantity; the leftover
/// `|yes_amount - no_amount|` stays on the larger leg.
pub(crate) async fn merge<V: Venue>(
    venue: &mut V,
    router: Address,
    market: Address,
    collateral: Address,
    yes: Address,
    no: Address,
    yes_amount: U256,
    no_amount: U256,
) -> Result<U256, ExecError> {
    let merged = yes_amount.min(no_amount);
    if merged.is_zero() {
        return Err(ExecError::ZeroMerge {
            yes_amount,
            no_amount,
        });
    }
    ensure_allowance(venue, yes, router, merged).await?;
    ensure_allowance(venue, no, router, merged).await?;
    venue
        .merge_positions(router, market, collateral, merged)
        .await?;
    debug!(%merged, %yes_amount, %no_amount, "merge complete");
    Ok(merged)
}
