//! BUY arbitrage pipeline.
//!
//! Mirror of the SELL flow with split and swap order inverted: split
//! settlement into its conditional legs, buy the trade asset's legs with
//! them, merge the lesser of the two trade-asset receipts, liquidate the
//! merged trade asset through the patched closing batch, then apply the
//! same signed profit guard.
//!
//! Known asymmetry, kept on purpose: unlike SELL, the leftover trade-asset
//! leg after the merge is not liquidated here. The stranded amount is
//! reported and logged so the operator can sweep it separately.

use std::time::Instant;

use alloy::primitives::U256;
use tracing::{info, warn};

use crate::error::ExecError;
use crate::executor::checked::{run_checked, swap_leg};
use crate::executor::conditional::{merge, split};
use crate::report::BuyReport;
use crate::types::{signed_delta, BuyArgs, Leg};
use crate::venue::Venue;

pub(crate) async fn run_buy<V: Venue>(
    venue: &mut V,
    args: &BuyArgs,
) -> Result<BuyReport, ExecError> {
    let start = Instant::now();
    let cur_before = venue.balance_of(args.settlement).await?;
    info!(amount = %args.amount_in, "buy flow: splitting settlement");

    let (yes_minted, no_minted) = split(
        venue,
        args.position_router,
        args.market,
        args.settlement,
        args.yes_settlement,
        args.no_settlement,
        args.amount_in,
    )
    .await?;

    let yes_out = swap_leg(
        venue,
        args.yes_settlement,
        args.yes_company,
        yes_minted,
        &args.swap_yes,
    )
    .await?;
    let no_out = swap_leg(
        venue,
        args.no_settlement,
        args.no_company,
        no_minted,
        &args.swap_no,
    )
    .await?;

    let merged = merge(
        venue,
        args.position_router,
        args.market,
        args.company,
        args.yes_company,
        args.no_company,
        yes_out,
        no_out,
    )
    .await?;

    let (leftover_leg, leftover) = if yes_out > no_out {
        (Some(Leg::Yes), yes_out - no_out)
    } else if no_out > yes_out {
        (Some(Leg::No), no_out - yes_out)
    } else {
        (None, U256::ZERO)
    };
    if let Some(leg) = leftover_leg {
        warn!(%leftover, %leg, "trade-asset leftover stranded; this flow does not liquidate it");
    }

    let settlement_received = run_checked(venue, &args.sell_company, merged).await?;

    let cur_after = venue.balance_of(args.settlement).await?;
    let net = signed_delta(cur_before, cur_after);
    if net < args.min_net {
        return Err(ExecError::ProfitBelowFloor {
            net,
            floor: args.min_net,
        });
    }

    let elapsed_ms = start.elapsed().as_millis();
    info!(%net, elapsed_ms, "buy flow complete");
    Ok(BuyReport {
        amount_in: args.amount_in,
        yes_minted,
        no_minted,
        yes_out,
        no_out,
        merged,
        settlement_received,
        leftover_leg,
        leftover,
        net,
        elapsed_ms,
    })
}
