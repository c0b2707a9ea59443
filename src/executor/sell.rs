//! SELL arbitrage pipeline.
//!
//! Straight line, no branching: buy the trade asset with settlement, split
//! it into conditional legs, sell each leg for its settlement-denominated
//! counterpart, merge the lesser of the two receipts back to settlement,
//! liquidate the leftover on the other leg, then check the signed net
//! change of the settlement balance against the caller's floor. The caller
//! (`Executor`) wraps this in a checkpoint, so a failure at any step
//! undoes every prior leg.

use std::time::Instant;

use alloy::primitives::U256;
use tracing::{debug, info};

use crate::error::ExecError;
use crate::executor::checked::{run_checked, swap_leg};
use crate::executor::conditional::{merge, split};
use crate::report::SellReport;
use crate::types::{signed_delta, Leg, SellArgs};
use crate::venue::Venue;

pub(crate) async fn run_sell<V: Venue>(
    venue: &mut V,
    args: &SellArgs,
) -> Result<SellReport, ExecError> {
    let start = Instant::now();
    let cur_before = venue.balance_of(args.settlement).await?;
    info!(amount = %args.amount_in, "sell flow: buying trade asset");

    let company_bought = run_checked(venue, &args.buy_company, args.amount_in).await?;

    let (yes_minted, no_minted) = split(
        venue,
        args.position_router,
        args.market,
        args.company,
        args.yes_company,
        args.no_company,
        company_bought,
    )
    .await?;

    let yes_out = swap_leg(
        venue,
        args.yes_company,
        args.yes_settlement,
        yes_minted,
        &args.swap_yes,
    )
    .await?;
    let no_out = swap_leg(
        venue,
        args.no_company,
        args.no_settlement,
        no_minted,
        &args.swap_no,
    )
    .await?;

    let merged = merge(
        venue,
        args.position_router,
        args.market,
        args.settlement,
        args.yes_settlement,
        args.no_settlement,
        yes_out,
        no_out,
    )
    .await?;

    // At most one leg holds a leftover: the one whose swap out-earned the
    // merge amount.
    let (leftover_leg, leftover) = if yes_out > no_out {
        (Some(Leg::Yes), yes_out - no_out)
    } else if no_out > yes_out {
        (Some(Leg::No), no_out - yes_out)
    } else {
        (None, U256::ZERO)
    };
    let mut leftover_liquidated = U256::ZERO;
    if let Some(leg) = leftover_leg {
        let (token, plan) = match leg {
            Leg::Yes => (args.yes_settlement, &args.liquidate_yes),
            Leg::No => (args.no_settlement, &args.liquidate_no),
        };
        debug!(%leftover, %leg, "liquidating leftover leg");
        leftover_liquidated = swap_leg(venue, token, args.settlement, leftover, plan).await?;
    }

    let cur_after = venue.balance_of(args.settlement).await?;
    let net = signed_delta(cur_before, cur_after);
    if net < args.min_net {
        return Err(ExecError::ProfitBelowFloor {
            net,
            floor: args.min_net,
        });
    }

    let elapsed_ms = start.elapsed().as_millis();
    info!(%net, elapsed_ms, "sell flow complete");
    Ok(SellReport {
        amount_in: args.amount_in,
        company_bought,
        yes_minted,
        no_minted,
        yes_out,
        no_out,
        merged,
        leftover_leg,
        leftover,
        leftover_liquidated,
        net,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::sim::{Market, SimVenue, SwapProgram};
    use crate::types::{CallDescriptor, LegSwap, PatchTemplate, TradeBatch};
    use alloy::primitives::{Address, Bytes, I256};

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn leg_swap(target: Address, min_out: U256) -> LegSwap {
        LegSwap {
            spender: target,
            swap: PatchTemplate {
                target,
                payload: Bytes::from(vec![0u8; 36]),
                value: U256::ZERO,
                amount_offset: 4,
                min_out_offset: None,
                slippage_bps: 0,
            },
            min_out,
        }
    }

    struct Fixture {
        venue: SimVenue,
        args: SellArgs,
        settlement: Address,
    }

    /// 1000 settlement in, 900 company out of the opening batch, YES leg
    /// pays 990, NO leg pays 940; merge 940, leftover 50 on YES liquidated
    /// 1:1. Final settlement: 940 + 50 = 990, net -10.
    fn fixture() -> Fixture {
        let position_router = addr(9);
        let market = addr(10);
        let (cur, comp) = (addr(1), addr(2));
        let (yes_comp, no_comp) = (addr(3), addr(4));
        let (yes_cur, no_cur) = (addr(5), addr(6));
        let balancer = addr(21);
        let (swapr_yes, swapr_no) = (addr(22), addr(23));
        let (liq_yes, liq_no) = (addr(24), addr(25));

        let mut venue = SimVenue::new(position_router);
        venue.fund(cur, U256::from(1_000u64));
        venue.register_market(Market::new(market, comp, yes_comp, no_comp));
        venue.register_market(Market::new(market, cur, yes_cur, no_cur));
        venue.install_program(balancer, SwapProgram::exchange(cur, comp, 9, 10, 4));
        venue.install_program(swapr_yes, SwapProgram::exchange(yes_comp, yes_cur, 11, 10, 4));
        venue.install_program(swapr_no, SwapProgram::exchange(no_comp, no_cur, 47, 45, 4));
        venue.install_program(liq_yes, SwapProgram::exchange(yes_cur, cur, 1, 1, 4));
        venue.install_program(liq_no, SwapProgram::exchange(no_cur, cur, 1, 1, 4));

        let args = SellArgs {
            amount_in: U256::from(1_000u64),
            buy_company: TradeBatch {
                calls: vec![CallDescriptor::new(balancer, Bytes::from(vec![0u8; 36]))],
                token_in: cur,
                token_out: comp,
                spender: balancer,
                amount_in: U256::ZERO,
                min_out: U256::from(900u64),
                patch_index: Some(0),
                amount_offset: 4,
                min_out_offset: None,
                slippage_bps: 0,
            },
            position_router,
            market,
            company: comp,
            settlement: cur,
            yes_company: yes_comp,
            no_company: no_comp,
            yes_settlement: yes_cur,
            no_settlement: no_cur,
            swap_yes: leg_swap(swapr_yes, U256::from(950u64)),
            swap_no: leg_swap(swapr_no, U256::from(900u64)),
            liquidate_yes: leg_swap(liq_yes, U256::ZERO),
            liquidate_no: leg_swap(liq_no, U256::ZERO),
            min_net: I256::try_from(-20i64).unwrap(),
        };
        Fixture {
            venue,
            args,
            settlement: cur,
        }
    }

    #[tokio::test]
    async fn full_sell_happy_path() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let Fixture {
            venue,
            args,
            settlement,
        } = fixture();
        let mut executor = Executor::new(venue);

        let report = executor.sell(&args).await.unwrap();

        assert_eq!(report.company_bought, U256::from(900u64));
        assert_eq!(report.yes_minted, U256::from(900u64));
        assert_eq!(report.no_minted, U256::from(900u64));
        assert_eq!(report.yes_out, U256::from(990u64));
        assert_eq!(report.no_out, U256::from(940u64));
        assert_eq!(report.merged, U256::from(940u64));
        assert_eq!(report.leftover_leg, Some(Leg::Yes));
        assert_eq!(report.leftover, U256::from(50u64));
        assert_eq!(report.leftover_liquidated, U256::from(50u64));
        assert_eq!(report.net, I256::try_from(-10i64).unwrap());
        assert_eq!(
            executor.venue().balance(settlement),
            U256::from(990u64)
        );
        // no conditional dust left anywhere
        for token in [addr(3), addr(4), addr(5), addr(6)] {
            assert_eq!(executor.venue().balance(token), U256::ZERO, "{token}");
        }
    }

    #[tokio::test]
    async fn profit_floor_miss_reverts_every_balance() {
        let Fixture { venue, mut args, settlement } = fixture();
        // true achievable net is -10
        args.min_net = I256::ZERO;
        let mut executor = Executor::new(venue);

        let err = executor.sell(&args).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::ProfitBelowFloor { net, floor }
                if net == I256::try_from(-10i64).unwrap() && floor == I256::ZERO
        ));

        let venue = executor.venue();
        assert_eq!(venue.balance(settlement), U256::from(1_000u64));
        for token in [addr(2), addr(3), addr(4), addr(5), addr(6)] {
            assert_eq!(venue.balance(token), U256::ZERO);
        }
        // allowances raised mid-run were rolled back too
        assert_eq!(venue.allowance_of(settlement, addr(21)), U256::ZERO);
        assert_eq!(venue.allowance_of(addr(3), addr(22)), U256::ZERO);
    }

    #[tokio::test]
    async fn mid_pipeline_failure_is_atomic() {
        let Fixture { mut venue, args, settlement } = fixture();
        // NO leg swap fails outright
        venue.install_program(addr(23), SwapProgram::failing(Bytes::from_static(b"pool drained")));
        let mut executor = Executor::new(venue);

        let err = executor.sell(&args).await.unwrap_err();
        assert!(matches!(err, ExecError::Venue(_)));

        let venue = executor.venue();
        assert_eq!(venue.balance(settlement), U256::from(1_000u64));
        for token in [addr(2), addr(3), addr(4), addr(5), addr(6)] {
            assert_eq!(venue.balance(token), U256::ZERO);
        }
    }

    #[tokio::test]
    async fn approve_failure_mid_run_is_atomic() {
        let Fixture { mut venue, args, settlement } = fixture();
        // the YES leg's router rejects its approve, after the opening buy
        // and the split have already run
        venue.fail_approvals(addr(3), addr(22));
        let mut executor = Executor::new(venue);

        let err = executor.sell(&args).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::Venue(crate::error::VenueError::ApproveFailed { .. })
        ));

        let venue = executor.venue();
        assert_eq!(venue.balance(settlement), U256::from(1_000u64));
        for token in [addr(2), addr(3), addr(4), addr(5), addr(6)] {
            assert_eq!(venue.balance(token), U256::ZERO);
        }
    }

    #[tokio::test]
    async fn per_leg_floor_violation_aborts_the_run() {
        let Fixture { venue, mut args, .. } = fixture();
        // demand more from the NO leg than its pool pays (940)
        args.swap_no.min_out = U256::from(1_000u64);
        let mut executor = Executor::new(venue);

        let err = executor.sell(&args).await.unwrap_err();
        assert!(matches!(err, ExecError::OutputBelowMinimum { .. }));
        assert_eq!(
            executor.venue().balance(args.settlement),
            U256::from(1_000u64)
        );
    }
}
