//! Delta-verified execution.
//!
//! Wraps the batch runner with before/after balance accounting: the
//! realized spend of the input token must equal the intended amount
//! exactly, and the realized receipt must meet the effective minimum (the
//! larger of the absolute floor and the slippage-derived floor). Nothing a
//! called venue reports is trusted; only re-read balances count.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::batch::run_batch;
use crate::error::ExecError;
use crate::patch::{min_out_from_slippage, patch_payload, patch_template};
use crate::types::{signed_delta, LegSwap, TradeBatch, BATCH_CAPACITY};
use crate::venue::{ensure_allowance, Venue};

/// Execute `batch` and verify its balance deltas. A nonzero
/// `override_amount` replaces `batch.amount_in`, which is how upstream
/// pipeline stages size a batch with a quantity discovered mid-run.
/// Returns the realized receipt of the output token.
pub(crate) async fn run_checked<V: Venue>(
    venue: &mut V,
    batch: &TradeBatch,
    override_amount: U256,
) -> Result<U256, ExecError> {
    let amount = if override_amount.is_zero() {
        batch.amount_in
    } else {
        override_amount
    };
    if amount.is_zero() {
        return Err(ExecError::ZeroAmount);
    }
    if batch.calls.len() > BATCH_CAPACITY {
        return Err(ExecError::BatchOverflow {
            count: batch.calls.len(),
            capacity: BATCH_CAPACITY,
        });
    }

    // Patch a working copy; the caller's plan stays pristine.
    let mut calls = batch.calls.clone();
    if let Some(index) = batch.patch_index {
        let call = calls
            .get_mut(index)
            .ok_or(ExecError::PatchIndexOutOfRange {
                index,
                count: batch.calls.len(),
            })?;
        if call.is_empty_slot() {
            return Err(ExecError::PatchTargetEmpty { index });
        }
        call.payload = patch_payload(
            &call.payload,
            batch.amount_offset,
            amount,
            batch.min_out_offset,
            batch.slippage_bps,
        )?;
    }

    if batch.spender != Address::ZERO {
        ensure_allowance(venue, batch.token_in, batch.spender, amount).await?;
    }

    let in_before = venue.balance_of(batch.token_in).await?;
    let out_before = venue.balance_of(batch.token_out).await?;

    run_batch(venue, &calls).await?;

    let in_after = venue.balance_of(batch.token_in).await?;
    let out_after = venue.balance_of(batch.token_out).await?;

    // Strict equality: downstream legs are sized off this amount, so an
    // under- or over-spend of even one unit is a hard failure.
    if in_after > in_before || in_before - in_after != amount {
        return Err(ExecError::SpendMismatch {
            intended: amount,
            spent: signed_delta(in_after, in_before),
        });
    }
    let received = out_after
        .checked_sub(out_before)
        .ok_or(ExecError::OutputDecreased {
            before: out_before,
            after: out_after,
        })?;

    let slip_floor = match batch.min_out_offset {
        Some(_) => min_out_from_slippage(amount, batch.slippage_bps)?,
        None => U256::ZERO,
    };
    let min_out_used = batch.min_out.max(slip_floor);
    if !min_out_used.is_zero() && received < min_out_used {
        return Err(ExecError::OutputBelowMinimum {
            received,
            min_out: min_out_used,
        });
    }

    debug!(%amount, %received, "checked batch complete");
    Ok(received)
}

/// Execute one patched single-leg swap sized to `amount`, output-checked
/// by balance delta against the larger of the leg floor and the
/// slippage-derived floor.
pub(crate) async fn swap_leg<V: Venue>(
    venue: &mut V,
    token_in: Address,
    token_out: Address,
    amount: U256,
    leg: &LegSwap,
) -> Result<U256, ExecError> {
    if amount.is_zero() {
        return Err(ExecError::ZeroAmount);
    }
    if leg.spender != Address::ZERO {
        ensure_allowance(venue, token_in, leg.spender, amount).await?;
    }
    let payload = patch_template(&leg.swap, amount)?;

    let out_before = venue.balance_of(token_out).await?;
    venue.execute(leg.swap.target, &payload, leg.swap.value).await?;
    let out_after = venue.balance_of(token_out).await?;

    let received = out_after
        .checked_sub(out_before)
        .ok_or(ExecError::OutputDecreased {
            before: out_before,
            after: out_after,
        })?;

    let slip_floor = match leg.swap.min_out_offset {
        Some(_) => min_out_from_slippage(amount, leg.swap.slippage_bps)?,
        None => U256::ZERO,
    };
    let min_out_used = leg.min_out.max(slip_floor);
    if !min_out_used.is_zero() && received < min_out_used {
        return Err(ExecError::OutputBelowMinimum {
            received,
            min_out: min_out_used,
        });
    }

    debug!(target = %leg.swap.target, %amount, %received, "leg swap complete");
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimVenue, SwapProgram};
    use crate::types::{CallDescriptor, PatchTemplate};
    use alloy::primitives::{Address, Bytes};

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    /// Batch with a single patchable call to `router`, amount at offset 4.
    fn batch_to(router: Address, token_in: Address, token_out: Address) -> TradeBatch {
        TradeBatch {
            calls: vec![CallDescriptor::new(router, Bytes::from(vec![0u8; 36]))],
            token_in,
            token_out,
            spender: router,
            amount_in: U256::from(1_000u64),
            min_out: U256::ZERO,
            patch_index: Some(0),
            amount_offset: 4,
            min_out_offset: None,
            slippage_bps: 0,
        }
    }

    fn venue_with_exchange(
        router: Address,
        token_in: Address,
        token_out: Address,
        rate_num: u64,
        rate_den: u64,
    ) -> SimVenue {
        let mut venue = SimVenue::new(addr(99));
        venue.fund(token_in, U256::from(10_000u64));
        venue.install_program(
            router,
            SwapProgram::exchange(token_in, token_out, rate_num, rate_den, 4),
        );
        venue
    }

    #[tokio::test]
    async fn happy_path_returns_the_realized_receipt() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 9, 10);
        let batch = batch_to(router, tok_in, tok_out);

        let received = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap();
        assert_eq!(received, U256::from(900u64));
        assert_eq!(venue.balance(tok_in), U256::from(9_000u64));
        // allowance was raised through the guard
        assert_eq!(venue.allowance_of(tok_in, router), U256::MAX);
    }

    #[tokio::test]
    async fn override_amount_wins_over_the_plan_amount() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 1, 1);
        let batch = batch_to(router, tok_in, tok_out);

        let received = run_checked(&mut venue, &batch, U256::from(42u64))
            .await
            .unwrap();
        assert_eq!(received, U256::from(42u64));
        assert_eq!(venue.balance(tok_in), U256::from(9_958u64));
    }

    #[tokio::test]
    async fn zero_amount_is_rejected_before_any_call() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 1, 1);
        let mut batch = batch_to(router, tok_in, tok_out);
        batch.amount_in = U256::ZERO;

        let err = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err();
        assert!(matches!(err, ExecError::ZeroAmount));
        assert!(venue.call_log.is_empty());
    }

    #[tokio::test]
    async fn patch_index_must_name_a_real_call() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 1, 1);

        let mut batch = batch_to(router, tok_in, tok_out);
        batch.patch_index = Some(3);
        assert!(matches!(
            run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err(),
            ExecError::PatchIndexOutOfRange { index: 3, count: 1 }
        ));

        let mut batch = batch_to(router, tok_in, tok_out);
        batch.calls.push(CallDescriptor::empty());
        batch.patch_index = Some(1);
        assert!(matches!(
            run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err(),
            ExecError::PatchTargetEmpty { index: 1 }
        ));
    }

    #[tokio::test]
    async fn spend_mismatch_aborts_in_either_direction() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        // program pulls one extra unit beyond the decoded amount
        let mut venue = SimVenue::new(addr(99));
        venue.fund(tok_in, U256::from(10_000u64));
        venue.install_program(
            router,
            SwapProgram::exchange(tok_in, tok_out, 1, 1, 4).with_spend_skew(U256::from(1u64)),
        );
        let batch = batch_to(router, tok_in, tok_out);

        let err = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err();
        match err {
            ExecError::SpendMismatch { intended, spent } => {
                assert_eq!(intended, U256::from(1_000u64));
                assert_eq!(spent, alloy::primitives::I256::try_from(1_001i64).unwrap());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn output_below_effective_minimum_aborts() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        // 5% haircut from the venue
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 95, 100);
        let mut batch = batch_to(router, tok_in, tok_out);
        // absolute floor above what the venue will pay out
        batch.min_out = U256::from(980u64);

        let err = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::OutputBelowMinimum {
                received,
                min_out,
            } if received == U256::from(950u64) && min_out == U256::from(980u64)
        ));
    }

    #[tokio::test]
    async fn slippage_floor_applies_when_the_payload_carries_a_min_out() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 95, 100);
        let mut batch = batch_to(router, tok_in, tok_out);
        batch.calls[0].payload = Bytes::from(vec![0u8; 68]);
        batch.min_out_offset = Some(36);
        batch.slippage_bps = 100; // tolerate 1%, venue takes 5%

        let err = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap_err();
        assert!(matches!(err, ExecError::OutputBelowMinimum { .. }));

        // a 10% tolerance passes
        batch.slippage_bps = 1_000;
        let received = run_checked(&mut venue, &batch, U256::ZERO).await.unwrap();
        assert_eq!(received, U256::from(950u64));
    }

    #[tokio::test]
    async fn leg_swap_checks_its_floor_by_balance_delta() {
        let (tok_in, tok_out, router) = (addr(1), addr(2), addr(11));
        let mut venue = venue_with_exchange(router, tok_in, tok_out, 4, 5);
        let leg = LegSwap {
            spender: router,
            swap: PatchTemplate {
                target: router,
                payload: Bytes::from(vec![0u8; 36]),
                value: U256::ZERO,
                amount_offset: 4,
                min_out_offset: None,
                slippage_bps: 0,
            },
            min_out: U256::from(90u64),
        };

        let received = swap_leg(&mut venue, tok_in, tok_out, U256::from(120u64), &leg)
            .await
            .unwrap();
        assert_eq!(received, U256::from(96u64));

        let err = swap_leg(&mut venue, tok_in, tok_out, U256::from(100u64), &leg)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::OutputBelowMinimum { .. }));
    }
}
