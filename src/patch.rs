//! Calldata patching.
//!
//! Downstream venues expect a specific binary layout, so amounts discovered
//! mid-run are written straight into the payload at caller-declared byte
//! offsets rather than re-encoded through a structured builder. A template
//! is copied, the 32-byte amount word is overwritten, and optionally a
//! slippage-derived minimum-output word is overwritten at a second offset.

use alloy::primitives::{Bytes, U256};

use crate::error::ExecError;
use crate::types::{PatchTemplate, BPS_DENOMINATOR, WORD_BYTES};

/// Minimum acceptable output for `amount` at a slippage tolerance of
/// `slippage_bps` hundredths of a percent. Integer division truncates
/// toward zero; `bps = 0` returns `amount` exactly.
///
/// `bps >= 10_000` would underflow the keep-fraction and is rejected
/// outright rather than clamped: it is a plan bug, not a runtime policy.
pub fn min_out_from_slippage(amount: U256, slippage_bps: u32) -> Result<U256, ExecError> {
    if u64::from(slippage_bps) >= BPS_DENOMINATOR {
        return Err(ExecError::SlippageOutOfRange { bps: slippage_bps });
    }
    if slippage_bps == 0 {
        return Ok(amount);
    }
    let keep = U256::from(BPS_DENOMINATOR - u64::from(slippage_bps));
    let den = U256::from(BPS_DENOMINATOR);
    // With amount = q*den + r: amount*keep/den == q*keep + r*keep/den
    // exactly, and every term fits in a word (r*keep < 10^8, the sum is
    // at most amount). Same truncation as the full-width product at any
    // magnitude.
    let q = amount / den;
    let r = amount % den;
    Ok(q * keep + r * keep / den)
}

/// Copy `template`, write `amount` at `amount_offset`, and when
/// `min_out_offset` is set write the slippage-derived minimum there too.
/// Bytes outside the written windows are untouched.
pub fn patch_payload(
    template: &Bytes,
    amount_offset: usize,
    amount: U256,
    min_out_offset: Option<usize>,
    slippage_bps: u32,
) -> Result<Bytes, ExecError> {
    let mut buf = template.to_vec();
    write_word(&mut buf, amount_offset, amount)?;
    if let Some(offset) = min_out_offset {
        let min_out = min_out_from_slippage(amount, slippage_bps)?;
        write_word(&mut buf, offset, min_out)?;
    }
    Ok(buf.into())
}

/// Patch a [`PatchTemplate`] with a runtime amount.
pub fn patch_template(template: &PatchTemplate, amount: U256) -> Result<Bytes, ExecError> {
    patch_payload(
        &template.payload,
        template.amount_offset,
        amount,
        template.min_out_offset,
        template.slippage_bps,
    )
}

fn write_word(buf: &mut [u8], offset: usize, value: U256) -> Result<(), ExecError> {
    let end = offset.checked_add(WORD_BYTES).ok_or(ExecError::PayloadTooShort {
        offset,
        len: buf.len(),
    })?;
    if buf.len() < end {
        return Err(ExecError::PayloadTooShort {
            offset,
            len: buf.len(),
        });
    }
    buf[offset..end].copy_from_slice(&value.to_be_bytes::<32>());
    Ok(())
}
