//! Ordered batch-call runner.
//!
//! Dispatches a bounded call list in order, skipping empty slots. The first
//! failing call aborts the whole batch with the child's failure payload
//! untouched; there is no partial-success mode. This routine is crate-
//! private on purpose: only the delta-verified executor may reach it, so
//! every dispatch is attributable to exactly one atomic unit.

use alloy::primitives::U256;
use tracing::debug;

use crate::error::ExecError;
use crate::types::{CallDescriptor, BATCH_CAPACITY};
use crate::venue::Venue;

pub(crate) async fn run_batch<V: Venue>(
    venue: &mut V,
    calls: &[CallDescriptor],
) -> Result<(), ExecError> {
    if calls.len() > BATCH_CAPACITY {
        return Err(ExecError::BatchOverflow {
            count: calls.len(),
            capacity: BATCH_CAPACITY,
        });
    }
    for (index, call) in calls.iter().enumerate() {
        if call.is_empty_slot() {
            continue;
        }
        debug!(
            index,
            target = %call.target,
            payload_len = call.payload.len(),
            "dispatching batch call"
        );
        venue.execute(call.target, &call.payload, U256::ZERO).await?;
    }
    Ok(())
}
