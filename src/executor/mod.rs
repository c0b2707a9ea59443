//! Caller-facing execution entry points.
//!
//! Each entry point is one atomic unit: the venue is checkpointed on the
//! way in, and on any error — precondition, external call failure, or
//! invariant violation — the venue is rolled back to that checkpoint
//! before the error propagates. The only outcomes are fully applied or
//! fully reverted; partial execution of a multi-leg run strands capital
//! mid-flow and is never acceptable.

mod buy;
mod checked;
mod conditional;
mod sell;

use alloy::primitives::U256;
use tracing::{error, warn};

use crate::error::ExecError;
use crate::report::{BuyReport, SellReport};
use crate::types::{BuyArgs, SellArgs, TradeBatch};
use crate::venue::{Checkpoint, Venue};

pub struct Executor<V: Venue> {
    venue: V,
}

impl<V: Venue> Executor<V> {
    pub fn new(venue: V) -> Self {
        Self { venue }
    }

    pub fn venue(&self) -> &V {
        &self.venue
    }

    pub fn venue_mut(&mut self) -> &mut V {
        &mut self.venue
    }

    pub fn into_venue(self) -> V {
        self.venue
    }

    /// Execute one delta-verified batch as its own atomic unit. A nonzero
    /// `override_amount` replaces the plan's `amount_in`. Returns the
    /// realized receipt of the output token.
    pub async fn run_checked_trade(
        &mut self,
        batch: &TradeBatch,
        override_amount: U256,
    ) -> Result<U256, ExecError> {
        let cp = self.venue.checkpoint().await?;
        let result = checked::run_checked(&mut self.venue, batch, override_amount).await;
        self.finish(cp, result).await
    }

    /// Run the SELL arbitrage pipeline as one atomic unit.
    pub async fn sell(&mut self, args: &SellArgs) -> Result<SellReport, ExecError> {
        let cp = self.venue.checkpoint().await?;
        let result = sell::run_sell(&mut self.venue, args).await;
        self.finish(cp, result).await
    }

    /// Run the BUY arbitrage pipeline as one atomic unit.
    pub async fn buy(&mut self, args: &BuyArgs) -> Result<BuyReport, ExecError> {
        let cp = self.venue.checkpoint().await?;
        let result = buy::run_buy(&mut self.venue, args).await;
        self.finish(cp, result).await
    }

    async fn finish<T>(
        &mut self,
        cp: Checkpoint,
        result: Result<T, ExecError>,
    ) -> Result<T, ExecError> {
        match result {
            Ok(value) => {
                self.venue.release(cp).await?;
                Ok(value)
            }
            Err(err) => {
                warn!(%err, "run failed, reverting atomic unit");
                if let Err(revert_err) = self.venue.revert_to(cp).await {
                    // the venue may be holding partial state now; surface
                    // the rollback failure but keep the root cause on record
                    error!(cause = %err, %revert_err, "rollback failed, venue state is suspect");
                    return Err(revert_err.into());
                }
                Err(err)
            }
        }
    }
}
