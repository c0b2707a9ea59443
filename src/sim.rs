//! Deterministic in-memory venue.
//!
//! Stands in for the chain during preflight simulation and tests: a token
//! ledger for the orchestrating identity, an allowance table, swap
//! "programs" installed at addresses, and one or more conditional markets.
//! A program decodes its input amount from the 32-byte word at a declared
//! payload offset — the same way the real routers read a patched payload —
//! so runs through here exercise the byte-offset contract end to end.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use tracing::trace;

use crate::error::VenueError;
use crate::venue::{Checkpoint, Venue};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

/// A swap installed at an address: debits `token_in`, credits `token_out`
/// at `rate_num / rate_den`, reading its amount from the payload.
#[derive(Debug, Clone)]
pub struct SwapProgram {
    pub token_in: Address,
    pub token_out: Address,
    /// Byte offset where the program reads its 32-byte input amount.
    pub amount_offset: usize,
    pub rate_num: u64,
    pub rate_den: u64,
    /// Extra input debited beyond the decoded amount. Fault injection for
    /// exact-spend verification.
    pub spend_skew: U256,
    /// When set, the program reverts with exactly this payload.
    pub revert_reason: Option<Bytes>,
}

impl SwapProgram {
    pub fn exchange(
        token_in: Address,
        token_out: Address,
        rate_num: u64,
        rate_den: u64,
        amount_offset: usize,
    ) -> Self {
        Self {
            token_in,
            token_out,
            amount_offset,
            rate_num,
            rate_den,
            spend_skew: U256::ZERO,
            revert_reason: None,
        }
    }

    pub fn failing(reason: Bytes) -> Self {
        Self {
            token_in: Address::ZERO,
            token_out: Address::ZERO,
            amount_offset: 0,
            rate_num: 1,
            rate_den: 1,
            spend_skew: U256::ZERO,
            revert_reason: Some(reason),
        }
    }

    pub fn with_spend_skew(mut self, skew: U256) -> Self {
        self.spend_skew = skew;
        self
    }
}

/// One conditional market: `collateral` splits 1:1 into (`yes`, `no`).
#[derive(Debug, Clone)]
pub struct Market {
    pub market: Address,
    pub collateral: Address,
    pub yes: Address,
    pub no: Address,
    /// Minted on top of the split amount per leg (venues may over-mint).
    pub mint_bonus: U256,
    /// Withheld from the split amount per leg. Fault injection for the
    /// under-mint guard.
    pub mint_shortfall: U256,
}

impl Market {
    pub fn new(market: Address, collateral: Address, yes: Address, no: Address) -> Self {
        Self {
            market,
            collateral,
            yes,
            no,
            mint_bonus: U256::ZERO,
            mint_shortfall: U256::ZERO,
        }
    }
}

pub struct SimVenue {
    state: LedgerState,
    programs: HashMap<Address, SwapProgram>,
    markets: Vec<Market>,
    /// The spender split/merge allowances must be granted to.
    position_router: Address,
    /// (token, spender) pairs whose approve is scripted to fail.
    failing_approvals: Vec<(Address, Address)>,
    checkpoints: Vec<LedgerState>,
    /// Every approve the core issued, in order.
    pub approve_log: Vec<(Address, Address, U256)>,
    /// Every call target dispatched, in order.
    pub call_log: Vec<Address>,
}

impl SimVenue {
    pub fn new(position_router: Address) -> Self {
        Self {
            state: LedgerState::default(),
            programs: HashMap::new(),
            markets: Vec::new(),
            position_router,
            failing_approvals: Vec::new(),
            checkpoints: Vec::new(),
            approve_log: Vec::new(),
            call_log: Vec::new(),
        }
    }

    pub fn fund(&mut self, token: Address, amount: U256) {
        let entry = self.state.balances.entry(token).or_default();
        *entry += amount;
    }

    pub fn set_balance(&mut self, token: Address, amount: U256) {
        self.state.balances.insert(token, amount);
    }

    pub fn set_allowance(&mut self, token: Address, spender: Address, amount: U256) {
        self.state.allowances.insert((token, spender), amount);
    }

    pub fn install_program(&mut self, at: Address, program: SwapProgram) {
        self.programs.insert(at, program);
    }

    /// Script every approve of `spender` on `token` to fail.
    pub fn fail_approvals(&mut self, token: Address, spender: Address) {
        self.failing_approvals.push((token, spender));
    }

    pub fn register_market(&mut self, market: Market) {
        self.markets.push(market);
    }

    /// Number of live checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Synchronous balance read for test assertions.
    pub fn balance(&self, token: Address) -> U256 {
        self.state.balances.get(&token).copied().unwrap_or_default()
    }

    /// Synchronous allowance read for test assertions.
    pub fn allowance_of(&self, token: Address, spender: Address) -> U256 {
        self.state
            .allowances
            .get(&(token, spender))
            .copied()
            .unwrap_or_default()
    }

    fn revert(&self, target: Address, reason: &str) -> VenueError {
        VenueError::Reverted {
            target,
            data: Bytes::from(reason.as_bytes().to_vec()),
        }
    }

    fn debit(&mut self, token: Address, amount: U256, target: Address) -> Result<(), VenueError> {
        let balance = self.balance(token);
        if balance < amount {
            return Err(self.revert(target, "insufficient balance"));
        }
        self.state.balances.insert(token, balance - amount);
        Ok(())
    }

    fn credit(&mut self, token: Address, amount: U256) {
        let entry = self.state.balances.entry(token).or_default();
        *entry += amount;
    }

    fn spend_allowance(
        &mut self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let key = (token, spender);
        let current = self.state.allowances.get(&key).copied().unwrap_or_default();
        if current < amount {
            return Err(self.revert(spender, "insufficient allowance"));
        }
        // max allowance is treated as infinite, like most ERC-20s
        if current != U256::MAX {
            self.state.allowances.insert(key, current - amount);
        }
        Ok(())
    }

    fn market_for(
        &self,
        market: Address,
        collateral: Address,
        router: Address,
    ) -> Result<Market, VenueError> {
        if router != self.position_router {
            return Err(self.revert(router, "unknown position router"));
        }
        self.markets
            .iter()
            .find(|m| m.market == market && m.collateral == collateral)
            .cloned()
            .ok_or_else(|| self.revert(router, "unknown market"))
    }
}

#[async_trait]
impl Venue for SimVenue {
    async fn balance_of(&self, token: Address) -> Result<U256, VenueError> {
        Ok(self.balance(token))
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256, VenueError> {
        Ok(self.allowance_of(token, spender))
    }

    async fn approve(
        &mut self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        self.approve_log.push((token, spender, amount));
        if self.failing_approvals.contains(&(token, spender)) {
            return Err(VenueError::ApproveFailed { token, spender });
        }
        self.state.allowances.insert((token, spender), amount);
        Ok(())
    }

    async fn execute(
        &mut self,
        target: Address,
        payload: &Bytes,
        _value: U256,
    ) -> Result<Bytes, VenueError> {
        self.call_log.push(target);
        let program = self
            .programs
            .get(&target)
            .cloned()
            .ok_or_else(|| self.revert(target, "no program at target"))?;
        if let Some(reason) = program.revert_reason {
            return Err(VenueError::Reverted {
                target,
                data: reason,
            });
        }

        let end = program.amount_offset + 32;
        if payload.len() < end {
            return Err(self.revert(target, "payload too short"));
        }
        let amount = U256::from_be_slice(&payload[program.amount_offset..end]);
        trace!(%target, %amount, "sim program run");

        let pulled = amount + program.spend_skew;
        self.spend_allowance(program.token_in, target, pulled)?;
        self.debit(program.token_in, pulled, target)?;
        let out = amount * U256::from(program.rate_num) / U256::from(program.rate_den);
        self.credit(program.token_out, out);
        Ok(Bytes::new())
    }

    async fn split_position(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let m = self.market_for(market, collateral, router)?;
        self.spend_allowance(collateral, router, amount)?;
        self.debit(collateral, amount, router)?;
        let minted = (amount + m.mint_bonus).saturating_sub(m.mint_shortfall);
        self.credit(m.yes, minted);
        self.credit(m.no, minted);
        Ok(())
    }

    async fn merge_positions(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let m = self.market_for(market, collateral, router)?;
        self.spend_allowance(m.yes, router, amount)?;
        self.spend_allowance(m.no, router, amount)?;
        self.debit(m.yes, amount, router)?;
        self.debit(m.no, amount, router)?;
        self.credit(collateral, amount);
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<Checkpoint, VenueError> {
        self.checkpoints.push(self.state.clone());
        Ok(Checkpoint(U256::from(self.checkpoints.len() - 1)))
    }

    async fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), VenueError> {
        let index = usize::try_from(checkpoint.0)
            .map_err(|_| VenueError::UnknownCheckpoint(checkpoint.0))?;
        if index >= self.checkpoints.len() {
            return Err(VenueError::UnknownCheckpoint(checkpoint.0));
        }
        self.state = self.checkpoints[index].clone();
        self.checkpoints.truncate(index);
        Ok(())
    }

    // Releasing also invalidates any newer checkpoints, like the snapshot
    // ids a node discards past a revert.
    async fn release(&mut self, checkpoint: Checkpoint) -> Result<(), VenueError> {
        let index = usize::try_from(checkpoint.0)
            .map_err(|_| VenueError::UnknownCheckpoint(checkpoint.0))?;
        if index >= self.checkpoints.len() {
            return Err(VenueError::UnknownCheckpoint(checkpoint.0));
        }
        self.checkpoints.truncate(index);
        Ok(())
    }
}
