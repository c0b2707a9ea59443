//! Venue adapter over an alloy provider.
//!
//! Intended for anvil/dev forks: balance and allowance reads go through
//! `eth_call`, state-changing dispatches are preflighted with `eth_call`
//! (so revert payloads surface byte-for-byte) and then submitted with
//! `eth_sendTransaction` from the impersonated executor identity, and
//! checkpoints map to `evm_snapshot`/`evm_revert`. Production submission
//! wraps a whole run in a single signed transaction and lives outside
//! this crate.

use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use eyre::{eyre, WrapErr};
use tracing::debug;

use crate::error::VenueError;
use crate::types::WORD_BYTES;
use crate::venue::{Checkpoint, Venue};

sol! {
    #[derive(Debug)]
    function balanceOf(address account) external view returns (uint256);

    #[derive(Debug)]
    function allowance(address owner, address spender) external view returns (uint256);

    #[derive(Debug)]
    function approve(address spender, uint256 amount) external returns (bool);

    #[derive(Debug)]
    function splitPosition(address proposal, address collateralToken, uint256 amount) external;

    #[derive(Debug)]
    function mergePositions(address proposal, address collateralToken, uint256 amount) external;
}

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const RECEIPT_POLL_ATTEMPTS: u32 = 600;

pub struct ChainVenue<P: Provider> {
    provider: P,
    /// The orchestrating identity all balances, allowances and dispatches
    /// belong to. Must be impersonated (or unlocked) on the target node.
    executor: Address,
}

/// Connect to an HTTP RPC endpoint.
pub fn connect(rpc_url: &str, executor: Address) -> eyre::Result<ChainVenue<impl Provider>> {
    let url: alloy::transports::http::reqwest::Url = rpc_url
        .parse()
        .wrap_err_with(|| format!("invalid RPC URL: {rpc_url}"))?;
    let provider = ProviderBuilder::new().connect_http(url);
    Ok(ChainVenue::new(provider, executor))
}

impl<P: Provider> ChainVenue<P> {
    pub fn new(provider: P, executor: Address) -> Self {
        Self { provider, executor }
    }

    pub fn executor(&self) -> Address {
        self.executor
    }

    async fn read(&self, to: Address, data: Vec<u8>) -> Result<Bytes, VenueError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(data)));
        self.provider
            .call(tx)
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))
    }

    /// Preflight with `eth_call` to capture the revert payload, then
    /// submit and wait for inclusion. Returns the preflight output; the
    /// core never interprets it.
    async fn send(
        &mut self,
        target: Address,
        data: Bytes,
        value: U256,
    ) -> Result<Bytes, VenueError> {
        let tx = TransactionRequest::default()
            .from(self.executor)
            .to(target)
            .value(value)
            .input(TransactionInput::new(data));

        let output = match self.provider.call(tx.clone()).await {
            Ok(output) => output,
            Err(err) => {
                return Err(VenueError::Reverted {
                    target,
                    data: revert_payload(&err),
                })
            }
        };

        let hash: B256 = self
            .provider
            .raw_request("eth_sendTransaction".into(), (tx,))
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        debug!(%target, %hash, "transaction submitted");

        let receipt = self.wait_for_receipt(hash).await?;
        if !receipt.status() {
            // the preflight passed but the included tx reverted; no
            // payload is recoverable post hoc
            return Err(VenueError::Reverted {
                target,
                data: Bytes::new(),
            });
        }
        Ok(output)
    }

    async fn wait_for_receipt(
        &self,
        hash: B256,
    ) -> Result<alloy::rpc::types::TransactionReceipt, VenueError> {
        let mut poll = tokio::time::interval(RECEIPT_POLL_INTERVAL);
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            poll.tick().await;
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| VenueError::Transport(e.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
        }
        Err(VenueError::Transport(format!(
            "receipt timeout for {hash}"
        )))
    }
}

#[async_trait]
impl<P: Provider> Venue for ChainVenue<P> {
    async fn balance_of(&self, token: Address) -> Result<U256, VenueError> {
        let call = balanceOfCall {
            account: self.executor,
        };
        let result = self.read(token, call.abi_encode()).await?;
        decode_word(token, &result)
    }

    async fn allowance(&self, token: Address, spender: Address) -> Result<U256, VenueError> {
        let call = allowanceCall {
            owner: self.executor,
            spender,
        };
        let result = self.read(token, call.abi_encode()).await?;
        decode_word(token, &result)
    }

    async fn approve(
        &mut self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let call = approveCall { spender, amount };
        let output = self
            .send(token, Bytes::from(call.abi_encode()), U256::ZERO)
            .await?;
        // tokens returning false instead of reverting
        if let Some(word) = output.get(..WORD_BYTES) {
            if U256::from_be_slice(word).is_zero() {
                return Err(VenueError::ApproveFailed { token, spender });
            }
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        target: Address,
        payload: &Bytes,
        value: U256,
    ) -> Result<Bytes, VenueError> {
        self.send(target, payload.clone(), value).await
    }

    async fn split_position(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let call = splitPositionCall {
            proposal: market,
            collateralToken: collateral,
            amount,
        };
        self.send(router, Bytes::from(call.abi_encode()), U256::ZERO)
            .await?;
        Ok(())
    }

    async fn merge_positions(
        &mut self,
        router: Address,
        market: Address,
        collateral: Address,
        amount: U256,
    ) -> Result<(), VenueError> {
        let call = mergePositionsCall {
            proposal: market,
            collateralToken: collateral,
            amount,
        };
        self.send(router, Bytes::from(call.abi_encode()), U256::ZERO)
            .await?;
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<Checkpoint, VenueError> {
        let id: U256 = self
            .provider
            .raw_request("evm_snapshot".into(), alloy::rpc::client::NoParams::default())
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        debug!(%id, "snapshot taken");
        Ok(Checkpoint(id))
    }

    async fn revert_to(&mut self, checkpoint: Checkpoint) -> Result<(), VenueError> {
        let ok: bool = self
            .provider
            .raw_request("evm_revert".into(), (checkpoint.0,))
            .await
            .map_err(|e| VenueError::Transport(e.to_string()))?;
        if !ok {
            return Err(VenueError::UnknownCheckpoint(checkpoint.0));
        }
        Ok(())
    }
}

/// Decode one ABI word out of view-call returndata. A token answering a
/// `balanceOf`/`allowance` read with anything but exactly 32 bytes is
/// misbehaving; that surfaces as a transport fault instead of a guessed
/// decode.
fn decode_word(token: Address, data: &[u8]) -> Result<U256, VenueError> {
    if data.len() != WORD_BYTES {
        return Err(VenueError::Transport(format!(
            "token {token} returned {} bytes for a word read",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(data))
}

/// Extract the raw revert payload from an RPC error response, if the node
/// attached one.
fn revert_payload(err: &RpcError<TransportErrorKind>) -> Bytes {
    if let Some(resp) = err.as_error_resp() {
        if let Some(raw) = resp.data.as_ref() {
            if let Ok(s) = serde_json::from_str::<String>(raw.get()) {
                if let Some(stripped) = s.strip_prefix("0x") {
                    if let Ok(bytes) = hex::decode(stripped) {
                        return Bytes::from(bytes);
                    }
                }
            }
        }
    }
    Bytes::new()
}

/// Convenience: connect from config, verifying the endpoint is reachable.
pub async fn connect_checked(
    rpc_url: &str,
    executor: Address,
) -> eyre::Result<ChainVenue<impl Provider>> {
    let venue = connect(rpc_url, executor)?;
    let chain_id = venue
        .provider
        .get_chain_id()
        .await
        .map_err(|e| eyre!("RPC endpoint unreachable: {e}"))?;
    debug!(chain_id, %executor, "connected");
    Ok(venue)
}
