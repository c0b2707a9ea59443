//! Address and endpoint wiring.
//!
//! Resolved once at startup, from the environment (the variable names the
//! deployment tooling writes) or from a JSON file. The core itself never
//! reads the environment; it only sees the resolved addresses.

use std::env;
use std::path::Path;

use alloy::primitives::Address;
use eyre::WrapErr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbConfig {
    pub rpc_url: String,
    /// The orchestrating identity holding all balances.
    pub executor: Address,
    /// Position-management venue (split/merge spender).
    pub position_router: Address,
    /// Market/proposal the conditional pairs belong to.
    pub market: Address,
    /// Settlement asset profitability is measured in.
    pub settlement: Address,
    /// Trade asset being arbitraged.
    pub company: Address,
    pub yes_company: Address,
    pub no_company: Address,
    pub yes_settlement: Address,
    pub no_settlement: Address,
}

impl ArbConfig {
    /// Load from the environment. A repo-level `.env` is honored when
    /// present; real environment variables take precedence.
    pub fn from_env() -> eyre::Result<Self> {
        let _ = dotenvy::dotenv();
        Ok(Self {
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            executor: addr_var("FUTARCHY_ARB_EXECUTOR_V5")?,
            position_router: addr_var("FUTARCHY_ROUTER_ADDRESS")?,
            market: addr_var("FUTARCHY_PROPOSAL_ADDRESS")?,
            settlement: addr_var("SDAI_TOKEN_ADDRESS")?,
            company: addr_var("COMPANY_TOKEN_ADDRESS")?,
            yes_company: addr_var("SWAPR_GNO_YES_ADDRESS")?,
            no_company: addr_var("SWAPR_GNO_NO_ADDRESS")?,
            yes_settlement: addr_var("SWAPR_SDAI_YES_ADDRESS")?,
            no_settlement: addr_var("SWAPR_SDAI_NO_ADDRESS")?,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("malformed config file {}", path.display()))
    }
}

fn addr_var(key: &str) -> eyre::Result<Address> {
    let raw = env::var(key).wrap_err_with(|| format!("missing env var {key}"))?;
    raw.parse()
        .wrap_err_with(|| format!("env var {key} is not an address: {raw}"))
}
