//! Command-line arguments shared by integrators embedding this crate in
//! their own binary. The binary itself (which must supply a concrete
//! [`crate::host::HostChain`] implementation bound to a real host-chain
//! client) is outside this crate; this module only parses the flags
//! common to every such integration.

use std::path::PathBuf;

use clap::Parser;

/// Flags needed to load configuration and connect to Bitcoin before
/// handing control to the maintainers.
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Bitcoin bridge relay maintainers")]
pub struct Args {
    /// Path to an optional TOML configuration file overriding the
    /// compiled-in defaults.
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// `bitcoind` RPC endpoint, e.g. `http://127.0.0.1:8332`.
    #[arg(long, env = "RELAY_BITCOIN_RPC_URL")]
    pub bitcoin_rpc_url: String,

    /// `bitcoind` RPC username.
    #[arg(long, env = "RELAY_BITCOIN_RPC_USER")]
    pub bitcoin_rpc_user: String,

    /// `bitcoind` RPC password.
    #[arg(long, env = "RELAY_BITCOIN_RPC_PASSWORD")]
    pub bitcoin_rpc_password: String,

    /// Emit JSON-formatted logs instead of human-readable ones.
    #[arg(long, env = "RELAY_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}
