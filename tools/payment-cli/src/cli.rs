use std::path::PathBuf;

use chain_btc::BtcNetwork;
use clap::{Parser, Subcommand};

use crate::error::AppError;

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan and sign P2WPKH payments offline", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the JSON payment request
    #[arg(short, long, global = true, default_value = "request.json")]
    pub input_file: PathBuf,

    /// Where to write the JSON result; stdout only when omitted
    #[arg(short, long, global = true)]
    pub output_file: Option<PathBuf>,

    /// Network override ("mainnet"/"bitcoin", "testnet", "signet", "regtest")
    #[arg(short, long, global = true)]
    pub network: Option<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the transaction plans for the request
    Plan,
    /// Plan, sign and print the raw transactions
    Sign,
}

/// The command-line network wins over the request's, mainnet otherwise.
pub fn resolve_network(
    cli: Option<&str>,
    request: Option<&str>,
) -> Result<BtcNetwork, AppError> {
    match cli.or(request) {
        Some(name) => Ok(name.parse()?),
        None => Ok(BtcNetwork::Mainnet),
    }
}
