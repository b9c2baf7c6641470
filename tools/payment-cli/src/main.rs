use std::fs;

use chain_btc::BtcNetwork;
use clap::Parser;

mod cli;
mod error;
mod request;

use cli::{resolve_network, CliArgs, Command};
use error::AppError;
use request::PaymentRequestFile;

fn main() -> Result<(), AppError> {
    env_logger::init();

    let args = CliArgs::parse();
    log::debug!("arguments: {:?}", args);

    let content = fs::read_to_string(&args.input_file).map_err(|e| {
        log::error!("failed to read {:?}", args.input_file);
        AppError::Io(e)
    })?;
    let request: PaymentRequestFile =
        serde_json::from_str(&content).map_err(|source| AppError::JsonParse {
            file_path: args.input_file.clone(),
            source,
        })?;

    let network = resolve_network(args.network.as_deref(), request.network.as_deref())?;
    log::info!("network: {network}");

    let output = run(args.command, &request, network)?;
    println!("{output}");

    if let Some(path) = &args.output_file {
        fs::write(path, &output)?;
        log::info!("wrote result to {:?}", path);
    }
    Ok(())
}

fn run(
    command: Command,
    request: &PaymentRequestFile,
    network: BtcNetwork,
) -> Result<String, AppError> {
    match command {
        Command::Plan => {
            let plans = request.plan(network)?;
            serde_json::to_string_pretty(&plans).map_err(AppError::JsonEncode)
        }
        Command::Sign => {
            let signed = request.sign(network)?;
            for tx in &signed {
                log::info!("signed {}", tx.txid);
            }
            serde_json::to_string_pretty(&signed).map_err(AppError::JsonEncode)
        }
    }
}
