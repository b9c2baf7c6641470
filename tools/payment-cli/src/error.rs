use std::path::PathBuf;

use chain_btc::BtcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {file_path:?}: {source}")]
    JsonParse {
        file_path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode output: {0}")]
    JsonEncode(#[source] serde_json::Error),

    #[error("{0}")]
    Engine(#[from] BtcError),

    #[error("invalid request: {0}")]
    InputValidation(String),
}
