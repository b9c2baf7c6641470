use chain_btc::error::BtcError;
use thiserror::Error;

/// Failures talking to a chain indexer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid payment request: {0}")]
    InvalidRequest(String),

    #[error("no spendable addresses")]
    NoSpendableAddresses,

    #[error("transaction engine: {0}")]
    Engine(BtcError),

    #[error("chain client: {0}")]
    Client(ClientError),
}

impl From<BtcError> for WalletError {
    fn from(e: BtcError) -> Self {
        WalletError::Engine(e)
    }
}

impl From<ClientError> for WalletError {
    fn from(e: ClientError) -> Self {
        WalletError::Client(e)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::MalformedResponse(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}
