use thiserror::Error;

/// Errors returned by the transaction engine.
///
/// Every failure is terminal for the call that produced it; nothing in the
/// engine retries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BtcError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unsupported witness version {version} with {program_len}-byte program")]
    UnsupportedWitnessVersion { version: u8, program_len: usize },

    #[error("insufficient funds: available {available} sat, required {required} sat")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("no private key supplied for input address {address}")]
    MissingPrivateKeyForInput { address: String },

    #[error("private key does not control address {address}")]
    KeyMismatch { address: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid utxo: {0}")]
    InvalidUtxo(String),

    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}
