//! Wallet layer around the `chain-btc` engine: configuration, the chain
//! client seam and the payment session that ties fetching, planning,
//! signing and broadcasting together.

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::{electrum_script_hash, Balance, ChainClient, LineTransport, RpcSession, Transport};
pub use config::WalletConfig;
pub use error::{ClientError, WalletError};
pub use session::{
    BroadcastFailure, BroadcastReport, PaymentRequest, PaymentSession, PreparedPayment,
};
