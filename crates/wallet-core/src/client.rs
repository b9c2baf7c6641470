//! Talking to an Electrum-style indexer.
//!
//! [`ChainClient`] is the seam the payment session depends on. [`RpcSession`]
//! implements it over JSON-RPC 2.0 on any [`Transport`]; [`LineTransport`]
//! is the newline-delimited framing Electrum servers speak over TCP.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use chain_btc::address::script_pubkey_for_address;
use chain_btc::{BtcNetwork, UnspentOutput};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::error::ClientError;

/// Confirmed and mempool balance of one address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub confirmed_sats: u64,
    /// Net effect of unconfirmed transactions; negative when spending.
    pub unconfirmed_sats: i64,
}

impl Balance {
    pub fn total_sats(&self) -> u64 {
        self.confirmed_sats.saturating_add_signed(self.unconfirmed_sats)
    }
}

impl std::ops::Add for Balance {
    type Output = Balance;

    fn add(self, other: Balance) -> Balance {
        Balance {
            confirmed_sats: self.confirmed_sats.saturating_add(other.confirmed_sats),
            unconfirmed_sats: self.unconfirmed_sats.saturating_add(other.unconfirmed_sats),
        }
    }
}

/// What the wallet needs from a chain backend.
pub trait ChainClient {
    fn fetch_utxos(&mut self, address: &str) -> Result<Vec<UnspentOutput>, ClientError>;

    /// Submit a raw transaction; returns the txid the backend reports.
    fn broadcast(&mut self, raw_hex: &str) -> Result<String, ClientError>;

    fn get_balance(&mut self, address: &str) -> Result<Balance, ClientError>;

    /// UTXOs of several addresses. Backends that can pipeline requests
    /// override this.
    fn fetch_utxos_many(
        &mut self,
        addresses: &[String],
    ) -> Result<Vec<UnspentOutput>, ClientError> {
        let mut utxos = Vec::new();
        for address in addresses {
            utxos.extend(self.fetch_utxos(address)?);
        }
        Ok(utxos)
    }
}

/// A bidirectional channel carrying one JSON-RPC message per frame.
pub trait Transport {
    fn send(&mut self, frame: String) -> Result<(), ClientError>;

    /// Block until the next frame arrives.
    fn receive(&mut self) -> Result<String, ClientError>;
}

/// Newline-delimited frames over a byte stream.
pub struct LineTransport<S: Read + Write> {
    reader: BufReader<S>,
}

impl LineTransport<TcpStream> {
    /// Plain TCP connection, e.g. to an Electrum server's `tcp` port.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> LineTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }
}

impl<S: Read + Write> Transport for LineTransport<S> {
    fn send(&mut self, frame: String) -> Result<(), ClientError> {
        if frame.contains('\n') {
            return Err(ClientError::InvalidRequest("frame contains a newline".into()));
        }
        let stream = self.reader.get_mut();
        stream.write_all(frame.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<String, ClientError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Transport("connection closed".into()));
        }
        Ok(line.trim_end().to_string())
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug)]
struct PendingRequest {
    method: String,
    response: Option<Result<Value, ClientError>>,
}

#[derive(Debug, Deserialize)]
struct ElectrumUnspent {
    tx_hash: String,
    tx_pos: u32,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct ElectrumBalance {
    confirmed: u64,
    unconfirmed: i64,
}

/// A JSON-RPC session with one indexer.
///
/// Owns its transport, the request id counter and the table of requests
/// still waiting for a response. Responses may arrive in any order; each is
/// parked on its pending entry until the caller that owns the id claims it.
pub struct RpcSession<T: Transport> {
    transport: T,
    network: BtcNetwork,
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl<T: Transport> RpcSession<T> {
    pub fn new(transport: T, network: BtcNetwork) -> Self {
        Self {
            transport,
            network,
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    /// Requests sent but not yet claimed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send one request and wait for its result.
    pub fn call(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.submit(method, params)?;
        self.claim(id)
    }

    /// Send all requests before reading any response; results come back in
    /// request order.
    pub fn call_many(&mut self, requests: Vec<(&str, Value)>) -> Result<Vec<Value>, ClientError> {
        let mut ids = Vec::with_capacity(requests.len());
        for (method, params) in requests {
            match self.submit(method, params) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    self.forget(&ids);
                    return Err(e);
                }
            }
        }

        let mut results = Vec::with_capacity(ids.len());
        for (n, &id) in ids.iter().enumerate() {
            match self.claim(id) {
                Ok(value) => results.push(value),
                Err(e) => {
                    self.forget(&ids[n + 1..]);
                    return Err(e);
                }
            }
        }
        Ok(results)
    }

    fn submit(&mut self, method: &str, params: Value) -> Result<u64, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        let frame = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| ClientError::InvalidRequest(format!("serialize {method}: {e}")))?;

        debug!("rpc -> #{id} {method}");
        self.transport.send(frame)?;
        self.pending.insert(
            id,
            PendingRequest {
                method: method.to_string(),
                response: None,
            },
        );
        Ok(id)
    }

    /// Read frames until the response for `id` is available, then remove it
    /// from the pending table.
    fn claim(&mut self, id: u64) -> Result<Value, ClientError> {
        loop {
            let ready = match self.pending.get_mut(&id) {
                Some(entry) => entry.response.take(),
                None => {
                    return Err(ClientError::InvalidRequest(format!(
                        "request #{id} is not pending"
                    )))
                }
            };
            if let Some(response) = ready {
                self.pending.remove(&id);
                return response;
            }

            let frame = match self.transport.receive() {
                Ok(frame) => frame,
                Err(e) => {
                    self.pending.remove(&id);
                    return Err(e);
                }
            };
            if let Err(e) = self.resolve(&frame) {
                self.pending.remove(&id);
                return Err(e);
            }
        }
    }

    fn resolve(&mut self, frame: &str) -> Result<(), ClientError> {
        let response: JsonRpcResponse = serde_json::from_str(frame)?;

        let Some(id) = response.id else {
            debug!("rpc <- notification ignored");
            return Ok(());
        };
        let Some(entry) = self.pending.get_mut(&id) else {
            warn!("rpc <- response for unknown request #{id} dropped");
            return Ok(());
        };

        debug!("rpc <- #{id} {}", entry.method);
        entry.response = Some(match (response.error, response.result) {
            (Some(err), _) => Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            }),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(ClientError::MalformedResponse(format!(
                "{} response has neither result nor error",
                entry.method
            ))),
        });
        Ok(())
    }

    fn forget(&mut self, ids: &[u64]) {
        for id in ids {
            self.pending.remove(id);
        }
    }

    fn script_hash(&self, address: &str) -> Result<String, ClientError> {
        electrum_script_hash(address, self.network)
    }
}

/// The Electrum protocol's address key: SHA256 of the scriptPubKey, byte
/// reversed, hex encoded.
pub fn electrum_script_hash(address: &str, network: BtcNetwork) -> Result<String, ClientError> {
    let script = script_pubkey_for_address(address, network)
        .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
    let mut hash: [u8; 32] = Sha256::digest(&script).into();
    hash.reverse();
    Ok(hex::encode(hash))
}

fn parse_unspent(address: &str, value: Value) -> Result<Vec<UnspentOutput>, ClientError> {
    let entries: Vec<ElectrumUnspent> = serde_json::from_value(value)?;
    Ok(entries
        .into_iter()
        .map(|u| UnspentOutput {
            txid: u.tx_hash,
            vout: u.tx_pos,
            value_sats: u.value,
            address: address.to_string(),
        })
        .collect())
}

impl<T: Transport> ChainClient for RpcSession<T> {
    fn fetch_utxos(&mut self, address: &str) -> Result<Vec<UnspentOutput>, ClientError> {
        let script_hash = self.script_hash(address)?;
        let result = self.call("blockchain.scripthash.listunspent", json!([script_hash]))?;
        parse_unspent(address, result)
    }

    fn broadcast(&mut self, raw_hex: &str) -> Result<String, ClientError> {
        let result = self.call("blockchain.transaction.broadcast", json!([raw_hex]))?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::MalformedResponse("broadcast result is not a txid".into()))
    }

    fn get_balance(&mut self, address: &str) -> Result<Balance, ClientError> {
        let script_hash = self.script_hash(address)?;
        let result = self.call("blockchain.scripthash.get_balance", json!([script_hash]))?;
        let balance: ElectrumBalance = serde_json::from_value(result)?;
        Ok(Balance {
            confirmed_sats: balance.confirmed,
            unconfirmed_sats: balance.unconfirmed,
        })
    }

    fn fetch_utxos_many(
        &mut self,
        addresses: &[String],
    ) -> Result<Vec<UnspentOutput>, ClientError> {
        let script_hashes = addresses
            .iter()
            .map(|a| self.script_hash(a))
            .collect::<Result<Vec<_>, _>>()?;
        let requests = script_hashes
            .into_iter()
            .map(|h| ("blockchain.scripthash.listunspent", json!([h])))
            .collect();

        let mut utxos = Vec::new();
        for (address, result) in addresses.iter().zip(self.call_many(requests)?) {
            utxos.extend(parse_unspent(address, result)?);
        }
        Ok(utxos)
    }
}
