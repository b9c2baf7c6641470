use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroizing;

use crate::address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::signer;

/// Already-derived `(address, private key)` pairs the signer draws from.
///
/// Addresses are stored lower-cased so lookups are case-insensitive, as
/// bech32 itself is. Key bytes are wiped on drop.
#[derive(Default, Clone)]
pub struct KeyRing {
    keys: BTreeMap<String, Zeroizing<[u8; 32]>>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key for `address`, replacing any previous one.
    ///
    /// The key must be a valid secp256k1 scalar. Whether it actually controls
    /// `address` is checked at signing time.
    pub fn insert(&mut self, address: &str, private_key: [u8; 32]) -> Result<(), BtcError> {
        let key = Zeroizing::new(private_key);
        signer::signing_key(&key)?;
        self.keys.insert(address.trim().to_lowercase(), key);
        Ok(())
    }

    /// Same as [`insert`](Self::insert) with a 64-char hex key.
    pub fn insert_hex(&mut self, address: &str, private_key_hex: &str) -> Result<(), BtcError> {
        let bytes = Zeroizing::new(
            hex::decode(private_key_hex.trim())
                .map_err(|e| BtcError::InvalidPrivateKey(format!("invalid hex: {e}")))?,
        );
        if bytes.len() != 32 {
            return Err(BtcError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        let result = self.insert(address, key);
        zeroize::Zeroize::zeroize(&mut key);
        result
    }

    /// Add a key under its own P2WPKH address and return that address.
    pub fn insert_derived(
        &mut self,
        private_key: [u8; 32],
        network: BtcNetwork,
    ) -> Result<String, BtcError> {
        let key = Zeroizing::new(private_key);
        let signing_key = signer::signing_key(&key)?;
        let pubkey = signer::compressed_public_key(&signing_key)?;
        let addr = address::pubkey_to_p2wpkh_address(&pubkey, network)?;
        self.keys.insert(addr.clone(), key);
        Ok(addr)
    }

    pub fn private_key_for(&self, address: &str) -> Option<&[u8; 32]> {
        self.keys.get(&address.trim().to_lowercase()).map(|k| &**k)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.private_key_for(address).is_some()
    }

    /// Addresses in sorted order.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("addresses", &self.keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
