//! Wallet address generation
//!
//! The relay treats address generation as a black box behind
//! [`AddressGenerator`]. The default implementation builds CryptoNote-style
//! addresses from two ed25519 key pairs: a random spend key and a view key
//! derived from the spend seed.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{KeyPair, WalletAddress};
use crate::types::Result;

/// Network prefix encoded at the start of every address
pub const ADDRESS_PREFIX: u64 = 3_914_525;

/// Bytes of double-SHA-256 appended as checksum
const CHECKSUM_LEN: usize = 4;

/// Produces a new, never reused wallet address per call
pub trait AddressGenerator: Send + Sync {
    fn generate(&self) -> Result<WalletAddress>;
}

/// Generates addresses from ed25519 keys drawn from the OS random source
#[derive(Debug, Clone)]
pub struct Ed25519AddressGenerator {
    prefix: u64,
}

impl Default for Ed25519AddressGenerator {
    fn default() -> Self {
        Self {
            prefix: ADDRESS_PREFIX,
        }
    }
}

impl Ed25519AddressGenerator {
    pub fn with_prefix(prefix: u64) -> Self {
        Self { prefix }
    }

    /// Build the wallet for a given spend seed
    pub fn wallet_from_seed(&self, seed: &[u8; 32]) -> WalletAddress {
        let spend = SigningKey::from_bytes(seed);

        let view_seed = Zeroizing::new(<[u8; 32]>::from(Sha256::digest(seed)));
        let view = SigningKey::from_bytes(&view_seed);

        let spend_public = spend.verifying_key().to_bytes();
        let view_public = view.verifying_key().to_bytes();

        WalletAddress {
            address: encode_address(self.prefix, &spend_public, &view_public),
            spend: KeyPair {
                private_key: hex::encode(spend.to_bytes()),
                public_key: hex::encode(spend_public),
            },
            view: KeyPair {
                private_key: hex::encode(view.to_bytes()),
                public_key: hex::encode(view_public),
            },
        }
    }
}

impl AddressGenerator for Ed25519AddressGenerator {
    fn generate(&self) -> Result<WalletAddress> {
        let spend = SigningKey::generate(&mut OsRng);
        let seed = Zeroizing::new(spend.to_bytes());
        Ok(self.wallet_from_seed(&seed))
    }
}

/// base58(varint(prefix) || spend || view || checksum)
fn encode_address(prefix: u64, spend_public: &[u8; 32], view_public: &[u8; 32]) -> String {
    let mut raw = encode_varint(prefix);
    raw.extend_from_slice(spend_public);
    raw.extend_from_slice(view_public);

    let checksum = Sha256::digest(Sha256::digest(&raw));
    raw.extend_from_slice(&checksum[..CHECKSUM_LEN]);

    bs58::encode(raw).into_string()
}

/// LEB128 encoding of the network prefix
fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | 0x80);
    }
}
