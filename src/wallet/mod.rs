//! Wallet creation
//!
//! ## Modules
//!
//! - `generator` - new wallet addresses (spend and view key pairs)
//! - `height` - current chain height from the block API
//! - `service` - pairs a fresh address with the height to scan from

pub mod generator;
pub mod height;
pub mod service;

pub use generator::{AddressGenerator, Ed25519AddressGenerator, ADDRESS_PREFIX};
pub use height::{HeightSource, HttpHeightSource, TopBlock};
pub use service::{CreatedWallet, WalletCreationService};

use serde::{Deserialize, Serialize};

/// Public/private key pair, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub private_key: String,
    pub public_key: String,
}

/// A newly generated wallet
///
/// Serialized as `{ address, spend: { privateKey, publicKey }, view: { ... } }`,
/// the shape the wallet scanner expects in a scan job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAddress {
    pub address: String,
    pub spend: KeyPair,
    pub view: KeyPair,
}
