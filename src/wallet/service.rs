//! Wallet creation service

use std::sync::Arc;

use super::{AddressGenerator, HeightSource, WalletAddress};
use crate::types::Result;

/// A fresh wallet and the chain height to start scanning it from
#[derive(Debug, Clone)]
pub struct CreatedWallet {
    pub wallet: WalletAddress,
    pub height: u64,
}

/// Produces `(address, height)` pairs for wallet requests
#[derive(Clone)]
pub struct WalletCreationService {
    generator: Arc<dyn AddressGenerator>,
    heights: Arc<dyn HeightSource>,
}

impl WalletCreationService {
    pub fn new(generator: Arc<dyn AddressGenerator>, heights: Arc<dyn HeightSource>) -> Self {
        Self { generator, heights }
    }

    /// Generate an address, then look up the current height.
    ///
    /// The address is generated first and dropped if the lookup fails; it is
    /// never handed out without a height.
    pub async fn create(&self) -> Result<CreatedWallet> {
        let wallet = self.generator.generate()?;
        let height = self.heights.top_height().await?;
        Ok(CreatedWallet { wallet, height })
    }
}
