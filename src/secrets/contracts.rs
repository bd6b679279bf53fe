//! On-chain lookups: router → coordinator → DON public keys.

use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::DynProvider;
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::ecies::DonPublicKey;
use super::tdh2::ThresholdPublicKey;
use crate::types::FunctionsError;

sol! {
    #[sol(rpc)]
    interface IFunctionsRouter {
        function getContractById(bytes32 id) external view returns (address);
    }

    #[sol(rpc)]
    interface IFunctionsCoordinator {
        function getDONPublicKey() external view returns (bytes memory);
        function getThresholdPublicKey() external view returns (bytes memory);
    }
}

/// Encode a DON id as a right-padded bytes32 string (at most 31 bytes,
/// leaving room for the terminator).
pub fn encode_don_id(don_id: &str) -> Result<B256, FunctionsError> {
    let raw = don_id.as_bytes();
    if raw.is_empty() || raw.len() > 31 {
        return Err(FunctionsError::InvalidDonId(don_id.to_string()));
    }
    let mut word = [0u8; 32];
    word[..raw.len()].copy_from_slice(raw);
    Ok(B256::from(word))
}

/// The two keys secrets are encrypted to: the DON's own key for the inner
/// envelope and the threshold key for the outer layer.
#[derive(Debug, Clone)]
pub struct DonKeys {
    pub don_public_key: DonPublicKey,
    pub threshold_public_key: ThresholdPublicKey,
}

/// Where the secrets manager gets the DON encryption keys.
#[async_trait]
pub trait DonKeySource: Send + Sync {
    async fn don_keys(&self) -> Result<DonKeys>;
}

/// Reads the key from the coordinator the router currently maps the DON id to.
pub struct OnChainKeySource {
    provider: DynProvider,
    router: Address,
    don_id: B256,
}

impl OnChainKeySource {
    pub fn new(provider: DynProvider, router: Address, don_id: &str) -> Result<Self> {
        Ok(Self {
            provider,
            router,
            don_id: encode_don_id(don_id)?,
        })
    }
}

#[async_trait]
impl DonKeySource for OnChainKeySource {
    async fn don_keys(&self) -> Result<DonKeys> {
        let router = IFunctionsRouter::new(self.router, self.provider.clone());
        let coordinator_address: Address = router
            .getContractById(self.don_id)
            .call()
            .await
            .with_context(|| format!("Router {} has no coordinator for DON id", self.router))?;
        debug!(coordinator = %coordinator_address, "Resolved Functions coordinator");

        let coordinator = IFunctionsCoordinator::new(coordinator_address, self.provider.clone());
        let don_key: Bytes = coordinator
            .getDONPublicKey()
            .call()
            .await
            .context("Failed to fetch DON public key")?;
        let threshold_key: Bytes = coordinator
            .getThresholdPublicKey()
            .call()
            .await
            .context("Failed to fetch threshold public key")?;

        info!(
            coordinator = %coordinator_address,
            don_key_len = don_key.len(),
            threshold_key_len = threshold_key.len(),
            "Fetched DON public keys"
        );
        Ok(DonKeys {
            don_public_key: DonPublicKey::from_bytes(&don_key)?,
            threshold_public_key: ThresholdPublicKey::from_json(&threshold_key)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
