// Wallet provider integration
// EIP-1193 style request boundary with an HTTP JSON-RPC transport and a
// locally signing key session

pub mod http;
pub mod signer;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use http::HttpProvider;
pub use signer::{KeySessionProvider, LegacyTransaction};
pub use types::*;

/// A live wallet provider handle.
///
/// Everything above this boundary (accounts, calls, transactions) goes
/// through `request`, so any provider that speaks the Ethereum JSON-RPC
/// method set can back a [`crate::chain::ChainClient`].
#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value>;

    /// Short label used in logs and the wallet info line.
    fn label(&self) -> String;
}
