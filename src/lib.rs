//! CPK-Compound: DAI lending on Compound through a per-user contract proxy
//!
//! This crate connects a wallet provider, resolves (and lazily deploys) the
//! owner's Safe proxy through the Contract Proxy Kit factory, and supplies
//! DAI to or redeems it from Compound's cDAI market with one atomic batch
//! per action.
//!
//! # Architecture
//!
//! - **Wallet Connector**: provider selection and account authorization
//! - **Chain Client**: typed contract calls and transaction submission over
//!   an EIP-1193 style provider
//! - **Proxy Client**: CREATE2 proxy resolution and batch execution
//!   (MultiSend for more than one call)
//! - **Money-Market Form**: snapshot reads and deposit/withdraw state machine
//! - **View Shell**: text rendering of the above
//!
//! # Example
//!
//! ```ignore
//! use cpk_compound::{AppConfig, MoneyMarketForm, PresetChoice, WalletConnector};
//!
//! let config = AppConfig::from_env()?;
//! let connector = WalletConnector::from_config(&config);
//!
//! if let Some(connection) = connector.connect(&mut PresetChoice(Some(0))).await? {
//!     let form = MoneyMarketForm::connect(connection, &config).await?;
//!     form.refresh().await?;
//!     form.deposit("100").await?;
//! }
//! ```

pub mod abi;
pub mod batch;
pub mod chain;
pub mod config;
pub mod connector;
pub mod error;
pub mod market;
pub mod provider;
pub mod proxy;
pub mod shell;
pub mod units;

pub use batch::{top_up_amount, BatchCall, Operation, PendingTransactionBatch};
pub use chain::{ChainClient, Contract, TransactionReceipt};
pub use config::{AppConfig, MarketAddresses, Network, ProxyKitAddresses, Route};
pub use connector::{
    Connection, PresetChoice, ProviderOption, ProviderPrompt, WalletConnector, WalletState,
};
pub use error::{CompoundError, Result};
pub use market::{
    Action, FormPhase, MoneyMarketForm, MoneyMarketSnapshot, RefreshOutcome, RefreshSequencer,
};
pub use provider::{HttpProvider, KeySessionProvider, Provider, TransactionRequest};
pub use proxy::{ProxyClient, ProxyHandle};
pub use shell::{ShellConfig, ViewShell};
pub use units::{format_amount, parse_amount, supply_apr};
