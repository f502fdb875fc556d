//! Common test utilities for money-market integration tests
//!
//! Every test gets its own in-memory chain on an ephemeral port, so tests
//! run in parallel without sharing state.

#![allow(dead_code)]

use alloy_primitives::{Address, U256};
use anyhow::Context;
use std::time::Duration;

use chain_mock::{AppState, Ledger, LedgerConfig, MinedTransaction};
use cpk_compound::config::CPK_SALT_NONCE;
use cpk_compound::units::WAD;
use cpk_compound::{AppConfig, MoneyMarketForm, Network, PresetChoice, Route, WalletConnector};

pub use chain_mock::DEV_ACCOUNT as OWNER;

/// Initialize logging (only once, subsequent calls are no-ops)
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub fn dai(whole: u64) -> U256 {
    U256::from(whole) * WAD
}

pub struct TestChain {
    pub url: String,
    pub ledger: AppState,
}

impl TestChain {
    pub async fn start(config: LedgerConfig) -> anyhow::Result<Self> {
        init_logging();
        let (addr, ledger) = chain_mock::spawn(Ledger::new(config)).await?;
        log::info!("⛓️  Test chain at http://{}", addr);
        Ok(Self {
            url: format!("http://{}", addr),
            ledger,
        })
    }

    pub async fn with_owner_funds(amount: U256) -> anyhow::Result<Self> {
        let chain = Self::start(LedgerConfig::default()).await?;
        chain.fund(OWNER, amount);
        Ok(chain)
    }

    pub fn fund(&self, account: Address, amount: U256) {
        chain_mock::lock(&self.ledger).fund(account, amount);
    }

    pub fn dai_balance(&self, account: Address) -> U256 {
        chain_mock::lock(&self.ledger).dai_balance(account)
    }

    pub fn supplied(&self, account: Address) -> U256 {
        chain_mock::lock(&self.ledger).supplied(account)
    }

    pub fn transactions(&self) -> Vec<MinedTransaction> {
        chain_mock::lock(&self.ledger).transactions().to_vec()
    }

    /// Client configuration pointing at this chain with fast receipt polling.
    pub fn config(&self, route: Route) -> AppConfig {
        let mut config = AppConfig::for_network(Network::Local);
        config.rpc_url = self.url.clone();
        config.route = route;
        config.receipt_poll_interval = Duration::from_millis(10);
        config.receipt_max_attempts = Some(100);
        config
    }

    /// Connect the first provider option and build the form.
    pub async fn form(&self, config: &AppConfig, option: usize) -> anyhow::Result<MoneyMarketForm> {
        let connector = WalletConnector::from_config(config);
        let connection = connector
            .connect(&mut PresetChoice(Some(option)))
            .await?
            .context("provider selection was dismissed")?;
        Ok(MoneyMarketForm::connect(connection, config).await?)
    }
}

/// Proxy address the mock's factory deploys for `owner`.
pub fn expected_proxy(owner: Address) -> Address {
    chain_mock::proxy_address(owner, U256::from_be_bytes(CPK_SALT_NONCE.0))
}
