/// Chain Mock Server
///
/// A lightweight in-memory Ethereum node exposing the JSON-RPC subset used
/// by the money-market client. Designed for local development and tests.

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

use chain_mock::{run_server, Ledger, LedgerConfig, DEV_ACCOUNT};

#[derive(Debug)]
struct Config {
    // Server
    host: String,
    port: u16,

    // Chain
    accounts: Vec<Address>,
    fund_dai: u64,
    supply_rate: U256,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let host = env::var("MOCK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("MOCK_PORT")
            .unwrap_or_else(|_| "8545".to_string())
            .parse()
            .context("Invalid MOCK_PORT")?;

        let accounts = match env::var("MOCK_ACCOUNTS") {
            Ok(list) if !list.trim().is_empty() => list
                .split(',')
                .map(|a| Address::from_str(a.trim()).context("Invalid address in MOCK_ACCOUNTS"))
                .collect::<Result<Vec<_>>>()?,
            _ => vec![DEV_ACCOUNT],
        };

        let fund_dai = env::var("MOCK_FUND_DAI")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .context("Invalid MOCK_FUND_DAI")?;

        let supply_rate = match env::var("MOCK_SUPPLY_RATE") {
            Ok(rate) => U256::from_str(rate.trim()).context("Invalid MOCK_SUPPLY_RATE")?,
            Err(_) => LedgerConfig::default().supply_rate_per_block,
        };

        Ok(Self {
            host,
            port,
            accounts,
            fund_dai,
            supply_rate,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting chain mock...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let mut ledger = Ledger::new(LedgerConfig {
        accounts: config.accounts.clone(),
        supply_rate_per_block: config.supply_rate,
        ..LedgerConfig::default()
    });
    let one_dai = U256::from(10u64).pow(U256::from(18u64));
    for account in &config.accounts {
        ledger.fund(*account, U256::from(config.fund_dai) * one_dai);
    }
    log::info!(
        "Unlocked accounts: {:?}, {} DAI each",
        config.accounts,
        config.fund_dai
    );

    run_server(ledger, config.host, config.port)
        .await
        .context("Server error")?;

    Ok(())
}
