//! Application configuration from environment variables
//!
//! Contract addresses are fixed per network; every one of them can be
//! overridden individually. Defaults to Rinkeby.

use alloy_primitives::{address, b256, Address, B256};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CompoundError, Result};
use crate::units::BLOCKS_PER_YEAR;

/// CPK deterministic salt nonce shared by every owner.
pub const CPK_SALT_NONCE: B256 =
    b256!("cfe33a586323e7325be6aa6ecd8b4600d232a9037e83c8ece69413b777dabe65");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Rinkeby,
    /// Local development node (`chain-mock` or similar)
    Local,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Rinkeby => "rinkeby",
            Network::Local => "local",
        }
    }
}

impl FromStr for Network {
    type Err = CompoundError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "rinkeby" | "" => Ok(Network::Rinkeby),
            "local" | "dev" => Ok(Network::Local),
            other => Err(CompoundError::Config(format!("unknown network '{}'", other))),
        }
    }
}

/// Where deposit/withdraw batches are executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// One atomic transaction through the owner's proxy
    Proxy,
    /// Each call of the batch sent by the owner as its own transaction
    Direct,
}

impl FromStr for Route {
    type Err = CompoundError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "proxy" | "" => Ok(Route::Proxy),
            "direct" => Ok(Route::Direct),
            other => Err(CompoundError::Config(format!("unknown route '{}'", other))),
        }
    }
}

/// Token contracts of the money market.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketAddresses {
    pub dai: Address,
    pub cdai: Address,
}

/// Contract proxy kit deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyKitAddresses {
    pub factory: Address,
    pub master_copy: Address,
    pub multi_send: Address,
    pub fallback_handler: Address,
    pub salt_nonce: B256,
}

impl MarketAddresses {
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self {
                dai: address!("6b175474e89094c44da98b954eedeac495271d0f"),
                cdai: address!("5d3a536e4d6dbd6114cc1ead35777bab948e3643"),
            },
            Network::Rinkeby => Self {
                dai: address!("5592ec0cfb4dbc12d3ab100b257153436a1f0fea"),
                cdai: address!("6d7f0754ffeb405d23c51ce938289d4835be3b14"),
            },
            Network::Local => Self {
                dai: address!("00000000000000000000000000000000000da100"),
                cdai: address!("00000000000000000000000000000000000cda10"),
            },
        }
    }
}

impl ProxyKitAddresses {
    pub fn for_network(network: Network) -> Self {
        match network {
            // Same deterministic deployment on every public network
            Network::Mainnet | Network::Rinkeby => Self {
                factory: address!("0fb4340432e56c014fa96286de17222822a9281b"),
                master_copy: address!("34cfac646f301356faa8b21e94227e3583fe3f5f"),
                multi_send: address!("b522a9f781924ed250a11c54105e51840b138add"),
                fallback_handler: address!("40a930851bd2e590bd5a5c981b436de25742e980"),
                salt_nonce: CPK_SALT_NONCE,
            },
            Network::Local => Self {
                factory: address!("0000000000000000000000000000000000cf0001"),
                master_copy: address!("0000000000000000000000000000000000cf0002"),
                multi_send: address!("0000000000000000000000000000000000cf0003"),
                fallback_handler: address!("0000000000000000000000000000000000cf0004"),
                salt_nonce: CPK_SALT_NONCE,
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: Network,
    /// JSON-RPC endpoint of the wallet provider
    pub rpc_url: String,
    pub market: MarketAddresses,
    pub proxy_kit: ProxyKitAddresses,
    pub route: Route,
    /// Fixed block-time approximation used to annualise the supply rate
    pub blocks_per_year: u64,
    pub receipt_poll_interval: Duration,
    /// `None` waits for a receipt indefinitely
    pub receipt_max_attempts: Option<u32>,
    /// Hex private key for the key-session provider
    pub private_key: Option<String>,
}

fn address_override(var: &str, default: Address) -> Result<Address> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Address::from_str(value.trim())
            .map_err(|e| CompoundError::Config(format!("{} is not an address: {}", var, e))),
        _ => Ok(default),
    }
}

fn number_override<T: FromStr>(var: &str, default: T) -> Result<T> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| CompoundError::Config(format!("{} is not a number: {}", var, value))),
        _ => Ok(default),
    }
}

/// Receipt polling bound; unset, empty or 0 means wait indefinitely.
fn attempts_override(var: &str) -> Result<Option<u32>> {
    Ok(match number_override(var, 0u32)? {
        0 => None,
        attempts => Some(attempts),
    })
}

impl AppConfig {
    /// Defaults for a network, without consulting the environment.
    pub fn for_network(network: Network) -> Self {
        let rpc_url = match network {
            Network::Mainnet => "https://mainnet.infura.io/v3/INFURA_ID",
            Network::Rinkeby => "https://rinkeby.infura.io/v3/INFURA_ID",
            Network::Local => "http://localhost:8545",
        }
        .to_string();

        Self {
            network,
            rpc_url,
            market: MarketAddresses::for_network(network),
            proxy_kit: ProxyKitAddresses::for_network(network),
            route: Route::Proxy,
            blocks_per_year: BLOCKS_PER_YEAR,
            receipt_poll_interval: Duration::from_millis(2000),
            receipt_max_attempts: None,
            private_key: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `CPK_NETWORK`: "rinkeby" (default), "mainnet" or "local"
    /// - `RPC_URL`: JSON-RPC endpoint (network default otherwise)
    /// - `DAI_ADDRESS`, `CDAI_ADDRESS`: market overrides
    /// - `CPK_FACTORY`, `CPK_MASTER_COPY`, `CPK_MULTI_SEND`, `CPK_FALLBACK_HANDLER`
    /// - `CPK_ROUTE`: "proxy" (default) or "direct"
    /// - `BLOCKS_PER_YEAR`, `RECEIPT_POLL_MS`
    /// - `RECEIPT_MAX_ATTEMPTS`: 0 or unset polls until the receipt arrives
    /// - `PRIVATE_KEY`: enables the key-session provider
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Against a local chain-mock node
    /// CPK_NETWORK=local RPC_URL=http://localhost:8545 compound-cli status
    /// ```
    pub fn from_env() -> Result<Self> {
        let network: Network = env::var("CPK_NETWORK").unwrap_or_default().parse()?;
        log::info!("🌐 Using {} network", network.name());

        let mut config = Self::for_network(network);

        if let Ok(url) = env::var("RPC_URL") {
            if !url.trim().is_empty() {
                config.rpc_url = url.trim().to_string();
            }
        }
        log::info!("📡 RPC URL: {}", config.rpc_url);

        config.market.dai = address_override("DAI_ADDRESS", config.market.dai)?;
        config.market.cdai = address_override("CDAI_ADDRESS", config.market.cdai)?;

        let kit = &mut config.proxy_kit;
        kit.factory = address_override("CPK_FACTORY", kit.factory)?;
        kit.master_copy = address_override("CPK_MASTER_COPY", kit.master_copy)?;
        kit.multi_send = address_override("CPK_MULTI_SEND", kit.multi_send)?;
        kit.fallback_handler = address_override("CPK_FALLBACK_HANDLER", kit.fallback_handler)?;

        config.route = env::var("CPK_ROUTE").unwrap_or_default().parse()?;
        config.blocks_per_year = number_override("BLOCKS_PER_YEAR", config.blocks_per_year)?;

        let poll_ms = number_override(
            "RECEIPT_POLL_MS",
            config.receipt_poll_interval.as_millis() as u64,
        )?;
        config.receipt_poll_interval = Duration::from_millis(poll_ms);

        config.receipt_max_attempts = attempts_override("RECEIPT_MAX_ATTEMPTS")?;

        config.private_key = env::var("PRIVATE_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if config.private_key.is_some() {
            log::info!("🔑 Key session available");
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    /// Default configuration (Rinkeby)
    fn default() -> Self {
        Self::for_network(Network::Rinkeby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_rinkeby_proxy_route() {
        let config = AppConfig::default();
        assert_eq!(config.network, Network::Rinkeby);
        assert_eq!(config.route, Route::Proxy);
        assert_eq!(config.blocks_per_year, 2_102_400);
        assert!(config.receipt_max_attempts.is_none());
    }

    #[test]
    fn test_network_and_route_parsing() {
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("".parse::<Network>().unwrap(), Network::Rinkeby);
        assert_eq!("local".parse::<Network>().unwrap(), Network::Local);
        assert!("ropsten".parse::<Network>().is_err());

        assert_eq!("direct".parse::<Route>().unwrap(), Route::Direct);
        assert_eq!(" Proxy ".parse::<Route>().unwrap(), Route::Proxy);
        assert!("bridge".parse::<Route>().is_err());
    }

    #[test]
    fn test_zero_receipt_attempts_means_unbounded() {
        const VAR: &str = "CPK_TEST_RECEIPT_ATTEMPTS";

        env::remove_var(VAR);
        assert_eq!(attempts_override(VAR).unwrap(), None);

        env::set_var(VAR, "0");
        assert_eq!(attempts_override(VAR).unwrap(), None);

        env::set_var(VAR, " 25 ");
        assert_eq!(attempts_override(VAR).unwrap(), Some(25));

        env::set_var(VAR, "-1");
        assert!(matches!(attempts_override(VAR), Err(CompoundError::Config(_))));
        env::remove_var(VAR);
    }

    #[test]
    fn test_public_networks_share_proxy_kit() {
        assert_eq!(
            ProxyKitAddresses::for_network(Network::Mainnet),
            ProxyKitAddresses::for_network(Network::Rinkeby)
        );
        assert_ne!(
            MarketAddresses::for_network(Network::Mainnet),
            MarketAddresses::for_network(Network::Rinkeby)
        );
    }
}
