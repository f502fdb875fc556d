//! Wallet connector
//!
//! Presents the provider choices, opens the selected provider and asks it
//! for account access. Dismissing the selection is a silent no-op
//! (`Ok(None)`), not an error. The selection modal is closed on every path
//! out of [`WalletConnector::connect`].

use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::ChainClient;
use crate::config::AppConfig;
use crate::error::{CompoundError, Result};
use crate::provider::{signer::parse_private_key, HttpProvider, KeySessionProvider, Provider};

/// Connected wallet as seen by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletState {
    pub account: Option<Address>,
    pub network_id: Option<u64>,
}

impl WalletState {
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOption {
    /// Node-managed accounts (`eth_accounts` / `eth_sendTransaction`)
    Injected { rpc_url: String },
    /// Remote endpoint with a locally held signing key
    KeySession { rpc_url: String, private_key: String },
}

impl ProviderOption {
    pub fn title(&self) -> String {
        match self {
            ProviderOption::Injected { rpc_url } => format!("Injected wallet ({})", rpc_url),
            ProviderOption::KeySession { rpc_url, .. } => format!("Key session ({})", rpc_url),
        }
    }

    /// Options available for a configuration; the key session is offered
    /// only when a private key is configured.
    pub fn from_config(config: &AppConfig) -> Vec<ProviderOption> {
        let mut options = vec![ProviderOption::Injected {
            rpc_url: config.rpc_url.clone(),
        }];
        if let Some(key) = &config.private_key {
            options.push(ProviderOption::KeySession {
                rpc_url: config.rpc_url.clone(),
                private_key: key.clone(),
            });
        }
        options
    }
}

/// Provider-selection modal.
pub trait ProviderPrompt: Send {
    /// Index of the chosen option, or `None` if the user dismissed the modal.
    fn choose(&mut self, options: &[ProviderOption]) -> Option<usize>;

    fn close(&mut self);
}

/// Non-interactive prompt that always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct PresetChoice(pub Option<usize>);

impl ProviderPrompt for PresetChoice {
    fn choose(&mut self, options: &[ProviderOption]) -> Option<usize> {
        self.0.filter(|index| *index < options.len())
    }

    fn close(&mut self) {}
}

struct ModalGuard<'a> {
    prompt: &'a mut dyn ProviderPrompt,
}

impl<'a> ModalGuard<'a> {
    fn open(prompt: &'a mut dyn ProviderPrompt) -> Self {
        log::debug!("Wallet selection opened");
        Self { prompt }
    }
}

impl Drop for ModalGuard<'_> {
    fn drop(&mut self) {
        self.prompt.close();
        log::debug!("Wallet selection closed");
    }
}

/// Live connection handed to the rest of the application.
pub struct Connection {
    pub chain: ChainClient,
    pub wallet: WalletState,
    pub provider_label: String,
}

impl Connection {
    pub fn account(&self) -> Result<Address> {
        self.wallet.account.ok_or(CompoundError::NotConnected)
    }
}

pub struct WalletConnector {
    options: Vec<ProviderOption>,
    poll_interval: Duration,
    max_attempts: Option<u32>,
}

impl WalletConnector {
    pub fn new(options: Vec<ProviderOption>) -> Self {
        Self {
            options,
            poll_interval: Duration::from_secs(2),
            max_attempts: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            options: ProviderOption::from_config(config),
            poll_interval: config.receipt_poll_interval,
            max_attempts: config.receipt_max_attempts,
        }
    }

    pub fn options(&self) -> &[ProviderOption] {
        &self.options
    }

    /// Instantiate the provider behind an option.
    pub fn open_provider(option: &ProviderOption) -> Result<Arc<dyn Provider>> {
        match option {
            ProviderOption::Injected { rpc_url } => Ok(Arc::new(HttpProvider::new(rpc_url.clone()))),
            ProviderOption::KeySession {
                rpc_url,
                private_key,
            } => {
                let key = parse_private_key(private_key)?;
                let transport: Arc<dyn Provider> = Arc::new(HttpProvider::new(rpc_url.clone()));
                Ok(Arc::new(KeySessionProvider::new(transport, key)))
            }
        }
    }

    /// Let the user pick a provider and authorize it.
    ///
    /// Returns `Ok(None)` when the selection is dismissed. A wallet that
    /// refuses account access yields [`CompoundError::UserCancelled`].
    pub async fn connect(&self, prompt: &mut dyn ProviderPrompt) -> Result<Option<Connection>> {
        let modal = ModalGuard::open(prompt);

        let Some(index) = modal.prompt.choose(&self.options) else {
            log::info!("Wallet selection dismissed");
            return Ok(None);
        };
        let option = self.options.get(index).ok_or_else(|| {
            CompoundError::Input(format!("no provider option #{}", index))
        })?;

        let provider = Self::open_provider(option)?;
        self.authorize(provider).await.map(Some)
    }

    /// Authorize an already opened provider.
    pub async fn authorize(&self, provider: Arc<dyn Provider>) -> Result<Connection> {
        let provider_label = provider.label();
        let chain = ChainClient::new(provider)
            .with_receipt_polling(self.poll_interval, self.max_attempts);

        let accounts = match chain.request_accounts().await {
            Ok(accounts) => accounts,
            Err(CompoundError::SignatureRejected(_)) => return Err(CompoundError::UserCancelled),
            Err(e) => {
                log::debug!("eth_requestAccounts unavailable ({}), using eth_accounts", e);
                chain.accounts().await?
            }
        };
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| CompoundError::provider("wallet exposed no accounts"))?;
        let network_id = chain.network_id().await?;

        log::info!(
            "🔗 Connected {} on network {} via {}",
            account,
            network_id,
            provider_label
        );

        Ok(Connection {
            chain,
            wallet: WalletState {
                account: Some(account),
                network_id: Some(network_id),
            },
            provider_label,
        })
    }
}
