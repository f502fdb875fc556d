//! Money-market form
//!
//! Reads the market snapshot and submits deposit and withdraw batches for the
//! connected owner. Phases move
//! `Disconnected -> Connected -> DataLoaded -> Submitting -> DataLoaded`;
//! a failed submission records `last_error` and the snapshot is re-fetched
//! either way.
//!
//! The form is shared by reference: at most one submission runs at a time
//! (a second one fails with [`CompoundError::SubmissionInFlight`]) and only
//! the most recently started refresh may replace the snapshot.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::abi::{CErc20, CErc20Abi, Erc20, Erc20Abi};
use crate::batch::{top_up_amount, PendingTransactionBatch};
use crate::chain::{ChainClient, Contract, TransactionReceipt};
use crate::config::{AppConfig, MarketAddresses, Route};
use crate::connector::{Connection, WalletState};
use crate::error::{CompoundError, Result};
use crate::provider::TransactionRequest;
use crate::proxy::{ProxyClient, ProxyHandle};
use crate::units::{format_amount, parse_amount, supply_apr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneyMarketSnapshot {
    /// Annualised supply rate, percent with 2 decimals
    pub supply_apr: String,
    /// Owner's DAI balance
    pub underlying_balance: U256,
    /// DAI parked at the position holder (the proxy, or the owner on the direct route)
    pub proxy_underlying_balance: U256,
    /// DAI supplied to Compound by the position holder
    pub locked_underlying: U256,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Deposit,
    Withdraw,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Deposit => "deposit",
            Action::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Disconnected,
    Connected,
    DataLoaded,
    Submitting(Action),
}

/// Token identifying one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshToken(u64);

/// Hands out increasing refresh tokens; only the newest one may be applied.
#[derive(Debug, Default)]
pub struct RefreshSequencer {
    issued: AtomicU64,
}

impl RefreshSequencer {
    pub fn issue(&self) -> RefreshToken {
        RefreshToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, token: RefreshToken) -> bool {
        self.issued.load(Ordering::SeqCst) == token.0
    }
}

/// Result of a refresh that completed without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(MoneyMarketSnapshot),
    /// A newer refresh was started meanwhile; this result was dropped.
    Stale,
}

#[derive(Debug)]
struct FormState {
    phase: FormPhase,
    wallet: WalletState,
    snapshot: Option<MoneyMarketSnapshot>,
    last_error: Option<String>,
}

pub struct MoneyMarketForm {
    chain: ChainClient,
    owner: Address,
    market: MarketAddresses,
    route: Route,
    blocks_per_year: u64,
    proxy: Option<ProxyClient>,
    dai: Contract<Erc20Abi>,
    cdai: Contract<CErc20Abi>,
    state: Mutex<FormState>,
    refreshes: RefreshSequencer,
}

impl MoneyMarketForm {
    /// Build the form for a live connection and load the first snapshot, so
    /// the form comes back in [`FormPhase::DataLoaded`]. On the proxy route
    /// this also fetches the factory's creation code to resolve the owner's
    /// proxy.
    pub async fn connect(connection: Connection, config: &AppConfig) -> Result<Self> {
        let owner = connection.account()?;
        let proxy = match config.route {
            Route::Proxy => Some(
                ProxyClient::new(connection.chain.clone(), owner, config.proxy_kit.clone()).await?,
            ),
            Route::Direct => {
                log::info!("↪️  Direct route: {} holds the position itself", owner);
                None
            }
        };

        let form = Self::new(
            connection.chain,
            connection.wallet,
            config.market,
            config.route,
            config.blocks_per_year,
            proxy,
        );
        form.refresh().await?;
        Ok(form)
    }

    pub fn new(
        chain: ChainClient,
        wallet: WalletState,
        market: MarketAddresses,
        route: Route,
        blocks_per_year: u64,
        proxy: Option<ProxyClient>,
    ) -> Self {
        let owner = wallet.account.unwrap_or_default();
        let phase = if wallet.is_connected() {
            FormPhase::Connected
        } else {
            FormPhase::Disconnected
        };

        Self {
            dai: chain.contract(market.dai),
            cdai: chain.contract(market.cdai),
            chain,
            owner,
            market,
            route,
            blocks_per_year,
            proxy,
            state: Mutex::new(FormState {
                phase,
                wallet,
                snapshot: None,
                last_error: None,
            }),
            refreshes: RefreshSequencer::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn phase(&self) -> FormPhase {
        self.lock().phase
    }

    pub fn wallet(&self) -> WalletState {
        self.lock().wallet.clone()
    }

    pub fn snapshot(&self) -> Option<MoneyMarketSnapshot> {
        self.lock().snapshot.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Proxy client, `None` on the direct route.
    pub fn proxy(&self) -> Option<&ProxyClient> {
        self.proxy.as_ref()
    }

    pub fn proxy_handle(&self) -> Option<ProxyHandle> {
        self.proxy.as_ref().map(ProxyClient::handle)
    }

    /// Address whose DAI and cDAI make up the position.
    pub fn position_holder(&self) -> Address {
        self.proxy_handle()
            .map(|handle| handle.proxy_address)
            .unwrap_or(self.owner)
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.lock().phase {
            FormPhase::Disconnected => Err(CompoundError::NotConnected),
            _ => Ok(()),
        }
    }

    /// Forget the wallet and the snapshot; every later operation fails with
    /// [`CompoundError::NotConnected`].
    pub fn disconnect(&self) {
        let mut state = self.lock();
        state.phase = FormPhase::Disconnected;
        state.wallet.clear();
        state.snapshot = None;
        state.last_error = None;
        log::info!("👋 Wallet disconnected");
    }

    /// Re-read the market.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        self.ensure_connected()?;
        let token = self.refreshes.issue();
        let snapshot = self.fetch_snapshot().await?;

        if self.apply_refresh(token, snapshot.clone()) {
            Ok(RefreshOutcome::Applied(snapshot))
        } else {
            log::debug!("Dropping stale refresh {:?}", token);
            Ok(RefreshOutcome::Stale)
        }
    }

    pub(crate) fn apply_refresh(&self, token: RefreshToken, snapshot: MoneyMarketSnapshot) -> bool {
        let mut state = self.lock();
        if state.phase == FormPhase::Disconnected || !self.refreshes.is_latest(token) {
            return false;
        }
        state.snapshot = Some(snapshot);
        if state.phase == FormPhase::Connected {
            state.phase = FormPhase::DataLoaded;
        }
        true
    }

    async fn fetch_snapshot(&self) -> Result<MoneyMarketSnapshot> {
        let holder = self.position_holder();
        let (rate, owner_balance, holder_balance, locked) = futures::try_join!(
            self.cdai.call(CErc20::supplyRatePerBlockCall {}),
            self.dai.call(Erc20::balanceOfCall { owner: self.owner }),
            self.dai.call(Erc20::balanceOfCall { owner: holder }),
            self.cdai.call(CErc20::balanceOfUnderlyingCall { owner: holder }),
        )?;

        Ok(MoneyMarketSnapshot {
            supply_apr: supply_apr(rate._0, self.blocks_per_year)?,
            underlying_balance: owner_balance._0,
            proxy_underlying_balance: holder_balance._0,
            locked_underlying: locked._0,
            fetched_at: Utc::now(),
        })
    }

    /// Supply `amount` DAI (decimal string) to Compound.
    pub async fn deposit(&self, amount: &str) -> Result<TransactionReceipt> {
        let amount = parse_amount(amount)?;
        self.begin_submit(Action::Deposit)?;
        log::info!("💰 Depositing {} DAI", format_amount(amount));

        let result = self.submit_deposit(amount).await;
        self.finish_submit(Action::Deposit, &result).await;
        result
    }

    /// Redeem `amount` DAI (decimal string) back to the owner.
    pub async fn withdraw(&self, amount: &str) -> Result<TransactionReceipt> {
        let amount = parse_amount(amount)?;
        self.begin_submit(Action::Withdraw)?;
        log::info!("🏧 Withdrawing {} DAI", format_amount(amount));

        let batch = PendingTransactionBatch::withdraw(&self.market, self.owner, amount);
        let result = self.execute(&batch).await;
        self.finish_submit(Action::Withdraw, &result).await;
        result
    }

    pub(crate) fn begin_submit(&self, action: Action) -> Result<()> {
        let mut state = self.lock();
        match state.phase {
            FormPhase::Disconnected => Err(CompoundError::NotConnected),
            FormPhase::Submitting(running) => {
                log::warn!(
                    "Rejecting {} while a {} is in flight",
                    action.name(),
                    running.name()
                );
                Err(CompoundError::SubmissionInFlight)
            }
            FormPhase::Connected | FormPhase::DataLoaded => {
                state.phase = FormPhase::Submitting(action);
                Ok(())
            }
        }
    }

    async fn finish_submit(&self, action: Action, result: &Result<TransactionReceipt>) {
        match result {
            Ok(receipt) => {
                log::info!("✅ {} confirmed in {}", action.name(), receipt.transaction_hash);
                self.lock().last_error = None;
            }
            Err(e) => {
                log::error!("❌ {} failed: {}", action.name(), e);
                self.lock().last_error = Some(e.to_string());
            }
        }

        // Leave Submitting first so the refresh below may apply its result.
        {
            let mut state = self.lock();
            if let FormPhase::Submitting(_) = state.phase {
                state.phase = if state.snapshot.is_some() {
                    FormPhase::DataLoaded
                } else {
                    FormPhase::Connected
                };
            }
        }

        if let Err(e) = self.refresh().await {
            log::warn!("Refresh after {} failed: {}", action.name(), e);
            let mut state = self.lock();
            if state.last_error.is_none() {
                state.last_error = Some(e.to_string());
            }
        }
    }

    async fn submit_deposit(&self, amount: U256) -> Result<TransactionReceipt> {
        let batch = PendingTransactionBatch::deposit(&self.market, amount);
        let Some(proxy) = &self.proxy else {
            return self.execute(&batch).await;
        };

        let holder = proxy.handle().proxy_address;
        let available = self
            .dai
            .call(Erc20::balanceOfCall { owner: holder })
            .await?
            ._0;

        let Some(top_up) = top_up_amount(available, amount) else {
            log::info!(
                "Proxy already holds {} DAI, no top-up needed",
                format_amount(available)
            );
            return proxy.execute(&batch).await;
        };

        log::info!(
            "💸 Topping up proxy {} with {} DAI",
            holder,
            format_amount(top_up)
        );
        self.dai
            .send(
                Erc20::transferCall {
                    recipient: holder,
                    amount: top_up,
                },
                self.owner,
            )
            .await?;

        proxy
            .execute(&batch)
            .await
            .map_err(|source| CompoundError::DepositIncomplete {
                parked: available + top_up,
                source: Box::new(source),
            })
    }

    async fn execute(&self, batch: &PendingTransactionBatch) -> Result<TransactionReceipt> {
        match &self.proxy {
            Some(proxy) => proxy.execute(batch).await,
            None => self.execute_direct(batch).await,
        }
    }

    /// Send each call of the batch from the owner, in order. Not atomic:
    /// stops at the first failure, earlier calls stay mined.
    async fn execute_direct(&self, batch: &PendingTransactionBatch) -> Result<TransactionReceipt> {
        let mut last = None;
        for (index, call) in batch.calls().iter().enumerate() {
            log::debug!("Direct call {}/{} to {}", index + 1, batch.len(), call.target);
            let tx = TransactionRequest::call(call.target, call.call_data.clone())
                .from(self.owner)
                .value(call.value);
            last = Some(self.chain.send_and_confirm(&tx).await?);
        }
        last.ok_or_else(|| CompoundError::Input("cannot execute an empty batch".to_string()))
    }
}
