//! Money-market integration tests
//!
//! Drives the form through the HTTP provider against an in-memory chain and
//! checks the mined transactions and resulting balances.
//!
//! Run with: cargo test --test money_market_test -- --nocapture

mod common;

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use chain_mock::addresses::{CDAI, DAI, FACTORY};
use chain_mock::LedgerConfig;
use common::{dai, expected_proxy, TestChain, OWNER};
use cpk_compound::abi::{CErc20, Erc20, GnosisSafe};
use cpk_compound::provider::signer::{address_of, parse_private_key};
use cpk_compound::{CompoundError, FormPhase, RefreshOutcome, Route};

#[tokio::test]
async fn test_first_deposit_tops_up_then_deploys_proxy() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let config = chain.config(Route::Proxy);
    let form = chain.form(&config, 0).await?;

    let proxy = form.proxy_handle().expect("proxy route").proxy_address;
    assert_eq!(proxy, expected_proxy(OWNER));

    // connecting already loads the first snapshot
    assert_eq!(form.phase(), FormPhase::DataLoaded);
    let before = form.snapshot().expect("snapshot loaded on connect");
    assert_eq!(before.underlying_balance, dai(500));
    assert_eq!(before.proxy_underlying_balance, dai(0));
    assert_eq!(before.locked_underlying, dai(0));
    assert_eq!(before.supply_apr, "6.67");

    form.deposit("100").await?;

    let txs = chain.transactions();
    assert_eq!(txs.len(), 2);

    // 1. top-up straight from the owner
    assert_eq!((txs[0].from, txs[0].to), (OWNER, DAI));
    let top_up = Erc20::transferCall::abi_decode(&txs[0].input, true)?;
    assert_eq!(top_up.recipient, proxy);
    assert_eq!(top_up.amount, dai(100));

    // 2. proxy deployment carrying [approve, mint]
    assert!(txs[1].succeeded);
    assert_eq!((txs[1].from, txs[1].to), (OWNER, FACTORY));
    let inner = txs[1].inner_calls_from(proxy);
    assert_eq!(inner.len(), 2);
    assert_eq!(inner[0].target, DAI);
    let approve = Erc20::approveCall::abi_decode(&inner[0].input, true)?;
    assert_eq!((approve.spender, approve.amount), (CDAI, dai(100)));
    assert_eq!(inner[1].target, CDAI);
    let mint = CErc20::mintCall::abi_decode(&inner[1].input, true)?;
    assert_eq!(mint.mintAmount, dai(100));

    let after = form.snapshot().expect("snapshot after deposit");
    assert_eq!(after.underlying_balance, dai(400));
    assert_eq!(after.proxy_underlying_balance, dai(0));
    assert_eq!(after.locked_underlying, dai(100));
    assert_eq!(form.phase(), FormPhase::DataLoaded);
    assert!(form.last_error().is_none());
    assert!(form.proxy().expect("proxy route").is_deployed().await?);
    Ok(())
}

#[tokio::test]
async fn test_later_deposit_goes_through_exec_transaction_and_counts_parked_funds(
) -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;
    let proxy = expected_proxy(OWNER);

    form.deposit("100").await?;
    chain.fund(proxy, dai(30));
    form.deposit("50").await?;

    let txs = chain.transactions();
    assert_eq!(txs.len(), 4);

    let top_up = Erc20::transferCall::abi_decode(&txs[2].input, true)?;
    assert_eq!(top_up.amount, dai(20));

    assert_eq!(txs[3].to, proxy);
    let exec = GnosisSafe::execTransactionCall::abi_decode(&txs[3].input, true)?;
    assert_eq!(exec.operation, 1);
    assert_eq!(&exec.signatures[12..32], OWNER.as_slice());

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.underlying_balance, dai(380));
    assert_eq!(snapshot.locked_underlying, dai(150));
    assert_eq!(chain.supplied(proxy), dai(150));
    Ok(())
}

#[tokio::test]
async fn test_no_top_up_when_proxy_already_holds_enough() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;
    chain.fund(expected_proxy(OWNER), dai(100));

    form.deposit("100").await?;

    let txs = chain.transactions();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].to, FACTORY);
    assert_eq!(chain.dai_balance(OWNER), dai(500));
    Ok(())
}

#[tokio::test]
async fn test_withdraw_returns_funds_to_owner() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;
    let proxy = expected_proxy(OWNER);

    form.deposit("100").await?;
    form.withdraw("40.5").await?;

    let txs = chain.transactions();
    let withdrawal = txs.last().expect("withdraw transaction");
    assert_eq!(withdrawal.to, proxy);

    let inner = withdrawal.inner_calls_from(proxy);
    assert_eq!(inner.len(), 2);
    let redeem = CErc20::redeemUnderlyingCall::abi_decode(&inner[0].input, true)?;
    assert_eq!(redeem.redeemAmount, dai(405) / alloy_primitives::U256::from(10u64));
    let transfer = Erc20::transferCall::abi_decode(&inner[1].input, true)?;
    assert_eq!(transfer.recipient, OWNER);

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(cpk_compound::format_amount(snapshot.underlying_balance), "440.5000");
    assert_eq!(cpk_compound::format_amount(snapshot.locked_underlying), "59.5000");
    assert_eq!(snapshot.proxy_underlying_balance, dai(0));
    Ok(())
}

#[tokio::test]
async fn test_reverting_batch_is_surfaced_and_changes_nothing() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;

    form.deposit("100").await?;
    let mined = chain.transactions().len();

    let err = form.withdraw("500").await.unwrap_err();
    assert!(err.is_revert(), "unexpected error: {}", err);
    assert!(err.to_string().contains("redeem amount exceeds supplied balance"));

    // refused during the preflight call, nothing was mined
    assert_eq!(chain.transactions().len(), mined);
    assert_eq!(form.phase(), FormPhase::DataLoaded);
    assert!(form.last_error().is_some());

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.underlying_balance, dai(400));
    assert_eq!(snapshot.locked_underlying, dai(100));
    Ok(())
}

#[tokio::test]
async fn test_failed_batch_after_top_up_reports_parked_funds() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let mut config = chain.config(Route::Proxy);
    // unknown to the factory, so deployment reverts after the top-up landed
    config.proxy_kit.master_copy = Address::repeat_byte(0x77);
    let form = chain.form(&config, 0).await?;
    let proxy = form.proxy_handle().expect("proxy route").proxy_address;

    let err = form.deposit("100").await.unwrap_err();
    let (parked, source) = match err {
        CompoundError::DepositIncomplete { parked, source } => (parked, source),
        other => panic!("expected DepositIncomplete, got {}", other),
    };
    assert_eq!(parked, dai(100));
    assert!(source.is_revert());

    let txs = chain.transactions();
    assert_eq!(txs.len(), 2);
    assert!(txs[0].succeeded);
    assert!(!txs[1].succeeded);
    assert_eq!(txs[1].revert_reason.as_deref(), Some("unknown master copy"));

    assert_eq!(chain.dai_balance(proxy), dai(100));
    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.proxy_underlying_balance, dai(100));
    assert!(form.last_error().unwrap_or_default().contains("Deposit incomplete"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_amount_sends_nothing() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;

    for input in ["", "ten", "-5", "1.0000000000000000001"] {
        assert!(matches!(form.deposit(input).await, Err(CompoundError::Input(_))));
    }
    assert!(chain.transactions().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_direct_route_sends_each_call_from_owner() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Direct), 0).await?;
    assert!(form.proxy_handle().is_none());
    assert_eq!(form.position_holder(), OWNER);

    form.deposit("100").await?;

    let txs = chain.transactions();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.from == OWNER && tx.succeeded));
    assert_eq!(txs[0].to, DAI);
    assert_eq!(
        txs[0].input.get(..4),
        Some(&Erc20::approveCall::SELECTOR[..])
    );
    assert_eq!(txs[1].to, CDAI);
    assert_eq!(chain.supplied(OWNER), dai(100));

    let snapshot = form.snapshot().expect("snapshot");
    assert_eq!(snapshot.underlying_balance, dai(400));
    assert_eq!(snapshot.proxy_underlying_balance, dai(400));
    assert_eq!(snapshot.locked_underlying, dai(100));

    form.withdraw("100").await?;
    assert_eq!(chain.supplied(OWNER), dai(0));
    assert_eq!(chain.dai_balance(OWNER), dai(500));
    Ok(())
}

#[tokio::test]
async fn test_key_session_transactions_are_signed_locally() -> anyhow::Result<()> {
    let chain = TestChain::start(LedgerConfig::default()).await?;
    let private_key = format!("0x{}", "11".repeat(32));
    let signer = address_of(&parse_private_key(&private_key)?);
    chain.fund(signer, dai(200));

    let mut config = chain.config(Route::Proxy);
    config.private_key = Some(private_key);
    let form = chain.form(&config, 1).await?;
    assert_eq!(form.owner(), signer);

    form.deposit("10").await?;

    let txs = chain.transactions();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.from == signer && tx.succeeded));
    assert_eq!(chain.supplied(expected_proxy(signer)), dai(10));
    assert_eq!(chain.dai_balance(signer), dai(190));
    Ok(())
}

#[tokio::test]
async fn test_disconnect_clears_wallet() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;
    form.refresh().await?;

    form.disconnect();
    assert_eq!(form.phase(), FormPhase::Disconnected);
    assert!(form.snapshot().is_none());
    assert!(matches!(form.withdraw("1").await, Err(CompoundError::NotConnected)));
    Ok(())
}

#[tokio::test]
async fn test_refresh_after_connect_replaces_snapshot() -> anyhow::Result<()> {
    let chain = TestChain::with_owner_funds(dai(500)).await?;
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;
    let initial = form.snapshot().expect("snapshot loaded on connect");
    assert_eq!(initial.underlying_balance, dai(500));

    chain.fund(OWNER, dai(25));
    let RefreshOutcome::Applied(refreshed) = form.refresh().await? else {
        panic!("single refresh must be applied");
    };
    assert_eq!(refreshed.underlying_balance, dai(525));
    assert_eq!(form.snapshot(), Some(refreshed));
    Ok(())
}

#[tokio::test]
async fn test_batch_simulating_to_false_is_not_sent() -> anyhow::Result<()> {
    let chain = TestChain::start(LedgerConfig {
        soft_exec_failures: true,
        ..LedgerConfig::default()
    })
    .await?;
    chain.fund(OWNER, dai(500));
    let form = chain.form(&chain.config(Route::Proxy), 0).await?;

    form.deposit("100").await?;
    let mined = chain.transactions().len();

    // the proxy answers `false` instead of reverting
    let err = form.withdraw("500").await.unwrap_err();
    assert!(err.is_revert(), "unexpected error: {}", err);
    assert!(err.to_string().contains("proxy reported failure"));

    assert_eq!(chain.transactions().len(), mined);
    assert_eq!(chain.supplied(expected_proxy(OWNER)), dai(100));
    assert_eq!(chain.dai_balance(OWNER), dai(400));
    Ok(())
}
