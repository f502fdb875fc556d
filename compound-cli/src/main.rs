use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};

use cpk_compound::{
    AppConfig, CompoundError, MoneyMarketForm, PresetChoice, ProviderOption, ProviderPrompt,
    Route, ShellConfig, ViewShell, WalletConnector,
};

#[derive(Parser)]
#[command(name = "compound-cli")]
#[command(about = "Supply DAI to Compound through a Safe contract proxy")]
struct Cli {
    /// Execute batches through the proxy (default) or call the market directly
    #[arg(long, value_enum)]
    route: Option<RouteArg>,

    /// Skip the wallet selection menu
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Colour the output with the accent colour
    #[arg(long)]
    color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum RouteArg {
    Proxy,
    Direct,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    /// Accounts unlocked on the node
    Injected,
    /// Local signing with PRIVATE_KEY
    Key,
}

#[derive(Subcommand)]
enum Commands {
    /// Show balances and the supply APR
    Status,
    /// Show the proxy address and whether it is deployed
    Proxy,
    /// Supply DAI to Compound
    Deposit {
        #[arg(value_name = "AMOUNT")]
        amount: String,
    },
    /// Redeem DAI from Compound
    Withdraw {
        #[arg(value_name = "AMOUNT")]
        amount: String,
    },
}

/// Numbered wallet menu on stdin; an empty line or `q` dismisses it.
struct TerminalPrompt;

impl ProviderPrompt for TerminalPrompt {
    fn choose(&mut self, options: &[ProviderOption]) -> Option<usize> {
        println!("Select a wallet:");
        for (index, option) in options.iter().enumerate() {
            println!("  {}) {}", index + 1, option.title());
        }

        let stdin = io::stdin();
        loop {
            print!("> ");
            io::stdout().flush().ok()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).ok()? == 0 {
                return None;
            }
            match line.trim() {
                "" | "q" => return None,
                choice => match choice.parse::<usize>() {
                    Ok(n) if (1..=options.len()).contains(&n) => return Some(n - 1),
                    _ => println!("Enter 1-{} or q", options.len()),
                },
            }
        }
    }

    fn close(&mut self) {
        println!();
    }
}

fn preset_index(options: &[ProviderOption], provider: ProviderArg) -> Result<usize> {
    options
        .iter()
        .position(|option| match (provider, option) {
            (ProviderArg::Injected, ProviderOption::Injected { .. }) => true,
            (ProviderArg::Key, ProviderOption::KeySession { .. }) => true,
            _ => false,
        })
        .context("Key session requested but PRIVATE_KEY is not set")
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(route) = cli.route {
        config.route = match route {
            RouteArg::Proxy => Route::Proxy,
            RouteArg::Direct => Route::Direct,
        };
    }

    let shell = ViewShell::new(ShellConfig {
        network_label: config.network.name().to_string(),
        color: cli.color,
        ..ShellConfig::default()
    });
    println!("{}\n", shell.header());

    let connector = WalletConnector::from_config(&config);
    let connection = match cli.provider {
        Some(provider) => {
            let index = preset_index(connector.options(), provider)?;
            connector.connect(&mut PresetChoice(Some(index))).await?
        }
        None => connector.connect(&mut TerminalPrompt).await?,
    };
    let Some(connection) = connection else {
        println!("No wallet selected.");
        return Ok(());
    };

    if let Some(info) = shell.wallet_info(&connection.wallet) {
        println!("{}\n", info);
    }

    let form = MoneyMarketForm::connect(connection, &config).await?;

    let receipt = match cli.command {
        Commands::Status => None,
        Commands::Proxy => {
            match form.proxy() {
                Some(proxy) => {
                    let deployed = proxy.is_deployed().await?;
                    println!("{}", shell.proxy_info(&proxy.handle(), deployed));
                }
                None => println!("Direct route: no proxy in use"),
            }
            return Ok(());
        }
        Commands::Deposit { amount } => Some(form.deposit(&amount).await),
        Commands::Withdraw { amount } => Some(form.withdraw(&amount).await),
    };

    match receipt {
        Some(Ok(receipt)) => println!("Transaction {}\n", receipt.transaction_hash),
        Some(Err(CompoundError::DepositIncomplete { parked, source })) => {
            println!(
                "Deposit incomplete: {} DAI is parked at the proxy and counts towards the next deposit ({})\n",
                cpk_compound::format_amount(parked),
                source
            );
        }
        Some(Err(e)) => println!("Failed: {}\n", e),
        None => {}
    }

    if let Some(snapshot) = form.snapshot() {
        println!("{}", shell.snapshot(&snapshot));
    }
    println!("{}", shell.status(form.phase(), form.last_error().as_deref()));

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    run(Cli::parse()).await
}
