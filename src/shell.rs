//! Text rendering of the connected wallet and the market snapshot
//!
//! Presentation settings are passed in explicitly through [`ShellConfig`];
//! nothing here touches the network.

use alloy_primitives::{keccak256, Address};

use crate::connector::WalletState;
use crate::market::{FormPhase, MoneyMarketSnapshot};
use crate::proxy::ProxyHandle;
use crate::units::format_amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub title: String,
    /// `#rrggbb`
    pub accent: String,
    /// Human name of the network, shown next to the account
    pub network_label: String,
    /// Emit ANSI colour codes
    pub color: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            title: "Safe Contract Proxy Kit Compound Example".to_string(),
            accent: "#008c73".to_string(),
            network_label: "rinkeby".to_string(),
            color: false,
        }
    }
}

fn parse_accent(accent: &str) -> Option<(u8, u8, u8)> {
    let hex = accent.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let bytes = hex::decode(hex).ok()?;
    Some((bytes[0], bytes[1], bytes[2]))
}

/// 5x5 mirrored identicon for an address, one string per row.
pub fn blockie(address: Address) -> Vec<String> {
    let seed = keccak256(address);
    (0..5)
        .map(|row| {
            let cells: Vec<bool> = (0..3).map(|col| seed[row * 3 + col] & 1 == 1).collect();
            [cells[0], cells[1], cells[2], cells[1], cells[0]]
                .iter()
                .map(|filled| if *filled { "██" } else { "  " })
                .collect::<String>()
        })
        .collect()
}

/// Shortened `0x1234…abcd` form of an address.
pub fn short_address(address: Address) -> String {
    let full = address.to_checksum(None);
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

pub struct ViewShell {
    config: ShellConfig,
}

impl ViewShell {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    fn accented(&self, text: &str) -> String {
        match parse_accent(&self.config.accent) {
            Some((r, g, b)) if self.config.color => {
                format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, text)
            }
            _ => text.to_string(),
        }
    }

    pub fn header(&self) -> String {
        let rule = "═".repeat(self.config.title.chars().count());
        format!("{}\n{}", self.accented(&self.config.title), rule)
    }

    /// Wallet line with identicon, or `None` when nothing is connected.
    pub fn wallet_info(&self, wallet: &WalletState) -> Option<String> {
        let account = wallet.account?;
        let network = match wallet.network_id {
            Some(id) => format!("{} (id {})", self.config.network_label, id),
            None => self.config.network_label.clone(),
        };

        let mut lines = blockie(account);
        lines[1].push_str(&format!("  {}", self.accented(&short_address(account))));
        lines[3].push_str(&format!("  {}", network));
        Some(lines.join("\n"))
    }

    pub fn proxy_info(&self, handle: &ProxyHandle, deployed: bool) -> String {
        format!(
            "Proxy: {} ({})",
            handle.proxy_address.to_checksum(None),
            if deployed { "deployed" } else { "not deployed yet" }
        )
    }

    pub fn snapshot(&self, snapshot: &MoneyMarketSnapshot) -> String {
        [
            format!("Supply APR:          {}%", snapshot.supply_apr),
            format!("Your DAI:            {}", format_amount(snapshot.underlying_balance)),
            format!("Proxy DAI:           {}", format_amount(snapshot.proxy_underlying_balance)),
            format!("Locked in Compound:  {}", format_amount(snapshot.locked_underlying)),
            format!(
                "Updated:             {}",
                snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        ]
        .join("\n")
    }

    pub fn status(&self, phase: FormPhase, last_error: Option<&str>) -> String {
        let phase = match phase {
            FormPhase::Disconnected => "Disconnected".to_string(),
            FormPhase::Connected => "Connected".to_string(),
            FormPhase::DataLoaded => "Ready".to_string(),
            FormPhase::Submitting(action) => format!("Submitting {}…", action.name()),
        };
        match last_error {
            Some(error) => format!("{}  (last error: {})", phase, error),
            None => phase,
        }
    }
}
