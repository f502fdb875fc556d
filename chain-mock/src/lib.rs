/// Chain Mock Library
///
/// In-memory Ethereum JSON-RPC node simulating DAI, cDAI, the contract
/// proxy kit factory, its proxies and MultiSend. Used as a standalone
/// binary for local development and as a library by integration tests.

pub mod abi;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod raw_tx;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use error::{Revert, RpcError};
pub use handlers::{dispatch, lock, AppState};
pub use ledger::{addresses, proxy_address, ExecutedCall, Ledger, LedgerConfig, MinedTransaction, DEV_ACCOUNT};
pub use server::{create_router, run_server, spawn};
