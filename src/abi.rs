//! Contract interfaces consumed over the ABI boundary
//!
//! Each `sol!` interface generates one call type per function. A marker type
//! per interface ties those calls together: [`crate::chain::Contract`] is
//! parameterised by the marker, and only calls implementing
//! [`InterfaceCall`] for it type-check.

use alloy_sol_types::{sol, SolCall};

sol! {
    /// Subset of ERC-20 used for DAI.
    interface Erc20 {
        function balanceOf(address owner) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address recipient, uint256 amount) external returns (bool);
    }

    /// Compound cERC20 market (cDAI).
    interface CErc20 {
        function supplyRatePerBlock() external view returns (uint256);
        function mint(uint256 mintAmount) external returns (uint256);
        function redeemUnderlying(uint256 redeemAmount) external returns (uint256);
        function balanceOfUnderlying(address owner) external returns (uint256);
    }

    /// Safe proxy entry point.
    interface GnosisSafe {
        function execTransaction(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address refundReceiver,
            bytes signatures
        ) external returns (bool);
    }

    /// Contract proxy kit factory (CREATE2 deployment plus first execution).
    interface CpkFactory {
        function proxyCreationCode() external pure returns (bytes);
        function createProxyAndExecTransaction(
            address masterCopy,
            uint256 saltNonce,
            address fallbackHandler,
            address to,
            uint256 value,
            bytes data,
            uint8 operation
        ) external returns (bool);
    }

    /// Executes packed sub-calls when delegate-called from a proxy.
    interface MultiSend {
        function multiSend(bytes transactions) external;
    }
}

/// A call that belongs to the ABI described by marker `I`.
pub trait InterfaceCall<I>: SolCall {}

macro_rules! interface_calls {
    ($marker:ident => $($call:ty),+ $(,)?) => {
        $(impl InterfaceCall<$marker> for $call {})+
    };
}

/// ERC-20 token (DAI).
#[derive(Debug, Clone, Copy)]
pub struct Erc20Abi;

/// Compound cERC20 market (cDAI).
#[derive(Debug, Clone, Copy)]
pub struct CErc20Abi;

/// Safe proxy.
#[derive(Debug, Clone, Copy)]
pub struct SafeAbi;

/// Proxy kit factory.
#[derive(Debug, Clone, Copy)]
pub struct CpkFactoryAbi;

interface_calls!(Erc20Abi =>
    Erc20::balanceOfCall,
    Erc20::approveCall,
    Erc20::transferCall,
);

interface_calls!(CErc20Abi =>
    CErc20::supplyRatePerBlockCall,
    CErc20::mintCall,
    CErc20::redeemUnderlyingCall,
    CErc20::balanceOfUnderlyingCall,
);

interface_calls!(SafeAbi => GnosisSafe::execTransactionCall);

interface_calls!(CpkFactoryAbi =>
    CpkFactory::proxyCreationCodeCall,
    CpkFactory::createProxyAndExecTransactionCall,
);
