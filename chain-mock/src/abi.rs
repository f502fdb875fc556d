/// Contract interfaces simulated by the mock node

use alloy_sol_types::sol;

sol! {
    interface Erc20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address recipient, uint256 amount) external returns (bool);
    }

    interface CErc20 {
        function supplyRatePerBlock() external view returns (uint256);
        function mint(uint256 mintAmount) external returns (uint256);
        function redeemUnderlying(uint256 redeemAmount) external returns (uint256);
        function balanceOfUnderlying(address owner) external returns (uint256);
    }

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

    interface MultiSend {
        function multiSend(bytes transactions) external;
    }
}
