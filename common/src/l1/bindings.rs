use alloy::{
    primitives::{B256, b256},
    sol,
};

/// Storage slot of the bridge's latest keystore state root. Fixed by the
/// bridge contract layout; `eth_getProof` against this slot is what gets
/// relayed to the destination chain.
pub const LATEST_STATE_ROOT_SLOT: B256 =
    b256!("0xc94330da5d5688c06df0ade6bfd773c87249c0b9f38b25021e2c16ab9672d000");

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface KeystoreBridge {
        event TransactionInitiated(bytes32 indexed l2TransactionHash, address indexed from, bytes transaction);
        event WithdrawalFinalized(bytes32 indexed withdrawalTransactionHash, address indexed to, uint256 amount);

        function latestStateRoot() external view returns (bytes32);
        function initiateTransaction(bytes calldata transaction) external payable;
        function finalizeWithdrawal(
            uint256 keystoreBlockNumber,
            bytes calldata withdrawalTransaction,
            bytes32[] calldata proof
        ) external;
    }
);
