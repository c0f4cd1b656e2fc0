use alloy::{
    primitives::{Address, address, aliases::U192},
    sol,
};

/// ERC-4337 v0.7 entry point, deployed at the same address on every chain.
pub const ENTRY_POINT_ADDRESS: Address = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

/// OP-stack L1 attributes predeploy.
pub const L1_BLOCK_PREDEPLOY: Address = address!("0x4200000000000000000000000000000000000015");

sol!(
    /// Proof that the keystore bridge's latest-state-root slot held
    /// `storageValue` in the source block whose RLP header is `blockHeader`.
    #[derive(Debug, PartialEq)]
    struct StateRootProof {
        bytes32 storageValue;
        bytes blockHeader;
        bytes[] accountProof;
        bytes[] storageProof;
    }

    /// Preimage of the keystore output root, for oracles that commit to the
    /// full output root rather than the bare state root.
    #[derive(Debug, PartialEq)]
    struct OutputRootPreimage {
        bytes32 stateRoot;
        bytes32 withdrawalsRoot;
        bytes32 lastValidBlockhash;
    }

    /// Layout the validator module decodes when checking a key-data proof
    /// against the cached keystore state root.
    #[derive(Debug, PartialEq)]
    struct KeyDataProof {
        bool isExclusion;
        bytes exclusionExtraData;
        bytes1 nextDummyByte;
        bytes32 nextImtKey;
        bytes32 vkeyHash;
        bytes keyData;
        bytes32[] proof;
        uint256 isLeft;
    }

    /// ERC-4337 v0.7 packed user operation.
    #[derive(Debug, PartialEq)]
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        bytes32 accountGasLimits;
        uint256 preVerificationGas;
        bytes32 gasFees;
        bytes paymasterAndData;
        bytes signature;
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface KeystoreValidator {
        function cacheBlockhash() external returns (bytes32);
        function cacheKeystoreStateRoot(StateRootProof calldata proof) external;
        function latestStateRoot() external view returns (bytes32);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface OPStackStateOracle {
        function cacheBlockhash() external returns (bytes32);
        function cacheKeystoreStateRoot(
            StateRootProof calldata proof,
            OutputRootPreimage calldata outputRootPreimage
        ) external;
        function latestStateRoot() external view returns (bytes32);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface L1Block {
        function number() external view returns (uint64);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface EntryPoint {
        function handleOps(PackedUserOperation[] calldata ops, address payable beneficiary) external;
        function getUserOpHash(PackedUserOperation calldata userOp) external view returns (bytes32);
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
    }
);

/// ERC-4337 nonce key that routes validation through the keystore validator
/// module: four zero bytes followed by the module address.
pub fn keystore_nonce_key(validator: Address) -> U192 {
    let mut key = [0u8; 24];
    key[4..].copy_from_slice(validator.as_slice());
    U192::from_be_bytes(key)
}
