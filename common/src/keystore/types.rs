use alloy::primitives::{B256, Bytes, FixedBytes, U64, U256};
use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Account state stored in the keystore ledger: the raw key data, its hash,
/// and the verifying key of the circuit that authenticates updates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub data: Bytes,
    pub data_hash: B256,
    pub vkey: Bytes,
}

/// One leaf of the indexed Merkle tree over keystore accounts. For an
/// exclusion proof this is the dummy leaf bracketing the absent key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImtLeaf {
    pub key_prefix: FixedBytes<1>,
    pub key: B256,
    pub value: Bytes,
    pub next_key_prefix: FixedBytes<1>,
    pub next_key: B256,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImtSibling {
    pub hash: B256,
    pub is_left: bool,
}

/// Indexed-Merkle-tree proof for one keystore address against a given
/// keystore block's state root.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImtProof {
    pub is_exclusion_proof: bool,
    pub leaf: ImtLeaf,
    pub siblings: Vec<ImtSibling>,
}

/// `keystore_getProof` response: the proof itself plus, for existing
/// accounts, the proven account state.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImtProofResponse {
    pub proof: ImtProof,
    pub state: Option<AccountState>,
}

/// Finality ladder of a keystore transaction, least final first. Receipt
/// polling must never report a regression, so comparisons use this order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransactionStatus {
    L2Pending,
    L2IncludedL1Pending,
    L2IncludedL1Included,
    L2FinalizedL1Included,
    L2FinalizedL1Finalized,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "L2Pending" => Ok(TransactionStatus::L2Pending),
            "L2IncludedL1Pending" => Ok(TransactionStatus::L2IncludedL1Pending),
            "L2IncludedL1Included" => Ok(TransactionStatus::L2IncludedL1Included),
            "L2FinalizedL1Included" => Ok(TransactionStatus::L2FinalizedL1Included),
            "L2FinalizedL1Finalized" => Ok(TransactionStatus::L2FinalizedL1Finalized),
            _ => Err(Error::msg(format!("Invalid transaction status: {s}"))),
        }
    }
}

/// Receipt as reported by the keystore node and sequencer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub status: TransactionStatus,
    pub block_number: Option<U64>,
}

/// Arguments for the bridge's `finalizeWithdrawal`, assembled by the
/// sequencer once the withdrawal's keystore block is finalized on L1.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeWithdrawalArgs {
    pub keystore_block_number: U256,
    pub withdrawal_transaction: Bytes,
    pub proof: Vec<B256>,
}

/// Subset of a keystore block header sufficient to rebuild the output-root
/// preimage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeystoreBlockHeader {
    pub number: U64,
    pub hash: B256,
    pub state_root: B256,
    pub withdrawals_root: B256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_order_follows_finality() {
        assert!(TransactionStatus::L2Pending < TransactionStatus::L2IncludedL1Pending);
        assert!(TransactionStatus::L2IncludedL1Pending < TransactionStatus::L2IncludedL1Included);
        assert!(TransactionStatus::L2IncludedL1Included < TransactionStatus::L2FinalizedL1Included);
        assert!(
            TransactionStatus::L2FinalizedL1Included < TransactionStatus::L2FinalizedL1Finalized
        );
    }

    #[test]
    fn test_status_wire_form_is_the_variant_name() {
        let status: TransactionStatus = serde_json::from_str("\"L2FinalizedL1Included\"").unwrap();
        assert_eq!(status, TransactionStatus::L2FinalizedL1Included);
        assert_eq!(
            serde_json::to_string(&TransactionStatus::L2Pending).unwrap(),
            "\"L2Pending\""
        );
    }
}
