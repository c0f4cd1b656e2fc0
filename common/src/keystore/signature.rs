use crate::{
    keystore::{
        account::AccountResolver,
        node_client::NodeClient,
        types::{ImtLeaf, ImtProofResponse, ImtSibling},
    },
    l2::{bindings::KeyDataProof, execution_layer::ExecutionLayer},
};
use alloy::{
    primitives::{B256, Bytes, U256, keccak256},
    sol_types::SolValue,
};
use anyhow::Error;
use tracing::info;

#[derive(Debug)]
pub enum ProofError {
    /// The root cached on the destination chain is unknown to the node.
    /// The relay has to run again before proofs can be built.
    StaleCachedRoot(B256),
    Any(Error),
}

/// Packs the sibling side flags into the word the validator expects: bit
/// `i` set means sibling `i` is a left node.
pub fn side_flag_word(siblings: &[ImtSibling]) -> U256 {
    siblings
        .iter()
        .enumerate()
        .fold(U256::ZERO, |acc, (index, sibling)| {
            if sibling.is_left {
                acc | (U256::from(1u8) << index)
            } else {
                acc
            }
        })
}

/// Extra data binding an exclusion proof to the counterfactual account:
/// `keyPrefix ++ key ++ salt ++ keccak256(leaf.value)`.
pub fn exclusion_extra_data(leaf: &ImtLeaf, salt: B256) -> Bytes {
    let mut data = Vec::with_capacity(97);
    data.extend_from_slice(leaf.key_prefix.as_slice());
    data.extend_from_slice(leaf.key.as_slice());
    data.extend_from_slice(salt.as_slice());
    data.extend_from_slice(keccak256(&leaf.value).as_slice());
    data.into()
}

/// Builds the validator key data proof from an IMT proof response.
///
/// An exclusion proof describes a counterfactual account, so the key data is
/// the locally intended initial configuration. An inclusion proof carries
/// the proven ledger state instead.
pub fn build_key_data_proof(
    response: &ImtProofResponse,
    salt: B256,
    vkey_hash: B256,
    intended_key_data: &Bytes,
) -> Result<KeyDataProof, ProofError> {
    let (extra_data, key_data) = if response.proof.is_exclusion_proof {
        (
            exclusion_extra_data(&response.proof.leaf, salt),
            intended_key_data.clone(),
        )
    } else {
        let state = response.state.as_ref().ok_or_else(|| {
            ProofError::Any(Error::msg(
                "Inclusion proof response carries no account state",
            ))
        })?;
        (Bytes::new(), state.data.clone())
    };

    Ok(KeyDataProof {
        isExclusion: response.proof.is_exclusion_proof,
        exclusionExtraData: extra_data,
        nextDummyByte: response.proof.leaf.next_key_prefix,
        nextImtKey: response.proof.leaf.next_key,
        vkeyHash: vkey_hash,
        keyData: key_data,
        proof: response
            .proof
            .siblings
            .iter()
            .map(|sibling| sibling.hash)
            .collect(),
        isLeft: side_flag_word(&response.proof.siblings),
    })
}

/// ABI-encodes the validator signature blob: the key data proof followed by
/// the authentication signatures.
pub fn encode_signature_blob(key_data_proof: &KeyDataProof, auth_data: &Bytes) -> Bytes {
    (key_data_proof.clone(), auth_data.clone())
        .abi_encode_params()
        .into()
}

/// Builds the keystore signature blob for a user operation against the
/// state root currently cached on the destination chain.
pub async fn encode_user_op_signature(
    l2: &ExecutionLayer,
    node: &NodeClient,
    resolver: &AccountResolver,
    auth_data: &Bytes,
) -> Result<Bytes, ProofError> {
    let root = l2.latest_state_root().await.map_err(|e| {
        ProofError::Any(Error::msg(format!(
            "Failed to read the cached state root: {e}"
        )))
    })?;

    let block_number = node
        .get_block_number_by_state_root(root)
        .await
        .map_err(|e| {
            ProofError::Any(Error::msg(format!(
                "Failed to resolve state root {root} to a block number: {e}"
            )))
        })?
        .ok_or(ProofError::StaleCachedRoot(root))?;

    let response = node
        .get_proof(resolver.keystore_address(), block_number)
        .await
        .map_err(|e| {
            ProofError::Any(Error::msg(format!(
                "Failed to fetch the IMT proof at block {block_number}: {e}"
            )))
        })?;

    if response.proof.is_exclusion_proof {
        info!("Using counterfactual keystore account");
    } else {
        info!("Using existing keystore account");
    }

    let key_data_proof = build_key_data_proof(
        &response,
        resolver.salt(),
        keccak256(resolver.vkey()),
        resolver.key_data(),
    )?;
    Ok(encode_signature_blob(&key_data_proof, auth_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::types::{AccountState, ImtProof};
    use alloy::primitives::{FixedBytes, b256, bytes};

    const SALT: B256 = b256!("0x0000000000000000000000000000000000000000000000000000000000000007");

    fn sibling(hash_byte: u8, is_left: bool) -> ImtSibling {
        ImtSibling {
            hash: B256::repeat_byte(hash_byte),
            is_left,
        }
    }

    fn leaf() -> ImtLeaf {
        ImtLeaf {
            key_prefix: FixedBytes::from([0x01]),
            key: B256::repeat_byte(0xaa),
            value: bytes!("0xbeef"),
            next_key_prefix: FixedBytes::from([0x02]),
            next_key: B256::repeat_byte(0xbb),
        }
    }

    fn exclusion_response() -> ImtProofResponse {
        ImtProofResponse {
            proof: ImtProof {
                is_exclusion_proof: true,
                leaf: leaf(),
                siblings: vec![sibling(0x11, true), sibling(0x22, false)],
            },
            state: None,
        }
    }

    fn inclusion_response() -> ImtProofResponse {
        ImtProofResponse {
            proof: ImtProof {
                is_exclusion_proof: false,
                leaf: leaf(),
                siblings: vec![sibling(0x11, false), sibling(0x22, true)],
            },
            state: Some(AccountState {
                data: bytes!("0x001ed6e4"),
                data_hash: B256::repeat_byte(0x44),
                vkey: bytes!("0xdeadbeef"),
            }),
        }
    }

    #[test]
    fn test_side_flag_word_sets_one_bit_per_left_sibling() {
        let siblings = vec![
            sibling(0x11, true),
            sibling(0x22, false),
            sibling(0x33, true),
            sibling(0x44, true),
        ];
        assert_eq!(side_flag_word(&siblings), U256::from(0b1101u8));
        assert_eq!(side_flag_word(&[]), U256::ZERO);
    }

    #[test]
    fn test_exclusion_extra_data_layout() {
        let data = exclusion_extra_data(&leaf(), SALT);
        assert_eq!(data.len(), 97);
        assert_eq!(data[0], 0x01);
        assert_eq!(&data[1..33], B256::repeat_byte(0xaa).as_slice());
        assert_eq!(&data[33..65], SALT.as_slice());
        assert_eq!(&data[65..97], keccak256(bytes!("0xbeef")).as_slice());
    }

    #[test]
    fn test_exclusion_branch_uses_intended_key_data() {
        let intended = bytes!("0x00c0ffee");
        let proof = build_key_data_proof(
            &exclusion_response(),
            SALT,
            B256::repeat_byte(0x55),
            &intended,
        )
        .unwrap();

        assert!(proof.isExclusion);
        assert_eq!(proof.keyData, intended);
        assert_eq!(proof.exclusionExtraData.len(), 97);
        assert_eq!(proof.nextDummyByte, FixedBytes::from([0x02]));
        assert_eq!(proof.nextImtKey, B256::repeat_byte(0xbb));
        assert_eq!(proof.isLeft, U256::from(0b01u8));
    }

    #[test]
    fn test_inclusion_branch_uses_ledger_state() {
        let intended = bytes!("0x00c0ffee");
        let response = inclusion_response();
        let proof =
            build_key_data_proof(&response, SALT, B256::repeat_byte(0x55), &intended).unwrap();

        assert!(!proof.isExclusion);
        assert_eq!(proof.keyData, response.state.as_ref().unwrap().data);
        assert!(proof.exclusionExtraData.is_empty());
        assert_eq!(proof.isLeft, U256::from(0b10u8));
    }

    #[test]
    fn test_inclusion_without_state_is_rejected() {
        let mut response = inclusion_response();
        response.state = None;
        let result = build_key_data_proof(&response, SALT, B256::repeat_byte(0x55), &Bytes::new());
        assert!(matches!(result, Err(ProofError::Any(_))));
    }

    #[test]
    fn test_signature_blob_decodes_back() {
        let proof = build_key_data_proof(
            &exclusion_response(),
            SALT,
            B256::repeat_byte(0x55),
            &bytes!("0x00c0ffee"),
        )
        .unwrap();
        let auth_data = bytes!("0x11223344");

        let blob = encode_signature_blob(&proof, &auth_data);
        let (decoded_proof, decoded_auth) =
            <(KeyDataProof, Bytes)>::abi_decode_params(&blob).unwrap();
        assert_eq!(decoded_proof, proof);
        assert_eq!(decoded_auth, auth_data);
    }
}
