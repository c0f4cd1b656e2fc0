use crate::{config::Config, keystore::types::AccountState};
use alloy::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    signers::{Signer, local::PrivateKeySigner},
    sol_types::SolValue,
};
use anyhow::{Error, anyhow};
use std::{
    fmt::{Display, Formatter},
    future::Future,
    str::FromStr,
};

/// Domain byte prefixed to m-of-n key data.
pub const M_OF_N_DOMAIN: u8 = 0x00;
/// Domain byte prefixed to data-hash key data.
pub const DATA_HASH_DOMAIN: u8 = 0x01;

/// Layout of the key data committed for the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDataVersion {
    /// Full m-of-n configuration stored in the ledger.
    MOfN,
    /// Only a hash commitment stored, the signer set stays local.
    DataHash,
}

impl Display for KeyDataVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for KeyDataVersion {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m-of-n" => Ok(KeyDataVersion::MOfN),
            "data-hash" => Ok(KeyDataVersion::DataHash),
            _ => Err(Error::msg(format!("Invalid key data version: {s}"))),
        }
    }
}

/// Encodes m-of-n key data: the domain byte followed by the ABI-encoded
/// consumer codehash, threshold, and signer addresses.
pub fn encode_m_of_n_data(codehash: B256, threshold: U256, signers: &[Address]) -> Bytes {
    let encoded = (codehash, threshold, signers.to_vec()).abi_encode_params();
    let mut data = Vec::with_capacity(1 + encoded.len());
    data.push(M_OF_N_DOMAIN);
    data.extend_from_slice(&encoded);
    data.into()
}

/// Decodes m-of-n key data back into codehash, threshold, and signers.
pub fn decode_m_of_n_data(data: &[u8]) -> Result<(B256, U256, Vec<Address>), Error> {
    let (domain, body) = data
        .split_first()
        .ok_or_else(|| anyhow!("Key data is empty"))?;
    if *domain != M_OF_N_DOMAIN {
        return Err(anyhow!("Key data domain {domain:#04x} is not m-of-n"));
    }
    Ok(<(B256, U256, Vec<Address>)>::abi_decode_params(body)?)
}

/// Encodes data-hash key data: the domain byte followed by the hash
/// committing to the full signer configuration.
pub fn encode_data_hash_data(commitment: B256) -> Bytes {
    let mut data = Vec::with_capacity(33);
    data.push(DATA_HASH_DOMAIN);
    data.extend_from_slice(commitment.as_slice());
    data.into()
}

/// Derives the keystore address from the account's initial commitment:
/// `keccak256(salt ++ dataHash ++ keccak256(vkey))`.
pub fn derive_keystore_address(salt: B256, data_hash: B256, vkey: &Bytes) -> B256 {
    let mut preimage = [0u8; 96];
    preimage[..32].copy_from_slice(salt.as_slice());
    preimage[32..64].copy_from_slice(data_hash.as_slice());
    preimage[64..].copy_from_slice(keccak256(vkey).as_slice());
    keccak256(preimage)
}

/// A keystore account as seen by the flows. Counterfactual accounts have
/// never been updated and exist only through their address derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeystoreAccount {
    Counterfactual {
        salt: B256,
        data_hash: B256,
        vkey: Bytes,
    },
    Existing {
        keystore_address: B256,
        data_hash: B256,
        vkey: Bytes,
    },
}

impl KeystoreAccount {
    pub fn keystore_address(&self) -> B256 {
        match self {
            KeystoreAccount::Counterfactual {
                salt,
                data_hash,
                vkey,
            } => derive_keystore_address(*salt, *data_hash, vkey),
            KeystoreAccount::Existing {
                keystore_address, ..
            } => *keystore_address,
        }
    }

    pub fn data_hash(&self) -> B256 {
        match self {
            KeystoreAccount::Counterfactual { data_hash, .. }
            | KeystoreAccount::Existing { data_hash, .. } => *data_hash,
        }
    }

    pub fn vkey(&self) -> &Bytes {
        match self {
            KeystoreAccount::Counterfactual { vkey, .. }
            | KeystoreAccount::Existing { vkey, .. } => vkey,
        }
    }

    /// Salt committed in transactions. Existing accounts carry zero since
    /// their address is already fixed in the ledger.
    pub fn salt(&self) -> B256 {
        match self {
            KeystoreAccount::Counterfactual { salt, .. } => *salt,
            KeystoreAccount::Existing { .. } => B256::ZERO,
        }
    }
}

/// Read access to keystore account state. Implemented by the node and
/// sequencer RPC clients.
pub trait StateReader {
    fn get_transaction_count(
        &self,
        keystore_address: B256,
    ) -> impl Future<Output = Result<u64, Error>> + Send;

    fn get_state_at(
        &self,
        keystore_address: B256,
    ) -> impl Future<Output = Result<AccountState, Error>> + Send;
}

/// Account resolved against live ledger state.
#[derive(Clone, Debug)]
pub struct ResolvedAccount {
    pub account: KeystoreAccount,
    pub nonce: u64,
    /// Signers that must authenticate the next transaction.
    pub signers: Vec<Address>,
}

/// Resolves the locally configured keystore account against the ledger and
/// signs on its behalf.
#[derive(Clone, Debug)]
pub struct AccountResolver {
    salt: B256,
    key_data: Bytes,
    data_hash: B256,
    vkey: Bytes,
    version: KeyDataVersion,
    local_signers: Vec<PrivateKeySigner>,
}

impl AccountResolver {
    pub fn new(
        salt: B256,
        codehash: B256,
        threshold: u64,
        version: KeyDataVersion,
        vkey: Bytes,
        local_signers: Vec<PrivateKeySigner>,
    ) -> Self {
        let signer_addresses = local_signers
            .iter()
            .map(|signer| signer.address())
            .collect::<Vec<_>>();
        let m_of_n = encode_m_of_n_data(codehash, U256::from(threshold), &signer_addresses);
        let key_data = match version {
            KeyDataVersion::MOfN => m_of_n,
            KeyDataVersion::DataHash => encode_data_hash_data(keccak256(&m_of_n)),
        };
        let data_hash = keccak256(&key_data);
        Self {
            salt,
            key_data,
            data_hash,
            vkey,
            version,
            local_signers,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let local_signers = config
            .signer_private_keys
            .iter()
            .map(|key| PrivateKeySigner::from_str(key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(
            config.account_salt,
            config.consumer_codehash,
            config.signer_threshold,
            config.key_data_version,
            config.vkey.clone(),
            local_signers,
        ))
    }

    pub fn salt(&self) -> B256 {
        self.salt
    }

    /// Key data of the initial account configuration.
    pub fn key_data(&self) -> &Bytes {
        &self.key_data
    }

    pub fn data_hash(&self) -> B256 {
        self.data_hash
    }

    pub fn vkey(&self) -> &Bytes {
        &self.vkey
    }

    pub fn version(&self) -> KeyDataVersion {
        self.version
    }

    /// The keystore address is fixed at creation, derived from the initial
    /// configuration regardless of later updates.
    pub fn keystore_address(&self) -> B256 {
        derive_keystore_address(self.salt, self.data_hash, &self.vkey)
    }

    pub fn local_signer_addresses(&self) -> Vec<Address> {
        self.local_signers
            .iter()
            .map(|signer| signer.address())
            .collect()
    }

    /// Signs the message hash with every local signer, in configuration
    /// order.
    pub async fn sign_hash(&self, hash: B256) -> Result<Vec<Bytes>, Error> {
        let mut signatures = Vec::with_capacity(self.local_signers.len());
        for signer in &self.local_signers {
            let signature = signer.sign_hash(&hash).await?;
            signatures.push(Bytes::from(signature.as_bytes().to_vec()));
        }
        Ok(signatures)
    }

    /// Resolves the account against the ledger. A zero nonce means the
    /// account is still counterfactual and the local configuration applies;
    /// otherwise the proven state decides the current signer set.
    pub async fn resolve<R: StateReader>(&self, reader: &R) -> Result<ResolvedAccount, Error> {
        let keystore_address = self.keystore_address();
        let nonce = reader.get_transaction_count(keystore_address).await?;
        if nonce == 0 {
            return Ok(ResolvedAccount {
                account: KeystoreAccount::Counterfactual {
                    salt: self.salt,
                    data_hash: self.data_hash,
                    vkey: self.vkey.clone(),
                },
                nonce,
                signers: self.local_signer_addresses(),
            });
        }
        let state = reader.get_state_at(keystore_address).await?;
        let signers = match self.version {
            KeyDataVersion::MOfN => decode_m_of_n_data(&state.data)?.2,
            KeyDataVersion::DataHash => self.local_signer_addresses(),
        };
        Ok(ResolvedAccount {
            account: KeystoreAccount::Existing {
                keystore_address,
                data_hash: state.data_hash,
                vkey: state.vkey,
            },
            nonce,
            signers,
        })
    }
}
