use crate::keystore::{account::KeyDataVersion, types::TransactionStatus};
use alloy::primitives::{Address, B256, Bytes, U256};
use anyhow::Error;
use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

/// Which contract surface receives the relayed keystore state root.
/// Older deployments verify the storage proof directly on the validator
/// module; newer ones verify it on a state oracle that additionally
/// checks the output root preimage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionShape {
    ProofOnly,
    ProofWithPreimage,
}

impl Display for SubmissionShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for SubmissionShape {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proof-only" => Ok(SubmissionShape::ProofOnly),
            "proof-with-preimage" => Ok(SubmissionShape::ProofWithPreimage),
            _ => Err(Error::msg(format!("Invalid state root submission: {s}"))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SponsorConfig {
    pub keystore_address: B256,
    pub data_hash: B256,
    pub codehash: B256,
    pub vkey: Bytes,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub l1_rpc_url: String,
    pub l2_rpc_url: String,
    pub keystore_node_rpc_url: String,
    pub keystore_sequencer_rpc_url: String,
    pub signature_prover_rpc_url: String,

    pub bridge_address: Address,
    pub validator_address: Address,
    pub state_oracle_address: Option<Address>,
    pub submission_shape: SubmissionShape,

    pub funded_private_key: String,
    pub signer_private_keys: Vec<String>,
    pub signer_threshold: u64,
    pub account_salt: B256,
    pub consumer_codehash: B256,
    pub vkey: Bytes,
    pub key_data_version: KeyDataVersion,

    pub sponsor: Option<SponsorConfig>,

    pub smart_account_address: Option<Address>,
    pub user_op_target: Option<Address>,
    pub user_op_value: U256,

    pub deposit_amount: U256,
    pub withdraw_amount: U256,
    pub withdraw_to: Option<Address>,
    pub new_signer_address: Option<Address>,

    pub poll_interval: Duration,
    pub max_polls: u64,
    pub finality_target: TransactionStatus,
    pub debug_artifacts_dir: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Result<Self, Error> {
        // Load environment variables from .env file
        let env_path = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
        dotenvy::from_path(env_path).ok();

        let l1_rpc_url = required_var("L1_RPC_URL")?;
        let l2_rpc_url = required_var("L2_RPC_URL")?;
        let keystore_node_rpc_url = required_var("KEYSTORE_NODE_RPC_URL")?;
        let keystore_sequencer_rpc_url = required_var("KEYSTORE_SEQUENCER_RPC_URL")?;
        let signature_prover_rpc_url = required_var("SIGNATURE_PROVER_RPC_URL")?;

        let bridge_address = address_var("KEYSTORE_BRIDGE_ADDRESS")?;
        let validator_address = address_var("KEYSTORE_VALIDATOR_ADDRESS")?;
        let state_oracle_address = optional_address_var("STATE_ORACLE_ADDRESS")?;
        let submission_shape = std::env::var("STATE_ROOT_SUBMISSION")
            .unwrap_or("proof-only".to_string())
            .parse::<SubmissionShape>()?;
        if submission_shape == SubmissionShape::ProofWithPreimage && state_oracle_address.is_none()
        {
            return Err(anyhow::anyhow!(
                "STATE_ORACLE_ADDRESS is required when STATE_ROOT_SUBMISSION is proof-with-preimage"
            ));
        }

        let funded_private_key = required_var("FUNDED_PRIVATE_KEY")?;
        let signer_private_keys = required_var("USER_SIGNER_PRIVATE_KEYS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        if signer_private_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "USER_SIGNER_PRIVATE_KEYS must contain at least one private key"
            ));
        }
        let signer_threshold = u64_var("SIGNER_THRESHOLD", 1)?;
        let account_salt = b256_var("ACCOUNT_SALT")?;
        let consumer_codehash = b256_var("CONSUMER_CODEHASH")?;
        let vkey = bytes_var("VERIFYING_KEY")?;
        let key_data_version = std::env::var("KEY_DATA_VERSION")
            .unwrap_or("m-of-n".to_string())
            .parse::<KeyDataVersion>()?;

        let sponsor = match std::env::var("SPONSOR_KEYSTORE_ADDRESS") {
            Ok(_) => Some(SponsorConfig {
                keystore_address: b256_var("SPONSOR_KEYSTORE_ADDRESS")?,
                data_hash: b256_var("SPONSOR_DATA_HASH")?,
                codehash: b256_var("SPONSOR_CODEHASH")?,
                vkey: bytes_var("SPONSOR_VKEY")?,
            }),
            Err(_) => None,
        };

        let smart_account_address = optional_address_var("SMART_ACCOUNT_ADDRESS")?;
        let user_op_target = optional_address_var("USER_OP_TARGET")?;
        let user_op_value = u256_var("USER_OP_VALUE_WEI", "1")?;

        // 0.005 and 0.003 ether
        let deposit_amount = u256_var("DEPOSIT_AMOUNT_WEI", "5000000000000000")?;
        let withdraw_amount = u256_var("WITHDRAW_AMOUNT_WEI", "3000000000000000")?;
        let withdraw_to = optional_address_var("WITHDRAW_TO")?;
        let new_signer_address = optional_address_var("NEW_SIGNER_ADDRESS")?;

        let poll_interval = Duration::from_secs(u64_var("POLL_INTERVAL_SEC", 30)?);
        let max_polls = u64_var("MAX_POLLS", 20)?;
        let finality_target = std::env::var("FINALITY_TARGET")
            .unwrap_or("L2FinalizedL1Included".to_string())
            .parse::<TransactionStatus>()?;
        let debug_artifacts_dir = std::env::var("DEBUG_ARTIFACTS_DIR").ok().map(PathBuf::from);

        tracing::info!(
            "Startup config:\nl1_rpc_url: {}\nl2_rpc_url: {}\nkeystore_node_rpc_url: {}\nkeystore_sequencer_rpc_url: {}\nsignature_prover_rpc_url: {}\nbridge_address: {}\nvalidator_address: {}\nstate_oracle_address: {:?}\nsubmission_shape: {}\nkey_data_version: {}\nsigner_threshold: {}\nsigners: {}\nsponsor configured: {}\npoll_interval: {:?}\nmax_polls: {}\nfinality_target: {}",
            l1_rpc_url,
            l2_rpc_url,
            keystore_node_rpc_url,
            keystore_sequencer_rpc_url,
            signature_prover_rpc_url,
            bridge_address,
            validator_address,
            state_oracle_address,
            submission_shape,
            key_data_version,
            signer_threshold,
            signer_private_keys.len(),
            sponsor.is_some(),
            poll_interval,
            max_polls,
            finality_target
        );

        Ok(Config {
            l1_rpc_url,
            l2_rpc_url,
            keystore_node_rpc_url,
            keystore_sequencer_rpc_url,
            signature_prover_rpc_url,
            bridge_address,
            validator_address,
            state_oracle_address,
            submission_shape,
            funded_private_key,
            signer_private_keys,
            signer_threshold,
            account_salt,
            consumer_codehash,
            vkey,
            key_data_version,
            sponsor,
            smart_account_address,
            user_op_target,
            user_op_value,
            deposit_amount,
            withdraw_amount,
            withdraw_to,
            new_signer_address,
            poll_interval,
            max_polls,
            finality_target,
            debug_artifacts_dir,
        })
    }
}

fn required_var(name: &str) -> Result<String, Error> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} env var not found"))
}

fn address_var(name: &str) -> Result<Address, Error> {
    Address::from_str(required_var(name)?.as_str())
        .map_err(|e| anyhow::anyhow!("{name} is not a valid address: {e}"))
}

fn optional_address_var(name: &str) -> Result<Option<Address>, Error> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(Address::from_str(value.as_str()).map_err(|e| {
            anyhow::anyhow!("{name} is not a valid address: {e}")
        })?)),
        Err(_) => Ok(None),
    }
}

fn b256_var(name: &str) -> Result<B256, Error> {
    B256::from_str(required_var(name)?.as_str())
        .map_err(|e| anyhow::anyhow!("{name} is not a valid 32-byte hex value: {e}"))
}

fn bytes_var(name: &str) -> Result<Bytes, Error> {
    Bytes::from_str(required_var(name)?.as_str())
        .map_err(|e| anyhow::anyhow!("{name} is not a valid hex value: {e}"))
}

fn u64_var(name: &str, default: u64) -> Result<u64, Error> {
    std::env::var(name)
        .unwrap_or(default.to_string())
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("{name} must be a number"))
}

fn u256_var(name: &str, default: &str) -> Result<U256, Error> {
    U256::from_str(std::env::var(name).unwrap_or(default.to_string()).as_str())
        .map_err(|_| anyhow::anyhow!("{name} must be a number"))
}
