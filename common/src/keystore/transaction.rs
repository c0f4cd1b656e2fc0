use crate::keystore::account::KeystoreAccount;
use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_rlp::{Encodable, RlpEncodable};
use serde_json::{Value, json};

/// Type byte of a bridge-initiated deposit.
pub const DEPOSIT_TX_TYPE: u8 = 0x01;
/// Type byte of a withdrawal.
pub const WITHDRAW_TX_TYPE: u8 = 0x02;
/// Type byte of a key data update.
pub const UPDATE_TX_TYPE: u8 = 0x03;

/// Account reference as committed inside transaction encodings.
#[derive(Clone, Debug, RlpEncodable)]
struct AccountFields {
    keystore_address: B256,
    salt: B256,
    data_hash: B256,
    vkey: Bytes,
}

impl From<&KeystoreAccount> for AccountFields {
    fn from(account: &KeystoreAccount) -> Self {
        Self {
            keystore_address: account.keystore_address(),
            salt: account.salt(),
            data_hash: account.data_hash(),
            vkey: account.vkey().clone(),
        }
    }
}

fn encode_typed<T: Encodable>(type_byte: u8, fields: &T) -> Bytes {
    let mut out = Vec::new();
    out.push(type_byte);
    fields.encode(&mut out);
    out.into()
}

fn account_debug_json(account: &KeystoreAccount) -> Value {
    let fields = AccountFields::from(account);
    json!({
        "keystoreAddress": format!("{}", fields.keystore_address),
        "salt": format!("{}", fields.salt),
        "dataHash": format!("{}", fields.data_hash),
        "vkey": format!("{}", fields.vkey),
    })
}

/// Deposit credited to a keystore account, initiated through the bridge on
/// the source chain.
#[derive(Clone, Debug)]
pub struct DepositTransaction {
    pub keystore_address: B256,
    pub amount: U256,
}

#[derive(RlpEncodable)]
struct DepositFields {
    keystore_address: B256,
    amount: U256,
}

impl DepositTransaction {
    pub fn tx_bytes(&self) -> Bytes {
        encode_typed(
            DEPOSIT_TX_TYPE,
            &DepositFields {
                keystore_address: self.keystore_address,
                amount: self.amount,
            },
        )
    }

    pub fn tx_hash(&self) -> B256 {
        keccak256(self.tx_bytes())
    }

    pub fn to_debug_json(&self) -> Value {
        json!({
            "keystoreAddress": format!("{}", self.keystore_address),
            "amt": self.amount.to_string(),
        })
    }
}

/// Withdrawal of keystore balance to a source-chain recipient.
#[derive(Clone, Debug)]
pub struct WithdrawTransaction {
    pub nonce: u64,
    pub fee_per_gas: U256,
    pub to: Address,
    pub amount: U256,
    pub user_account: KeystoreAccount,
}

#[derive(RlpEncodable)]
struct WithdrawFields {
    nonce: u64,
    fee_per_gas: U256,
    to: Address,
    amount: U256,
    user_account: AccountFields,
}

impl WithdrawTransaction {
    pub fn tx_bytes(&self) -> Bytes {
        encode_typed(
            WITHDRAW_TX_TYPE,
            &WithdrawFields {
                nonce: self.nonce,
                fee_per_gas: self.fee_per_gas,
                to: self.to,
                amount: self.amount,
                user_account: AccountFields::from(&self.user_account),
            },
        )
    }

    pub fn tx_hash(&self) -> B256 {
        keccak256(self.tx_bytes())
    }

    /// Hash the user signers authenticate. Withdrawals have no sponsor so it
    /// is the transaction hash itself.
    pub fn user_msg_hash(&self) -> B256 {
        self.tx_hash()
    }

    pub fn to_debug_json(&self) -> Value {
        json!({
            "nonce": self.nonce.to_string(),
            "feePerGas": self.fee_per_gas.to_string(),
            "to": format!("{}", self.to),
            "amt": self.amount.to_string(),
            "userAcct": account_debug_json(&self.user_account),
        })
    }
}

/// Rotation of an account's key data, optionally fee-sponsored.
#[derive(Clone, Debug)]
pub struct UpdateTransaction {
    pub nonce: u64,
    pub fee_per_gas: U256,
    pub new_user_data: Bytes,
    pub new_user_vkey: Bytes,
    pub user_account: KeystoreAccount,
    pub sponsor_account: Option<KeystoreAccount>,
}

#[derive(RlpEncodable)]
struct UpdateFields {
    nonce: u64,
    fee_per_gas: U256,
    new_user_data: Bytes,
    new_user_vkey: Bytes,
    user_account: AccountFields,
}

#[derive(RlpEncodable)]
struct SponsoredUpdateFields {
    nonce: u64,
    fee_per_gas: U256,
    new_user_data: Bytes,
    new_user_vkey: Bytes,
    user_account: AccountFields,
    sponsor_account: AccountFields,
}

impl UpdateTransaction {
    fn unsponsored_fields(&self) -> UpdateFields {
        UpdateFields {
            nonce: self.nonce,
            fee_per_gas: self.fee_per_gas,
            new_user_data: self.new_user_data.clone(),
            new_user_vkey: self.new_user_vkey.clone(),
            user_account: AccountFields::from(&self.user_account),
        }
    }

    pub fn tx_bytes(&self) -> Bytes {
        match &self.sponsor_account {
            Some(sponsor) => encode_typed(
                UPDATE_TX_TYPE,
                &SponsoredUpdateFields {
                    nonce: self.nonce,
                    fee_per_gas: self.fee_per_gas,
                    new_user_data: self.new_user_data.clone(),
                    new_user_vkey: self.new_user_vkey.clone(),
                    user_account: AccountFields::from(&self.user_account),
                    sponsor_account: AccountFields::from(sponsor),
                },
            ),
            None => encode_typed(UPDATE_TX_TYPE, &self.unsponsored_fields()),
        }
    }

    pub fn tx_hash(&self) -> B256 {
        keccak256(self.tx_bytes())
    }

    /// Hash the user signers authenticate. The sponsor reference is excluded
    /// so the user commitment stays valid whichever sponsor pays.
    pub fn user_msg_hash(&self) -> B256 {
        keccak256(encode_typed(UPDATE_TX_TYPE, &self.unsponsored_fields()))
    }

    pub fn to_debug_json(&self) -> Value {
        let mut value = json!({
            "nonce": self.nonce.to_string(),
            "feePerGas": self.fee_per_gas.to_string(),
            "newUserData": format!("{}", self.new_user_data),
            "newUserVkey": format!("{}", self.new_user_vkey),
            "userAcct": account_debug_json(&self.user_account),
        });
        if let Some(sponsor) = &self.sponsor_account {
            value["sponsorAcct"] = account_debug_json(sponsor);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, bytes};

    fn user_account() -> KeystoreAccount {
        KeystoreAccount::Existing {
            keystore_address: b256!(
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            ),
            data_hash: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            vkey: bytes!("0xdeadbeef"),
        }
    }

    fn withdraw() -> WithdrawTransaction {
        WithdrawTransaction {
            nonce: 1,
            fee_per_gas: U256::from(1_000_000u64),
            to: address!("0x1111111111111111111111111111111111111111"),
            amount: U256::from(3_000_000_000_000_000u64),
            user_account: user_account(),
        }
    }

    fn update(sponsor: Option<KeystoreAccount>) -> UpdateTransaction {
        UpdateTransaction {
            nonce: 2,
            fee_per_gas: U256::from(1_000_000u64),
            new_user_data: bytes!("0x00aabb"),
            new_user_vkey: bytes!("0xdeadbeef"),
            user_account: user_account(),
            sponsor_account: sponsor,
        }
    }

    #[test]
    fn test_withdraw_encoding_reference_vector() {
        let tx = withdraw();
        let expected = bytes!(
            "0x02f88c01830f4240941111111111111111111111111111111111111111870aa87bee538000f868a0aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa00000000000000000000000000000000000000000000000000000000000000000a0111111111111111111111111111111111111111111111111111111111111111184deadbeef"
        );
        assert_eq!(tx.tx_bytes(), expected);
        assert_eq!(
            tx.tx_hash(),
            b256!("0xa50a6f4818997cddf7fd8fcb9119c2a92169a827d5032c6e752fddd21f6269c4")
        );
        assert_eq!(tx.user_msg_hash(), tx.tx_hash());
    }

    #[test]
    fn test_type_bytes_are_distinct() {
        let deposit = DepositTransaction {
            keystore_address: user_account().keystore_address(),
            amount: U256::from(1u64),
        };
        assert_eq!(deposit.tx_bytes()[0], DEPOSIT_TX_TYPE);
        assert_eq!(withdraw().tx_bytes()[0], WITHDRAW_TX_TYPE);
        assert_eq!(update(None).tx_bytes()[0], UPDATE_TX_TYPE);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(withdraw().tx_bytes(), withdraw().tx_bytes());
        assert_eq!(update(None).tx_bytes(), update(None).tx_bytes());
    }

    #[test]
    fn test_update_user_msg_hash_ignores_sponsor() {
        let sponsor = KeystoreAccount::Existing {
            keystore_address: b256!(
                "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
            ),
            data_hash: b256!("0x2222222222222222222222222222222222222222222222222222222222222222"),
            vkey: bytes!("0xfeedface"),
        };
        let unsponsored = update(None);
        let sponsored = update(Some(sponsor));

        assert_eq!(unsponsored.user_msg_hash(), sponsored.user_msg_hash());
        assert_ne!(unsponsored.tx_bytes(), sponsored.tx_bytes());
        assert_ne!(unsponsored.tx_hash(), sponsored.tx_hash());
    }

    #[test]
    fn test_counterfactual_account_commits_salt() {
        let counterfactual = KeystoreAccount::Counterfactual {
            salt: b256!("0x0000000000000000000000000000000000000000000000000000000000000007"),
            data_hash: b256!("0x1111111111111111111111111111111111111111111111111111111111111111"),
            vkey: bytes!("0xdeadbeef"),
        };
        let mut tx = withdraw();
        tx.user_account = counterfactual;
        assert_ne!(tx.tx_bytes(), withdraw().tx_bytes());
    }

    #[test]
    fn test_debug_json_renders_big_ints_as_decimal_strings() {
        let json = withdraw().to_debug_json();
        assert_eq!(json["amt"], "3000000000000000");
        assert_eq!(json["feePerGas"], "1000000");
        assert_eq!(json["nonce"], "1");
        assert_eq!(
            json["userAcct"]["keystoreAddress"],
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );

        let sponsored = update(Some(user_account())).to_debug_json();
        assert!(sponsored.get("sponsorAcct").is_some());
        assert!(update(None).to_debug_json().get("sponsorAcct").is_none());
    }
}
