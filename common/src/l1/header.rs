use alloy::primitives::Bytes;
use serde_json::Value;
use std::fmt;

/// Header fields that exist at every fork, in canonical RLP order.
const REQUIRED_FIELDS: [&str; 15] = [
    "parentHash",
    "sha3Uncles",
    "miner",
    "stateRoot",
    "transactionsRoot",
    "receiptsRoot",
    "logsBloom",
    "difficulty",
    "number",
    "gasLimit",
    "gasUsed",
    "timestamp",
    "extraData",
    "mixHash",
    "nonce",
];

/// Fork-gated trailing fields. A field that is absent from the fetched
/// header does not exist at that fork and is dropped from the encoding
/// entirely; absence is not the same as a zero value.
const OPTIONAL_FIELDS: [&str; 6] = [
    "baseFeePerGas",
    "withdrawalsRoot",
    "blobGasUsed",
    "excessBlobGas",
    "parentBeaconBlockRoot",
    "requestsHash",
];

#[derive(Debug, PartialEq, Eq)]
pub enum HeaderError {
    MissingRequiredField(&'static str),
    InvalidFieldEncoding(&'static str),
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::MissingRequiredField(field) => {
                write!(f, "Block header is missing required field {field}")
            }
            HeaderError::InvalidFieldEncoding(field) => {
                write!(f, "Block header field {field} is not valid hex")
            }
        }
    }
}

impl std::error::Error for HeaderError {}

/// Re-encodes a fetched `eth_getBlockByNumber` header object into the RLP
/// form whose keccak256 is the block hash. The destination chain verifier
/// hashes exactly these bytes, so the policy must hold for every fork
/// shape: absent trailing fields are dropped, a retained `"0x0"` becomes
/// the empty byte string, and odd-length hex is left-padded by one nibble.
pub fn canonicalize_block_header(header: &Value) -> Result<Bytes, HeaderError> {
    let mut fields: Vec<Vec<u8>> =
        Vec::with_capacity(REQUIRED_FIELDS.len() + OPTIONAL_FIELDS.len());

    for name in REQUIRED_FIELDS {
        let value = match header.get(name) {
            None | Some(Value::Null) => return Err(HeaderError::MissingRequiredField(name)),
            Some(value) => value
                .as_str()
                .ok_or(HeaderError::InvalidFieldEncoding(name))?,
        };
        fields.push(normalize_hex_field(name, value)?);
    }

    for name in OPTIONAL_FIELDS {
        match header.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                let value = value
                    .as_str()
                    .ok_or(HeaderError::InvalidFieldEncoding(name))?;
                fields.push(normalize_hex_field(name, value)?);
            }
        }
    }

    let mut out = Vec::new();
    alloy_rlp::encode_list::<Vec<u8>, [u8]>(&fields, &mut out);
    Ok(out.into())
}

/// Decodes one retained header field to the byte string that enters the
/// RLP list. `"0x0"` is the minimal-width zero quantity and carries no
/// bytes; an odd number of hex digits gets one zero nibble prepended.
pub fn normalize_hex_field(name: &'static str, value: &str) -> Result<Vec<u8>, HeaderError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or(HeaderError::InvalidFieldEncoding(name))?;
    if digits == "0" {
        return Ok(Vec::new());
    }
    let padded;
    let digits = if digits.len() % 2 != 0 {
        padded = format!("0{digits}");
        padded.as_str()
    } else {
        digits
    };
    hex::decode(digits).map_err(|_| HeaderError::InvalidFieldEncoding(name))
}
