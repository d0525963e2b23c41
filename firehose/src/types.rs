//! Minimal data types handed over by the host at the instrumentation points
//!
//! These types are independent of any client implementation. The integration layer is
//! responsible for converting its own block, transaction and receipt types into them.

use alloy_primitives::{Address, B256, Bloom, Bytes, U256};
use serde::{Serialize, Serializer};
use std::fmt;

/// Legacy transaction type identifier
pub const LEGACY_TX_TYPE: u8 = 0;
/// EIP-2930 access list transaction type identifier
pub const ACCESS_LIST_TX_TYPE: u8 = 1;
/// EIP-1559 dynamic fee transaction type identifier
pub const DYNAMIC_FEE_TX_TYPE: u8 = 2;

fn quantity<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:#x}"))
}

fn block_nonce<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{value:016x}"))
}

/// HeaderData holds the block header fields, serialized with the Ethereum JSON-RPC names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderData {
    pub parent_hash: B256,
    #[serde(rename = "sha3Uncles")]
    pub uncle_hash: B256,
    #[serde(rename = "miner")]
    pub coinbase: Address,
    #[serde(rename = "stateRoot")]
    pub root: B256,
    #[serde(rename = "transactionsRoot")]
    pub tx_hash: B256,
    #[serde(rename = "receiptsRoot")]
    pub receipt_hash: B256,
    #[serde(rename = "logsBloom")]
    pub bloom: Bloom,
    pub difficulty: U256,
    #[serde(serialize_with = "quantity")]
    pub number: u64,
    #[serde(serialize_with = "quantity")]
    pub gas_limit: u64,
    #[serde(serialize_with = "quantity")]
    pub gas_used: u64,
    #[serde(rename = "timestamp", serialize_with = "quantity")]
    pub time: u64,
    #[serde(rename = "extraData")]
    pub extra: Bytes,
    #[serde(rename = "mixHash")]
    pub mix_digest: B256,
    #[serde(serialize_with = "block_nonce")]
    pub nonce: u64,
    #[serde(rename = "baseFeePerGas", skip_serializing_if = "Option::is_none")]
    pub base_fee: Option<U256>,
    pub hash: B256,
}

impl Default for HeaderData {
    fn default() -> Self {
        Self {
            parent_hash: B256::ZERO,
            uncle_hash: B256::ZERO,
            coinbase: Address::ZERO,
            root: B256::ZERO,
            tx_hash: B256::ZERO,
            receipt_hash: B256::ZERO,
            bloom: Bloom::default(),
            difficulty: U256::ZERO,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            time: 0,
            extra: Bytes::new(),
            mix_digest: B256::ZERO,
            nonce: 0,
            base_fee: None,
            hash: B256::ZERO,
        }
    }
}

/// BlockData contains the block data needed by the block lifecycle events
#[derive(Debug, Clone, Default)]
pub struct BlockData {
    pub header: HeaderData,
    pub uncles: Vec<HeaderData>,
    /// Encoded size of the block in bytes
    pub size: u64,
}

impl BlockData {
    pub fn new(header: HeaderData) -> Self {
        Self {
            header,
            uncles: Vec::new(),
            size: 0,
        }
    }

    pub fn with_uncles(mut self, uncles: Vec<HeaderData>) -> Self {
        self.uncles = uncles;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> B256 {
        self.header.hash
    }
}

/// AccessListItem is one `(address, storage keys)` tuple of an EIP-2930 access list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

/// Binary encoding of an access list: for each tuple, the 20 bytes address, the number of
/// keys as 4 bytes big-endian, then every 32 bytes key. The empty list encodes to no bytes.
pub fn encode_access_list(items: &[AccessListItem]) -> Vec<u8> {
    let size = items
        .iter()
        .map(|item| 20 + 4 + 32 * item.storage_keys.len())
        .sum();

    let mut out = Vec::with_capacity(size);
    for item in items {
        out.extend_from_slice(item.address.as_slice());
        out.extend_from_slice(&(item.storage_keys.len() as u32).to_be_bytes());
        for key in &item.storage_keys {
            out.extend_from_slice(key.as_slice());
        }
    }
    out
}

/// TransactionData contains the data printed when a transaction starts
#[derive(Debug, Clone)]
pub struct TransactionData {
    pub tx_type: u8,
    pub hash: B256,
    /// None for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub v: Bytes,
    pub r: Bytes,
    pub s: Bytes,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub nonce: u64,
    pub input: Bytes,
    pub access_list: Vec<AccessListItem>,
}

impl TransactionData {
    /// Creates a legacy transaction, use the `with_*` builders for the other fields
    pub fn new(
        hash: B256,
        to: Option<Address>,
        value: U256,
        gas_limit: u64,
        gas_price: U256,
        nonce: u64,
        input: Bytes,
    ) -> Self {
        Self {
            tx_type: LEGACY_TX_TYPE,
            hash,
            to,
            value,
            v: Bytes::new(),
            r: Bytes::new(),
            s: Bytes::new(),
            gas_limit,
            gas_price,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            nonce,
            input,
            access_list: Vec::new(),
        }
    }

    pub fn with_signature(mut self, v: Bytes, r: Bytes, s: Bytes) -> Self {
        self.v = v;
        self.r = r;
        self.s = s;
        self
    }

    /// Turns the transaction into an access list one
    pub fn with_access_list(mut self, access_list: Vec<AccessListItem>) -> Self {
        if self.tx_type == LEGACY_TX_TYPE {
            self.tx_type = ACCESS_LIST_TX_TYPE;
        }
        self.access_list = access_list;
        self
    }

    /// Turns the transaction into a dynamic fee one
    pub fn with_dynamic_fee(mut self, max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Self {
        self.tx_type = DYNAMIC_FEE_TX_TYPE;
        self.max_fee_per_gas = Some(max_fee_per_gas);
        self.max_priority_fee_per_gas = Some(max_priority_fee_per_gas);
        self
    }

    /// Returns true if this is a contract creation transaction
    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Price actually paid per gas unit.
    ///
    /// Dynamic fee transactions pay `min(max_priority_fee + base_fee, max_fee)` once a base fee
    /// exists, every other case pays the declared gas price.
    pub fn effective_gas_price(&self, base_fee: Option<U256>) -> U256 {
        match (
            self.tx_type,
            base_fee,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
        ) {
            (DYNAMIC_FEE_TX_TYPE, Some(base_fee), Some(max_fee), Some(tip)) => {
                tip.saturating_add(base_fee).min(max_fee)
            }
            _ => self.gas_price,
        }
    }
}

/// LogData contains log event data, field order follows the sorted keys consumers expect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogData {
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
}

impl LogData {
    pub fn new(address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            address,
            data,
            topics,
        }
    }
}

/// ReceiptData contains transaction receipt data
#[derive(Debug, Clone, Default)]
pub struct ReceiptData {
    pub gas_used: u64,
    /// Pre-Byzantium intermediate state root, empty afterwards
    pub post_state: Bytes,
    pub cumulative_gas_used: u64,
    pub bloom: Bloom,
    pub logs: Vec<LogData>,
}

impl ReceiptData {
    pub fn new(gas_used: u64, cumulative_gas_used: u64) -> Self {
        Self {
            gas_used,
            cumulative_gas_used,
            ..Default::default()
        }
    }

    /// Adds a log to the receipt
    pub fn add_log(&mut self, log: LogData) {
        self.logs.push(log);
    }
}

/// CallType represents the type of call frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
    /// Both CREATE and CREATE2, the protocol does not distinguish them
    Create,
}

impl CallType {
    /// Token used in the `EVM_RUN_CALL` and `EVM_PARAM` lines
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::CallCode => "CALLCODE",
            Self::DelegateCall => "DELEGATE",
            Self::StaticCall => "STATIC",
            Self::Create => "CREATE",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn transfer() -> TransactionData {
        TransactionData::new(
            B256::ZERO,
            Some(Address::ZERO),
            U256::from(1u64),
            21000,
            U256::from(30u64),
            0,
            Bytes::new(),
        )
    }

    #[test]
    fn test_tx_is_create() {
        let mut tx = transfer();
        assert!(!tx.is_create());

        tx.to = None;
        assert!(tx.is_create());
    }

    #[test]
    fn test_effective_gas_price() {
        let legacy = transfer();
        assert_eq!(legacy.effective_gas_price(Some(U256::from(10u64))), U256::from(30u64));

        let dynamic = transfer().with_dynamic_fee(U256::from(100u64), U256::from(2u64));
        assert_eq!(dynamic.effective_gas_price(Some(U256::from(10u64))), U256::from(12u64));
        // Capped by max fee
        assert_eq!(dynamic.effective_gas_price(Some(U256::from(99u64))), U256::from(100u64));
        // No base fee yet, declared gas price
        assert_eq!(dynamic.effective_gas_price(None), U256::from(30u64));
    }

    #[test]
    fn test_access_list_builder_sets_type() {
        let tx = transfer().with_access_list(Vec::new());
        assert_eq!(tx.tx_type, ACCESS_LIST_TX_TYPE);

        let tx = transfer()
            .with_dynamic_fee(U256::from(1u64), U256::from(1u64))
            .with_access_list(Vec::new());
        assert_eq!(tx.tx_type, DYNAMIC_FEE_TX_TYPE);
    }

    #[test]
    fn test_encode_access_list() {
        assert!(encode_access_list(&[]).is_empty());

        let items = vec![AccessListItem {
            address: address!("1111111111111111111111111111111111111111"),
            storage_keys: vec![B256::repeat_byte(0x22), B256::repeat_byte(0x33)],
        }];
        let encoded = encode_access_list(&items);

        assert_eq!(encoded.len(), 20 + 4 + 64);
        assert_eq!(&encoded[..20], &[0x11; 20]);
        assert_eq!(&encoded[20..24], &[0, 0, 0, 2]);
        assert_eq!(&encoded[24..56], &[0x22; 32]);
        assert_eq!(&encoded[56..], &[0x33; 32]);
    }

    #[test]
    fn test_header_json_names() {
        let header = HeaderData {
            number: 16,
            gas_limit: 30_000_000,
            nonce: 0x42,
            base_fee: Some(U256::from(7u64)),
            ..Default::default()
        };

        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["number"], "0x10");
        assert_eq!(value["gasLimit"], "0x1c9c380");
        assert_eq!(value["nonce"], "0x0000000000000042");
        assert_eq!(value["baseFeePerGas"], "0x7");
        assert!(value.get("sha3Uncles").is_some());
        assert!(value.get("miner").is_some());
        assert!(value.get("logsBloom").is_some());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_header_json_skips_missing_base_fee() {
        let value = serde_json::to_value(HeaderData::default()).unwrap();
        assert!(value.get("baseFeePerGas").is_none());
    }

    #[test]
    fn test_call_type_tokens() {
        assert_eq!(CallType::Call.to_string(), "CALL");
        assert_eq!(CallType::CallCode.to_string(), "CALLCODE");
        assert_eq!(CallType::DelegateCall.to_string(), "DELEGATE");
        assert_eq!(CallType::StaticCall.to_string(), "STATIC");
        assert_eq!(CallType::Create.to_string(), "CREATE");
    }
}
