use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::utils::{difficulty_from_bits, double_sha256, varint_size};

pub const HEADER_SIZE: usize = 80;

/// 32-byte hash kept in internal (wire) byte order.
///
/// `Display` and serialization use the conventional reversed order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const fn zero() -> Self {
        Hash256([0u8; 32])
    }

    pub fn from_internal(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_display_bytes(&self) -> [u8; 32] {
        let mut out = self.0;
        out.reverse();
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_display_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

fn serialize_hex<T: AsRef<[u8]>, S: Serializer>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    pub version: i32,
    pub previous_block_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.previous_block_hash.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Double-SHA-256 of the serialized header.
    pub fn block_hash(&self) -> Hash256 {
        Hash256(double_sha256(&self.to_bytes()))
    }

    pub fn time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0).unwrap_or_default()
    }

    pub fn difficulty(&self) -> Option<f64> {
        difficulty_from_bits(self.bits)
    }
}

/// Best-effort output classification from the first script byte.
///
/// This is not script interpretation: a script starting with `0x76` is
/// reported as P2PKH whether or not the rest of the template matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptType {
    Unknown,
    P2SH,
    WitnessV0,
    P2PKH,
}

impl ScriptType {
    pub fn classify(script: &[u8]) -> Self {
        match script.first() {
            Some(0x00) => ScriptType::WitnessV0,
            Some(0xa9) => ScriptType::P2SH,
            Some(0x76) => ScriptType::P2PKH,
            _ => ScriptType::Unknown,
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptType::Unknown => "unknown",
            ScriptType::P2SH => "p2sh",
            ScriptType::WitnessV0 => "witness_v0",
            ScriptType::P2PKH => "p2pkh",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxInput {
    pub previous_txid: Hash256,
    pub previous_output_index: u32,
    #[serde(serialize_with = "serialize_hex")]
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// First input of its transaction with an all-zero previous txid.
    pub is_coinbase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutput {
    pub value: u64,
    #[serde(serialize_with = "serialize_hex")]
    pub script_pub_key: Vec<u8>,
    pub script_type: ScriptType,
}

/// Witness items for a single input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WitnessStack {
    pub items: Vec<Vec<u8>>,
}

impl WitnessStack {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialized size: item count plus each length-prefixed item.
    pub fn encoded_size(&self) -> usize {
        varint_size(self.items.len() as u64)
            + self
                .items
                .iter()
                .map(|item| varint_size(item.len() as u64) + item.len())
                .sum::<usize>()
    }
}

impl Serialize for WitnessStack {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter().map(hex::encode))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub txid: Hash256,
    pub wtxid: Hash256,
    pub version: i32,
    /// The segwit marker and flag were present.
    pub has_witness: bool,
    /// Advisory script-prefix signal that witness data might follow.
    pub witness_hint: bool,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// One stack per input, in input order, when witness data was read.
    pub witness: Option<Vec<WitnessStack>>,
    pub locktime: u32,
    /// Total serialized size in bytes.
    pub size: usize,
    /// Serialized size without marker, flag and witness data.
    pub base_size: usize,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.first().map_or(false, |input| input.is_coinbase)
    }

    pub fn weight(&self) -> usize {
        self.base_size * 3 + self.size
    }

    pub fn vsize(&self) -> usize {
        (self.weight() + 3) / 4
    }

    /// `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.value))
    }

    /// Block height pushed at the start of a coinbase scriptSig.
    ///
    /// Only meaningful for block versions that commit to their height.
    pub fn coinbase_height(&self) -> Option<u64> {
        if !self.is_coinbase() {
            return None;
        }
        let script = &self.inputs[0].script_sig;
        match *script.first()? {
            0x00 => Some(0),
            op @ 0x51..=0x60 => Some(u64::from(op - 0x50)),
            len @ 0x01..=0x08 => {
                let bytes = script.get(1..1 + len as usize)?;
                Some(
                    bytes
                        .iter()
                        .rev()
                        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
                )
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub hash: Hash256,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    /// Offset of the record's magic bytes within its source.
    pub offset: usize,
    /// Offset immediately after the record, where the next one begins.
    pub next_offset: usize,
    /// Declared body length, header included.
    pub size: usize,
}

impl Block {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn weight(&self) -> usize {
        let prefix = HEADER_SIZE + varint_size(self.transactions.len() as u64);
        prefix * 4 + self.transactions.iter().map(Transaction::weight).sum::<usize>()
    }
}
