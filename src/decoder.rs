use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, DecodeResult};
use crate::models::{
    Block, BlockHeader, Hash256, ScriptType, Transaction, TxInput, TxOutput, WitnessStack,
    HEADER_SIZE,
};
use crate::utils::{double_sha256, double_sha256_parts};

/// Magic + little-endian body length.
pub const RECORD_HEADER_SIZE: usize = 8;

const SEGWIT_MARKER: [u8; 2] = [0x00, 0x01];

// Smallest possible serializations, used to bound preallocation.
const MIN_INPUT_SIZE: usize = 32 + 4 + 1 + 4;
const MIN_OUTPUT_SIZE: usize = 8 + 1;
const MIN_TX_SIZE: usize = 4 + 1 + 1 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet3,
    Regtest,
    Signet,
}

impl Network {
    pub fn magic(&self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xf9, 0xbe, 0xb4, 0xd9],
            Network::Testnet3 => [0x0b, 0x11, 0x09, 0x07],
            Network::Regtest => [0xfa, 0xbf, 0xb5, 0xda],
            Network::Signet => [0x0a, 0x03, 0xcf, 0x40],
        }
    }
}

/// When to read per-input witness stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WitnessDetection {
    /// Only after the segwit marker and flag.
    #[default]
    Marker,
    /// Also when the advisory script-prefix signal fires.
    Heuristic,
}

#[derive(Debug, Clone, Default)]
pub struct DecoderConfig {
    /// Expected record magic. `None` accepts any non-zero magic.
    pub magic: Option<[u8; 4]>,
    pub witness_detection: WitnessDetection,
}

impl DecoderConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            magic: Some(network.magic()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlockDecoder {
    config: DecoderConfig,
}

impl BlockDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Decodes the record at the cursor and leaves the cursor on the next one.
    ///
    /// On any error the cursor is left where it was, so no partial record is
    /// ever observable.
    pub fn decode_block(&self, cursor: &mut ByteCursor<'_>) -> DecodeResult<Block> {
        let mut record = cursor.clone();
        let offset = record.position();

        // bitcoind preallocates blk files; a zeroed tail means no more records
        let lookahead = record.peek(record.remaining().min(4))?;
        if lookahead.iter().all(|b| *b == 0) {
            trace!(offset, "end of stream");
            return Err(DecodeError::EndOfStream);
        }

        let record_header = record.read_exact(RECORD_HEADER_SIZE)?;
        let magic = [
            record_header[0],
            record_header[1],
            record_header[2],
            record_header[3],
        ];
        if let Some(expected) = self.config.magic {
            if magic != expected {
                return Err(DecodeError::malformed(
                    offset,
                    format!(
                        "unexpected magic {}, expected {}",
                        hex::encode(magic),
                        hex::encode(expected)
                    ),
                ));
            }
        }
        let block_length = LittleEndian::read_u32(&record_header[4..]) as usize;
        let mut body = record.split(block_length)?;

        let block = self
            .decode_body(&mut body, offset, record.position())
            .map_err(overrun_is_malformed)?;

        *cursor = record;
        Ok(block)
    }

    fn decode_body(
        &self,
        body: &mut ByteCursor<'_>,
        offset: usize,
        next_offset: usize,
    ) -> DecodeResult<Block> {
        let size = body.remaining();
        if size < HEADER_SIZE {
            return Err(DecodeError::malformed(
                body.position(),
                format!("block length {size} is shorter than a header"),
            ));
        }

        let header = decode_header(body)?;
        let hash = header.block_hash();

        let tx_count = body.read_length()?;
        trace!(%hash, tx_count, "decoding block");

        let capacity = tx_count.min(body.remaining() / MIN_TX_SIZE);
        let mut transactions = Vec::with_capacity(capacity);
        for _ in 0..tx_count {
            transactions.push(decode_transaction(body, &self.config)?);
        }

        if !body.is_empty() {
            return Err(DecodeError::malformed(
                body.position(),
                format!("{} bytes left after last transaction", body.remaining()),
            ));
        }

        Ok(Block {
            hash,
            header,
            transactions,
            offset,
            next_offset,
            size,
        })
    }
}

/// Decodes one record with the default configuration.
pub fn decode_block(cursor: &mut ByteCursor<'_>) -> DecodeResult<Block> {
    BlockDecoder::default().decode_block(cursor)
}

/// A read that overruns the block body means the declared lengths disagree.
fn overrun_is_malformed(err: DecodeError) -> DecodeError {
    match err {
        DecodeError::TruncatedInput {
            offset,
            needed,
            available,
        } => DecodeError::malformed(
            offset,
            format!("read of {needed} bytes overruns block body ({available} left)"),
        ),
        other => other,
    }
}

pub fn decode_header(cursor: &mut ByteCursor<'_>) -> DecodeResult<BlockHeader> {
    Ok(BlockHeader {
        version: cursor.read_i32_le()?,
        previous_block_hash: Hash256::from_internal(cursor.read_hash()?),
        merkle_root: Hash256::from_internal(cursor.read_hash()?),
        timestamp: cursor.read_u32_le()?,
        bits: cursor.read_u32_le()?,
        nonce: cursor.read_u32_le()?,
    })
}

pub fn decode_transaction(
    cursor: &mut ByteCursor<'_>,
    config: &DecoderConfig,
) -> DecodeResult<Transaction> {
    let start = cursor.position();
    let version = cursor.read_i32_le()?;

    let has_witness = matches!(cursor.peek(2), Ok(pair) if pair == &SEGWIT_MARKER[..]);
    if has_witness {
        cursor.read_exact(2)?;
    }
    let base_start = cursor.position();

    let mut witness_hint = false;

    let input_count = cursor.read_length()?;
    let mut inputs = Vec::with_capacity(input_count.min(cursor.remaining() / MIN_INPUT_SIZE));
    for index in 0..input_count {
        let input = decode_input(cursor, index == 0)?;
        witness_hint |= matches!(input.script_sig.first(), None | Some(0x16) | Some(0x22));
        inputs.push(input);
    }

    let output_count = cursor.read_length()?;
    let mut outputs = Vec::with_capacity(output_count.min(cursor.remaining() / MIN_OUTPUT_SIZE));
    for _ in 0..output_count {
        let output = decode_output(cursor)?;
        witness_hint |= output.script_type == ScriptType::WitnessV0;
        outputs.push(output);
    }
    let base_end = cursor.position();

    let read_witness = has_witness
        || (config.witness_detection == WitnessDetection::Heuristic && witness_hint);
    let witness = if read_witness {
        let mut stacks = Vec::with_capacity(inputs.len());
        for _ in 0..inputs.len() {
            stacks.push(decode_witness_stack(cursor)?);
        }
        Some(stacks)
    } else {
        None
    };
    let witness_end = cursor.position();

    let locktime = cursor.read_u32_le()?;
    let end = cursor.position();

    let txid = Hash256::from_internal(double_sha256_parts(&[
        cursor.span(start, start + 4),
        cursor.span(base_start, base_end),
        cursor.span(witness_end, end),
    ]));
    let wtxid = Hash256::from_internal(double_sha256(cursor.span(start, end)));

    trace!(%txid, inputs = inputs.len(), outputs = outputs.len(), has_witness, "decoded transaction");

    Ok(Transaction {
        txid,
        wtxid,
        version,
        has_witness,
        witness_hint,
        inputs,
        outputs,
        witness,
        locktime,
        size: end - start,
        base_size: 4 + (base_end - base_start) + 4,
    })
}

fn decode_input(cursor: &mut ByteCursor<'_>, first: bool) -> DecodeResult<TxInput> {
    let previous_txid = Hash256::from_internal(cursor.read_hash()?);
    let previous_output_index = cursor.read_u32_le()?;
    let script_sig = cursor.read_var_bytes()?.to_vec();
    let sequence = cursor.read_u32_le()?;

    Ok(TxInput {
        is_coinbase: first && previous_txid.is_zero(),
        previous_txid,
        previous_output_index,
        script_sig,
        sequence,
    })
}

fn decode_output(cursor: &mut ByteCursor<'_>) -> DecodeResult<TxOutput> {
    let value = cursor.read_u64_le()?;
    let script_pub_key = cursor.read_var_bytes()?.to_vec();

    Ok(TxOutput {
        script_type: ScriptType::classify(&script_pub_key),
        value,
        script_pub_key,
    })
}

fn decode_witness_stack(cursor: &mut ByteCursor<'_>) -> DecodeResult<WitnessStack> {
    let item_count = cursor.read_length()?;
    let mut items = Vec::with_capacity(item_count.min(cursor.remaining()));
    for _ in 0..item_count {
        items.push(cursor.read_var_bytes()?.to_vec());
    }
    Ok(WitnessStack { items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{genesis_body, genesis_record, record, GENESIS_HASH};

    #[test]
    fn test_decode_genesis_block() {
        let data = genesis_record();
        let mut cursor = ByteCursor::new(&data);
        let block = BlockDecoder::new(DecoderConfig::for_network(Network::Mainnet))
            .decode_block(&mut cursor)
            .unwrap();

        assert_eq!(block.hash.to_string(), GENESIS_HASH);
        assert_eq!(block.size, 285);
        assert_eq!(block.offset, 0);
        assert_eq!(block.next_offset, data.len());
        assert_eq!(cursor.position(), data.len());
        assert_eq!(block.transaction_count(), 1);

        let coinbase = &block.transactions[0];
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.has_witness);
        assert!(coinbase.witness.is_none());
        assert_eq!(coinbase.txid, block.header.merkle_root);
        assert_eq!(coinbase.txid, coinbase.wtxid);
        assert_eq!(coinbase.outputs[0].value, 50 * 100_000_000);
        assert_eq!(coinbase.outputs[0].script_type, ScriptType::Unknown);
        assert_eq!(coinbase.size, 204);
        assert_eq!(coinbase.base_size, 204);
        assert_eq!(block.weight(), 285 * 4);

        assert!(matches!(
            decode_block(&mut cursor),
            Err(DecodeError::EndOfStream)
        ));
    }

    #[test]
    fn test_wrong_magic_is_rejected() {
        let data = genesis_record();
        let mut cursor = ByteCursor::new(&data);
        let decoder = BlockDecoder::new(DecoderConfig::for_network(Network::Testnet3));
        match decoder.decode_block(&mut cursor) {
            Err(DecodeError::MalformedBlock { offset: 0, reason }) => {
                assert!(reason.contains("f9beb4d9"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_zeroed_tail_is_end_of_stream() {
        let mut data = genesis_record();
        data.extend_from_slice(&[0u8; 16]);
        let mut cursor = ByteCursor::new(&data);
        decode_block(&mut cursor).unwrap();
        assert!(decode_block(&mut cursor).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_partial_record_header_is_truncated() {
        let data = [0xf9, 0xbe, 0xb4, 0xd9, 0x1d];
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            decode_block(&mut cursor),
            Err(DecodeError::TruncatedInput { offset: 0, needed: 8, available: 5 })
        ));
    }

    #[test]
    fn test_trailing_bytes_in_body_are_malformed() {
        let mut body = genesis_body();
        body.push(0xaa);
        let data = record(&body);

        let mut cursor = ByteCursor::new(&data);
        match decode_block(&mut cursor) {
            Err(DecodeError::MalformedBlock { offset, .. }) => assert_eq!(offset, data.len() - 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_short_body_is_malformed() {
        let mut body = genesis_body();
        body.truncate(200);
        let data = record(&body);

        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            decode_block(&mut cursor),
            Err(DecodeError::MalformedBlock { .. })
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_body_shorter_than_header() {
        let data = record(&[1u8; 10]);
        let mut cursor = ByteCursor::new(&data);
        assert!(matches!(
            decode_block(&mut cursor),
            Err(DecodeError::MalformedBlock { offset: 8, .. })
        ));
    }

    #[test]
    fn test_marker_requires_exact_flag() {
        // version, then 0x00 0x02: not a marker, so 0x00 is read as the input count
        let mut tx = vec![1u8, 0, 0, 0, 0x00, 0x02];
        for _ in 0..2 {
            tx.extend_from_slice(&[0u8; 8]);
            tx.push(0x00);
        }
        tx.extend_from_slice(&[0u8; 4]);
        let mut cursor = ByteCursor::new(&tx);
        let decoded = decode_transaction(&mut cursor, &DecoderConfig::default()).unwrap();
        assert!(!decoded.has_witness);
        assert!(decoded.inputs.is_empty());
        assert_eq!(decoded.outputs.len(), 2);
        assert_eq!(cursor.position(), tx.len());
    }
}
