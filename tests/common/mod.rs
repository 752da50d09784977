#![allow(dead_code)]

use blkparse::utils::write_varint;

pub const MAINNET_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

pub struct TxIn {
    pub previous_txid: [u8; 32],
    pub index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

pub struct TxOut {
    pub value: u64,
    pub script_pub_key: Vec<u8>,
}

pub fn coinbase_input(script_sig: Vec<u8>) -> TxIn {
    TxIn {
        previous_txid: [0u8; 32],
        index: 0xffff_ffff,
        script_sig,
        sequence: 0xffff_ffff,
    }
}

pub fn spend_input(seed: u8, index: u32, script_sig: Vec<u8>) -> TxIn {
    TxIn {
        previous_txid: [seed; 32],
        index,
        script_sig,
        sequence: 0xffff_fffe,
    }
}

/// Serializes a transaction; `witness` adds the marker, flag and one stack per input.
pub fn transaction(
    version: i32,
    inputs: &[TxIn],
    outputs: &[TxOut],
    witness: Option<&[Vec<Vec<u8>>]>,
    locktime: u32,
) -> Vec<u8> {
    let mut buf = version.to_le_bytes().to_vec();
    if witness.is_some() {
        buf.extend_from_slice(&[0x00, 0x01]);
    }
    write_varint(&mut buf, inputs.len() as u64);
    for input in inputs {
        buf.extend_from_slice(&input.previous_txid);
        buf.extend_from_slice(&input.index.to_le_bytes());
        write_varint(&mut buf, input.script_sig.len() as u64);
        buf.extend_from_slice(&input.script_sig);
        buf.extend_from_slice(&input.sequence.to_le_bytes());
    }
    write_varint(&mut buf, outputs.len() as u64);
    for output in outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        write_varint(&mut buf, output.script_pub_key.len() as u64);
        buf.extend_from_slice(&output.script_pub_key);
    }
    if let Some(stacks) = witness {
        for stack in stacks {
            write_varint(&mut buf, stack.len() as u64);
            for item in stack {
                write_varint(&mut buf, item.len() as u64);
                buf.extend_from_slice(item);
            }
        }
    }
    buf.extend_from_slice(&locktime.to_le_bytes());
    buf
}

pub fn header(nonce: u32) -> [u8; 80] {
    let mut out = [0u8; 80];
    out[0..4].copy_from_slice(&0x2000_0000i32.to_le_bytes());
    out[4..36].copy_from_slice(&[0x11; 32]);
    out[36..68].copy_from_slice(&[0x22; 32]);
    out[68..72].copy_from_slice(&1_600_000_000u32.to_le_bytes());
    out[72..76].copy_from_slice(&0x1703_4219u32.to_le_bytes());
    out[76..80].copy_from_slice(&nonce.to_le_bytes());
    out
}

pub fn block_body(header: &[u8; 80], transactions: &[Vec<u8>]) -> Vec<u8> {
    let mut body = header.to_vec();
    write_varint(&mut body, transactions.len() as u64);
    for tx in transactions {
        body.extend_from_slice(tx);
    }
    body
}

pub fn record(body: &[u8]) -> Vec<u8> {
    let mut out = MAINNET_MAGIC.to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

pub fn simple_coinbase() -> Vec<u8> {
    transaction(
        1,
        &[coinbase_input(Vec::new())],
        &[TxOut {
            value: 625_000_000,
            script_pub_key: vec![0x76, 0xa9, 0x14],
        }],
        None,
        0,
    )
}
