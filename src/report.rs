use std::fmt::{self, Write};

use crate::models::{Block, Transaction};
use crate::processing::FileSummary;

const SATOSHIS_PER_BITCOIN: f64 = 100_000_000.0;

pub fn block_summary(block: &Block) -> Result<String, fmt::Error> {
    let header = &block.header;
    let difficulty = header
        .difficulty()
        .map_or_else(|| "n/a".to_string(), |d| format!("{:.2}", d));

    let mut out = String::new();
    writeln!(out, "block {}", block.hash)?;
    writeln!(out, "  offset:      {}..{}", block.offset, block.next_offset)?;
    writeln!(out, "  previous:    {}", header.previous_block_hash)?;
    writeln!(out, "  merkle root: {}", header.merkle_root)?;
    writeln!(out, "  version:     0x{:08x}", header.version)?;
    writeln!(out, "  time:        {}", header.time().format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "  bits:        {:08x} (difficulty {})", header.bits, difficulty)?;
    writeln!(out, "  nonce:       {}", header.nonce)?;
    writeln!(out, "  size:        {} bytes, weight {}", block.size, block.weight())?;
    writeln!(out, "  tx count:    {}", block.transaction_count())?;
    // heights are only committed from version 2 onwards
    if header.version >= 2 {
        if let Some(height) = block.transactions.first().and_then(|tx| tx.coinbase_height()) {
            writeln!(out, "  height:      {}", height)?;
        }
    }
    Ok(out)
}

pub fn transaction_detail(tx: &Transaction) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "  tx {} (version {}, {} bytes, vsize {}{}{})",
        tx.txid,
        tx.version,
        tx.size,
        tx.vsize(),
        if tx.has_witness { ", segwit" } else { "" },
        if tx.is_coinbase() { ", coinbase" } else { "" },
    )?;

    for (index, input) in tx.inputs.iter().enumerate() {
        writeln!(
            out,
            "    in  {}: {}:{} seq {:08x}",
            index, input.previous_txid, input.previous_output_index, input.sequence
        )?;
        writeln!(out, "        scriptSig: {}", hex::encode(&input.script_sig))?;
        if let Some(stack) = tx.witness.as_ref().and_then(|w| w.get(index)) {
            for item in &stack.items {
                writeln!(out, "        witness:   {}", hex::encode(item))?;
            }
        }
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        writeln!(
            out,
            "    out {}: {:.8} BTC [{}]",
            index,
            output.value as f64 / SATOSHIS_PER_BITCOIN,
            output.script_type
        )?;
        writeln!(out, "        scriptPubKey: {}", hex::encode(&output.script_pub_key))?;
    }

    writeln!(out, "    locktime: {}", tx.locktime)?;
    Ok(out)
}

pub fn json_line(block: &Block) -> serde_json::Result<String> {
    serde_json::to_string(block)
}

pub fn file_summary_line(summary: &FileSummary) -> String {
    let status = match &summary.error {
        Some(e) => format!("stopped: {}", e),
        None => "ok".to_string(),
    };
    format!(
        "{}: {} blocks, {} txs ({} segwit), {} bytes in {:?} [{}]",
        summary.path.display(),
        summary.blocks,
        summary.transactions,
        summary.segwit_transactions,
        summary.bytes,
        summary.elapsed,
        status
    )
}
