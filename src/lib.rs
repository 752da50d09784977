//! Decoder for Bitcoin `blk*.dat` block files.
//!
//! [`cursor::ByteCursor`] walks raw bytes; [`decoder::BlockDecoder`] turns one
//! record at a time into a [`models::Block`]; [`file_reader::BlockStream`]
//! chains records across files lazily.

pub mod cursor;
pub mod decoder;
pub mod error;
pub mod file_reader;
pub mod logging;
pub mod models;
pub mod processing;
pub mod report;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use cursor::{reverse_bytes, ByteCursor};
pub use decoder::{decode_block, BlockDecoder, DecoderConfig, Network, WitnessDetection};
pub use error::{DecodeError, DecodeResult};
pub use file_reader::{decode_all, BlockSource, BlockStream, FileReader};
pub use models::{Block, BlockHeader, Hash256, ScriptType, Transaction, TxInput, TxOutput, WitnessStack};
