use sha2::{Digest, Sha256};

pub fn double_sha256(bytes: &[u8]) -> [u8; 32] {
    let first_hash = Sha256::digest(bytes);
    let second_hash = Sha256::digest(first_hash);
    second_hash.into()
}

/// Double-SHA-256 over several consecutive slices, as if they were one buffer.
pub fn double_sha256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let first_hash = hasher.finalize();
    Sha256::digest(first_hash).into()
}

pub fn varint_size(value: u64) -> usize {
    match value {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x10000..=0xFFFFFFFF => 5,
        _ => 9,
    }
}

/// Minimal VarInt encoding of `value`.
pub fn write_varint(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xFC => buf.push(value as u8),
        0xFD..=0xFFFF => {
            buf.push(0xFD);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x10000..=0xFFFFFFFF => {
            buf.push(0xFE);
            buf.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xFF);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Difficulty relative to the minimum target `0x1d00ffff`.
///
/// Returns `None` for a zero mantissa, which encodes a target of zero.
pub fn difficulty_from_bits(bits: u32) -> Option<f64> {
    let exp = (bits >> 24) as i32;
    let coef = bits & 0x00ff_ffff;
    if coef == 0 {
        return None;
    }

    let current_target = coef as f64 * 256f64.powi(exp - 3);
    let difficulty_1_target = 0xffff as f64 * 256f64.powi(0x1d - 3);
    Some(difficulty_1_target / current_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_size_boundaries() {
        assert_eq!(varint_size(0xFC), 1);
        assert_eq!(varint_size(0xFD), 3);
        assert_eq!(varint_size(0xFFFF), 3);
        assert_eq!(varint_size(0x10000), 5);
        assert_eq!(varint_size(0xFFFF_FFFF), 5);
        assert_eq!(varint_size(0x1_0000_0000), 9);
    }

    #[test]
    fn test_write_varint_matches_size() {
        for value in [0u64, 0xFC, 0xFD, 0xFFFF, 0x10000, 0xFFFF_FFFF, u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            assert_eq!(buf.len(), varint_size(value));
        }
    }

    #[test]
    fn test_double_sha256_empty() {
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_double_sha256_parts_matches_whole() {
        assert_eq!(double_sha256_parts(&[b"ab", b"", b"cd"]), double_sha256(b"abcd"));
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(difficulty_from_bits(0x1d00ffff), Some(1.0));
        let d = difficulty_from_bits(0x1b0404cb).unwrap();
        assert!((d - 16307.420938523983).abs() < 1e-6);
        assert_eq!(difficulty_from_bits(0x1d000000), None);
    }
}
