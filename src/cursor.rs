use byteorder::{ByteOrder, LittleEndian};

use crate::error::{DecodeError, DecodeResult};

/// Position-tracked, bounds-checked view over a byte buffer.
///
/// `position()` is absolute: a cursor split off for a block body keeps
/// reporting offsets relative to the start of the original buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Resume a cursor at `position` within `data`.
    pub fn at(data: &'a [u8], position: usize) -> DecodeResult<Self> {
        if position > data.len() {
            return Err(DecodeError::TruncatedInput {
                offset: data.len(),
                needed: position - data.len(),
                available: 0,
            });
        }
        Ok(Self {
            data,
            pos: position,
            base: 0,
        })
    }

    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_exact(&mut self, n: usize) -> DecodeResult<&'a [u8]> {
        let bytes = self.peek(n)?;
        self.pos += n;
        Ok(bytes)
    }

    pub fn peek(&self, n: usize) -> DecodeResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(DecodeError::TruncatedInput {
                offset: self.position(),
                needed: n,
                available: self.remaining(),
            });
        }
        let data = self.data;
        Ok(&data[self.pos..self.pos + n])
    }

    pub fn read_array<const N: usize>(&mut self) -> DecodeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        Ok(self.read_exact(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> DecodeResult<u16> {
        Ok(LittleEndian::read_u16(self.read_exact(2)?))
    }

    pub fn read_u32_le(&mut self) -> DecodeResult<u32> {
        Ok(LittleEndian::read_u32(self.read_exact(4)?))
    }

    pub fn read_i32_le(&mut self) -> DecodeResult<i32> {
        Ok(LittleEndian::read_i32(self.read_exact(4)?))
    }

    pub fn read_u64_le(&mut self) -> DecodeResult<u64> {
        Ok(LittleEndian::read_u64(self.read_exact(8)?))
    }

    /// 32 bytes in internal (wire) order.
    pub fn read_hash(&mut self) -> DecodeResult<[u8; 32]> {
        self.read_array::<32>()
    }

    /// Returns `(value, bytes_consumed)`. Non-minimal encodings are accepted.
    pub fn read_varint(&mut self) -> DecodeResult<(u64, usize)> {
        let start = self.pos;
        let discriminator = self.read_u8()?;
        let value = match discriminator {
            0xFD => self.read_u16_le().map(u64::from),
            0xFE => self.read_u32_le().map(u64::from),
            0xFF => self.read_u64_le(),
            n => Ok(u64::from(n)),
        };
        match value {
            Ok(value) => Ok((value, self.pos - start)),
            Err(e) => {
                // a varint is consumed whole or not at all
                self.pos = start;
                Err(e)
            }
        }
    }

    /// A VarInt that sizes a following read or counts following items.
    ///
    /// Every counted item takes at least one byte, so a value larger than
    /// what is left after the VarInt is an overrun and the VarInt is not consumed.
    pub fn read_length(&mut self) -> DecodeResult<usize> {
        let start = self.pos;
        let offset = self.position();
        let (value, _) = self.read_varint()?;
        let available = self.remaining();
        match usize::try_from(value) {
            Ok(len) if len <= available => Ok(len),
            _ => {
                self.pos = start;
                Err(DecodeError::TruncatedInput {
                    offset,
                    needed: usize::try_from(value).unwrap_or(usize::MAX),
                    available,
                })
            }
        }
    }

    /// VarInt-length-prefixed byte string.
    pub fn read_var_bytes(&mut self) -> DecodeResult<&'a [u8]> {
        let start = self.pos;
        let len = self.read_length()?;
        self.read_exact(len).map_err(|e| {
            self.pos = start;
            e
        })
    }

    /// Splits the next `n` bytes off into their own cursor and advances past them.
    pub fn split(&mut self, n: usize) -> DecodeResult<ByteCursor<'a>> {
        let base = self.position();
        let data = self.read_exact(n)?;
        Ok(ByteCursor { data, pos: 0, base })
    }

    /// Bytes between two absolute positions already covered by this cursor.
    pub(crate) fn span(&self, from: usize, to: usize) -> &'a [u8] {
        let data = self.data;
        &data[from - self.base..to - self.base]
    }
}

/// Copy of `buf` in reverse byte order.
pub fn reverse_bytes(buf: &[u8]) -> Vec<u8> {
    let mut vec = buf.to_vec();
    vec.reverse();
    vec
}
