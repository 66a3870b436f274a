//! Bounds-checked binary reader over a borrowed slice.

use crate::{IoError, IoResult, MAX_VAR_BYTES};

/// Reads little-endian values from an in-memory byte slice.
///
/// Every read is bounds-checked; running off the end yields
/// [`IoError::EndOfStream`] rather than a panic, since the input is
/// typically untrusted snapshot or program data.
#[derive(Debug, Clone)]
pub struct MemoryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemoryReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current offset from the start of the input.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// True when the input is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails unless every input byte has been consumed.
    pub fn expect_end(&self) -> IoResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(IoError::TrailingBytes { remaining }),
        }
    }

    fn take(&mut self, count: usize) -> IoResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(IoError::EndOfStream {
                requested: count,
                available: self.remaining(),
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&self.data[start..self.position])
    }

    pub fn read_u8(&mut self) -> IoResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> IoResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> IoResult<u32> {
        let bytes = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_u64(&mut self) -> IoResult<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads exactly `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> IoResult<&'a [u8]> {
        self.take(count)
    }

    /// Reads a compact var-int, rejecting non-canonical encodings.
    ///
    /// A value encoded in a wider form than necessary (for example `0x05`
    /// written as `FD 05 00`) is an error: canonical encoding is what makes
    /// snapshot checksums meaningful.
    pub fn read_var_int(&mut self) -> IoResult<u64> {
        let marker = self.read_u8()?;
        let value = match marker {
            0xFD => {
                let v = self.read_u16()? as u64;
                if v < 0xFD {
                    return Err(IoError::NonCanonicalVarInt { value: v });
                }
                v
            }
            0xFE => {
                let v = self.read_u32()? as u64;
                if v <= u16::MAX as u64 {
                    return Err(IoError::NonCanonicalVarInt { value: v });
                }
                v
            }
            0xFF => {
                let v = self.read_u64()?;
                if v <= u32::MAX as u64 {
                    return Err(IoError::NonCanonicalVarInt { value: v });
                }
                v
            }
            inline => inline as u64,
        };
        Ok(value)
    }

    /// Reads a length-prefixed byte string of at most `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> IoResult<Vec<u8>> {
        let len = self.read_var_int()?;
        let cap = max.min(MAX_VAR_BYTES);
        if len > cap as u64 {
            return Err(IoError::Oversized {
                len: len as usize,
                max: cap,
            });
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Reads a length-prefixed UTF-8 string of at most `max` bytes.
    pub fn read_var_string(&mut self, max: usize) -> IoResult<String> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes).map_err(|_| IoError::InvalidUtf8)
    }
}
