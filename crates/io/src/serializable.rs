//! Trait implemented by every type with a canonical binary form.

use crate::{BinaryWriter, IoResult, MemoryReader};

/// A type with a single canonical binary encoding.
///
/// Canonical means byte-for-byte stable: encoding the same value twice
/// yields identical bytes, and decoding accepts exactly the bytes encoding
/// would produce. Checksums over encodings rely on this.
pub trait Serializable: Sized {
    /// Appends the canonical encoding of `self` to `writer`.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Decodes one value, leaving the reader positioned after it.
    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self>;

    /// Encodes `self` into a fresh buffer.
    fn to_bytes(&self) -> IoResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Decodes a value from `data`, requiring every byte to be consumed.
    fn from_bytes(data: &[u8]) -> IoResult<Self> {
        let mut reader = MemoryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        reader.expect_end()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoError;

    #[derive(Debug, PartialEq)]
    struct Pair {
        left: u32,
        right: String,
    }

    impl Serializable for Pair {
        fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
            writer.write_u32(self.left);
            writer.write_var_string(&self.right);
            Ok(())
        }

        fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
            Ok(Pair {
                left: reader.read_u32()?,
                right: reader.read_var_string(64)?,
            })
        }
    }

    #[test]
    fn to_bytes_from_bytes_roundtrip() {
        let pair = Pair {
            left: 42,
            right: "frozen".into(),
        };
        let bytes = pair.to_bytes().unwrap();
        assert_eq!(Pair::from_bytes(&bytes).unwrap(), pair);
    }

    #[test]
    fn from_bytes_rejects_trailing_garbage() {
        let pair = Pair {
            left: 1,
            right: "x".into(),
        };
        let mut bytes = pair.to_bytes().unwrap();
        bytes.push(0);
        assert_eq!(
            Pair::from_bytes(&bytes),
            Err(IoError::TrailingBytes { remaining: 1 })
        );
    }
}
