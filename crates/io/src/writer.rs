//! Append-only binary writer.

/// Serializes values into a growable little-endian byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with `capacity` bytes preallocated.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer and returns the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a compact var-int.
    ///
    /// Values below `0xFD` occupy one byte; larger values use a marker byte
    /// followed by the smallest of u16/u32/u64 that holds them.
    pub fn write_var_int(&mut self, value: u64) {
        if value < 0xFD {
            self.write_u8(value as u8);
        } else if value <= u16::MAX as u64 {
            self.write_u8(0xFD);
            self.write_u16(value as u16);
        } else if value <= u32::MAX as u64 {
            self.write_u8(0xFE);
            self.write_u32(value as u32);
        } else {
            self.write_u8(0xFF);
            self.write_u64(value);
        }
    }

    /// Writes a var-int length prefix followed by the bytes.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_var_int(bytes.len() as u64);
        self.write_bytes(bytes);
    }

    /// Writes a string as length-prefixed UTF-8.
    pub fn write_var_string(&mut self, value: &str) {
        self.write_var_bytes(value.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_little_endian_integers() {
        let mut w = BinaryWriter::new();
        w.write_u8(0x01);
        w.write_u16(0x0302);
        w.write_u32(0x0706_0504);
        w.write_u64(0x0F0E_0D0C_0B0A_0908);
        assert_eq!(
            w.into_bytes(),
            (1u8..=0x0F).collect::<Vec<u8>>(),
        );
    }

    #[test]
    fn var_int_uses_minimal_width() {
        let mut w = BinaryWriter::new();
        w.write_var_int(0xFC);
        assert_eq!(w.as_slice(), &[0xFC]);

        let mut w = BinaryWriter::new();
        w.write_var_int(0xFD);
        assert_eq!(w.as_slice(), &[0xFD, 0xFD, 0x00]);

        let mut w = BinaryWriter::new();
        w.write_var_int(0x1_0000);
        assert_eq!(w.as_slice(), &[0xFE, 0x00, 0x00, 0x01, 0x00]);

        let mut w = BinaryWriter::new();
        w.write_var_int(0x1_0000_0000);
        assert_eq!(w.as_slice()[0], 0xFF);
        assert_eq!(w.len(), 9);
    }

    #[test]
    fn var_bytes_prefixes_length() {
        let mut w = BinaryWriter::new();
        w.write_var_bytes(b"abc");
        assert_eq!(w.as_slice(), &[3, b'a', b'b', b'c']);
    }
}
