//! The on-disk snapshot envelope.
//!
//! Layout, all little-endian:
//!
//! ```text
//!   magic            8 bytes   b"FLOESNAP"
//!   format_version   u16       currently 1
//!   module id        var-string
//!   payload          var-bytes (the ModuleState encoding)
//!   checksum         u32       first 4 bytes of SHA-256 over the above
//! ```
//!
//! Decoding is strict: wrong magic, an unknown version, a checksum
//! mismatch, an embedded module id that differs from the requested one,
//! trailing bytes, or a payload that fails to decode are all `Corrupt`.
//! Versions are never coerced.

use floe_io::{BinaryWriter, MemoryReader, Serializable, MAX_VAR_BYTES};
use floe_vm::ModuleState;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};
use crate::store::MAX_MODULE_ID_LEN;

pub const MAGIC: [u8; 8] = *b"FLOESNAP";
pub const FORMAT_VERSION: u16 = 1;

/// First 4 bytes of the SHA-256 digest, as a little-endian u32.
pub fn checksum_of(bytes: &[u8]) -> u32 {
    let digest = Sha256::digest(bytes);
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

pub fn encode_envelope(module: &str, state: &ModuleState) -> StoreResult<Vec<u8>> {
    let mut payload = BinaryWriter::new();
    state
        .serialize(&mut payload)
        .map_err(|err| StoreError::corrupt(module, format!("state encoding failed: {err}")))?;

    let mut writer = BinaryWriter::new();
    writer.write_bytes(&MAGIC);
    writer.write_u16(FORMAT_VERSION);
    writer.write_var_string(module);
    writer.write_var_bytes(payload.as_slice());
    let checksum = checksum_of(writer.as_slice());
    writer.write_u32(checksum);
    Ok(writer.into_bytes())
}

/// Decodes an envelope whose embedded module id is not known in advance,
/// returning it alongside the state. `label` only names the source in
/// error messages (a file path, for tooling).
pub fn read_envelope(label: &str, bytes: &[u8]) -> StoreResult<(String, ModuleState)> {
    if bytes.len() < MAGIC.len() + 4 {
        return Err(StoreError::corrupt(label, "envelope truncated"));
    }

    // Verify the checksum before trusting any field.
    let (body, tail) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = checksum_of(body);
    if stored != computed {
        return Err(StoreError::corrupt(
            label,
            format!("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"),
        ));
    }

    let map_io = |err: floe_io::IoError| StoreError::corrupt(label, err.to_string());
    let mut reader = MemoryReader::new(body);

    let magic = reader.read_bytes(MAGIC.len()).map_err(map_io)?;
    if magic != MAGIC {
        return Err(StoreError::corrupt(label, "bad magic"));
    }
    let version = reader.read_u16().map_err(map_io)?;
    if version != FORMAT_VERSION {
        return Err(StoreError::corrupt(
            label,
            format!("unsupported format version {version}"),
        ));
    }
    let embedded = reader.read_var_string(MAX_MODULE_ID_LEN).map_err(map_io)?;
    let payload = reader.read_var_bytes(MAX_VAR_BYTES).map_err(map_io)?;
    reader.expect_end().map_err(map_io)?;

    let state = ModuleState::from_bytes(&payload)
        .map_err(|err| StoreError::corrupt(label, format!("state decoding failed: {err}")))?;
    Ok((embedded, state))
}

pub fn decode_envelope(module: &str, bytes: &[u8]) -> StoreResult<ModuleState> {
    let (embedded, state) = read_envelope(module, bytes)?;
    if embedded != module {
        return Err(StoreError::corrupt(
            module,
            format!("envelope names module `{embedded}`"),
        ));
    }
    Ok(state)
}
