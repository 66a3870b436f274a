//! Binary serialization primitives shared by the snapshot format and the
//! program encoding.
//!
//! All multi-byte integers are little-endian. Variable-length quantities use
//! the compact var-int scheme (`< 0xFD` inline, then 2/4/8-byte wide forms)
//! and decoding rejects non-canonical encodings so that every value has
//! exactly one byte representation.

mod error;
mod reader;
mod serializable;
mod writer;

pub use error::{IoError, IoResult};
pub use reader::MemoryReader;
pub use serializable::Serializable;
pub use writer::BinaryWriter;

/// Upper bound accepted for any var-int length prefix.
///
/// Snapshot payloads are bounded well below this; the cap exists so a
/// corrupted length prefix cannot drive a multi-gigabyte allocation.
pub const MAX_VAR_BYTES: usize = 0x0400_0000; // 64 MiB
