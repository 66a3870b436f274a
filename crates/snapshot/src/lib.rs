//! Snapshot persistence for frozen module state.
//!
//! Each module's [`floe_vm::ModuleState`] lives in a single committed file
//! under the store root, wrapped in a versioned, checksummed envelope. The
//! [`SnapshotStore`] hands out exclusively-owned [`Snapshot`] handles;
//! every call ends by either committing the handle (atomic replace) or
//! discarding it (the committed file is untouched). There is no state in
//! between for a reader to observe.

mod error;
mod format;
mod store;

pub use error::{StoreError, StoreResult};
pub use format::{checksum_of, decode_envelope, encode_envelope, read_envelope, FORMAT_VERSION, MAGIC};
pub use store::{
    valid_module_id, Snapshot, SnapshotStore, MAX_MODULE_ID_LEN, SNAPSHOT_EXT,
};
