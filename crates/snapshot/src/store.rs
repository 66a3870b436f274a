//! File-backed snapshot store with atomic replace.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use floe_vm::ModuleState;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::format;

/// Longest accepted module identifier.
pub const MAX_MODULE_ID_LEN: usize = 255;
/// Extension of committed snapshot files under the store root.
pub const SNAPSHOT_EXT: &str = "snap";

/// An exclusively-owned handle on one module's restored state.
///
/// Exactly one of [`SnapshotStore::commit`] or [`SnapshotStore::discard`]
/// consumes it; there is no way to alias the state into a second live call.
#[derive(Debug, PartialEq)]
pub struct Snapshot {
    module: String,
    state: ModuleState,
}

impl Snapshot {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ModuleState {
        &mut self.state
    }

    pub fn into_state(self) -> ModuleState {
        self.state
    }
}

/// One committed envelope per module, under a root directory.
///
/// `commit` goes through a temporary file, fsync and rename, so a crash at
/// any point leaves either the old committed file or the new one, never a
/// torn mix. The store keeps the last committed envelope bytes per module
/// in memory; `load` decodes from that cache when it can.
#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    committed: Mutex<HashMap<String, Vec<u8>>>,
}

impl SnapshotStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|err| StoreError::io(format!("creating store root {}", root.display()), err))?;
        log::debug!("snapshot store opened at {}", root.display());
        Ok(Self {
            root,
            committed: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a committed snapshot exists for `module`. Invalid
    /// identifiers exist nowhere.
    pub fn exists(&self, module: &str) -> bool {
        match self.snapshot_path(module) {
            Ok(path) => path.is_file() || self.committed.lock().contains_key(module),
            Err(_) => false,
        }
    }

    /// Deploy-time creation of a module's first snapshot.
    pub fn init_module(&self, module: &str, state: ModuleState) -> StoreResult<()> {
        let path = self.snapshot_path(module)?;
        if path.is_file() || self.committed.lock().contains_key(module) {
            return Err(StoreError::already_exists(module));
        }
        let bytes = format::encode_envelope(module, &state)?;
        self.write_atomic(&path, &bytes)?;
        self.committed.lock().insert(module.to_owned(), bytes);
        log::info!("initialized module `{module}`");
        Ok(())
    }

    /// Restores the committed state for `module` into an owned handle.
    pub fn load(&self, module: &str) -> StoreResult<Snapshot> {
        let path = self.snapshot_path(module)?;

        if let Some(bytes) = self.committed.lock().get(module).cloned() {
            let state = format::decode_envelope(module, &bytes)?;
            log::debug!("loaded `{module}` from the committed cache");
            return Ok(Snapshot {
                module: module.to_owned(),
                state,
            });
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(module));
            }
            Err(err) => {
                let err = StoreError::corrupt(module, format!("read failed: {err}"));
                log::warn!("{err}");
                return Err(err);
            }
        };
        let state = match format::decode_envelope(module, &bytes) {
            Ok(state) => state,
            Err(err) => {
                log::warn!("{err} (from {})", path.display());
                return Err(err);
            }
        };
        log::debug!(
            "loaded `{module}` from {} ({} bytes)",
            path.display(),
            bytes.len()
        );
        self.committed.lock().insert(module.to_owned(), bytes);
        Ok(Snapshot {
            module: module.to_owned(),
            state,
        })
    }

    /// Atomically replaces the committed snapshot with `snapshot`.
    ///
    /// A commit whose envelope is byte-identical to the committed one
    /// skips the disk write.
    pub fn commit(&self, snapshot: Snapshot) -> StoreResult<()> {
        let Snapshot { module, state } = snapshot;
        let path = self.snapshot_path(&module)?;
        let bytes = format::encode_envelope(&module, &state)?;

        if self.committed.lock().get(&module).map(Vec::as_slice) == Some(bytes.as_slice()) {
            log::debug!("commit for `{module}` is unchanged, skipping write");
            return Ok(());
        }

        self.write_atomic(&path, &bytes)?;
        log::debug!("committed `{module}` ({} bytes)", bytes.len());
        self.committed.lock().insert(module, bytes);
        Ok(())
    }

    /// Drops the handle; the previously committed snapshot stays
    /// authoritative.
    pub fn discard(&self, snapshot: Snapshot) {
        log::debug!("discarded in-memory snapshot for `{}`", snapshot.module);
        drop(snapshot);
    }

    fn snapshot_path(&self, module: &str) -> StoreResult<PathBuf> {
        if !valid_module_id(module) {
            return Err(StoreError::not_found(module));
        }
        Ok(self.root.join(format!("{module}.{SNAPSHOT_EXT}")))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let tmp = path.with_extension(format!("{SNAPSHOT_EXT}.tmp"));
        let mut file = File::create(&tmp)
            .map_err(|err| StoreError::io(format!("creating {}", tmp.display()), err))?;
        file.write_all(bytes)
            .map_err(|err| StoreError::io(format!("writing {}", tmp.display()), err))?;
        file.sync_all()
            .map_err(|err| StoreError::io(format!("syncing {}", tmp.display()), err))?;
        drop(file);
        fs::rename(&tmp, path)
            .map_err(|err| StoreError::io(format!("renaming into {}", path.display()), err))?;
        // The rename itself must survive a crash, so flush the directory
        // entry as well.
        #[cfg(unix)]
        {
            let dir = File::open(&self.root)
                .map_err(|err| StoreError::io("opening store root for sync", err))?;
            dir.sync_all()
                .map_err(|err| StoreError::io("syncing store root", err))?;
        }
        Ok(())
    }
}

/// Identifiers are restricted to `[A-Za-z0-9._-]`, non-empty, at most
/// [`MAX_MODULE_ID_LEN`] bytes, and never a bare dot component. Nothing
/// else can name a file under the store root.
pub fn valid_module_id(module: &str) -> bool {
    !module.is_empty()
        && module.len() <= MAX_MODULE_ID_LEN
        && module != "."
        && module != ".."
        && module
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
