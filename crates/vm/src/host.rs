//! Host-context syscalls available to frozen programs.

/// Longest log line a program may emit.
pub const MAX_LOG_LEN: usize = 4096;

/// Per-call environment supplied by the host runtime.
///
/// This is the only execution input besides the argument bytes and the
/// snapshot itself; nothing here is read from ambient process state, which
/// keeps invocations replayable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Account that signed/triggered the call.
    pub caller: String,
    /// Deposit attached to the call, in the chain's minimal unit.
    pub attached_deposit: u128,
    /// Block timestamp, nanoseconds since the epoch.
    pub block_timestamp: u64,
}

impl CallContext {
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            ..Self::default()
        }
    }

    pub fn with_deposit(mut self, attached_deposit: u128) -> Self {
        self.attached_deposit = attached_deposit;
        self
    }

    pub fn with_timestamp(mut self, block_timestamp: u64) -> Self {
        self.block_timestamp = block_timestamp;
        self
    }
}

/// Stable syscall identifiers, named after the host environment functions
/// the frozen programs were written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SyscallId {
    StorageRead = 0x1001,
    StorageWrite = 0x1002,
    StorageRemove = 0x1003,
    StorageHasKey = 0x1004,
    PredecessorAccountId = 0x2001,
    AttachedDeposit = 0x2002,
    BlockTimestamp = 0x2003,
    LogUtf8 = 0x3001,
}

impl SyscallId {
    pub fn from_u32(id: u32) -> Option<SyscallId> {
        match id {
            0x1001 => Some(SyscallId::StorageRead),
            0x1002 => Some(SyscallId::StorageWrite),
            0x1003 => Some(SyscallId::StorageRemove),
            0x1004 => Some(SyscallId::StorageHasKey),
            0x2001 => Some(SyscallId::PredecessorAccountId),
            0x2002 => Some(SyscallId::AttachedDeposit),
            0x2003 => Some(SyscallId::BlockTimestamp),
            0x3001 => Some(SyscallId::LogUtf8),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SyscallId::StorageRead => "storage_read",
            SyscallId::StorageWrite => "storage_write",
            SyscallId::StorageRemove => "storage_remove",
            SyscallId::StorageHasKey => "storage_has_key",
            SyscallId::PredecessorAccountId => "predecessor_account_id",
            SyscallId::AttachedDeposit => "attached_deposit",
            SyscallId::BlockTimestamp => "block_timestamp",
            SyscallId::LogUtf8 => "log_utf8",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syscall_ids_roundtrip() {
        for id in [
            SyscallId::StorageRead,
            SyscallId::StorageWrite,
            SyscallId::StorageRemove,
            SyscallId::StorageHasKey,
            SyscallId::PredecessorAccountId,
            SyscallId::AttachedDeposit,
            SyscallId::BlockTimestamp,
            SyscallId::LogUtf8,
        ] {
            assert_eq!(SyscallId::from_u32(id as u32), Some(id));
        }
        assert_eq!(SyscallId::from_u32(0xDEAD), None);
    }

    #[test]
    fn context_builder_sets_fields() {
        let ctx = CallContext::new("alice.test")
            .with_deposit(250)
            .with_timestamp(1_700_000_000);
        assert_eq!(ctx.caller, "alice.test");
        assert_eq!(ctx.attached_deposit, 250);
        assert_eq!(ctx.block_timestamp, 1_700_000_000);
    }
}
