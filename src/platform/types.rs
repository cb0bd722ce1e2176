//! Value types exchanged with a [`FileSystem`](super::FileSystem) provider.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Entry attribute bits, using the Windows `FILE_ATTRIBUTE_*` values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct FileAttributes: u32 {
        const READ_ONLY           = 0x0000_0001;
        const HIDDEN              = 0x0000_0002;
        const SYSTEM              = 0x0000_0004;
        const DIRECTORY           = 0x0000_0010;
        const ARCHIVE             = 0x0000_0020;
        const DEVICE              = 0x0000_0040;
        const NORMAL              = 0x0000_0080;
        const TEMPORARY           = 0x0000_0100;
        const SPARSE_FILE         = 0x0000_0200;
        const REPARSE_POINT       = 0x0000_0400;
        const COMPRESSED          = 0x0000_0800;
        const OFFLINE             = 0x0000_1000;
        const NOT_CONTENT_INDEXED = 0x0000_2000;
        const ENCRYPTED           = 0x0000_4000;
    }
}

/// Kind of redirection carried by a reparse point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReparseTag {
    /// Binds a directory to another volume.
    MountPoint,
    Symlink,
    Other(u32),
}

/// Timestamps applied by [`FileSystem::set_times`](super::FileSystem::set_times).
/// `None` leaves the corresponding time untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileTimes {
    pub created: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

/// Metadata of one file-system node, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryInfo {
    pub attributes: FileAttributes,
    /// Logical size in bytes.
    pub size: u64,
    /// Bytes occupied on disk (after compression / cluster rounding).
    pub allocated_size: u64,
    pub created: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub reparse_tag: Option<ReparseTag>,
}

impl EntryInfo {
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }

    pub fn is_reparse_point(&self) -> bool {
        self.attributes.contains(FileAttributes::REPARSE_POINT) || self.reparse_tag.is_some()
    }

    pub fn is_mount_point(&self) -> bool {
        self.reparse_tag == Some(ReparseTag::MountPoint)
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(FileAttributes::READ_ONLY)
    }

    pub fn times(&self) -> FileTimes {
        FileTimes {
            created: self.created,
            accessed: self.accessed,
            modified: self.modified,
        }
    }
}

/// One record of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub info: EntryInfo,
}

/// Opaque transaction context threaded unchanged through every primitive call.
#[derive(Clone)]
pub struct TransactionHandle(Arc<dyn Any + Send + Sync>);

impl TransactionHandle {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self(Arc::new(inner))
    }

    /// Providers recover their own transaction type here.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &TransactionHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransactionHandle(..)")
    }
}

/// Opaque access-control snapshot captured from one node and applied to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecuritySnapshot(Vec<u8>);

impl SecuritySnapshot {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Answer of a progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAction {
    Continue,
    Cancel,
}

/// Progress of a single file transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileProgress {
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

pub type ProgressCallback<'a> = dyn FnMut(&FileProgress) -> ProgressAction + 'a;

/// Result of a single file copy or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Completed { bytes: u64 },
    /// The progress callback cancelled; no partial destination is left behind.
    Aborted { bytes: u64 },
}
