pub mod local;
pub mod memory;
pub mod resolver;
pub mod traits;
pub mod types;

#[cfg(windows)]
pub mod windows;

pub use local::LocalFileSystem;
pub use memory::{CallRecord, MemoryFileSystem};
pub use resolver::HostPathNormalizer;
pub use traits::{FileSystem, Listing, PathNormalizer};
pub use types::{
    EntryInfo, FileAttributes, FileOutcome, FileProgress, FileTimes, ProgressAction,
    ProgressCallback, RawEntry, ReparseTag, SecuritySnapshot, TransactionHandle,
};
