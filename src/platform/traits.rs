use crate::error::Result;
use crate::path::NormalizedPath;

use super::types::{
    EntryInfo, FileAttributes, FileOutcome, FileTimes, ProgressCallback, RawEntry,
    SecuritySnapshot, TransactionHandle,
};

/// Lazily produced directory listing.
///
/// Dropping the listing releases whatever handle the provider holds open.
pub type Listing<'a> = Box<dyn Iterator<Item = Result<RawEntry>> + 'a>;

/// Path normalization for platform-specific requirements
pub trait PathNormalizer {
    /// Turn user input into a canonical path
    fn normalize(&self, raw: &str, allow_wildcards: bool) -> Result<NormalizedPath>;
}

/// Primitive single-entry operations a storage backend provides.
///
/// Every call receives the caller's transaction context unchanged.
pub trait FileSystem {
    /// Immediate children of `dir`. May include `.` and `..` pseudo-entries.
    ///
    /// A missing directory fails with `PathNotFound`; `FileNotFound` means "no entries".
    fn list_children(
        &self,
        dir: &NormalizedPath,
        tx: Option<&TransactionHandle>,
    ) -> Result<Listing<'_>>;

    /// Metadata of `path` without following reparse points, `None` when absent.
    fn stat(&self, path: &NormalizedPath, tx: Option<&TransactionHandle>)
    -> Result<Option<EntryInfo>>;

    /// Succeeds when a directory already exists at `path`; fails when a file does.
    fn create_directory(
        &self,
        path: &NormalizedPath,
        template: Option<&NormalizedPath>,
        security: Option<&SecuritySnapshot>,
        tx: Option<&TransactionHandle>,
    ) -> Result<()>;

    fn delete_file(&self, path: &NormalizedPath, tx: Option<&TransactionHandle>) -> Result<()>;

    /// Removes an empty directory, or the reparse-point node itself.
    fn delete_directory(&self, path: &NormalizedPath, tx: Option<&TransactionHandle>)
    -> Result<()>;

    fn copy_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        overwrite: bool,
        progress: &mut ProgressCallback<'_>,
        tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome>;

    /// Atomic within a volume. Across volumes performs copy + delete when
    /// `allow_copy_fallback` is set, otherwise fails with `CrossVolumeNotSupported`.
    fn move_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        allow_copy_fallback: bool,
        progress: &mut ProgressCallback<'_>,
        tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome>;

    fn set_attributes(
        &self,
        path: &NormalizedPath,
        attributes: FileAttributes,
        tx: Option<&TransactionHandle>,
    ) -> Result<()>;

    fn set_times(
        &self,
        path: &NormalizedPath,
        times: &FileTimes,
        tx: Option<&TransactionHandle>,
    ) -> Result<()>;

    /// Detach the volume mounted at `path` without touching the volume's content.
    fn unmount_reparse_point(&self, path: &NormalizedPath) -> Result<()>;

    fn capture_security(&self, path: &NormalizedPath) -> Result<SecuritySnapshot>;

    fn apply_security(&self, path: &NormalizedPath, snapshot: &SecuritySnapshot) -> Result<()>;

    /// Whether a rename between the two paths can be atomic.
    fn same_volume(&self, a: &NormalizedPath, b: &NormalizedPath) -> bool {
        a.same_root(b)
    }

    /// Whether names that differ only in case are distinct entries.
    fn is_case_sensitive(&self) -> bool {
        false
    }
}
