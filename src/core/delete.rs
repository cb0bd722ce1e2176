use tracing::{debug, info, warn};

use crate::core::enumerator::{EnumerateOptions, enumerate};
use crate::core::outcome::{OperationOutcome, TreeStats};
use crate::core::pattern::SearchPattern;
use crate::error::{FsError, Result};
use crate::path::NormalizedPath;
use crate::platform::traits::FileSystem;
use crate::platform::types::{EntryInfo, FileAttributes, TransactionHandle};

/// Attribute bits a caller may change; the rest describe the node itself.
const SETTABLE: FileAttributes = FileAttributes::READ_ONLY
    .union(FileAttributes::HIDDEN)
    .union(FileAttributes::SYSTEM)
    .union(FileAttributes::ARCHIVE)
    .union(FileAttributes::TEMPORARY)
    .union(FileAttributes::OFFLINE)
    .union(FileAttributes::NOT_CONTENT_INDEXED);

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub recursive: bool,
    /// Clear the read-only attribute and retry once when a removal is denied.
    pub ignore_read_only: bool,
    /// Restricts a recursive delete to matching entries. Anything narrower than
    /// `*` leaves the directory skeleton in place.
    pub pattern: String,
    pub transaction: Option<TransactionHandle>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            ignore_read_only: true,
            pattern: "*".to_string(),
            transaction: None,
        }
    }
}

/// Delete a single file. A missing file counts as deleted.
pub fn delete_file<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    ignore_read_only: bool,
    tx: Option<&TransactionHandle>,
) -> Result<()> {
    match remove_file(fs, path, ignore_read_only, tx) {
        Err(e) if e.is_not_found() => {
            debug!("{} already absent", path);
            Ok(())
        }
        other => other,
    }
}

/// Delete the directory at `path`, its content too when `recursive`.
///
/// A missing directory is an error. A reparse point at `path` is removed without
/// touching its target.
pub fn delete_directory<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    options: &DeleteOptions,
) -> Result<OperationOutcome> {
    let pattern = SearchPattern::new(&options.pattern)?;
    let tx = options.transaction.as_ref();
    info!(
        "Deleting directory {} (recursive: {}, pattern: '{}')",
        path, options.recursive, options.pattern
    );

    let info = fs
        .stat(path, tx)?
        .filter(EntryInfo::is_directory)
        .ok_or_else(|| FsError::path_not_found(path))?;

    let mut stats = TreeStats::default();
    let result = if info.is_reparse_point() {
        remove_reparse_point(fs, path, &info, options).map(|()| stats.reparse_points += 1)
    } else {
        let mut deleter = TreeDeleter {
            fs,
            options,
            pattern: &pattern,
            stats: &mut stats,
        };
        deleter.run(path)
    };

    match result {
        Ok(()) => {
            info!("Deleted {}: {:?}", path, stats);
            Ok(OperationOutcome::Success(stats))
        }
        Err(e) => OperationOutcome::failed(e, stats, false),
    }
}

struct TreeDeleter<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    options: &'a DeleteOptions,
    pattern: &'a SearchPattern,
    stats: &'a mut TreeStats,
}

impl<F: FileSystem + ?Sized> TreeDeleter<'_, F> {
    fn run(&mut self, root: &NormalizedPath) -> Result<()> {
        match self.delete_once(root) {
            // Something was added behind our back; one more full pass.
            Err(FsError::DirectoryNotEmpty { path }) if self.options.recursive => {
                warn!(
                    "{} was not empty, running the recursive delete of {} again",
                    path.display(),
                    root
                );
                self.delete_once(root)
            }
            other => other,
        }
    }

    fn delete_once(&mut self, root: &NormalizedPath) -> Result<()> {
        if self.options.recursive {
            self.delete_children(root)?;
            if !self.pattern.matches_everything() {
                return Ok(());
            }
        }

        remove_directory(self.fs, root, self.options)?;
        self.stats.directories += 1;
        Ok(())
    }

    fn delete_children(&mut self, root: &NormalizedPath) -> Result<()> {
        let tx = self.options.transaction.as_ref();
        let walker = enumerate(
            self.fs,
            EnumerateOptions::new(root.clone())
                .pattern(self.options.pattern.clone())
                .recursive(true)
                .transaction(self.options.transaction.clone()),
        )?;

        // Every directory is discovered after its parent, so reverse discovery
        // order removes children first.
        let mut directories = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.is_reparse_point() {
                remove_reparse_point(self.fs, &entry.full_path, &entry.info, self.options)?;
                self.stats.reparse_points += 1;
            } else if entry.is_directory() {
                directories.push(entry.full_path);
            } else {
                match remove_file(self.fs, &entry.full_path, self.options.ignore_read_only, tx) {
                    Ok(()) => {
                        self.stats.files += 1;
                        self.stats.bytes += entry.info.size;
                    }
                    Err(e) if e.is_not_found() => {
                        debug!("{} vanished before it could be deleted", entry.full_path);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if self.pattern.matches_everything() {
            for dir in directories.iter().rev() {
                remove_directory(self.fs, dir, self.options)?;
                self.stats.directories += 1;
            }
        }
        Ok(())
    }
}

/// Remove a link or mount point node. Mount points are detached first.
fn remove_reparse_point<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    info: &EntryInfo,
    options: &DeleteOptions,
) -> Result<()> {
    if info.is_mount_point() {
        debug!("Unmounting volume at {}", path);
        fs.unmount_reparse_point(path)?;
    }

    if info.is_directory() {
        remove_directory(fs, path, options)
    } else {
        remove_file(
            fs,
            path,
            options.ignore_read_only,
            options.transaction.as_ref(),
        )
    }
}

fn remove_file<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    ignore_read_only: bool,
    tx: Option<&TransactionHandle>,
) -> Result<()> {
    debug!("Deleting file {}", path);
    match fs.delete_file(path, tx) {
        Err(FsError::AccessDenied { .. }) if ignore_read_only => {
            warn!("Access denied deleting {}, clearing read-only and retrying", path);
            clear_read_only(fs, path, tx)?;
            fs.delete_file(path, tx)
        }
        other => other,
    }
}

/// Remove one empty directory node with the read-only retry.
fn remove_directory<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    options: &DeleteOptions,
) -> Result<()> {
    let tx = options.transaction.as_ref();
    debug!("Removing directory {}", path);

    let result = match fs.delete_directory(path, tx) {
        Err(FsError::AccessDenied { .. }) if options.ignore_read_only => {
            warn!("Access denied removing {}, clearing read-only and retrying", path);
            clear_read_only(fs, path, tx)?;
            fs.delete_directory(path, tx)
        }
        other => other,
    };

    match result {
        // The name resolved through something that is not a directory.
        Err(FsError::FileNotFound { .. }) => Err(FsError::path_not_found(path)),
        other => other,
    }
}

fn clear_read_only<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    tx: Option<&TransactionHandle>,
) -> Result<()> {
    let Some(info) = fs.stat(path, tx)? else {
        return Ok(());
    };
    let mut attributes = info.attributes & SETTABLE.difference(FileAttributes::READ_ONLY);
    if attributes.is_empty() {
        attributes = FileAttributes::NORMAL;
    }
    fs.set_attributes(path, attributes, tx)
}
