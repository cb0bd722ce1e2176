//! Lazy directory-tree walk.
//!
//! Pending directories live on an explicit stack so depth never grows the call
//! stack. At most one listing is open at a time and it is released as soon as it is
//! exhausted, on error, or when the walker is dropped.

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::pattern::SearchPattern;
use crate::error::{FsError, Result};
use crate::path::NormalizedPath;
use crate::platform::traits::{FileSystem, Listing};
use crate::platform::types::{EntryInfo, TransactionHandle};

const SELF_ENTRY: &str = ".";
const PARENT_ENTRY: &str = "..";

/// Walk configuration. Matching is always case-insensitive.
#[derive(Debug, Clone)]
pub struct EnumerateOptions {
    pub root: NormalizedPath,
    pub pattern: String,
    pub recursive: bool,
    pub include_files: bool,
    pub include_dirs: bool,
    pub continue_on_access_error: bool,
    pub transaction: Option<TransactionHandle>,
}

impl EnumerateOptions {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            pattern: "*".to_string(),
            recursive: false,
            include_files: true,
            include_dirs: true,
            continue_on_access_error: false,
            transaction: None,
        }
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn include_files(mut self, include: bool) -> Self {
        self.include_files = include;
        self
    }

    pub fn include_dirs(mut self, include: bool) -> Self {
        self.include_dirs = include;
        self
    }

    pub fn continue_on_access_error(mut self, enabled: bool) -> Self {
        self.continue_on_access_error = enabled;
        self
    }

    pub fn transaction(mut self, transaction: Option<TransactionHandle>) -> Self {
        self.transaction = transaction;
        self
    }
}

/// One yielded child.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub name: String,
    pub full_path: NormalizedPath,
    pub info: EntryInfo,
}

impl Entry {
    pub fn is_directory(&self) -> bool {
        self.info.is_directory()
    }

    pub fn is_reparse_point(&self) -> bool {
        self.info.is_reparse_point()
    }

    pub fn is_mount_point(&self) -> bool {
        self.info.is_mount_point()
    }
}

/// A directory whose listing failed and was passed over.
#[derive(Debug)]
pub struct SkippedDirectory {
    pub path: NormalizedPath,
    pub error: FsError,
}

/// Single-pass iterator over a directory tree. Re-walking needs a new [`enumerate`] call.
pub struct DirectoryWalker<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    root: NormalizedPath,
    pattern: SearchPattern,
    recursive: bool,
    include_files: bool,
    include_dirs: bool,
    continue_on_access_error: bool,
    transaction: Option<TransactionHandle>,
    stack: Vec<NormalizedPath>,
    current: Option<(NormalizedPath, Listing<'a>)>,
    skipped: Vec<SkippedDirectory>,
    finished: bool,
}

/// Start a walk of `options.root`. Nothing is listed until the first `next()`.
pub fn enumerate<F: FileSystem + ?Sized>(
    fs: &F,
    options: EnumerateOptions,
) -> Result<DirectoryWalker<'_, F>> {
    let pattern = SearchPattern::new(&options.pattern)?;
    debug!(
        "Enumerating {} (pattern: '{}', recursive: {})",
        options.root, options.pattern, options.recursive
    );

    Ok(DirectoryWalker {
        fs,
        stack: vec![options.root.clone()],
        root: options.root,
        pattern,
        recursive: options.recursive,
        include_files: options.include_files,
        include_dirs: options.include_dirs,
        continue_on_access_error: options.continue_on_access_error,
        transaction: options.transaction,
        current: None,
        skipped: Vec::new(),
        finished: false,
    })
}

impl<'a, F: FileSystem + ?Sized> DirectoryWalker<'a, F> {
    /// Directories passed over so far under `continue_on_access_error`.
    pub fn skipped(&self) -> &[SkippedDirectory] {
        &self.skipped
    }

    pub fn take_skipped(&mut self) -> Vec<SkippedDirectory> {
        std::mem::take(&mut self.skipped)
    }

    /// Handle a failure of `dir`. Returns the error when the walk must stop.
    fn on_error(&mut self, dir: NormalizedPath, error: FsError) -> Option<FsError> {
        match error {
            // "No more files": the directory is simply empty.
            FsError::FileNotFound { .. } => {
                debug!("No entries in {}", dir);
                None
            }
            FsError::PathNotFound { .. } if dir != self.root => {
                debug!("Directory {} vanished during enumeration", dir);
                None
            }
            error if self.continue_on_access_error => {
                warn!("Skipping directory {}: {}", dir, error);
                self.skipped.push(SkippedDirectory { path: dir, error });
                None
            }
            error => {
                self.finished = true;
                self.stack.clear();
                Some(error)
            }
        }
    }

    fn wanted(&self, name: &str, info: &EntryInfo) -> bool {
        let kind_included = if info.is_directory() {
            self.include_dirs
        } else {
            self.include_files
        };
        kind_included && self.pattern.is_match(name)
    }
}

impl<'a, F: FileSystem + ?Sized> Iterator for DirectoryWalker<'a, F> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            if self.current.is_none() {
                let Some(dir) = self.stack.pop() else {
                    self.finished = true;
                    return None;
                };
                match self.fs.list_children(&dir, self.transaction.as_ref()) {
                    Ok(listing) => self.current = Some((dir, listing)),
                    Err(e) => {
                        if let Some(error) = self.on_error(dir, e) {
                            return Some(Err(error));
                        }
                    }
                }
                continue;
            }

            let Some((dir, listing)) = self.current.as_mut() else {
                continue;
            };

            let raw = match listing.next() {
                None => {
                    self.current = None;
                    continue;
                }
                Some(Ok(raw)) => raw,
                Some(Err(e)) if e.is_not_found() => {
                    debug!("Entry vanished while listing {}: {}", dir, e);
                    continue;
                }
                Some(Err(e)) => {
                    if let Some((dir, _)) = self.current.take()
                        && let Some(error) = self.on_error(dir, e)
                    {
                        return Some(Err(error));
                    }
                    continue;
                }
            };

            if raw.name == SELF_ENTRY || raw.name == PARENT_ENTRY {
                continue;
            }

            let full_path = dir.child(&raw.name);
            // Descent ignores the pattern; reparse points are never followed.
            if self.recursive && raw.info.is_directory() && !raw.info.is_reparse_point() {
                self.stack.push(full_path.clone());
            }

            if self.wanted(&raw.name, &raw.info) {
                return Some(Ok(Entry {
                    name: raw.name,
                    full_path,
                    info: raw.info,
                }));
            }
        }
    }
}
