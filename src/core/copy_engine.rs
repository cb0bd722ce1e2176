use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::delete::{DeleteOptions, delete_directory, delete_file};
use crate::core::enumerator::{EnumerateOptions, enumerate};
use crate::core::outcome::{OperationOutcome, TreeStats};
use crate::core::validation::validate_transfer;
use crate::error::Result;
use crate::path::NormalizedPath;
use crate::platform::traits::FileSystem;
use crate::platform::types::{
    EntryInfo, FileOutcome, FileProgress, ProgressAction, TransactionHandle,
};

/// What a move does when source and destination are on different volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossVolumePolicy {
    Deny,
    /// Copy everything, then delete the source.
    #[default]
    CopyFallback,
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    /// Carry access control and timestamps over to copies.
    pub preserve_metadata: bool,
    pub cross_volume: CrossVolumePolicy,
    /// Replace an existing destination. It is deleted before the transfer starts.
    pub overwrite: bool,
    pub transaction: Option<TransactionHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub files_transferred: u64,
    pub directories_created: u64,
    pub current_file: Option<NormalizedPath>,
    pub current_file_bytes: u64,
    pub current_file_total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Copy,
    Move,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Self::Copy => "Copying",
            Self::Move => "Moving",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Abort,
}

/// Copies and moves trees through a [`FileSystem`], reporting progress as it goes.
///
/// The callback runs after every chunk of every file and once more after each
/// completed file; returning [`ProgressAction::Cancel`] stops the transfer with
/// [`OperationOutcome::Aborted`]. Nothing already written is rolled back.
pub struct CopyEngine<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    options: &'a TransferOptions,
}

impl<'a, F: FileSystem + ?Sized> CopyEngine<'a, F> {
    pub fn new(fs: &'a F, options: &'a TransferOptions) -> Self {
        Self { fs, options }
    }

    pub fn copy<P>(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        progress_callback: P,
    ) -> Result<OperationOutcome>
    where
        P: FnMut(&TransferProgress) -> ProgressAction,
    {
        self.transfer(Mode::Copy, source, destination, progress_callback)
    }

    /// Within a volume this is one rename. Across volumes the whole tree is copied
    /// first and the source is deleted only once every copy succeeded.
    pub fn move_tree<P>(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        progress_callback: P,
    ) -> Result<OperationOutcome>
    where
        P: FnMut(&TransferProgress) -> ProgressAction,
    {
        self.transfer(Mode::Move, source, destination, progress_callback)
    }

    fn transfer<P>(
        &self,
        mode: Mode,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        mut progress_callback: P,
    ) -> Result<OperationOutcome>
    where
        P: FnMut(&TransferProgress) -> ProgressAction,
    {
        info!("{} {} -> {}", mode.verb(), source, destination);

        let validation =
            validate_transfer(self.fs, source, destination, mode == Mode::Move, self.options)?;
        for warning in &validation.warnings {
            warn!("{}", warning);
        }

        let mut run = TransferRun {
            fs: self.fs,
            options: self.options,
            callback: &mut progress_callback,
            progress: TransferProgress::default(),
            stats: TreeStats::default(),
            mutated: false,
        };

        if let Some(existing) = &validation.destination
            && let Err(e) = run.clear_destination(destination, existing)
        {
            return OperationOutcome::failed(e, run.stats, run.mutated);
        }

        let source_info = &validation.source;
        let is_tree = source_info.is_directory() && !source_info.is_reparse_point();
        let result = match mode {
            Mode::Move if validation.same_volume => {
                run.move_entry(source, destination, source_info, false)
            }
            Mode::Move if !is_tree => run.move_entry(source, destination, source_info, true),
            Mode::Move => run
                .copy_entry(source, destination, source_info)
                .and_then(|flow| run.remove_source(source, flow)),
            Mode::Copy => run.copy_entry(source, destination, source_info),
        };

        match result {
            Ok(Flow::Continue) => {
                info!(
                    "{} finished: {} files, {} directories, {} bytes",
                    mode.verb(),
                    run.stats.files,
                    run.stats.directories,
                    run.stats.bytes
                );
                Ok(OperationOutcome::Success(run.stats))
            }
            Ok(Flow::Abort) => {
                info!("{} {} aborted by progress callback", mode.verb(), source);
                Ok(OperationOutcome::Aborted { stats: run.stats })
            }
            Err(e) => OperationOutcome::failed(e, run.stats, run.mutated),
        }
    }
}

/// Copy `source` to `destination`. See [`CopyEngine`].
pub fn copy_tree<F, P>(
    fs: &F,
    source: &NormalizedPath,
    destination: &NormalizedPath,
    options: &TransferOptions,
    progress_callback: P,
) -> Result<OperationOutcome>
where
    F: FileSystem + ?Sized,
    P: FnMut(&TransferProgress) -> ProgressAction,
{
    CopyEngine::new(fs, options).copy(source, destination, progress_callback)
}

/// Move `source` to `destination`. See [`CopyEngine::move_tree`].
pub fn move_tree<F, P>(
    fs: &F,
    source: &NormalizedPath,
    destination: &NormalizedPath,
    options: &TransferOptions,
    progress_callback: P,
) -> Result<OperationOutcome>
where
    F: FileSystem + ?Sized,
    P: FnMut(&TransferProgress) -> ProgressAction,
{
    CopyEngine::new(fs, options).move_tree(source, destination, progress_callback)
}

struct TransferRun<'a, F: FileSystem + ?Sized, P> {
    fs: &'a F,
    options: &'a TransferOptions,
    callback: &'a mut P,
    progress: TransferProgress,
    stats: TreeStats,
    mutated: bool,
}

impl<F, P> TransferRun<'_, F, P>
where
    F: FileSystem + ?Sized,
    P: FnMut(&TransferProgress) -> ProgressAction,
{
    fn tx(&self) -> Option<&TransactionHandle> {
        self.options.transaction.as_ref()
    }

    fn delete_options(&self) -> DeleteOptions {
        DeleteOptions {
            recursive: true,
            ignore_read_only: true,
            pattern: "*".to_string(),
            transaction: self.options.transaction.clone(),
        }
    }

    fn clear_destination(
        &mut self,
        destination: &NormalizedPath,
        existing: &EntryInfo,
    ) -> Result<()> {
        info!("Destination {} exists, deleting it first", destination);
        self.mutated = true;

        if existing.is_directory() {
            match delete_directory(self.fs, destination, &self.delete_options())? {
                OperationOutcome::PartialFailure { first_error, .. } => Err(first_error),
                _ => Ok(()),
            }
        } else {
            delete_file(self.fs, destination, true, self.tx())
        }
    }

    fn begin_file(&mut self, source: &NormalizedPath, info: &EntryInfo) {
        self.progress.current_file = Some(source.clone());
        self.progress.current_file_bytes = 0;
        self.progress.current_file_total = info.size;
    }

    fn record_file(&mut self, info: &EntryInfo, bytes: u64) {
        if info.is_reparse_point() {
            self.stats.reparse_points += 1;
        } else if info.is_directory() {
            self.stats.directories += 1;
        } else {
            self.stats.files += 1;
        }
        self.stats.bytes += bytes;
        self.progress.bytes_transferred += bytes;
        self.progress.files_transferred += 1;
    }

    fn report(&mut self) -> Flow {
        match (self.callback)(&self.progress) {
            ProgressAction::Continue => Flow::Continue,
            ProgressAction::Cancel => Flow::Abort,
        }
    }

    /// Single move primitive. Within a volume this renames the whole subtree at once;
    /// across volumes the primitive copies and deletes a file or link itself.
    fn move_entry(
        &mut self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        info: &EntryInfo,
        allow_copy_fallback: bool,
    ) -> Result<Flow> {
        debug!("Moving {} -> {}", source, destination);
        self.begin_file(source, info);

        let tx = self.options.transaction.as_ref();
        let progress = &mut self.progress;
        let callback = &mut *self.callback;
        let mut on_chunk = |p: &FileProgress| {
            progress.current_file_bytes = p.transferred_bytes;
            progress.current_file_total = p.total_bytes;
            callback(progress)
        };
        let outcome =
            self.fs
                .move_file(source, destination, allow_copy_fallback, &mut on_chunk, tx)?;

        self.finish_primitive(outcome, info)
    }

    fn finish_primitive(&mut self, outcome: FileOutcome, info: &EntryInfo) -> Result<Flow> {
        match outcome {
            FileOutcome::Completed { bytes } => {
                self.mutated = true;
                self.record_file(info, bytes);
                Ok(Flow::Continue)
            }
            FileOutcome::Aborted { .. } => Ok(Flow::Abort),
        }
    }

    fn copy_entry(
        &mut self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        info: &EntryInfo,
    ) -> Result<Flow> {
        if info.is_directory() && !info.is_reparse_point() {
            self.copy_directory(source, destination, info)
        } else {
            self.copy_file(source, destination, info)
        }
    }

    fn copy_directory(
        &mut self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        info: &EntryInfo,
    ) -> Result<Flow> {
        let preserve = self.options.preserve_metadata;
        let security = if preserve {
            Some(self.fs.capture_security(source)?)
        } else {
            None
        };

        debug!("Creating directory {}", destination);
        self.fs
            .create_directory(destination, Some(source), security.as_ref(), self.tx())?;
        self.mutated = true;
        self.stats.directories += 1;
        self.progress.directories_created += 1;

        let children = enumerate(
            self.fs,
            EnumerateOptions::new(source.clone()).transaction(self.options.transaction.clone()),
        )?;
        for child in children {
            let child = child?;
            let target = destination.child(&child.name);
            if self.copy_entry(&child.full_path, &target, &child.info)? == Flow::Abort {
                return Ok(Flow::Abort);
            }
        }

        if preserve {
            self.fs.set_times(destination, &info.times(), self.tx())?;
        }
        Ok(Flow::Continue)
    }

    fn copy_file(
        &mut self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        info: &EntryInfo,
    ) -> Result<Flow> {
        debug!("Copying {} -> {}", source, destination);
        self.begin_file(source, info);

        let tx = self.options.transaction.as_ref();
        let overwrite = self.options.overwrite;
        let progress = &mut self.progress;
        let callback = &mut *self.callback;
        let mut on_chunk = |p: &FileProgress| {
            progress.current_file_bytes = p.transferred_bytes;
            progress.current_file_total = p.total_bytes;
            callback(progress)
        };
        let outcome = self
            .fs
            .copy_file(source, destination, overwrite, &mut on_chunk, tx)?;

        let bytes = match outcome {
            FileOutcome::Completed { bytes } => bytes,
            FileOutcome::Aborted { bytes } => {
                debug!("Copy of {} aborted after {} bytes", source, bytes);
                return Ok(Flow::Abort);
            }
        };
        self.mutated = true;

        if self.options.preserve_metadata && !info.is_reparse_point() {
            self.fs.set_times(destination, &info.times(), self.tx())?;
        }
        self.record_file(info, bytes);
        Ok(self.report())
    }

    /// Last step of a cross-volume tree move.
    fn remove_source(&mut self, source: &NormalizedPath, flow: Flow) -> Result<Flow> {
        if flow == Flow::Abort {
            return Ok(flow);
        }

        info!("All entries copied, removing source {}", source);
        match delete_directory(self.fs, source, &self.delete_options())? {
            OperationOutcome::PartialFailure { first_error, .. } => Err(first_error),
            _ => Ok(Flow::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;
    use crate::path::normalize;
    use crate::platform::memory::MemoryFileSystem;

    fn np(raw: &str) -> NormalizedPath {
        normalize(raw, false).expect("normalize")
    }

    fn keep_going(_: &TransferProgress) -> ProgressAction {
        ProgressAction::Continue
    }

    fn two_level() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\root\a.txt", "alpha").expect("write");
        fs.write_file(r"C:\root\sub\b.txt", "beta!").expect("write");
        fs
    }

    #[test]
    fn test_copy_two_level_tree() {
        let fs = two_level();
        let outcome = copy_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\copy"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("copy");

        assert!(outcome.is_success());
        assert_eq!(outcome.stats().files, 2);
        assert_eq!(outcome.stats().directories, 2);
        assert_eq!(outcome.stats().bytes, 10);
        assert_eq!(fs.read_file(r"C:\copy\a.txt").as_deref(), Some(&b"alpha"[..]));
        assert_eq!(fs.read_file(r"C:\copy\sub\b.txt").as_deref(), Some(&b"beta!"[..]));
        assert!(fs.exists(r"C:\root\a.txt"));
    }

    #[test]
    fn test_copy_preserves_modified_times_when_asked() {
        let fs = two_level();
        let stat = |p: &str| {
            fs.stat(&np(p), None)
                .expect("stat")
                .expect("exists")
                .modified
        };

        copy_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\plain"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("copy");
        assert_ne!(stat(r"C:\plain\a.txt"), stat(r"C:\root\a.txt"));

        let options = TransferOptions {
            preserve_metadata: true,
            ..TransferOptions::default()
        };
        copy_tree(&fs, &np(r"C:\root"), &np(r"C:\kept"), &options, keep_going).expect("copy");
        assert_eq!(stat(r"C:\kept\a.txt"), stat(r"C:\root\a.txt"));
        assert_eq!(stat(r"C:\kept\sub\b.txt"), stat(r"C:\root\sub\b.txt"));
        assert_eq!(stat(r"C:\kept\sub"), stat(r"C:\root\sub"));
    }

    #[test]
    fn test_copy_refuses_existing_destination() {
        let fs = two_level();
        fs.create_dir_all(r"C:\copy").expect("mkdir");

        let err = copy_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\copy"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect_err("exists");
        assert!(matches!(err, FsError::AlreadyExists { .. }));
    }

    #[test]
    fn test_overwrite_replaces_destination_tree() {
        let fs = two_level();
        fs.write_file(r"C:\copy\stale.txt", "old").expect("write");

        let options = TransferOptions {
            overwrite: true,
            ..TransferOptions::default()
        };
        let outcome =
            copy_tree(&fs, &np(r"C:\root"), &np(r"C:\copy"), &options, keep_going).expect("copy");
        assert!(outcome.is_success());
        assert!(!fs.exists(r"C:\copy\stale.txt"));
        assert!(fs.exists(r"C:\copy\sub\b.txt"));
    }

    #[test]
    fn test_overwrite_never_replaces_an_ancestor_of_the_source() {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\a\b\keep.txt", "keep").expect("write");
        let options = TransferOptions {
            overwrite: true,
            ..TransferOptions::default()
        };

        let copied = copy_tree(&fs, &np(r"C:\a\b"), &np(r"C:\a"), &options, keep_going);
        assert!(matches!(copied, Err(FsError::InvalidPath { .. })));

        let moved = move_tree(&fs, &np(r"C:\a\b"), &np(r"C:\A"), &options, keep_going);
        assert!(matches!(moved, Err(FsError::InvalidPath { .. })));

        assert_eq!(fs.read_file(r"C:\a\b\keep.txt").as_deref(), Some(&b"keep"[..]));
    }

    #[test]
    fn test_same_volume_move_is_single_rename() {
        let fs = two_level();
        fs.clear_calls();

        let outcome = move_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\moved"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("move");

        assert!(outcome.is_success());
        assert!(!fs.exists(r"C:\root"));
        assert!(fs.exists(r"C:\moved\sub\b.txt"));

        let calls = fs.calls();
        assert_eq!(
            calls.iter().filter(|c| c.operation == "move_file").count(),
            1
        );
        assert!(!calls.iter().any(|c| c.operation == "copy_file"));
    }

    #[test]
    fn test_cross_volume_move_copies_then_deletes_source() {
        let fs = two_level();
        fs.add_volume(r"D:\").expect("volume");

        let outcome = move_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"D:\root"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("move");

        assert!(outcome.is_success());
        assert!(!fs.exists(r"C:\root"));
        assert_eq!(fs.read_file(r"D:\root\a.txt").as_deref(), Some(&b"alpha"[..]));
        assert_eq!(fs.read_file(r"D:\root\sub\b.txt").as_deref(), Some(&b"beta!"[..]));
    }

    #[test]
    fn test_cross_volume_move_denied_by_policy() {
        let fs = two_level();
        fs.add_volume(r"D:\").expect("volume");
        let options = TransferOptions {
            cross_volume: CrossVolumePolicy::Deny,
            ..TransferOptions::default()
        };

        let err = move_tree(&fs, &np(r"C:\root"), &np(r"D:\root"), &options, keep_going)
            .expect_err("denied");
        assert!(matches!(err, FsError::CrossVolumeNotSupported { .. }));
        assert!(!fs.exists(r"D:\root"));
    }

    #[test]
    fn test_abort_after_first_child_keeps_source_intact() {
        let fs = two_level();
        fs.add_volume(r"D:\").expect("volume");

        let mut completed = 0;
        let outcome = move_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"D:\root"),
            &TransferOptions::default(),
            |p: &TransferProgress| {
                if p.files_transferred > completed {
                    completed = p.files_transferred;
                    return ProgressAction::Cancel;
                }
                ProgressAction::Continue
            },
        )
        .expect("outcome");

        assert!(outcome.is_aborted());
        assert_eq!(outcome.stats().files, 1);
        assert!(fs.exists(r"C:\root\a.txt"));
        assert!(fs.exists(r"C:\root\sub\b.txt"));

        let copied = [r"D:\root\a.txt", r"D:\root\sub\b.txt"]
            .iter()
            .filter(|p| fs.exists(p))
            .count();
        assert!(copied <= 1);
    }

    #[test]
    fn test_abort_mid_file_leaves_no_partial_copy() {
        let fs = MemoryFileSystem::new().with_chunk_size(2);
        fs.write_file(r"C:\big.bin", vec![1u8; 8]).expect("write");

        let outcome = copy_tree(
            &fs,
            &np(r"C:\big.bin"),
            &np(r"C:\big.copy"),
            &TransferOptions::default(),
            |p: &TransferProgress| {
                if p.current_file_bytes >= 4 {
                    ProgressAction::Cancel
                } else {
                    ProgressAction::Continue
                }
            },
        )
        .expect("outcome");

        assert!(outcome.is_aborted());
        assert!(!fs.exists(r"C:\big.copy"));
    }

    #[test]
    fn test_single_file_copy_uses_one_primitive() {
        let fs = two_level();
        fs.clear_calls();

        copy_tree(
            &fs,
            &np(r"C:\root\a.txt"),
            &np(r"C:\a.bak"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("copy");

        let copies = fs
            .calls()
            .iter()
            .filter(|c| c.operation == "copy_file")
            .count();
        assert_eq!(copies, 1);
        assert_eq!(fs.read_file(r"C:\a.bak").as_deref(), Some(&b"alpha"[..]));
    }

    #[test]
    fn test_links_copied_as_links() {
        let fs = two_level();
        fs.write_file(r"C:\elsewhere\big.txt", "not copied").expect("write");
        fs.add_symlink(r"C:\root\link", r"C:\elsewhere", true).expect("link");

        let outcome = copy_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\copy"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("copy");

        assert_eq!(outcome.stats().reparse_points, 1);
        let info = fs
            .stat(&np(r"C:\copy\link"), None)
            .expect("stat")
            .expect("exists");
        assert!(info.is_reparse_point());
        assert!(!fs.exists(r"C:\copy\link\big.txt"));
    }

    #[test]
    fn test_failure_after_mutation_is_partial() {
        let fs = two_level();
        fs.deny_listing(r"C:\root\sub").expect("deny");

        let outcome = copy_tree(
            &fs,
            &np(r"C:\root"),
            &np(r"C:\copy"),
            &TransferOptions::default(),
            keep_going,
        )
        .expect("outcome");

        match outcome {
            OperationOutcome::PartialFailure { first_error, .. } => {
                assert!(matches!(first_error, FsError::AccessDenied { .. }));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_transaction_reaches_every_primitive() {
        let fs = two_level();
        fs.add_volume(r"D:\").expect("volume");
        fs.clear_calls();

        let tx = TransactionHandle::new(String::from("move"));
        let options = TransferOptions {
            preserve_metadata: true,
            transaction: Some(tx.clone()),
            ..TransferOptions::default()
        };
        move_tree(&fs, &np(r"C:\root"), &np(r"D:\root"), &options, keep_going).expect("move");

        let calls = fs.calls();
        assert!(calls.iter().any(|c| c.operation == "copy_file"));
        assert!(
            calls
                .iter()
                .all(|c| c.transaction.as_ref().is_some_and(|t| t.ptr_eq(&tx)))
        );
    }
}
