//! Host file system provider built on `std::fs`.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::{debug, warn};

use crate::error::{FsError, Result};
use crate::path::NormalizedPath;
use crate::path::chars::DIRECTORY_SEPARATOR;
use crate::platform::traits::{FileSystem, Listing};
use crate::platform::types::{
    EntryInfo, FileAttributes, FileOutcome, FileProgress, FileTimes, ProgressAction,
    ProgressCallback, RawEntry, ReparseTag, SecuritySnapshot, TransactionHandle,
};

/// Buffer size for streaming copy (1MB)
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

#[cfg(windows)]
const ERROR_NOT_SAME_DEVICE: i32 = 17;

/// Provider backed by the host file system.
///
/// Transactions are accepted and ignored.
pub struct LocalFileSystem {
    buffer_size: usize,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self {
            buffer_size: COPY_BUFFER_SIZE,
        }
    }

    /// Chunk size of streamed copies; progress is reported once per chunk.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn to_utc(time: io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    time.ok().map(DateTime::<Utc>::from)
}

fn unsupported(path: &NormalizedPath, what: &str) -> FsError {
    FsError::Unexpected {
        path: path.to_host_path(),
        source: io::Error::new(io::ErrorKind::Unsupported, what.to_string()),
    }
}

#[cfg(unix)]
fn device_of(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    fs::symlink_metadata(path).ok().map(|m| m.dev())
}

#[cfg(not(unix))]
fn device_of(_path: &Path) -> Option<u64> {
    None
}

#[cfg(unix)]
fn entry_info(path: &Path, meta: &fs::Metadata, parent_dev: Option<u64>) -> EntryInfo {
    use std::os::unix::fs::MetadataExt;

    let file_type = meta.file_type();
    let mut attributes = FileAttributes::empty();
    let mut reparse_tag = None;

    if file_type.is_symlink() {
        attributes |= FileAttributes::REPARSE_POINT;
        reparse_tag = Some(ReparseTag::Symlink);
        if fs::metadata(path).is_ok_and(|m| m.is_dir()) {
            attributes |= FileAttributes::DIRECTORY;
        }
    } else if file_type.is_dir() {
        attributes |= FileAttributes::DIRECTORY;
        // A directory on another device than its parent is a mount point.
        if parent_dev.is_some_and(|dev| dev != meta.dev()) {
            attributes |= FileAttributes::REPARSE_POINT;
            reparse_tag = Some(ReparseTag::MountPoint);
        }
    } else if !file_type.is_file() {
        attributes |= FileAttributes::DEVICE;
    }

    if meta.permissions().readonly() {
        attributes |= FileAttributes::READ_ONLY;
    }
    if path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
    {
        attributes |= FileAttributes::HIDDEN;
    }
    if attributes.is_empty() {
        attributes = FileAttributes::NORMAL;
    }

    let is_dir = attributes.contains(FileAttributes::DIRECTORY);
    EntryInfo {
        attributes,
        size: if is_dir { 0 } else { meta.len() },
        allocated_size: if is_dir { 0 } else { meta.blocks() * 512 },
        created: to_utc(meta.created()),
        accessed: to_utc(meta.accessed()),
        modified: to_utc(meta.modified()),
        reparse_tag,
    }
}

#[cfg(windows)]
fn entry_info(path: &Path, meta: &fs::Metadata, _parent_dev: Option<u64>) -> EntryInfo {
    use std::os::windows::fs::MetadataExt;

    let attributes = FileAttributes::from_bits_truncate(meta.file_attributes());
    let reparse_tag = if attributes.contains(FileAttributes::REPARSE_POINT) {
        match fs::read_link(path) {
            Ok(target) if target.to_string_lossy().contains("Volume{") => {
                Some(ReparseTag::MountPoint)
            }
            Ok(_) => Some(ReparseTag::Symlink),
            Err(_) => Some(ReparseTag::Other(0)),
        }
    } else {
        None
    };

    let is_dir = attributes.contains(FileAttributes::DIRECTORY);
    EntryInfo {
        attributes,
        size: if is_dir { 0 } else { meta.file_size() },
        allocated_size: if is_dir { 0 } else { meta.file_size() },
        created: to_utc(meta.created()),
        accessed: to_utc(meta.accessed()),
        modified: to_utc(meta.modified()),
        reparse_tag,
    }
}

#[cfg(not(any(unix, windows)))]
fn entry_info(_path: &Path, meta: &fs::Metadata, _parent_dev: Option<u64>) -> EntryInfo {
    let mut attributes = if meta.is_dir() {
        FileAttributes::DIRECTORY
    } else {
        FileAttributes::NORMAL
    };
    if meta.file_type().is_symlink() {
        attributes |= FileAttributes::REPARSE_POINT;
    }
    if meta.permissions().readonly() {
        attributes |= FileAttributes::READ_ONLY;
    }
    EntryInfo {
        attributes,
        size: meta.len(),
        allocated_size: meta.len(),
        created: to_utc(meta.created()),
        accessed: to_utc(meta.accessed()),
        modified: to_utc(meta.modified()),
        reparse_tag: meta.file_type().is_symlink().then_some(ReparseTag::Symlink),
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    #[cfg(windows)]
    if e.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE) {
        return true;
    }
    e.kind() == io::ErrorKind::CrossesDevices
}

fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    let target = fs::read_link(source)?;

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&target, destination)
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::{symlink_dir, symlink_file};
        if source.is_dir() {
            symlink_dir(&target, destination)
        } else {
            symlink_file(&target, destination)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, destination);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "Symbolic links are unsupported on this platform",
        ))
    }
}

#[cfg(unix)]
fn set_read_only(path: &Path, read_only: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::symlink_metadata(path)?.permissions();
    let mode = permissions.mode();
    permissions.set_mode(if read_only { mode & !0o222 } else { mode | 0o200 });
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_read_only(path: &Path, read_only: bool) -> io::Result<()> {
    let mut permissions = fs::symlink_metadata(path)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(read_only);
    fs::set_permissions(path, permissions)
}

impl FileSystem for LocalFileSystem {
    fn list_children(
        &self,
        dir: &NormalizedPath,
        _tx: Option<&TransactionHandle>,
    ) -> Result<Listing<'_>> {
        let host_dir = dir.to_host_path();
        debug!("Listing directory: {}", host_dir.display());

        let read_dir = fs::read_dir(&host_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                FsError::path_not_found(&host_dir)
            }
            _ => FsError::from_io(&host_dir, e),
        })?;
        let parent_dev = device_of(&host_dir);

        Ok(Box::new(read_dir.map(move |item| {
            let entry = item.map_err(|e| FsError::from_io(&host_dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            // A backslash is a separator in canonical paths, so this name cannot be addressed.
            if !cfg!(windows) && name.contains(DIRECTORY_SEPARATOR) {
                return Err(FsError::invalid_path(
                    path.to_string_lossy(),
                    "file name contains a backslash",
                ));
            }
            let meta = fs::symlink_metadata(&path).map_err(|e| FsError::from_io(&path, e))?;
            Ok(RawEntry {
                name,
                info: entry_info(&path, &meta, parent_dev),
            })
        })))
    }

    fn stat(
        &self,
        path: &NormalizedPath,
        _tx: Option<&TransactionHandle>,
    ) -> Result<Option<EntryInfo>> {
        let host = path.to_host_path();
        match fs::symlink_metadata(&host) {
            Ok(meta) => {
                let parent_dev = host.parent().and_then(device_of);
                Ok(Some(entry_info(&host, &meta, parent_dev)))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(FsError::from_io(&host, e)),
        }
    }

    fn create_directory(
        &self,
        path: &NormalizedPath,
        template: Option<&NormalizedPath>,
        security: Option<&SecuritySnapshot>,
        _tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let host = path.to_host_path();
        debug!("Creating directory: {}", host.display());

        match fs::create_dir(&host) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return if fs::symlink_metadata(&host).is_ok_and(|m| m.is_dir()) {
                    Ok(())
                } else {
                    Err(FsError::already_exists(&host))
                };
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FsError::path_not_found(&host));
            }
            Err(e) => return Err(FsError::from_io(&host, e)),
        }

        #[cfg(windows)]
        if let Some(template) = template {
            use std::os::windows::fs::MetadataExt;
            let attributes = fs::metadata(template.to_host_path())
                .map_err(|e| FsError::from_io(template.to_host_path(), e))?
                .file_attributes()
                & !(FileAttributes::DIRECTORY | FileAttributes::REPARSE_POINT).bits();
            super::windows::set_file_attributes(&host, attributes)
                .map_err(|e| FsError::from_io(&host, e))?;
        }
        #[cfg(not(windows))]
        let _ = template;

        if let Some(snapshot) = security {
            self.apply_security(path, snapshot)?;
        }
        Ok(())
    }

    fn delete_file(&self, path: &NormalizedPath, _tx: Option<&TransactionHandle>) -> Result<()> {
        debug!("Deleting file: {}", path);
        let host = path.to_host_path();
        fs::remove_file(&host).map_err(|e| FsError::from_io(&host, e))
    }

    fn delete_directory(
        &self,
        path: &NormalizedPath,
        _tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        debug!("Deleting directory: {}", path);
        let host = path.to_host_path();
        let meta = fs::symlink_metadata(&host).map_err(|e| FsError::from_io(&host, e))?;

        let removed = if meta.file_type().is_symlink() && !cfg!(windows) {
            fs::remove_file(&host)
        } else {
            fs::remove_dir(&host)
        };
        removed.map_err(|e| FsError::from_io(&host, e))
    }

    fn copy_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        overwrite: bool,
        progress: &mut ProgressCallback<'_>,
        _tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome> {
        let src = source.to_host_path();
        let dst = destination.to_host_path();
        debug!("Copying file: {:?} -> {:?}", src, dst);

        let src_meta = fs::symlink_metadata(&src).map_err(|e| FsError::from_io(&src, e))?;
        let dst_exists = fs::symlink_metadata(&dst).is_ok();
        if dst_exists && !overwrite {
            return Err(FsError::already_exists(&dst));
        }

        if src_meta.file_type().is_symlink() {
            if dst_exists {
                fs::remove_file(&dst).map_err(|e| FsError::from_io(&dst, e))?;
            }
            copy_symlink(&src, &dst).map_err(|e| FsError::from_io(&dst, e))?;
            return Ok(FileOutcome::Completed { bytes: 0 });
        }

        let mut reader = File::open(&src).map_err(|e| FsError::from_io(&src, e))?;
        let mut writer = match File::create(&dst) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied && dst_exists => {
                warn!(
                    "Destination {} is not writable, clearing read-only and retrying",
                    dst.display()
                );
                set_read_only(&dst, false).map_err(|e| FsError::from_io(&dst, e))?;
                File::create(&dst).map_err(|e| FsError::from_io(&dst, e))?
            }
            Err(e) => return Err(FsError::from_io(&dst, e)),
        };

        let total_bytes = src_meta.len();
        let mut buffer = vec![0u8; self.buffer_size];
        let mut transferred = 0u64;

        loop {
            let bytes_read = reader
                .read(&mut buffer)
                .map_err(|e| FsError::from_io(&src, e))?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| FsError::from_io(&dst, e))?;
            transferred += bytes_read as u64;

            let action = progress(&FileProgress {
                total_bytes,
                transferred_bytes: transferred,
            });
            if action == ProgressAction::Cancel {
                drop(writer);
                if let Err(e) = fs::remove_file(&dst) {
                    warn!("Failed to remove partial copy {}: {}", dst.display(), e);
                }
                return Ok(FileOutcome::Aborted { bytes: transferred });
            }
        }

        writer
            .sync_all()
            .map_err(|e| FsError::from_io(&dst, e))?;
        drop(writer);

        fs::set_permissions(&dst, src_meta.permissions())
            .map_err(|e| FsError::from_io(&dst, e))?;

        Ok(FileOutcome::Completed { bytes: transferred })
    }

    fn move_file(
        &self,
        source: &NormalizedPath,
        destination: &NormalizedPath,
        allow_copy_fallback: bool,
        progress: &mut ProgressCallback<'_>,
        tx: Option<&TransactionHandle>,
    ) -> Result<FileOutcome> {
        let src = source.to_host_path();
        let dst = destination.to_host_path();
        debug!("Moving: {:?} -> {:?}", src, dst);

        let src_meta = fs::symlink_metadata(&src).map_err(|e| FsError::from_io(&src, e))?;
        if fs::symlink_metadata(&dst).is_ok() {
            return Err(FsError::already_exists(&dst));
        }

        match fs::rename(&src, &dst) {
            Ok(()) => {
                let bytes = if src_meta.is_dir() { 0 } else { src_meta.len() };
                // Rename is atomic; a late cancel has nothing left to stop.
                let _ = progress(&FileProgress {
                    total_bytes: bytes,
                    transferred_bytes: bytes,
                });
                Ok(FileOutcome::Completed { bytes })
            }
            Err(e) if is_cross_device(&e) => {
                if !allow_copy_fallback {
                    return Err(FsError::CrossVolumeNotSupported {
                        source_path: src,
                        destination: dst,
                    });
                }
                if src_meta.is_dir() {
                    return Err(unsupported(
                        source,
                        "directory moves across volumes require a tree copy",
                    ));
                }

                match self.copy_file(source, destination, false, progress, tx)? {
                    FileOutcome::Completed { bytes } => {
                        self.delete_file(source, tx)?;
                        Ok(FileOutcome::Completed { bytes })
                    }
                    aborted => Ok(aborted),
                }
            }
            Err(e) => Err(FsError::from_io(&src, e)),
        }
    }

    fn set_attributes(
        &self,
        path: &NormalizedPath,
        attributes: FileAttributes,
        _tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        debug!("Setting attributes {:?} on {}", attributes, path);

        #[cfg(windows)]
        {
            let host = path.to_host_path();
            super::windows::set_file_attributes(&host, attributes.bits())
                .map_err(|e| FsError::from_io(&host, e))
        }
        #[cfg(not(windows))]
        {
            let host = path.to_host_path();
            set_read_only(&host, attributes.contains(FileAttributes::READ_ONLY))
                .map_err(|e| FsError::from_io(&host, e))
        }
    }

    fn set_times(
        &self,
        path: &NormalizedPath,
        times: &FileTimes,
        _tx: Option<&TransactionHandle>,
    ) -> Result<()> {
        let host = path.to_host_path();
        let meta = fs::symlink_metadata(&host).map_err(|e| FsError::from_io(&host, e))?;

        let to_file_time = |t: DateTime<Utc>| {
            FileTime::from_unix_time(t.timestamp(), t.timestamp_subsec_nanos())
        };
        let accessed = times
            .accessed
            .map(to_file_time)
            .unwrap_or_else(|| FileTime::from_last_access_time(&meta));
        let modified = times
            .modified
            .map(to_file_time)
            .unwrap_or_else(|| FileTime::from_last_modification_time(&meta));

        if times.created.is_some() {
            debug!("Creation time is not settable on the host, skipped for {}", path);
        }

        let result = if meta.file_type().is_symlink() {
            filetime::set_symlink_file_times(&host, accessed, modified)
        } else {
            filetime::set_file_times(&host, accessed, modified)
        };
        result.map_err(|e| FsError::from_io(&host, e))
    }

    fn unmount_reparse_point(&self, path: &NormalizedPath) -> Result<()> {
        #[cfg(windows)]
        {
            let host = path.to_host_path();
            super::windows::delete_volume_mount_point(&host)
                .map_err(|e| FsError::from_io(&host, e))
        }
        #[cfg(not(windows))]
        {
            Err(unsupported(path, "unmounting is not supported on this platform"))
        }
    }

    fn capture_security(&self, path: &NormalizedPath) -> Result<SecuritySnapshot> {
        let host = path.to_host_path();
        let meta = fs::metadata(&host).map_err(|e| FsError::from_io(&host, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            Ok(SecuritySnapshot::new(
                meta.permissions().mode().to_le_bytes().to_vec(),
            ))
        }
        #[cfg(not(unix))]
        {
            Ok(SecuritySnapshot::new(vec![u8::from(
                meta.permissions().readonly(),
            )]))
        }
    }

    fn apply_security(&self, path: &NormalizedPath, snapshot: &SecuritySnapshot) -> Result<()> {
        let host = path.to_host_path();
        let invalid = || FsError::Unexpected {
            path: host.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, "malformed security snapshot"),
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let bytes: [u8; 4] = snapshot.as_bytes().try_into().map_err(|_| invalid())?;
            let mut mode = u32::from_le_bytes(bytes);
            if fs::symlink_metadata(&host).is_ok_and(|m| m.is_dir()) {
                // Owner keeps write access so children can still be created.
                mode |= 0o200;
            }
            fs::set_permissions(&host, fs::Permissions::from_mode(mode))
                .map_err(|e| FsError::from_io(&host, e))
        }
        #[cfg(not(unix))]
        {
            let [read_only] = snapshot.as_bytes() else {
                return Err(invalid());
            };
            set_read_only(&host, *read_only != 0).map_err(|e| FsError::from_io(&host, e))
        }
    }

    fn same_volume(&self, a: &NormalizedPath, b: &NormalizedPath) -> bool {
        let nearest_device = |p: &NormalizedPath| {
            let host = p.to_host_path();
            host.ancestors().find_map(device_of)
        };
        match (nearest_device(a), nearest_device(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a.same_root(b),
        }
    }

    fn is_case_sensitive(&self) -> bool {
        cfg!(not(any(windows, target_os = "macos")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::normalize;

    fn np(path: &Path) -> NormalizedPath {
        normalize(&path.to_string_lossy(), false).expect("normalize")
    }

    fn continue_always(_: &FileProgress) -> ProgressAction {
        ProgressAction::Continue
    }

    #[test]
    fn test_list_children_reports_files_and_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a.txt"), b"abc").expect("write");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");

        let lfs = LocalFileSystem::new();
        let mut entries: Vec<RawEntry> = lfs
            .list_children(&np(temp.path()), None)
            .expect("list")
            .collect::<Result<_>>()
            .expect("entries");
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].info.size, 3);
        assert!(!entries[0].info.is_directory());
        assert_eq!(entries[1].name, "sub");
        assert!(entries[1].info.is_directory());
    }

    #[test]
    fn test_list_missing_directory_is_path_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = np(&temp.path().join("missing"));
        let err = LocalFileSystem::new()
            .list_children(&missing, None)
            .err()
            .expect("must fail");
        assert!(matches!(err, FsError::PathNotFound { .. }));
    }

    #[test]
    fn test_stat_missing_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let info = LocalFileSystem::new()
            .stat(&np(&temp.path().join("nope")), None)
            .expect("stat");
        assert!(info.is_none());
    }

    #[test]
    fn test_copy_file_streams_in_chunks() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src.bin");
        let dst = temp.path().join("dst.bin");
        fs::write(&src, vec![7u8; 10]).expect("write");

        let lfs = LocalFileSystem::new().with_buffer_size(4);
        let mut calls = Vec::new();
        let mut progress = |p: &FileProgress| {
            calls.push(p.transferred_bytes);
            ProgressAction::Continue
        };
        let outcome = lfs
            .copy_file(&np(&src), &np(&dst), false, &mut progress, None)
            .expect("copy");

        assert_eq!(outcome, FileOutcome::Completed { bytes: 10 });
        assert_eq!(calls, [4, 8, 10]);
        assert_eq!(fs::read(&dst).expect("read"), vec![7u8; 10]);
    }

    #[test]
    fn test_copy_file_cancel_removes_partial_destination() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("src.bin");
        let dst = temp.path().join("dst.bin");
        fs::write(&src, vec![1u8; 16]).expect("write");

        let lfs = LocalFileSystem::new().with_buffer_size(4);
        let mut cancel = |_: &FileProgress| ProgressAction::Cancel;
        let outcome = lfs
            .copy_file(&np(&src), &np(&dst), false, &mut cancel, None)
            .expect("copy");

        assert_eq!(outcome, FileOutcome::Aborted { bytes: 4 });
        assert!(!dst.exists());
    }

    #[test]
    fn test_copy_file_refuses_existing_without_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("a");
        let dst = temp.path().join("b");
        fs::write(&src, b"new").expect("write");
        fs::write(&dst, b"old").expect("write");

        let lfs = LocalFileSystem::new();
        let err = lfs
            .copy_file(&np(&src), &np(&dst), false, &mut continue_always, None)
            .expect_err("exists");
        assert!(matches!(err, FsError::AlreadyExists { .. }));

        lfs.copy_file(&np(&src), &np(&dst), true, &mut continue_always, None)
            .expect("overwrite");
        assert_eq!(fs::read(&dst).expect("read"), b"new");
    }

    #[test]
    fn test_create_directory_is_idempotent_for_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = np(&temp.path().join("d"));
        let lfs = LocalFileSystem::new();
        lfs.create_directory(&dir, None, None, None).expect("create");
        lfs.create_directory(&dir, None, None, None).expect("create again");

        let file = temp.path().join("f");
        fs::write(&file, b"x").expect("write");
        let err = lfs
            .create_directory(&np(&file), None, None, None)
            .expect_err("file in the way");
        assert!(matches!(err, FsError::AlreadyExists { .. }));
    }

    #[test]
    fn test_move_file_refuses_existing_destination() {
        let temp = tempfile::tempdir().expect("tempdir");
        let src = temp.path().join("a");
        let dst = temp.path().join("b");
        fs::write(&src, b"1").expect("write");
        fs::write(&dst, b"2").expect("write");

        let err = LocalFileSystem::new()
            .move_file(&np(&src), &np(&dst), true, &mut continue_always, None)
            .expect_err("exists");
        assert!(matches!(err, FsError::AlreadyExists { .. }));
    }

    #[test]
    fn test_set_times_applies_modified() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("t");
        fs::write(&file, b"x").expect("write");

        let when = DateTime::<Utc>::from_timestamp(1_700_000_020, 0).expect("timestamp");
        LocalFileSystem::new()
            .set_times(
                &np(&file),
                &FileTimes {
                    modified: Some(when),
                    ..FileTimes::default()
                },
                None,
            )
            .expect("set times");

        let meta = fs::metadata(&file).expect("meta");
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            FileTime::from_unix_time(1_700_000_020, 0)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_reported_as_reparse_point() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("target")).expect("mkdir");
        std::os::unix::fs::symlink(temp.path().join("target"), temp.path().join("link"))
            .expect("symlink");

        let info = LocalFileSystem::new()
            .stat(&np(&temp.path().join("link")), None)
            .expect("stat")
            .expect("exists");
        assert!(info.is_reparse_point());
        assert!(info.is_directory());
        assert_eq!(info.reparse_tag, Some(ReparseTag::Symlink));
    }

    #[test]
    fn test_same_volume_within_temp_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lfs = LocalFileSystem::new();
        assert!(lfs.same_volume(&np(&temp.path().join("a")), &np(&temp.path().join("b"))));
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_in_host_name_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("a\\b"), b"x").expect("write");

        let results: Vec<Result<RawEntry>> = LocalFileSystem::new()
            .list_children(&np(temp.path()), None)
            .expect("list")
            .collect();

        assert_eq!(results.len(), 1);
        let err = results.into_iter().next().expect("one item").expect_err("rejected");
        assert!(matches!(err, FsError::InvalidPath { .. }));
        assert!(err.to_string().contains("a\\b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_errors_name_the_host_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let missing = temp.path().join("missing.txt");

        let err = LocalFileSystem::new()
            .delete_file(&np(&missing), None)
            .expect_err("missing");
        assert!(err.is_not_found());
        assert_eq!(err.path(), missing.as_path());
        assert!(!err.to_string().contains('\\'));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_case_sensitivity_follows_host() {
        assert!(LocalFileSystem::new().is_case_sensitive());
    }
}
