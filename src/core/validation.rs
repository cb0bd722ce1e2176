use tracing::debug;

use crate::core::copy_engine::{CrossVolumePolicy, TransferOptions};
use crate::error::{FsError, Result};
use crate::path::NormalizedPath;
use crate::platform::traits::FileSystem;
use crate::platform::types::EntryInfo;

/// Paths longer than this get a warning unless already in extended form.
const LONG_PATH_WARNING: usize = 200;

#[derive(Debug)]
pub struct ValidationResult {
    pub source: EntryInfo,
    /// What currently sits at the destination, if anything.
    pub destination: Option<EntryInfo>,
    pub same_volume: bool,
    pub warnings: Vec<String>,
}

/// Check a copy or move before anything is touched.
pub fn validate_transfer<F: FileSystem + ?Sized>(
    fs: &F,
    source: &NormalizedPath,
    destination: &NormalizedPath,
    is_move: bool,
    options: &TransferOptions,
) -> Result<ValidationResult> {
    let tx = options.transaction.as_ref();
    let mut warnings = Vec::new();

    debug!("Validating transfer: {} -> {}", source, destination);

    // 1. Source exists
    let source_info = fs
        .stat(source, tx)?
        .ok_or_else(|| FsError::path_not_found(source))?;

    // 2. Source and destination differ
    let case_sensitive = fs.is_case_sensitive();
    let dest_in_source = destination.starts_with_case(source, case_sensitive);
    let source_in_dest = source.starts_with_case(destination, case_sensitive);
    if dest_in_source && source_in_dest {
        return Err(FsError::invalid_path(
            destination.as_str(),
            "source and destination are the same",
        ));
    }

    // 3. No copying a tree into itself
    if source_info.is_directory() && !source_info.is_reparse_point() && dest_in_source {
        return Err(FsError::invalid_path(
            destination.as_str(),
            "destination is inside the source tree",
        ));
    }

    // 4. Replacing the destination must not remove the source with it
    if source_in_dest {
        return Err(FsError::invalid_path(
            destination.as_str(),
            "destination contains the source",
        ));
    }

    // 5. Destination parent must be a directory
    if let Some(parent) = destination.parent() {
        match fs.stat(&parent, tx)? {
            Some(info) if info.is_directory() => {}
            _ => return Err(FsError::path_not_found(&parent)),
        }
    }

    // 6. Existing destination
    let destination_info = fs.stat(destination, tx)?;
    if destination_info.is_some() && !options.overwrite {
        return Err(FsError::already_exists(destination));
    }

    // 7. Volume boundary
    let same_volume = fs.same_volume(source, destination);
    if is_move && !same_volume && options.cross_volume == CrossVolumePolicy::Deny {
        return Err(FsError::CrossVolumeNotSupported {
            source_path: source.to_host_path(),
            destination: destination.to_host_path(),
        });
    }

    // 8. Path length
    if !destination.root_kind().is_long_path() && destination.as_str().len() > LONG_PATH_WARNING {
        warnings.push(format!(
            "Destination path is {} characters long; deeper entries may exceed MAX_PATH",
            destination.as_str().len()
        ));
    }

    Ok(ValidationResult {
        source: source_info,
        destination: destination_info,
        same_volume,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::normalize;
    use crate::platform::memory::MemoryFileSystem;

    fn np(raw: &str) -> NormalizedPath {
        normalize(raw, false).expect("normalize")
    }

    fn fixture() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\src\a.txt", "a").expect("write");
        fs.create_dir_all(r"C:\out").expect("mkdir");
        fs
    }

    #[test]
    fn test_valid_transfer() {
        let fs = fixture();
        let result = validate_transfer(
            &fs,
            &np(r"C:\src"),
            &np(r"C:\out\copy"),
            false,
            &TransferOptions::default(),
        )
        .expect("valid");
        assert!(result.source.is_directory());
        assert!(result.destination.is_none());
        assert!(result.same_volume);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_source() {
        let fs = fixture();
        let err = validate_transfer(
            &fs,
            &np(r"C:\nope"),
            &np(r"C:\out\x"),
            false,
            &TransferOptions::default(),
        )
        .expect_err("missing");
        assert!(matches!(err, FsError::PathNotFound { .. }));
    }

    #[test]
    fn test_same_path_and_nested_destination_rejected() {
        let fs = fixture();
        let opts = TransferOptions::default();
        assert!(matches!(
            validate_transfer(&fs, &np(r"C:\src"), &np(r"c:\SRC"), false, &opts),
            Err(FsError::InvalidPath { .. })
        ));
        assert!(matches!(
            validate_transfer(&fs, &np(r"C:\src"), &np(r"C:\src\inner"), true, &opts),
            Err(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_destination_containing_source_rejected() {
        let fs = fixture();
        fs.write_file(r"C:\src\inner\keep.txt", "k").expect("write");
        let opts = TransferOptions {
            overwrite: true,
            ..TransferOptions::default()
        };

        for is_move in [false, true] {
            let err = validate_transfer(&fs, &np(r"C:\src\inner"), &np(r"C:\src"), is_move, &opts)
                .expect_err("ancestor destination");
            assert!(matches!(err, FsError::InvalidPath { .. }));
        }

        let err = validate_transfer(&fs, &np(r"C:\src\a.txt"), &np(r"C:\SRC"), false, &opts)
            .expect_err("ancestor of a file");
        assert!(matches!(err, FsError::InvalidPath { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_case_sensitive_host_allows_differently_cased_destination() {
        use crate::platform::local::LocalFileSystem;

        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(temp.path().join("Data")).expect("mkdir");
        std::fs::create_dir(temp.path().join("data")).expect("mkdir");
        let root = temp.path().to_string_lossy().into_owned();

        let result = validate_transfer(
            &LocalFileSystem::new(),
            &np(&format!("{root}/Data")),
            &np(&format!("{root}/data/x")),
            false,
            &TransferOptions::default(),
        )
        .expect("distinct directories");
        assert!(result.destination.is_none());
    }

    #[test]
    fn test_existing_destination_needs_overwrite() {
        let fs = fixture();
        fs.create_dir_all(r"C:\out\copy").expect("mkdir");

        let err = validate_transfer(
            &fs,
            &np(r"C:\src"),
            &np(r"C:\out\copy"),
            false,
            &TransferOptions::default(),
        )
        .expect_err("exists");
        assert!(matches!(err, FsError::AlreadyExists { .. }));

        let opts = TransferOptions {
            overwrite: true,
            ..TransferOptions::default()
        };
        let result = validate_transfer(&fs, &np(r"C:\src"), &np(r"C:\out\copy"), false, &opts)
            .expect("overwrite allowed");
        assert!(result.destination.is_some());
    }

    #[test]
    fn test_missing_destination_parent() {
        let fs = fixture();
        let err = validate_transfer(
            &fs,
            &np(r"C:\src"),
            &np(r"C:\nowhere\copy"),
            false,
            &TransferOptions::default(),
        )
        .expect_err("no parent");
        assert!(matches!(err, FsError::PathNotFound { .. }));
    }

    #[test]
    fn test_cross_volume_move_denied_by_policy() {
        let fs = fixture();
        fs.add_volume(r"D:\").expect("volume");
        let deny = TransferOptions {
            cross_volume: CrossVolumePolicy::Deny,
            ..TransferOptions::default()
        };

        let err = validate_transfer(&fs, &np(r"C:\src"), &np(r"D:\src"), true, &deny)
            .expect_err("denied");
        assert!(matches!(err, FsError::CrossVolumeNotSupported { .. }));

        // Copies never need a rename.
        let result = validate_transfer(&fs, &np(r"C:\src"), &np(r"D:\src"), false, &deny)
            .expect("copy is fine");
        assert!(!result.same_volume);
    }
}
