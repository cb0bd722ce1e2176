//! Aggregate statistics over a directory.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::core::enumerator::{EnumerateOptions, enumerate};
use crate::error::{FsError, Result};
use crate::path::NormalizedPath;
use crate::platform::traits::FileSystem;
use crate::platform::types::{EntryInfo, TransactionHandle};

const REPARSE_POINT_NAME: &str = "REPARSE_POINT";

#[derive(Debug, Clone, Default)]
pub struct PropertiesOptions {
    pub recursive: bool,
    pub continue_on_access_error: bool,
    pub transaction: Option<TransactionHandle>,
}

/// Counters for the entries below a directory. The directory itself is not counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryProperties {
    /// Number of entries seen.
    pub total: u64,
    pub files: u64,
    pub directories: u64,
    /// Links and mount points. They count toward `total` only.
    pub reparse_points: u64,
    /// Sum of logical file sizes.
    pub size: u64,
    /// Sum of allocated file sizes.
    pub size_on_disk: u64,
    /// Directories that could not be listed and were skipped.
    pub inaccessible: u64,
    /// Attribute name to number of entries carrying it. Reparse points only add
    /// `REPARSE_POINT`, so directories and links never overlap.
    pub attributes: BTreeMap<String, u64>,
}

impl DirectoryProperties {
    fn record(&mut self, info: &EntryInfo) {
        self.total += 1;

        if info.is_reparse_point() {
            self.reparse_points += 1;
            *self
                .attributes
                .entry(REPARSE_POINT_NAME.to_string())
                .or_default() += 1;
            return;
        }

        for (name, _) in info.attributes.iter_names() {
            *self.attributes.entry(name.to_string()).or_default() += 1;
        }
        if info.is_directory() {
            self.directories += 1;
        } else {
            self.files += 1;
            self.size += info.size;
            self.size_on_disk += info.allocated_size;
        }
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict = BTreeMap::new();
        dict.insert("cnt_total".to_string(), self.total);
        dict.insert("cnt_files".to_string(), self.files);
        dict.insert("cnt_directories".to_string(), self.directories);
        dict.insert("cnt_reparse_points".to_string(), self.reparse_points);
        dict.insert("cnt_inaccessible".to_string(), self.inaccessible);
        dict.insert("size".to_string(), self.size);
        dict.insert("size_on_disk".to_string(), self.size_on_disk);
        for (name, count) in &self.attributes {
            dict.insert(format!("attr_{}", name.to_lowercase()), *count);
        }
        dict
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} total={} files={} directories={} reparse_points={} size={} size_on_disk={} inaccessible={}",
            self.total,
            self.files,
            self.directories,
            self.reparse_points,
            self.size,
            self.size_on_disk,
            self.inaccessible
        )
    }
}

impl fmt::Display for DirectoryProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[PROPS]"))
    }
}

/// Walk `path` once and count what is below it. Nothing is modified.
pub fn get_properties<F: FileSystem + ?Sized>(
    fs: &F,
    path: &NormalizedPath,
    options: &PropertiesOptions,
) -> Result<DirectoryProperties> {
    fs.stat(path, options.transaction.as_ref())?
        .filter(EntryInfo::is_directory)
        .ok_or_else(|| FsError::path_not_found(path))?;

    let mut walker = enumerate(
        fs,
        EnumerateOptions::new(path.clone())
            .recursive(options.recursive)
            .continue_on_access_error(options.continue_on_access_error)
            .transaction(options.transaction.clone()),
    )?;

    let mut properties = DirectoryProperties::default();
    for entry in walker.by_ref() {
        properties.record(&entry?.info);
    }
    properties.inaccessible = walker.skipped().len() as u64;

    info!("Properties of {}: {}", path, properties);
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::normalize;
    use crate::platform::memory::MemoryFileSystem;

    fn np(raw: &str) -> NormalizedPath {
        normalize(raw, false).expect("normalize")
    }

    fn sample() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.write_file(r"C:\p\ten.bin", vec![0u8; 10]).expect("write");
        fs.write_file(r"C:\p\twenty.bin", vec![0u8; 20]).expect("write");
        fs.write_file(r"C:\p\sub\thirty.bin", vec![0u8; 30]).expect("write");
        fs
    }

    #[test]
    fn test_recursive_counts() {
        let fs = sample();
        let options = PropertiesOptions {
            recursive: true,
            ..PropertiesOptions::default()
        };
        let props = get_properties(&fs, &np(r"C:\p"), &options).expect("props");

        assert_eq!(props.size, 60);
        assert_eq!(props.files, 3);
        assert_eq!(props.directories, 1);
        assert_eq!(props.total, 4);
        assert_eq!(props.size_on_disk, 3 * 4096);
        assert_eq!(props.attributes["DIRECTORY"], 1);
        assert_eq!(props.attributes["NORMAL"], 3);
    }

    #[test]
    fn test_non_recursive_by_default() {
        let fs = sample();
        let props =
            get_properties(&fs, &np(r"C:\p"), &PropertiesOptions::default()).expect("props");
        assert_eq!(props.files, 2);
        assert_eq!(props.directories, 1);
        assert_eq!(props.size, 30);
    }

    #[test]
    fn test_reparse_points_kept_out_of_directory_counts() {
        let fs = sample();
        fs.add_symlink(r"C:\p\link", r"C:\elsewhere", true).expect("link");
        fs.add_mount_point(r"C:\p\mnt", "Volume{v}").expect("mount");

        let props =
            get_properties(&fs, &np(r"C:\p"), &PropertiesOptions::default()).expect("props");
        assert_eq!(props.reparse_points, 2);
        assert_eq!(props.directories, 1);
        assert_eq!(props.attributes["DIRECTORY"], 1);
        assert_eq!(props.attributes["REPARSE_POINT"], 2);
    }

    #[test]
    fn test_inaccessible_directories_counted() {
        let fs = sample();
        fs.deny_listing(r"C:\p\sub").expect("deny");
        let options = PropertiesOptions {
            recursive: true,
            continue_on_access_error: true,
            ..PropertiesOptions::default()
        };

        let props = get_properties(&fs, &np(r"C:\p"), &options).expect("props");
        assert_eq!(props.inaccessible, 1);
        assert_eq!(props.files, 2);
    }

    #[test]
    fn test_missing_directory() {
        let fs = MemoryFileSystem::new();
        let err = get_properties(&fs, &np(r"C:\none"), &PropertiesOptions::default())
            .expect_err("missing");
        assert!(matches!(err, FsError::PathNotFound { .. }));
    }

    #[test]
    fn test_dict_and_format() {
        let props = DirectoryProperties {
            total: 4,
            files: 3,
            directories: 1,
            size: 60,
            size_on_disk: 12288,
            attributes: BTreeMap::from([("DIRECTORY".to_string(), 1)]),
            ..DirectoryProperties::default()
        };

        let dict = props.to_dict();
        assert_eq!(dict["cnt_files"], 3);
        assert_eq!(dict["size"], 60);
        assert_eq!(dict["attr_directory"], 1);
        assert_eq!(
            props.to_string(),
            "[PROPS] total=4 files=3 directories=1 reparse_points=0 size=60 size_on_disk=12288 inaccessible=0"
        );
    }
}
