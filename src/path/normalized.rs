use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::{Serialize, Serializer};

use super::chars::{DIRECTORY_SEPARATOR, EXTENSION_SEPARATOR};
use super::normalizer::{extension_offset_of, normalize};
use crate::error::Result;

/// How a path begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RootKind {
    /// Relative to the current directory.
    None,
    /// `\`: root of the current drive.
    UnqualifiedRoot,
    /// `C:` or `C:\`.
    Drive,
    /// `\\server\share`.
    UncShare,
    /// `\\?\C:\`.
    LongPathDrive,
    /// `\\?\UNC\server\share`.
    LongPathUncShare,
    /// `\\?\Volume{GUID}\`.
    LongPathVolumeGuid,
    /// `\\?\GLOBALROOT\`.
    LongPathGlobalRoot,
}

impl RootKind {
    pub fn is_long_path(self) -> bool {
        matches!(
            self,
            Self::LongPathDrive
                | Self::LongPathUncShare
                | Self::LongPathVolumeGuid
                | Self::LongPathGlobalRoot
        )
    }

    pub fn is_unc(self) -> bool {
        matches!(self, Self::UncShare | Self::LongPathUncShare)
    }
}

/// Canonical form of a path string produced by [`normalize`].
///
/// `component_offsets` holds the byte offset in `canonical` where each component
/// starts. For rooted paths the root is component 0 at offset 0 and is never
/// removed by `..` resolution. Every other offset directly follows a separator.
///
/// Equality and hashing ignore `raw`.
#[derive(Debug, Clone)]
pub struct NormalizedPath {
    pub(crate) raw: String,
    pub(crate) canonical: String,
    pub(crate) root_kind: RootKind,
    pub(crate) root_len: usize,
    pub(crate) component_offsets: Vec<usize>,
    pub(crate) extension_offset: usize,
}

impl NormalizedPath {
    /// Original input, kept for error messages.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn root_kind(&self) -> RootKind {
        self.root_kind
    }

    pub fn component_offsets(&self) -> &[usize] {
        &self.component_offsets
    }

    pub fn extension_offset(&self) -> usize {
        self.extension_offset
    }

    pub fn is_rooted(&self) -> bool {
        self.root_kind != RootKind::None
    }

    /// `C:foo` style path: names a drive but is relative to its current directory.
    pub fn is_drive_relative(&self) -> bool {
        self.root_kind == RootKind::Drive && !self.root().ends_with(DIRECTORY_SEPARATOR)
    }

    /// Root clause including its trailing separator, empty for relative paths.
    pub fn root(&self) -> &str {
        &self.canonical[..self.root_len]
    }

    /// Components after the root, in nesting order.
    pub fn components(&self) -> impl Iterator<Item = &str> + '_ {
        let skip = usize::from(self.is_rooted());
        self.component_offsets
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, &start)| {
                let end = self
                    .component_offsets
                    .get(i + 1)
                    .copied()
                    .unwrap_or(self.canonical.len());
                self.canonical[start..end].trim_end_matches(DIRECTORY_SEPARATOR)
            })
            .filter(|c| !c.is_empty())
    }

    /// Final component, `None` for a bare root.
    pub fn file_name(&self) -> Option<&str> {
        self.components().last()
    }

    /// Extension of the final component without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        if self.extension_offset >= self.canonical.len() {
            return None;
        }
        Some(&self.canonical[self.extension_offset + EXTENSION_SEPARATOR.len_utf8()..])
    }

    /// Path with the final component removed; `None` at a root or a single relative component.
    pub fn parent(&self) -> Option<NormalizedPath> {
        let removable = self.component_offsets.len() - usize::from(self.is_rooted());
        if removable == 0 || (!self.is_rooted() && removable == 1) {
            return None;
        }

        let last = *self.component_offsets.last()?;
        let mut canonical = self.canonical[..last].to_string();
        let offsets = self.component_offsets[..self.component_offsets.len() - 1].to_vec();
        // Keep the root separator, strip the one that ended the parent's last component.
        if last > self.root_len && canonical.ends_with(DIRECTORY_SEPARATOR) {
            canonical.pop();
        }

        let name_start = offsets.last().copied().filter(|&o| o >= self.root_len);
        Some(NormalizedPath {
            raw: canonical.clone(),
            extension_offset: extension_offset_of(&canonical, name_start),
            canonical,
            root_kind: self.root_kind,
            root_len: self.root_len,
            component_offsets: offsets,
        })
    }

    /// Append a relative path and normalize the result.
    pub fn join(&self, child: &str) -> Result<NormalizedPath> {
        let mut joined = String::with_capacity(self.canonical.len() + child.len() + 1);
        joined.push_str(&self.canonical);
        if !joined.is_empty() && !joined.ends_with(DIRECTORY_SEPARATOR) && !self.is_drive_relative() {
            joined.push(DIRECTORY_SEPARATOR);
        }
        joined.push_str(child);
        normalize(&joined, false)
    }

    /// Append a name reported by a directory listing. The name is trusted and not re-validated.
    pub(crate) fn child(&self, name: &str) -> NormalizedPath {
        let mut canonical = self.canonical.clone();
        let mut offsets = self.component_offsets.clone();
        let mut root_len = self.root_len;

        if !self.is_rooted() && offsets.is_empty() {
            canonical.clear();
        }
        if !canonical.is_empty()
            && !canonical.ends_with(DIRECTORY_SEPARATOR)
            && !self.is_drive_relative()
        {
            if canonical.len() == root_len {
                root_len += 1;
            }
            canonical.push(DIRECTORY_SEPARATOR);
        }

        let start = canonical.len();
        offsets.push(start);
        canonical.push_str(name);

        NormalizedPath {
            raw: canonical.clone(),
            extension_offset: extension_offset_of(&canonical, Some(start)),
            canonical,
            root_kind: self.root_kind,
            root_len,
            component_offsets: offsets,
        }
    }

    /// Component-aligned, case-insensitive prefix test.
    ///
    /// Use [`starts_with_case`](Self::starts_with_case) for paths on a case-sensitive volume.
    pub fn starts_with(&self, base: &NormalizedPath) -> bool {
        self.starts_with_case(base, false)
    }

    /// Component-aligned prefix test. The root clause always compares case-insensitively.
    pub fn starts_with_case(&self, base: &NormalizedPath, case_sensitive: bool) -> bool {
        if !self.same_root(base) {
            return false;
        }
        let mine: Vec<&str> = self.components().collect();
        let theirs: Vec<&str> = base.components().collect();
        theirs.len() <= mine.len()
            && theirs.iter().zip(mine.iter()).all(|(a, b)| {
                if case_sensitive {
                    a == b
                } else {
                    a.eq_ignore_ascii_case(b)
                }
            })
    }

    /// Both paths name the same root clause (case-insensitive).
    pub fn same_root(&self, other: &NormalizedPath) -> bool {
        self.root_kind == other.root_kind
            && self
                .root()
                .trim_end_matches(DIRECTORY_SEPARATOR)
                .eq_ignore_ascii_case(other.root().trim_end_matches(DIRECTORY_SEPARATOR))
    }

    /// Host representation. Outside Windows the canonical separator is mapped to `/`.
    pub fn to_host_path(&self) -> PathBuf {
        if cfg!(windows) {
            PathBuf::from(&self.canonical)
        } else {
            PathBuf::from(self.canonical.replace(DIRECTORY_SEPARATOR, "/"))
        }
    }
}

impl PartialEq for NormalizedPath {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
            && self.root_kind == other.root_kind
            && self.component_offsets == other.component_offsets
            && self.extension_offset == other.extension_offset
    }
}

impl Eq for NormalizedPath {}

impl Hash for NormalizedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
        self.root_kind.hash(state);
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl AsRef<std::path::Path> for NormalizedPath {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.canonical)
    }
}

impl Serialize for NormalizedPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}
