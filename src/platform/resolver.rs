use std::path::Path;

use crate::error::Result;
use crate::path::{NormalizedPath, RootKind, normalize};
use crate::platform::traits::PathNormalizer;

/// Windows long path limit
const WINDOWS_MAX_PATH: usize = 260;

/// Windows extended path prefix
const EXTENDED_PATH_PREFIX: &str = r"\\?\";

/// Resolves user input against the host before normalizing it.
///
/// Existing relative paths are made absolute with `dunce::canonicalize`; drive and
/// UNC paths close to `MAX_PATH` get the extended-length prefix when enabled.
pub struct HostPathNormalizer {
    extend_long_paths: bool,
}

impl HostPathNormalizer {
    pub fn new() -> Self {
        Self {
            extend_long_paths: cfg!(windows),
        }
    }

    pub fn with_long_path_prefix(mut self, enabled: bool) -> Self {
        self.extend_long_paths = enabled;
        self
    }

    fn absolutize(raw: &str) -> String {
        let path = Path::new(raw);
        if path.is_absolute() || raw.contains(['*', '?']) {
            return raw.to_string();
        }

        match dunce::canonicalize(path) {
            Ok(resolved) => resolved.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::debug!("Cannot canonicalize '{}': {}. Using original path.", raw, e);
                raw.to_string()
            }
        }
    }

    fn extend(&self, normalized: NormalizedPath, allow_wildcards: bool) -> Result<NormalizedPath> {
        if !self.extend_long_paths || normalized.as_str().len() <= WINDOWS_MAX_PATH - 50 {
            return Ok(normalized);
        }

        let extended = match normalized.root_kind() {
            RootKind::Drive if !normalized.is_drive_relative() => {
                format!("{}{}", EXTENDED_PATH_PREFIX, normalized.as_str())
            }
            RootKind::UncShare => format!(r"\\?\UNC{}", &normalized.as_str()[1..]),
            _ => return Ok(normalized),
        };

        tracing::debug!(
            "Path exceeds MAX_PATH ({}), adding extended prefix",
            normalized.as_str().len()
        );
        normalize(&extended, allow_wildcards)
    }
}

impl Default for HostPathNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathNormalizer for HostPathNormalizer {
    fn normalize(&self, raw: &str, allow_wildcards: bool) -> Result<NormalizedPath> {
        let absolute = Self::absolutize(raw);
        let normalized = normalize(&absolute, allow_wildcards)?;
        self.extend(normalized, allow_wildcards)
    }
}
