use serde::Serialize;

use crate::error::{FsError, Result};

/// Counters accumulated while a tree operation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
    pub reparse_points: u64,
}

/// Terminal state of a delete, copy or move.
///
/// Failures detected before anything was changed are returned as `Err` instead.
#[derive(Debug)]
pub enum OperationOutcome {
    Success(TreeStats),
    /// Part of the tree was changed before the operation stopped on `first_error`.
    PartialFailure {
        error_count: u64,
        first_error: FsError,
        stats: TreeStats,
    },
    /// The progress callback asked to stop. Work already done is left in place.
    Aborted { stats: TreeStats },
}

impl TreeStats {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl OperationOutcome {
    /// Outcome of a run that stopped on `error`. Nothing changed yet means a plain `Err`.
    pub(crate) fn failed(error: FsError, stats: TreeStats, mutated: bool) -> Result<Self> {
        if !mutated && stats.is_zero() {
            return Err(error);
        }
        Ok(Self::PartialFailure {
            error_count: 1,
            first_error: error,
            stats,
        })
    }

    pub fn stats(&self) -> &TreeStats {
        match self {
            Self::Success(stats)
            | Self::PartialFailure { stats, .. }
            | Self::Aborted { stats } => stats,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// One-line summary for humans.
    pub fn summary(&self) -> String {
        let s = self.stats();
        let counts = format!(
            "{} files, {} directories, {} reparse points, {} bytes",
            s.files, s.directories, s.reparse_points, s.bytes
        );
        match self {
            Self::Success(_) => format!("completed: {counts}"),
            Self::PartialFailure {
                error_count,
                first_error,
                ..
            } => format!("failed after {counts} ({error_count} errors, first: {first_error})"),
            Self::Aborted { .. } => format!("aborted after {counts}"),
        }
    }
}
