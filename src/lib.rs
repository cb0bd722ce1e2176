//! Path normalization, lazy directory enumeration and recursive tree operations
//! (delete, copy, move, properties) over a pluggable file-system backend.

pub mod config;
pub mod core;
pub mod error;
pub mod observability;
pub mod path;
pub mod platform;

pub use error::{ErrorKind, FsError, Result};
pub use path::{NormalizedPath, RootKind, normalize};
pub use platform::{FileSystem, LocalFileSystem, MemoryFileSystem};
