pub mod copy_engine;
pub mod delete;
pub mod enumerator;
pub mod outcome;
pub mod pattern;
pub mod properties;
pub mod validation;

pub use copy_engine::{
    CopyEngine, CrossVolumePolicy, TransferOptions, TransferProgress, copy_tree, move_tree,
};
pub use delete::{DeleteOptions, delete_directory, delete_file};
pub use enumerator::{DirectoryWalker, EnumerateOptions, Entry, SkippedDirectory, enumerate};
pub use outcome::{OperationOutcome, TreeStats};
pub use pattern::SearchPattern;
pub use properties::{DirectoryProperties, PropertiesOptions, get_properties};
pub use validation::{ValidationResult, validate_transfer};
