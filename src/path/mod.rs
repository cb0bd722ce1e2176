pub mod chars;
pub mod normalized;
pub mod normalizer;

pub use normalized::{NormalizedPath, RootKind};
pub use normalizer::normalize;
