pub mod logger;

pub use logger::{Rotation, init_logging, shutdown_logging};
