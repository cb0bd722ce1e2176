pub mod file_ops;

pub use file_ops::{delete_volume_mount_point, set_file_attributes};
