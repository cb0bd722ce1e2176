use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use tracing::debug;
use windows::Win32::Storage::FileSystem::{
    DeleteVolumeMountPointW, FILE_FLAGS_AND_ATTRIBUTES, SetFileAttributesW,
};
use windows::core::PCWSTR;

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

fn to_io_error(e: windows::core::Error) -> io::Error {
    // HRESULT_FROM_WIN32 keeps the Win32 code in the low word.
    io::Error::from_raw_os_error(e.code().0 & 0xFFFF)
}

/// Replace the attribute bits of `path`.
pub fn set_file_attributes(path: &Path, attributes: u32) -> io::Result<()> {
    debug!("Setting attributes {:#x} on {:?}", attributes, path);
    let wide = to_wide(path);

    unsafe {
        SetFileAttributesW(
            PCWSTR(wide.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(attributes),
        )
        .map_err(to_io_error)
    }
}

/// Detach the volume mounted at `path`. The directory node itself survives.
pub fn delete_volume_mount_point(path: &Path) -> io::Result<()> {
    debug!("Unmounting volume at {:?}", path);

    // The API requires a trailing backslash.
    let mut mount = path.as_os_str().to_os_string();
    if !mount.to_string_lossy().ends_with('\\') {
        mount.push("\\");
    }
    let wide = to_wide(Path::new(&mount));

    unsafe { DeleteVolumeMountPointW(PCWSTR(wide.as_ptr())).map_err(to_io_error) }
}
