//! Character predicates used by the path scanner and the search pattern compiler.

/// Canonical directory separator.
pub const DIRECTORY_SEPARATOR: char = '\\';

/// Alternate directory separator accepted on input.
pub const ALT_DIRECTORY_SEPARATOR: char = '/';

pub const VOLUME_SEPARATOR: char = ':';

pub const EXTENSION_SEPARATOR: char = '.';

/// Characters rejected anywhere in a path.
const INVALID_PATH_CHARS: &[char] = &['"', '<', '>', '|'];

#[inline]
pub fn is_separator(c: char) -> bool {
    c == DIRECTORY_SEPARATOR || c == ALT_DIRECTORY_SEPARATOR
}

#[inline]
pub fn is_wildcard(c: char) -> bool {
    c == '*' || c == '?'
}

#[inline]
pub fn is_drive_letter(c: char) -> bool {
    c.is_ascii_alphabetic()
}

/// End of a path component.
#[inline]
pub fn is_terminator(c: Option<char>) -> bool {
    match c {
        None => true,
        Some(c) => is_separator(c),
    }
}

/// Legal somewhere in a path (root clauses included).
#[inline]
pub fn is_valid_path_char(c: char) -> bool {
    (c as u32) >= 0x20 && !INVALID_PATH_CHARS.contains(&c)
}

/// Legal inside a single file or directory name, wildcards excluded.
#[inline]
pub fn is_valid_name_char(c: char) -> bool {
    is_valid_path_char(c) && c != VOLUME_SEPARATOR && !is_wildcard(c) && !is_separator(c)
}
