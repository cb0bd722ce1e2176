//! Single-pass path scanner.
//!
//! The scanner classifies the root clause, then walks the remaining components
//! left to right writing the canonical form into one buffer. `.` components are
//! dropped, `..` cancels the previous component where that is legal, and the
//! wildcard rules differ between directory components and the final name.

use super::chars::{
    DIRECTORY_SEPARATOR, EXTENSION_SEPARATOR, VOLUME_SEPARATOR, is_drive_letter, is_separator,
    is_terminator, is_valid_name_char, is_valid_path_char, is_wildcard,
};
use super::normalized::{NormalizedPath, RootKind};
use crate::error::{FsError, Result};

const LONG_PATH_PREFIX: &str = r"\\?\";
const UNC_TOKEN: &str = "UNC";
const GLOBAL_ROOT_TOKEN: &str = "GLOBALROOT";
const VOLUME_TOKEN: &str = "Volume";
const PARENT_DIRECTORY: &str = "..";
const CURRENT_DIRECTORY: &str = ".";

/// Hex digit counts of the dash-separated groups in `Volume{GUID}`.
const GUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// Parse `raw` into its canonical form.
///
/// Wildcards are accepted in the final component only, and only when
/// `allow_wildcards` is set; directory components never accept them.
pub fn normalize(raw: &str, allow_wildcards: bool) -> Result<NormalizedPath> {
    if raw.trim().is_empty() {
        return Err(FsError::invalid_path(raw, "path is empty"));
    }
    if let Some(c) = raw.chars().find(|&c| !is_valid_path_char(c)) {
        return Err(FsError::invalid_path(
            raw,
            format!("illegal character {c:?} in path"),
        ));
    }

    let mut scanner = Scanner::new(raw);
    let mut buf = String::with_capacity(raw.len() + LONG_PATH_PREFIX.len());
    let root_kind = scanner.match_root(&mut buf)?;
    let root_len = buf.len();
    let rooted = root_kind != RootKind::None;

    // A drive-relative root (`C:` without separator) cannot absorb `..`.
    let anchored = rooted && !(root_kind == RootKind::Drive && !buf.ends_with(DIRECTORY_SEPARATOR));
    let removable_from = usize::from(rooted);

    let mut offsets: Vec<usize> = if rooted { vec![0] } else { Vec::new() };
    let mut extension_offset = None;

    while !scanner.at_end() {
        if scanner.eat_separator() {
            continue;
        }

        let start = buf.len();
        let mut saw_wildcard = false;
        let mut saw_illegal = false;
        let mut last_dot = None;

        while let Some(c) = scanner.peek() {
            if is_separator(c) {
                break;
            }
            scanner.bump();
            if is_wildcard(c) {
                saw_wildcard = true;
            } else if !is_valid_name_char(c) {
                saw_illegal = true;
            } else if c == EXTENSION_SEPARATOR {
                last_dot = Some(buf.len());
            }
            buf.push(c);
        }

        let is_final = !scanner.eat_separator();
        let component = &buf[start..];

        if component == CURRENT_DIRECTORY {
            buf.truncate(start);
            continue;
        }

        if component == PARENT_DIRECTORY {
            buf.truncate(start);
            let previous_is_parent = offsets.len() > removable_from
                && offsets
                    .last()
                    .is_some_and(|&prev| &buf[prev..start - 1] == PARENT_DIRECTORY);

            if offsets.len() > removable_from && !previous_is_parent {
                if let Some(prev) = offsets.pop() {
                    buf.truncate(prev);
                }
            } else if !anchored {
                offsets.push(start);
                buf.push_str(PARENT_DIRECTORY);
                if !is_final {
                    buf.push(DIRECTORY_SEPARATOR);
                }
            }
            continue;
        }

        if saw_illegal {
            return Err(FsError::invalid_path(
                raw,
                format!("illegal character in name '{component}'"),
            ));
        }

        if is_final {
            if saw_wildcard && !allow_wildcards {
                return Err(FsError::invalid_path(
                    raw,
                    format!("wildcards are not allowed in '{component}'"),
                ));
            }
            offsets.push(start);
            extension_offset = last_dot;
        } else {
            if saw_wildcard {
                return Err(FsError::invalid_path(
                    raw,
                    format!("wildcards are not allowed in directory name '{component}'"),
                ));
            }
            offsets.push(start);
            buf.push(DIRECTORY_SEPARATOR);
        }
    }

    if !rooted && buf.is_empty() {
        buf.push_str(CURRENT_DIRECTORY);
    }

    Ok(NormalizedPath {
        raw: raw.to_string(),
        extension_offset: extension_offset.unwrap_or(buf.len()),
        canonical: buf,
        root_kind,
        root_len,
        component_offsets: offsets,
    })
}

/// Offset of the last extension separator in the name starting at `name_start`.
pub(crate) fn extension_offset_of(canonical: &str, name_start: Option<usize>) -> usize {
    name_start
        .and_then(|start| {
            canonical[start..]
                .rfind(EXTENSION_SEPARATOR)
                .map(|i| start + i)
        })
        .unwrap_or(canonical.len())
}

struct Scanner<'a> {
    raw: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(raw: &'a str) -> Self {
        Self { raw, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.raw[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.raw.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat_separator(&mut self) -> bool {
        if self.peek().is_some_and(is_separator) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// `token` (ASCII, case-insensitive) followed by a separator or end of input.
    fn at_token(&self, token: &str) -> bool {
        let rest = self.rest();
        rest.len() >= token.len()
            && rest.is_char_boundary(token.len())
            && rest[..token.len()].eq_ignore_ascii_case(token)
            && is_terminator(rest[token.len()..].chars().next())
    }

    fn skip(&mut self, n_bytes: usize) {
        self.pos += n_bytes;
    }

    /// Read up to the next separator.
    fn take_name(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest.find(is_separator).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn match_root(&mut self, buf: &mut String) -> Result<RootKind> {
        let c0 = self.peek();
        let c1 = self.peek_nth(1);

        if c0.is_some_and(is_separator) && c1.is_some_and(is_separator) {
            if self.peek_nth(2) == Some('?') && self.peek_nth(3).is_some_and(is_separator) {
                self.skip(4);
                buf.push_str(LONG_PATH_PREFIX);
                return self.match_long_path_root(buf);
            }
            self.skip(2);
            buf.push(DIRECTORY_SEPARATOR);
            buf.push(DIRECTORY_SEPARATOR);
            self.match_unc_share(buf)?;
            return Ok(RootKind::UncShare);
        }

        if c0.is_some_and(is_separator) {
            self.bump();
            buf.push(DIRECTORY_SEPARATOR);
            return Ok(RootKind::UnqualifiedRoot);
        }

        if let (Some(letter), Some(VOLUME_SEPARATOR)) = (c0, c1) {
            if is_drive_letter(letter) {
                self.skip(2);
                buf.push(letter);
                buf.push(VOLUME_SEPARATOR);
                if self.eat_separator() {
                    buf.push(DIRECTORY_SEPARATOR);
                }
                return Ok(RootKind::Drive);
            }
        }

        Ok(RootKind::None)
    }

    fn match_long_path_root(&mut self, buf: &mut String) -> Result<RootKind> {
        if let (Some(letter), Some(VOLUME_SEPARATOR)) = (self.peek(), self.peek_nth(1)) {
            if is_drive_letter(letter) {
                self.skip(2);
                buf.push(letter);
                buf.push(VOLUME_SEPARATOR);
                if self.eat_separator() {
                    buf.push(DIRECTORY_SEPARATOR);
                }
                return Ok(RootKind::LongPathDrive);
            }
        }

        if self.at_token(UNC_TOKEN) {
            self.skip(UNC_TOKEN.len());
            if !self.eat_separator() {
                return Err(FsError::invalid_path(self.raw, "UNC server name is missing"));
            }
            buf.push_str(UNC_TOKEN);
            buf.push(DIRECTORY_SEPARATOR);
            self.match_unc_share(buf)?;
            return Ok(RootKind::LongPathUncShare);
        }

        if self.at_token(GLOBAL_ROOT_TOKEN) {
            self.skip(GLOBAL_ROOT_TOKEN.len());
            buf.push_str(GLOBAL_ROOT_TOKEN);
            if self.eat_separator() {
                buf.push(DIRECTORY_SEPARATOR);
            }
            return Ok(RootKind::LongPathGlobalRoot);
        }

        let rest = self.rest();
        if rest.len() >= VOLUME_TOKEN.len()
            && rest.is_char_boundary(VOLUME_TOKEN.len())
            && rest[..VOLUME_TOKEN.len()].eq_ignore_ascii_case(VOLUME_TOKEN)
        {
            self.skip(VOLUME_TOKEN.len());
            let guid = self.take_name();
            if !is_volume_guid(guid) {
                return Err(FsError::invalid_path(
                    self.raw,
                    format!("malformed volume GUID clause 'Volume{guid}'"),
                ));
            }
            buf.push_str(VOLUME_TOKEN);
            buf.push_str(&guid.to_ascii_lowercase());
            if self.eat_separator() {
                buf.push(DIRECTORY_SEPARATOR);
            }
            return Ok(RootKind::LongPathVolumeGuid);
        }

        Err(FsError::invalid_path(self.raw, "unrecognized long path prefix"))
    }

    /// `server\share` with an optional trailing separator.
    fn match_unc_share(&mut self, buf: &mut String) -> Result<()> {
        let server = self.take_name();
        if server.is_empty() {
            return Err(FsError::invalid_path(self.raw, "UNC server name is missing"));
        }
        if !server.chars().all(is_valid_name_char) {
            return Err(FsError::invalid_path(
                self.raw,
                format!("illegal character in server name '{server}'"),
            ));
        }
        buf.push_str(server);

        if !self.eat_separator() {
            return Err(FsError::invalid_path(self.raw, "UNC share name is missing"));
        }
        let share = self.take_name();
        if share.is_empty() {
            return Err(FsError::invalid_path(self.raw, "UNC share name is missing"));
        }
        if !share.chars().all(is_valid_name_char) {
            return Err(FsError::invalid_path(
                self.raw,
                format!("illegal character in share name '{share}'"),
            ));
        }
        buf.push(DIRECTORY_SEPARATOR);
        buf.push_str(share);

        if self.eat_separator() {
            buf.push(DIRECTORY_SEPARATOR);
        }
        Ok(())
    }
}

/// `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}` with hex digits.
fn is_volume_guid(token: &str) -> bool {
    let Some(inner) = token.strip_prefix('{').and_then(|t| t.strip_suffix('}')) else {
        return false;
    };
    let groups: Vec<&str> = inner.split('-').collect();
    groups.len() == GUID_GROUPS.len()
        && groups
            .iter()
            .zip(GUID_GROUPS)
            .all(|(g, n)| g.len() == n && g.chars().all(|c| c.is_ascii_hexdigit()))
}
