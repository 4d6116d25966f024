//! 8.3 short names as stored in FAT directory entries

use super::constants::{MAX_EXTENSION_LENGTH, MAX_FILENAME_LENGTH};
use core::fmt;

/// Maps a byte to one FAT accepts in a short name.
///
/// Lowercase letters become uppercase. Control characters and punctuation
/// other than `-`, `_` and `~` become `'X'`.
pub fn validate_char(c: u8) -> u8 {
    match c {
        0x00..=0x1F => b'X',
        0x21..=0x2F if c != b'-' => b'X',
        0x3A..=0x40 => b'X',
        0x5B..=0x60 if c != b'_' => b'X',
        b'a'..=b'z' => c.to_ascii_uppercase(),
        0x7B..=0xFF if c != b'~' => b'X',
        _ => c,
    }
}

/// Space padded, uppercase 8.3 name.
///
/// Only built through [`ShortName::new`] or [`ShortName::parse`], so every
/// byte has passed [`validate_char`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ShortName {
    name: [u8; MAX_FILENAME_LENGTH],
    ext: [u8; MAX_EXTENSION_LENGTH],
}

impl ShortName {
    /// Builds a name from separate base and extension parts, truncating or
    /// space padding each to its fixed width
    pub fn new(name: &[u8], ext: &[u8]) -> Self {
        Self {
            name: fill_field(name),
            ext: fill_field(ext),
        }
    }

    /// Splits `"NAME.EXT"` at its last dot
    pub fn parse(filename: &str) -> Self {
        let (base, ext) = match filename.rfind('.') {
            Some(pos) => (&filename[..pos], &filename[pos + 1..]),
            None => (filename, ""),
        };
        Self::new(base.as_bytes(), ext.as_bytes())
    }

    pub fn name(&self) -> &[u8; MAX_FILENAME_LENGTH] {
        &self.name
    }

    pub fn ext(&self) -> &[u8; MAX_EXTENSION_LENGTH] {
        &self.ext
    }

    /// Compares against the 11 raw name bytes of a directory entry
    pub fn matches(&self, raw: &[u8]) -> bool {
        raw.len() >= MAX_FILENAME_LENGTH + MAX_EXTENSION_LENGTH
            && raw[..MAX_FILENAME_LENGTH] == self.name
            && raw[MAX_FILENAME_LENGTH..MAX_FILENAME_LENGTH + MAX_EXTENSION_LENGTH] == self.ext
    }

    /// Rebuilds a name from raw directory entry fields
    pub(crate) fn from_raw(name: [u8; MAX_FILENAME_LENGTH], ext: [u8; MAX_EXTENSION_LENGTH]) -> Self {
        Self::new(&name, &ext)
    }
}

fn fill_field<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut field = [b' '; N];
    for (dst, &c) in field.iter_mut().zip(src) {
        *dst = validate_char(c);
    }
    field
}

fn trimmed(field: &[u8]) -> &str {
    let end = field.iter().rposition(|&c| c != b' ').map_or(0, |p| p + 1);
    core::str::from_utf8(&field[..end]).unwrap_or("")
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ext = trimmed(&self.ext);
        if ext.is_empty() {
            write!(f, "{}", trimmed(&self.name))
        } else {
            write!(f, "{}.{}", trimmed(&self.name), ext)
        }
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({})", self)
    }
}
