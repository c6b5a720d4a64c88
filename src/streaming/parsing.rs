//! Zero-allocation region line parsing.
//!
//! Region files are whitespace or tab delimited: `chrom start [end] ...`.
//! Fields beyond the third are ignored.

use memchr::memchr2;

/// Classification of one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLine<'a> {
    /// A usable record. `end` equals `start` when the column is absent.
    Record { chrom: &'a str, start: u32, end: u32 },
    /// `#` comment, `track` or `browser` header.
    Comment,
    /// Empty or whitespace-only line.
    Blank,
    /// Unusable record, with a short description of the problem.
    Malformed(&'static str),
}

/// Fast u32 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty, contains non-digit characters or
/// overflows.
#[inline(always)]
pub fn parse_u32_fast(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n * 10 + d as u64;
    }
    u32::try_from(n).ok()
}

/// Iterator over whitespace-separated fields, skipping runs of separators.
pub struct Fields<'a> {
    rest: &'a [u8],
}

impl<'a> Fields<'a> {
    #[inline]
    pub fn new(line: &'a [u8]) -> Self {
        Self { rest: line }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<&'a [u8]> {
        loop {
            if self.rest.is_empty() {
                return None;
            }
            let cut = memchr2(b'\t', b' ', self.rest).unwrap_or(self.rest.len());
            let field = &self.rest[..cut];
            self.rest = if cut < self.rest.len() {
                &self.rest[cut + 1..]
            } else {
                &[]
            };
            if !field.is_empty() {
                return Some(field);
            }
        }
    }
}

/// Strip a trailing `\n` / `\r\n`.
#[inline(always)]
pub fn trim_newline(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Check if a line is a comment or header.
#[inline(always)]
pub fn is_comment(line: &[u8]) -> bool {
    line.first() == Some(&b'#') || line.starts_with(b"track") || line.starts_with(b"browser")
}

/// Parse one region line.
pub fn parse_region_line(line: &[u8]) -> RegionLine<'_> {
    let line = trim_newline(line);
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return RegionLine::Blank;
    }
    if is_comment(line) {
        return RegionLine::Comment;
    }

    let mut fields = Fields::new(line);
    let chrom = match fields.next().map(std::str::from_utf8) {
        Some(Ok(chrom)) => chrom,
        _ => return RegionLine::Malformed("chromosome name is not valid UTF-8"),
    };
    let start = match fields.next() {
        Some(field) => match parse_u32_fast(field) {
            Some(start) => start,
            None => return RegionLine::Malformed("start is not a non-negative integer"),
        },
        None => return RegionLine::Malformed("expected at least 2 fields"),
    };
    let end = match fields.next() {
        Some(field) => match parse_u32_fast(field) {
            Some(end) => end,
            None => return RegionLine::Malformed("end is not a non-negative integer"),
        },
        None => start,
    };

    RegionLine::Record { chrom, start, end }
}
