use std::cmp;
use std::ops::Range;
use std::str;

use memchr::{memchr, memchr_iter, memmem, memrchr};

use crate::{Error, Malformed, TextPos};

type Result<T> = ::std::result::Result<T, Error>;

/// Extension methods for the byte classes the decoder cares about.
pub(crate) trait XmlByteExt {
    /// Checks if byte is a space.
    ///
    /// `[ \r\n\t]`
    fn is_xml_space(&self) -> bool;

    /// Checks if byte can start an element or an attribute name.
    ///
    /// Any non-ASCII byte is accepted, since we do not validate names.
    fn is_xml_name_start(&self) -> bool;

    /// Checks if byte ends a name.
    fn is_name_delimiter(&self) -> bool;
}

impl XmlByteExt for u8 {
    #[inline]
    fn is_xml_space(&self) -> bool {
        matches!(*self, b' ' | b'\t' | b'\n' | b'\r')
    }

    #[inline]
    fn is_xml_name_start(&self) -> bool {
        matches!(*self, b'A'..=b'Z' | b'a'..=b'z' | b':' | b'_' | 0x80..=0xFF)
    }

    #[inline]
    fn is_name_delimiter(&self) -> bool {
        matches!(*self, b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>' | b'<' | b'=' | b'"' | b'\'')
    }
}


/// A byte range inside the document buffer.
///
/// Replaces a NUL-terminated pointer: the bytes stay in the buffer,
/// we only remember where they are.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    #[inline]
    pub fn new(start: usize, len: usize) -> Self {
        Span { start, len }
    }

    #[inline]
    pub fn from_range(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Span { start, len: end - start }
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..(self.start + self.len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}


/// The extent of a span as it was before its references were collapsed.
///
/// Collapsing moves text and may produce line feeds or multi-byte
/// characters, so positions after the span can't be counted
/// from the decoded bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct Collapsed {
    pub span: Span,
    /// Amount of line feeds.
    pub lines: u32,
    /// Amount of characters after the last line feed.
    pub tail: u32,
}

impl Collapsed {
    fn new(span: Span, data: &[u8]) -> Self {
        let tail = match memrchr(b'\n', data) {
            Some(idx) => &data[idx + 1..],
            None => data,
        };

        Collapsed {
            span,
            lines: memchr_iter(b'\n', data).count() as u32,
            tail: char_count(tail) as u32,
        }
    }
}

/// Counts UTF-8 characters without validating the data.
fn char_count(data: &[u8]) -> usize {
    data.iter().filter(|c| **c & 0xC0 != 0x80).count()
}


/// A cursor over a mutable document buffer.
///
/// The only writes it performs are NUL terminators and the collapsing
/// of entity references inside their span.
pub(crate) struct Scanner<'a> {
    buf: &'a mut [u8],
    pos: usize,
    /// Collapsed spans in document order.
    collapsed: Vec<Collapsed>,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Scanner { buf, pos: 0, collapsed: Vec::new() }
    }

    pub fn into_collapsed(self) -> Vec<Collapsed> {
        self.collapsed
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the buffer length.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn curr_byte(&self) -> Result<u8> {
        if self.at_end() {
            return Err(self.error(Malformed::UnexpectedEndOfStream));
        }

        Ok(self.buf[self.pos])
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.buf.len());
        self.pos += n;
    }

    /// Moves the cursor to an absolute position found by one of the `find_*` methods.
    #[inline]
    pub fn jump_to(&mut self, pos: usize) {
        debug_assert!(pos >= self.pos && pos <= self.buf.len());
        self.pos = pos;
    }

    #[inline]
    pub fn starts_with(&self, text: &[u8]) -> bool {
        self.buf[self.pos..].starts_with(text)
    }

    pub fn consume_byte(&mut self, c: u8) -> Result<()> {
        let curr = self.curr_byte()?;
        if curr != c {
            return Err(self.error(Malformed::InvalidChar { expected: c, actual: curr }));
        }

        self.advance(1);
        Ok(())
    }

    #[inline]
    pub fn starts_with_space(&self) -> bool {
        !self.at_end() && self.buf[self.pos].is_xml_space()
    }

    #[inline]
    pub fn skip_spaces(&mut self) {
        while self.starts_with_space() {
            self.advance(1);
        }
    }

    /// Consumes a name and returns its span.
    ///
    /// The name may be empty when the cursor is already on a delimiter.
    pub fn consume_name(&mut self) -> Span {
        let start = self.pos;
        while !self.at_end() && !self.buf[self.pos].is_name_delimiter() {
            self.advance(1);
        }

        Span::from_range(start, self.pos)
    }

    /// Returns the absolute position of the next `c` at or after the cursor.
    #[inline]
    pub fn find_byte(&self, c: u8) -> Option<usize> {
        memchr(c, &self.buf[self.pos..]).map(|i| self.pos + i)
    }

    /// Returns the absolute position of the next `text` at or after the cursor.
    #[inline]
    pub fn find_string(&self, text: &[u8]) -> Option<usize> {
        memmem::find(&self.buf[self.pos..], text).map(|i| self.pos + i)
    }

    /// Overwrites the delimiter at the cursor with NUL and steps over it.
    ///
    /// Line feeds are kept so row numbers in error positions stay valid.
    pub fn terminate(&mut self) {
        debug_assert!(!self.at_end());
        if self.buf[self.pos] != b'\n' {
            self.buf[self.pos] = 0;
        }

        self.advance(1);
    }

    /// Checks that span contains only XML spaces.
    pub fn is_blank(&self, span: Span) -> bool {
        self.buf[span.range()].iter().all(|c| c.is_xml_space())
    }

    pub fn slice(&self, span: Span) -> &[u8] {
        &self.buf[span.range()]
    }

    /// Collapses entity references inside `span` and returns the shortened span.
    ///
    /// Bytes freed at the end of the span are filled with NUL.
    pub fn unescape(&mut self, span: Span) -> Span {
        let data = &mut self.buf[span.range()];
        if memchr(b'&', data).is_none() {
            return span;
        }

        let extent = Collapsed::new(span, data);
        match unescape_in_place(data) {
            Some(len) => {
                self.collapsed.push(extent);
                Span::new(span.start, len)
            }
            None => span,
        }
    }

    pub fn error(&self, reason: Malformed) -> Error {
        self.error_at(reason, self.pos)
    }

    pub fn error_at(&self, reason: Malformed, pos: usize) -> Error {
        Error::MalformedDocument(reason, text_pos_at(self.buf, &self.collapsed, pos))
    }
}


/// Calculates a row/column position in the original document for a byte offset.
///
/// Collapsed spans before `pos` are measured by their original extent.
///
/// This operation is expensive. Use only for errors and diagnostics.
pub(crate) fn text_pos_at(data: &[u8], collapsed: &[Collapsed], pos: usize) -> TextPos {
    let pos = cmp::min(pos, data.len());

    let mut text_pos = TextPos::new(1, 1);
    let mut prev = 0;
    for c in collapsed {
        let range = c.span.range();
        if range.end > pos {
            break;
        }

        shift_text_pos(&mut text_pos, segment_text_pos(&data[prev..range.start]));
        shift_text_pos(&mut text_pos, TextPos::new(c.lines + 1, c.tail + 1));
        prev = range.end;
    }

    shift_text_pos(&mut text_pos, segment_text_pos(&data[prev..pos]));
    text_pos
}

/// Returns the position at the end of `data` as if it starts at 1:1.
fn segment_text_pos(data: &[u8]) -> TextPos {
    let text = match str::from_utf8(data) {
        Ok(text) => text,
        Err(e) => str::from_utf8(&data[..e.valid_up_to()]).unwrap_or(""),
    };

    xmlparser::Stream::from(text).gen_text_pos_from(text.len())
}

/// Moves `pos` by a relative position produced by `segment_text_pos`.
fn shift_text_pos(pos: &mut TextPos, by: TextPos) {
    if by.row > 1 {
        pos.row += by.row - 1;
        pos.col = by.col;
    } else {
        pos.col += by.col - 1;
    }
}


/// Decodes references in place.
///
/// Returns the new length or `None` when nothing had to be changed.
pub(crate) fn unescape_in_place(data: &mut [u8]) -> Option<usize> {
    let first = memchr(b'&', data)?;

    let mut read = first;
    let mut write = first;
    let mut changed = false;
    while read < data.len() {
        if data[read] == b'&' {
            if let Some((c, consumed)) = parse_reference(&data[read..]) {
                // An encoded char is never longer than its reference,
                // so we can't overrun the read cursor.
                let mut tmp = [0; 4];
                let encoded = c.encode_utf8(&mut tmp).as_bytes();
                data[write..write + encoded.len()].copy_from_slice(encoded);
                write += encoded.len();
                read += consumed;
                changed = true;
                continue;
            }
        }

        let next = memchr(b'&', &data[read + 1..]).map_or(data.len(), |i| read + 1 + i);
        data.copy_within(read..next, write);
        write += next - read;
        read = next;
    }

    if !changed {
        return None;
    }

    for c in &mut data[write..] {
        *c = 0;
    }

    Some(write)
}

// The longest reference we accept is `&#x10FFFF;`.
const MAX_REFERENCE_LEN: usize = 10;

/// Parses a reference at the start of `data`.
///
/// Only the predefined entities and character references are known,
/// anything else is left as is.
fn parse_reference(data: &[u8]) -> Option<(char, usize)> {
    debug_assert_eq!(data.first(), Some(&b'&'));

    let window = &data[..cmp::min(data.len(), MAX_REFERENCE_LEN)];
    let end = memchr(b';', window)?;
    let name = &window[1..end];

    let c = match name {
        b"amp" => '&',
        b"lt" => '<',
        b"gt" => '>',
        b"quot" => '"',
        b"apos" => '\'',
        [b'#', b'x', hex @ ..] => parse_char_ref(hex, 16)?,
        [b'#', dec @ ..] => parse_char_ref(dec, 10)?,
        _ => return None,
    };

    Some((c, end + 1))
}

fn parse_char_ref(digits: &[u8], radix: u32) -> Option<char> {
    if digits.is_empty() || !digits.iter().all(|c| (*c as char).is_digit(radix)) {
        return None;
    }

    let digits = str::from_utf8(digits).ok()?;
    let n = u32::from_str_radix(digits, radix).ok()?;
    match char::from_u32(n) {
        Some('\0') | None => None,
        Some(c) => Some(c),
    }
}
