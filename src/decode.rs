use std::error;
use std::fmt;

use log::debug;

use crate::arena::{Arena, ElementId, DEFAULT_BLOCK_CAPACITY};
use crate::scanner::{Scanner, Span, XmlByteExt};
use crate::{Document, TextPos};


/// A list of all possible errors.
///
/// Decoding stops at the first error and no tree is returned.
#[derive(Debug)]
pub enum Error {
    /// The input buffer is empty.
    EmptyInput,

    /// The input is truncated or its tags are not balanced.
    MalformedDocument(Malformed, TextPos),

    /// The input doesn't contain any element.
    RootNotFound,

    /// A pool was not allowed to grow past `DecodeOptions::block_limit`.
    #[allow(missing_docs)]
    AllocationFailure { limit: usize },
}

impl Error {
    /// Returns a stable numeric code of the error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// let err = inplacexml::Document::decode(Vec::new()).unwrap_err();
    /// assert_eq!(err.code(), 100);
    /// ```
    pub fn code(&self) -> u32 {
        match *self {
            Error::EmptyInput => 100,
            Error::MalformedDocument(..) => 101,
            Error::AllocationFailure { .. } => 102,
            Error::RootNotFound => 103,
        }
    }

    /// Returns the position of a malformed document error.
    pub fn pos(&self) -> Option<TextPos> {
        match *self {
            Error::MalformedDocument(_, pos) => Some(pos),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::EmptyInput => {
                write!(f, "data is nil")
            }
            Error::MalformedDocument(ref reason, pos) => {
                write!(f, "decode failure: {} at {}", reason, pos)
            }
            Error::RootNotFound => {
                write!(f, "document root not found")
            }
            Error::AllocationFailure { limit } => {
                write!(f, "unable to allocate memory: the limit of {} pool blocks is reached", limit)
            }
        }
    }
}

impl error::Error for Error {}


/// The reason of a `MalformedDocument` error.
#[derive(Clone, PartialEq, Debug)]
pub enum Malformed {
    /// The input ended inside a tag.
    UnexpectedEndOfStream,

    /// A specific byte was expected.
    #[allow(missing_docs)]
    InvalidChar { expected: u8, actual: u8 },

    /// An element or an attribute name is missing or starts with an invalid byte.
    InvalidName,

    /// An attribute without `=` or without a quoted value.
    InvalidAttribute,

    /// The close tag doesn't match the innermost open element.
    #[allow(missing_docs)]
    UnexpectedCloseTag { expected: String, actual: String },

    /// A close tag without any open element.
    UnmatchedCloseTag(String),

    /// An element was still open at the end of the input.
    UnclosedElement(String),

    /// The `-->` is missing.
    UnterminatedComment,

    /// The `]]>` is missing.
    UnterminatedCdata,

    /// A processing instruction or a declaration is not closed.
    UnterminatedDeclaration,

    /// A `DOCTYPE` was found, but `DecodeOptions::allow_dtd` is disabled.
    DtdDetected,

    /// An element was found after the root element was closed.
    MultipleRootElements,

    /// The buffer is not a valid UTF-8 text.
    InvalidUtf8,
}

impl fmt::Display for Malformed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Malformed::UnexpectedEndOfStream => {
                write!(f, "unexpected end of stream")
            }
            Malformed::InvalidChar { expected, actual } => {
                write!(f, "expected '{}' not '{}'", expected as char, actual as char)
            }
            Malformed::InvalidName => {
                write!(f, "invalid name")
            }
            Malformed::InvalidAttribute => {
                write!(f, "invalid attribute")
            }
            Malformed::UnexpectedCloseTag { ref expected, ref actual } => {
                write!(f, "expected '{}' tag, not '{}'", expected, actual)
            }
            Malformed::UnmatchedCloseTag(ref name) => {
                write!(f, "close tag '{}' has no open element", name)
            }
            Malformed::UnclosedElement(ref name) => {
                write!(f, "element '{}' is not closed", name)
            }
            Malformed::UnterminatedComment => {
                write!(f, "unterminated comment")
            }
            Malformed::UnterminatedCdata => {
                write!(f, "unterminated CDATA section")
            }
            Malformed::UnterminatedDeclaration => {
                write!(f, "unterminated declaration")
            }
            Malformed::DtdDetected => {
                write!(f, "DTD is not allowed")
            }
            Malformed::MultipleRootElements => {
                write!(f, "unexpected element after the root element")
            }
            Malformed::InvalidUtf8 => {
                write!(f, "invalid UTF-8 data")
            }
        }
    }
}


/// Decoding options.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct DecodeOptions {
    /// Amount of records in each element and attribute pool block.
    ///
    /// Default: 100
    pub block_capacity: usize,

    /// Maximum amount of blocks each pool may grow to.
    ///
    /// `None` means unbounded.
    ///
    /// Default: None
    pub block_limit: Option<usize>,

    /// Allow a `DOCTYPE`. It will be skipped anyway.
    ///
    /// Default: true
    pub allow_dtd: bool,

    /// Collapse the predefined entities and character references
    /// in text and attribute values.
    ///
    /// Default: true
    pub decode_entities: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            block_limit: None,
            allow_dtd: true,
            decode_entities: true,
        }
    }
}


impl Document {
    /// Decodes the XML buffer in place.
    ///
    /// The buffer is consumed: decoding writes into it and the `Document`
    /// keeps it alive for all the strings it returns.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode(b"<e a='b'/>".to_vec()).unwrap();
    /// assert_eq!(doc.root_element().name(), "e");
    /// assert_eq!(doc.root_element().attribute("a"), Some("b"));
    /// ```
    pub fn decode(data: Vec<u8>) -> Result<Document, Error> {
        Self::decode_with_options(data, DecodeOptions::default())
    }

    /// Decodes the XML buffer in place using the specified options.
    pub fn decode_with_options(data: Vec<u8>, opt: DecodeOptions) -> Result<Document, Error> {
        let res = decode(data, opt);
        if let Err(ref e) = res {
            debug!("failed to decode a document: {}", e);
        }

        res
    }

    /// Copies the string into a new buffer and decodes it.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e>text</e>").unwrap();
    /// assert_eq!(doc.root_element().text(), Some("text"));
    /// ```
    pub fn decode_str(text: &str) -> Result<Document, Error> {
        Self::decode(text.as_bytes().to_vec())
    }
}

fn decode(mut data: Vec<u8>, opt: DecodeOptions) -> Result<Document, Error> {
    if data.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut arena = Arena::new(opt.block_capacity, opt.block_limit);
    let (root, collapsed) = {
        let mut decoder = Decoder {
            s: Scanner::new(&mut data),
            arena: &mut arena,
            opt,
            root: None,
            current: None,
            tag_start: 0,
        };
        let root = decoder.run()?;
        (root, decoder.s.into_collapsed())
    };

    // The scanner writes only ASCII bytes and moves whole characters,
    // so a valid input stays valid after decoding.
    let text = match String::from_utf8(data) {
        Ok(text) => text,
        Err(e) => {
            let valid_up_to = e.utf8_error().valid_up_to();
            let data = e.into_bytes();
            let pos = crate::scanner::text_pos_at(&data, &collapsed, valid_up_to);
            return Err(Error::MalformedDocument(Malformed::InvalidUtf8, pos));
        }
    };

    debug!(
        "decoded {} elements and {} attributes using {} + {} pool blocks",
        arena.element_count(),
        arena.attribute_count(),
        arena.element_blocks(),
        arena.attribute_blocks(),
    );

    Ok(Document { text, arena, root, collapsed })
}


#[derive(Clone, Copy, PartialEq, Debug)]
enum State {
    /// Text between tags.
    OutsideTag,
    /// Just after `<`.
    TagOpen,
    /// `<name`
    InStartTag,
    /// Between the element name and `>`, `/>` or an attribute value.
    InAttributeName(ElementId),
    /// After the opening quote.
    InAttributeValue { element: ElementId, quote: u8, name: Span },
    /// `<![CDATA[`
    InCData,
    /// `<!--`
    InComment,
    /// `<?` or `<!`
    InDeclaration,
    /// `/>`
    SelfClosed,
    /// `</`
    EndTag,
    End,
}

struct Decoder<'a, 'b> {
    s: Scanner<'a>,
    arena: &'b mut Arena,
    opt: DecodeOptions,
    root: Option<ElementId>,
    /// The innermost open element.
    ///
    /// Together with the parent links acts as a stack of open elements.
    current: Option<ElementId>,
    /// Position of the `<` of the tag being processed.
    tag_start: usize,
}

impl<'a, 'b> Decoder<'a, 'b> {
    fn run(&mut self) -> Result<ElementId, Error> {
        // Skip UTF-8 BOM.
        if self.s.starts_with(&[0xEF, 0xBB, 0xBF]) {
            self.s.advance(3);
        }

        let mut state = State::OutsideTag;
        while state != State::End {
            state = match state {
                State::OutsideTag => self.outside_tag(),
                State::TagOpen => self.tag_open()?,
                State::InStartTag => self.start_tag()?,
                State::InAttributeName(element) => self.attribute_name(element)?,
                State::InAttributeValue { element, quote, name } => {
                    self.attribute_value(element, quote, name)?
                }
                State::InCData => self.cdata()?,
                State::InComment => self.comment()?,
                State::InDeclaration => self.declaration()?,
                State::SelfClosed => self.close_current(),
                State::EndTag => self.end_tag()?,
                State::End => State::End,
            };
        }

        if let Some(id) = self.current {
            let e = self.arena.element(id);
            let name = self.name_string(e.name);
            return Err(self.s.error_at(Malformed::UnclosedElement(name), e.pos));
        }

        self.root.ok_or(Error::RootNotFound)
    }

    fn outside_tag(&mut self) -> State {
        let start = self.s.pos();
        let (end, next) = match self.s.find_byte(b'<') {
            Some(end) => (end, State::TagOpen),
            None => (self.s.len(), State::End),
        };

        let text = Span::from_range(start, end);
        self.s.jump_to(end);

        if !text.is_empty() {
            self.set_text(text);
        }

        next
    }

    fn set_text(&mut self, text: Span) {
        let id = match self.current {
            Some(id) => id,
            None => return,
        };

        if self.arena.element(id).text.is_some() || self.s.is_blank(text) {
            return;
        }

        let text = if self.opt.decode_entities { self.s.unescape(text) } else { text };
        self.arena.element_mut(id).text = Some(text);
    }

    fn tag_open(&mut self) -> Result<State, Error> {
        self.tag_start = self.s.pos();

        let state = if self.s.starts_with(b"<!--") {
            self.s.advance(4);
            State::InComment
        } else if self.s.starts_with(b"<![CDATA[") {
            self.s.advance(9);
            State::InCData
        } else if self.s.starts_with(b"<!") || self.s.starts_with(b"<?") {
            State::InDeclaration
        } else if self.s.starts_with(b"</") {
            self.s.advance(2);
            State::EndTag
        } else {
            self.s.advance(1);
            if !self.s.curr_byte()?.is_xml_name_start() {
                return Err(self.s.error(Malformed::InvalidName));
            }

            State::InStartTag
        };

        Ok(state)
    }

    fn start_tag(&mut self) -> Result<State, Error> {
        if self.current.is_none() && self.root.is_some() {
            return Err(self.s.error_at(Malformed::MultipleRootElements, self.tag_start));
        }

        let name = self.s.consume_name();
        let id = self.arena.alloc_element(name, self.tag_start)?;
        match self.current {
            Some(parent_id) => self.arena.attach_child(parent_id, id),
            None => self.root = Some(id),
        }
        self.current = Some(id);

        if self.s.starts_with_space() {
            self.s.terminate();
        }

        Ok(State::InAttributeName(id))
    }

    fn attribute_name(&mut self, element: ElementId) -> Result<State, Error> {
        self.s.skip_spaces();

        match self.s.curr_byte()? {
            b'>' => {
                self.s.advance(1);
                return Ok(State::OutsideTag);
            }
            b'/' => {
                self.s.advance(1);
                self.s.consume_byte(b'>')?;
                return Ok(State::SelfClosed);
            }
            _ => {}
        }

        let name = self.s.consume_name();
        if name.is_empty() {
            return Err(self.s.error(Malformed::InvalidName));
        }

        // Terminate the name on either `=` or the first space after it.
        match self.s.curr_byte()? {
            b'=' => self.s.terminate(),
            c if c.is_xml_space() => {
                self.s.terminate();
                self.s.skip_spaces();
                if self.s.curr_byte()? != b'=' {
                    return Err(self.s.error(Malformed::InvalidAttribute));
                }
                self.s.advance(1);
            }
            _ => return Err(self.s.error(Malformed::InvalidAttribute)),
        }

        self.s.skip_spaces();
        match self.s.curr_byte()? {
            quote @ b'"' | quote @ b'\'' => {
                self.s.advance(1);
                Ok(State::InAttributeValue { element, quote, name })
            }
            _ => Err(self.s.error(Malformed::InvalidAttribute)),
        }
    }

    fn attribute_value(&mut self, element: ElementId, quote: u8, name: Span) -> Result<State, Error> {
        let start = self.s.pos();
        let end = match self.s.find_byte(quote) {
            Some(end) => end,
            None => {
                let end = self.s.len();
                self.s.jump_to(end);
                return Err(self.s.error(Malformed::UnexpectedEndOfStream));
            }
        };

        self.s.jump_to(end);
        self.s.terminate();

        let mut value = Span::from_range(start, end);
        if self.opt.decode_entities {
            value = self.s.unescape(value);
        }

        let attr_id = self.arena.alloc_attribute(name, value, name.start)?;
        self.arena.attach_attribute(element, attr_id);

        Ok(State::InAttributeName(element))
    }

    fn cdata(&mut self) -> Result<State, Error> {
        let start = self.s.pos();
        let end = match self.s.find_string(b"]]>") {
            Some(end) => end,
            None => {
                return Err(self.s.error_at(Malformed::UnterminatedCdata, self.tag_start));
            }
        };

        self.s.jump_to(end);
        self.s.terminate();
        self.s.advance(2);

        if let Some(id) = self.current {
            let e = self.arena.element_mut(id);
            // CDATA replaces plain text, but not a previous CDATA.
            if !e.text_is_cdata {
                e.text = Some(Span::from_range(start, end));
                e.text_is_cdata = true;
            }
        }

        Ok(State::OutsideTag)
    }

    fn comment(&mut self) -> Result<State, Error> {
        match self.s.find_string(b"-->") {
            Some(end) => {
                self.s.jump_to(end + 3);
                Ok(State::OutsideTag)
            }
            None => Err(self.s.error_at(Malformed::UnterminatedComment, self.tag_start)),
        }
    }

    fn declaration(&mut self) -> Result<State, Error> {
        if self.s.starts_with(b"<?") {
            return match self.s.find_string(b"?>") {
                Some(end) => {
                    self.s.jump_to(end + 2);
                    Ok(State::OutsideTag)
                }
                None => Err(self.s.error_at(Malformed::UnterminatedDeclaration, self.tag_start)),
            };
        }

        if self.s.starts_with(b"<!DOCTYPE") && !self.opt.allow_dtd {
            return Err(self.s.error(Malformed::DtdDetected));
        }

        self.s.advance(2); // <!

        // Skip until the `>` outside of quotes and an internal subset.
        let mut depth = 0;
        let mut quote = None;
        while !self.s.at_end() {
            if quote.is_none() && self.s.starts_with(b"<!--") {
                match self.s.find_string(b"-->") {
                    Some(end) => {
                        self.s.jump_to(end + 3);
                        continue;
                    }
                    None => break,
                }
            }

            let c = self.s.curr_byte()?;
            self.s.advance(1);
            match (c, quote) {
                (b'"', None) | (b'\'', None) => quote = Some(c),
                (_, Some(q)) if c == q => quote = None,
                (_, Some(_)) => {}
                (b'[', None) => depth += 1,
                (b']', None) if depth > 0 => depth -= 1,
                (b'>', None) if depth == 0 => return Ok(State::OutsideTag),
                _ => {}
            }
        }

        Err(self.s.error_at(Malformed::UnterminatedDeclaration, self.tag_start))
    }

    fn end_tag(&mut self) -> Result<State, Error> {
        let name = self.s.consume_name();
        self.s.skip_spaces();
        self.s.consume_byte(b'>')?;

        let id = match self.current {
            Some(id) => id,
            None => {
                let name = self.name_string(name);
                return Err(self.s.error_at(Malformed::UnmatchedCloseTag(name), self.tag_start));
            }
        };

        let open_name = self.arena.element(id).name;
        if self.s.slice(open_name) != self.s.slice(name) {
            let reason = Malformed::UnexpectedCloseTag {
                expected: self.name_string(open_name),
                actual: self.name_string(name),
            };
            return Err(self.s.error_at(reason, self.tag_start));
        }

        Ok(self.close_current())
    }

    /// Pops the innermost open element.
    fn close_current(&mut self) -> State {
        if let Some(id) = self.current {
            self.current = self.arena.element(id).parent;
        }

        State::OutsideTag
    }

    fn name_string(&self, name: Span) -> String {
        String::from_utf8_lossy(self.s.slice(name)).into_owned()
    }
}
