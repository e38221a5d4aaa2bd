/*!
Decode an XML buffer in place into a read-only tree.

The root point of the documentations is [`Document::decode`].

The decoder takes ownership of the input buffer and never copies strings
out of it: names, values and text are byte ranges into that buffer.
Delimiters are overwritten with NUL and entity references are collapsed
inside their own range, so the buffer is modified while decoding.

Elements and attributes are stored in pools of fixed-capacity blocks,
so decoding doesn't allocate per node.

This is not a validating parser. There is no DTD or namespaces support,
and only the predefined entities and character references are decoded.

[`Document::decode`]: struct.Document.html#method.decode
*/

#![doc(html_root_url = "https://docs.rs/inplacexml/0.1.0")]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::iter::FusedIterator;

pub use xmlparser::TextPos;

mod arena;
mod decode;
mod scanner;
#[cfg(test)]
mod scanner_tests;

pub use crate::arena::DEFAULT_BLOCK_CAPACITY;
pub use crate::decode::*;

use crate::arena::{Arena, AttributeData, AttributeId, ElementData, ElementId};
use crate::scanner::{Collapsed, Span};


/// A decoded XML document.
///
/// Owns the decoded buffer and the element and attribute pools.
/// Everything returned by the document borrows it, so nothing
/// can outlive it.
///
/// The document always has a root element.
pub struct Document {
    /// The decoded buffer.
    ///
    /// Contains NUL bytes in places of delimiters.
    text: String,
    arena: Arena,
    root: ElementId,
    /// Spans whose references were collapsed, in document order.
    collapsed: Vec<Collapsed>,
}

impl Document {
    /// Returns the root element.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<!-- comment --><e/>").unwrap();
    /// assert_eq!(doc.root_element().name(), "e");
    /// assert!(doc.root_element().parent().is_none());
    /// ```
    pub fn root_element(&self) -> Element {
        self.get(self.root)
    }

    /// Returns an iterator over all elements in document order.
    ///
    /// Shorthand for `doc.root_element().descendants()`.
    pub fn descendants(&self) -> Descendants {
        self.root_element().descendants()
    }

    /// Returns the amount of decoded elements.
    pub fn element_count(&self) -> usize {
        self.arena.element_count()
    }

    /// Returns the amount of decoded attributes.
    pub fn attribute_count(&self) -> usize {
        self.arena.attribute_count()
    }

    /// Returns the amount of element pool blocks.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e/>").unwrap();
    /// assert_eq!(doc.element_blocks(), 1);
    /// assert_eq!(doc.attribute_blocks(), 0);
    /// ```
    pub fn element_blocks(&self) -> usize {
        self.arena.element_blocks()
    }

    /// Returns the amount of attribute pool blocks.
    pub fn attribute_blocks(&self) -> usize {
        self.arena.attribute_blocks()
    }

    /// Calculates `TextPos` in the original document from position in bytes.
    ///
    /// **Note:** this operation is expensive.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("\
    /// <!-- comment -->
    /// <e/>"
    /// ).unwrap();
    ///
    /// assert_eq!(doc.text_pos_at(10), inplacexml::TextPos::new(1, 11));
    /// assert_eq!(doc.text_pos_at(9999), inplacexml::TextPos::new(2, 5));
    /// ```
    pub fn text_pos_at(&self, pos: usize) -> TextPos {
        scanner::text_pos_at(self.text.as_bytes(), &self.collapsed, pos)
    }

    #[inline]
    fn get(&self, id: ElementId) -> Element {
        Element { id, d: self.arena.element(id), doc: self }
    }

    #[inline]
    fn get_attribute(&self, id: AttributeId) -> Attribute {
        Attribute { d: self.arena.attribute(id), doc: self }
    }

    #[inline]
    fn span_str(&self, span: Span) -> &str {
        &self.text[span.range()]
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        macro_rules! writeln_indented {
            ($depth:expr, $f:expr, $fmt:expr) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt)?;
            };
            ($depth:expr, $f:expr, $fmt:expr, $($arg:tt)*) => {
                for _ in 0..$depth { write!($f, "    ")?; }
                writeln!($f, $fmt, $($arg)*)?;
            };
        }

        fn print_element(element: Element, depth: usize, f: &mut fmt::Formatter)
            -> Result<(), fmt::Error>
        {
            writeln_indented!(depth, f, "Element {{");
            writeln_indented!(depth, f, "    name: {:?}", element.name());

            if let Some(text) = element.text() {
                writeln_indented!(depth, f, "    text: {:?}", text);
            }

            if element.has_attributes() {
                writeln_indented!(depth, f, "    attributes: [");
                for attr in element.attributes() {
                    writeln_indented!(depth + 2, f, "{:?}", attr);
                }
                writeln_indented!(depth, f, "    ]");
            }

            if element.has_children() {
                writeln_indented!(depth, f, "    children: [");
                for child in element.children() {
                    print_element(child, depth + 2, f)?;
                }
                writeln_indented!(depth, f, "    ]");
            }

            writeln_indented!(depth, f, "}}");

            Ok(())
        }

        writeln!(f, "Document [")?;
        print_element(self.root_element(), 1, f)?;
        writeln!(f, "]")?;

        Ok(())
    }
}


/// An element.
///
/// A cheap, copyable handle into a `Document`.
pub struct Element<'a> {
    id: ElementId,
    doc: &'a Document,
    d: &'a ElementData,
}

impl<'a> Copy for Element<'a> {}

impl<'a> Clone for Element<'a> {
    fn clone(&self) -> Self { *self }
}

impl<'a> Eq for Element<'a> {}

impl<'a> PartialEq for Element<'a> {
    fn eq(&self, other: &Self) -> bool {
           self.id == other.id
        && self.doc as *const _ == other.doc as *const _
    }
}

impl<'a> Element<'a> {
    /// Returns element's document.
    pub fn document(&self) -> &'a Document {
        self.doc
    }

    /// Returns element's name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<svg:e/>").unwrap();
    /// assert_eq!(doc.root_element().name(), "svg:e");
    /// ```
    pub fn name(&self) -> &'a str {
        self.doc.span_str(self.d.name)
    }

    /// Checks that element has a specified name.
    ///
    /// The comparison is case-sensitive.
    pub fn has_name(&self, name: &str) -> bool {
        self.name() == name
    }

    /// Returns element's text.
    ///
    /// This is the first non-blank text run directly inside the element,
    /// or the first CDATA section, which takes precedence.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<p>1 &lt; 2</p>").unwrap();
    /// assert_eq!(doc.root_element().text(), Some("1 < 2"));
    /// ```
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<p><![CDATA[1 &lt; 2]]></p>").unwrap();
    /// assert_eq!(doc.root_element().text(), Some("1 &lt; 2"));
    /// ```
    pub fn text(&self) -> Option<&'a str> {
        self.d.text.map(|span| self.doc.span_str(span))
    }

    /// Returns the value of the first attribute with the specified name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e a='b' a='c'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().attribute("a"), Some("b"));
    /// assert_eq!(doc.root_element().attribute("A"), None);
    /// ```
    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.attribute_node(name).map(|a| a.value())
    }

    /// Returns the first attribute with the specified name.
    pub fn attribute_node(&self, name: &str) -> Option<Attribute<'a>> {
        self.attributes().find(|a| a.name() == name)
    }

    /// Checks that element has a specified attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_node(name).is_some()
    }

    /// Checks that element has any attributes.
    pub fn has_attributes(&self) -> bool {
        self.d.first_attribute.is_some()
    }

    /// Returns the first attribute of this element.
    pub fn first_attribute(&self) -> Option<Attribute<'a>> {
        self.d.first_attribute.map(|id| self.doc.get_attribute(id))
    }

    /// Returns an iterator over element's attributes in document order.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e b='1' a='2'/>").unwrap();
    ///
    /// let names: Vec<_> = doc.root_element().attributes().map(|a| a.name()).collect();
    /// assert_eq!(names, ["b", "a"]);
    /// ```
    pub fn attributes(&self) -> Attributes<'a> {
        Attributes(self.first_attribute())
    }

    fn gen_element(&self, id: ElementId) -> Element<'a> {
        self.doc.get(id)
    }

    /// Returns the parent of this element.
    pub fn parent(&self) -> Option<Self> {
        self.d.parent.map(|id| self.gen_element(id))
    }

    /// Returns the previous sibling of this element.
    pub fn prev_sibling(&self) -> Option<Self> {
        self.d.prev_sibling.map(|id| self.gen_element(id))
    }

    /// Returns the next sibling of this element.
    pub fn next_sibling(&self) -> Option<Self> {
        self.d.next_sibling.map(|id| self.gen_element(id))
    }

    /// Returns the first child of this element.
    pub fn first_child(&self) -> Option<Self> {
        self.d.first_child.map(|id| self.gen_element(id))
    }

    /// Returns the last child of this element.
    pub fn last_child(&self) -> Option<Self> {
        self.d.current_child.map(|id| self.gen_element(id))
    }

    /// Returns true if this element has siblings.
    pub fn has_siblings(&self) -> bool {
        self.d.prev_sibling.is_some() || self.d.next_sibling.is_some()
    }

    /// Returns true if this element has children.
    pub fn has_children(&self) -> bool {
        self.d.first_child.is_some()
    }

    /// Returns the first following sibling with the specified name.
    ///
    /// The element itself is not checked.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<r><a/><b/><a id='2'/></r>").unwrap();
    ///
    /// let a = doc.root_element().first_child().unwrap();
    /// assert_eq!(a.next_sibling_named("a").unwrap().attribute("id"), Some("2"));
    /// assert!(a.next_sibling_named("c").is_none());
    /// ```
    pub fn next_sibling_named(&self, name: &str) -> Option<Self> {
        self.next_siblings().find(|e| e.has_name(name))
    }

    /// Returns the first child with the specified name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<r><a/><b>text</b></r>").unwrap();
    ///
    /// assert_eq!(doc.root_element().child_named("b").unwrap().text(), Some("text"));
    /// assert!(doc.root_element().child_named("c").is_none());
    /// ```
    pub fn child_named(&self, name: &str) -> Option<Self> {
        self.children().find(|e| e.has_name(name))
    }

    /// Returns an iterator over ancestor elements.
    pub fn ancestors(&self) -> Ancestors<'a> {
        Ancestors(self.parent())
    }

    /// Returns an iterator over previous sibling elements.
    pub fn prev_siblings(&self) -> PrevSiblings<'a> {
        PrevSiblings(self.prev_sibling())
    }

    /// Returns an iterator over next sibling elements.
    pub fn next_siblings(&self) -> NextSiblings<'a> {
        NextSiblings(self.next_sibling())
    }

    /// Returns an iterator over children elements.
    pub fn children(&self) -> Children<'a> {
        Children { front: self.first_child(), back: self.last_child() }
    }

    /// Returns an iterator which traverses the subtree starting at this element.
    pub fn traverse(&self) -> Traverse<'a> {
        Traverse { root: *self, edge: None, done: false }
    }

    /// Returns an iterator over this element and its descendants.
    pub fn descendants(&self) -> Descendants<'a> {
        Descendants(self.traverse())
    }

    /// Returns element's position in bytes in the original document.
    ///
    /// Points to the `<` of the start tag.
    pub fn pos(&self) -> usize {
        self.d.pos
    }

    /// Calculates element's position in the original document.
    ///
    /// **Note:** this operation is expensive.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("\
    /// <!-- comment -->
    /// <e/>"
    /// ).unwrap();
    ///
    /// assert_eq!(doc.root_element().text_pos(), inplacexml::TextPos::new(2, 1));
    /// ```
    pub fn text_pos(&self) -> TextPos {
        self.doc.text_pos_at(self.d.pos)
    }
}

impl<'a> fmt::Debug for Element<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "Element {{ name: {:?}, attributes: [", self.name())?;
        for (i, attr) in self.attributes().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", attr)?;
        }
        write!(f, "] }}")
    }
}


/// An attribute.
pub struct Attribute<'a> {
    doc: &'a Document,
    d: &'a AttributeData,
}

impl<'a> Copy for Attribute<'a> {}

impl<'a> Clone for Attribute<'a> {
    fn clone(&self) -> Self { *self }
}

impl<'a> Attribute<'a> {
    /// Returns attribute's name.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e a='b'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().first_attribute().unwrap().name(), "a");
    /// ```
    pub fn name(&self) -> &'a str {
        self.doc.span_str(self.d.name)
    }

    /// Returns attribute's value.
    ///
    /// # Examples
    ///
    /// ```
    /// let doc = inplacexml::Document::decode_str("<e a='&quot;b&quot;'/>").unwrap();
    ///
    /// assert_eq!(doc.root_element().first_attribute().unwrap().value(), "\"b\"");
    /// ```
    pub fn value(&self) -> &'a str {
        self.doc.span_str(self.d.value)
    }

    /// Returns the next attribute of the same element.
    pub fn next(&self) -> Option<Attribute<'a>> {
        self.d.next.map(|id| self.doc.get_attribute(id))
    }

    /// Returns attribute's name position in bytes in the original document.
    ///
    /// ```text
    /// <e attr='value'/>
    ///    ^
    /// ```
    pub fn pos(&self) -> usize {
        self.d.pos
    }
}

impl<'a> PartialEq for Attribute<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.d as *const _ == other.d as *const _
    }
}

impl<'a> fmt::Debug for Attribute<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "Attribute {{ name: {:?}, value: {:?} }}", self.name(), self.value())
    }
}


/// Iterator over element's attributes.
#[derive(Clone)]
pub struct Attributes<'a>(Option<Attribute<'a>>);

impl<'a> Iterator for Attributes<'a> {
    type Item = Attribute<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let attr = self.0.take();
        self.0 = attr.as_ref().and_then(Attribute::next);
        attr
    }
}


macro_rules! axis_iterators {
    ($(#[$m:meta] $i:ident($f:path);)*) => {
        $(
            #[$m]
            #[derive(Clone)]
            pub struct $i<'a>(Option<Element<'a>>);
            impl<'a> Iterator for $i<'a> {
                type Item = Element<'a>;
                fn next(&mut self) -> Option<Self::Item> {
                    let element = self.0.take();
                    self.0 = element.as_ref().and_then($f);
                    element
                }
            }
        )*
    };
}

axis_iterators! {
    /// Iterator over ancestors.
    Ancestors(Element::parent);

    /// Iterator over previous siblings.
    PrevSiblings(Element::prev_sibling);

    /// Iterator over next siblings.
    NextSiblings(Element::next_sibling);
}


/// Iterator over children.
#[derive(Clone)]
pub struct Children<'a> {
    front: Option<Element<'a>>,
    back: Option<Element<'a>>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            let element = self.front.take();
            self.back = None;
            element
        } else {
            let element = self.front.take();
            self.front = element.as_ref().and_then(Element::next_sibling);
            element
        }
    }
}

impl<'a> DoubleEndedIterator for Children<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.back == self.front {
            let element = self.back.take();
            self.front = None;
            element
        } else {
            let element = self.back.take();
            self.back = element.as_ref().and_then(Element::prev_sibling);
            element
        }
    }
}


/// Open or close edge of an element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Edge<'a> {
    /// Open.
    Open(Element<'a>),
    /// Close.
    Close(Element<'a>),
}


/// Iterator which traverses a subtree.
#[derive(Clone)]
pub struct Traverse<'a> {
    root: Element<'a>,
    edge: Option<Edge<'a>>,
    done: bool,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = Edge<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.edge {
            Some(Edge::Open(element)) => {
                self.edge = Some(match element.first_child() {
                    Some(first_child) => Edge::Open(first_child),
                    None => Edge::Close(element),
                });
            }
            Some(Edge::Close(element)) => {
                if element == self.root {
                    self.edge = None;
                    self.done = true;
                } else if let Some(next_sibling) = element.next_sibling() {
                    self.edge = Some(Edge::Open(next_sibling));
                } else {
                    self.edge = element.parent().map(Edge::Close);
                }
            }
            None if self.done => {}
            None => {
                self.edge = Some(Edge::Open(self.root));
            }
        }

        self.edge
    }
}

impl<'a> FusedIterator for Traverse<'a> {}


/// Iterator over an element and its descendants.
#[derive(Clone)]
pub struct Descendants<'a>(Traverse<'a>);

impl<'a> Iterator for Descendants<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for edge in &mut self.0 {
            if let Edge::Open(element) = edge {
                return Some(element);
            }
        }

        None
    }
}

impl<'a> FusedIterator for Descendants<'a> {}
