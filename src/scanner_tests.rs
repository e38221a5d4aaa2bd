use std::str;

use pretty_assertions::assert_eq;

use crate::scanner::{self, Collapsed, Scanner, Span};
use crate::{Error, Malformed, TextPos};

#[test]
fn text_pos_1() {
    assert_eq!(scanner::text_pos_at(b"text", &[], 2), TextPos::new(1, 3));
}

#[test]
fn text_pos_2() {
    assert_eq!(scanner::text_pos_at(b"text\ntext", &[], 6), TextPos::new(2, 2));
}

#[test]
fn text_pos_3() {
    assert_eq!(scanner::text_pos_at("текст\nтекст".as_bytes(), &[], 15), TextPos::new(2, 3));
}

#[test]
fn text_pos_out_of_range() {
    assert_eq!(scanner::text_pos_at(b"a\nb", &[], 100), TextPos::new(2, 2));
}

#[test]
fn text_pos_invalid_utf8() {
    assert_eq!(scanner::text_pos_at(b"ab\xFFcd", &[], 5), TextPos::new(1, 3));
}

#[test]
fn text_pos_after_multibyte_reference() {
    let mut data = b"<a>&#x263A;</a>".to_vec();
    let mut s = Scanner::new(&mut data);
    s.unescape(Span::new(3, 8));
    let collapsed = s.into_collapsed();

    assert_eq!(collapsed, [Collapsed { span: Span::new(3, 8), lines: 0, tail: 8 }]);
    assert_eq!(scanner::text_pos_at(&data, &collapsed, 11), TextPos::new(1, 12));
}

#[test]
fn text_pos_after_line_feed_reference() {
    let mut data = b"<a>&#10;&amp;\nb</a>".to_vec();
    let mut s = Scanner::new(&mut data);
    s.unescape(Span::new(3, 12));
    let collapsed = s.into_collapsed();

    assert_eq!(&data[3..15], b"\n&\nb\0\0\0\0\0\0\0\0");
    assert_eq!(collapsed, [Collapsed { span: Span::new(3, 12), lines: 1, tail: 1 }]);
    assert_eq!(scanner::text_pos_at(&data, &collapsed, 15), TextPos::new(2, 2));
}

#[test]
fn text_pos_inside_collapsed_span() {
    let mut data = b"&amp;x".to_vec();
    let mut s = Scanner::new(&mut data);
    s.unescape(Span::new(0, 6));
    let collapsed = s.into_collapsed();

    assert_eq!(scanner::text_pos_at(&data, &collapsed, 6), TextPos::new(1, 7));
    assert_eq!(scanner::text_pos_at(&data, &collapsed, 1), TextPos::new(1, 2));
}

#[test]
fn unchanged_spans_are_not_collapsed() {
    let mut data = b"text &b; text".to_vec();
    let mut s = Scanner::new(&mut data);
    s.unescape(Span::new(0, 4));
    s.unescape(Span::new(5, 3));
    assert!(s.into_collapsed().is_empty());
}

#[test]
fn span_size() {
    assert!(::std::mem::size_of::<Span>() <= 16);
}

macro_rules! test_unescape {
    ($name:ident, $text:expr, $result:expr) => (
        #[test]
        fn $name() {
            let mut data = $text.as_bytes().to_vec();
            let len = data.len();
            let mut s = Scanner::new(&mut data);
            let span = s.unescape(Span::new(0, len));
            assert_eq!(str::from_utf8(s.slice(span)).unwrap(), $result);
        }
    )
}

test_unescape!(unescape_01, "text", "text");
test_unescape!(unescape_02, "&amp;", "&");
test_unescape!(unescape_03, "&lt;&gt;&quot;&apos;", "<>\"'");
test_unescape!(unescape_04, "a &lt; b &amp;&amp; c", "a < b && c");
test_unescape!(unescape_05, "&#65;&#x42;", "AB");
test_unescape!(unescape_06, "&#x10FFFF;", "\u{10FFFF}");
test_unescape!(unescape_07, "&#xE9;t&#233;", "été");
test_unescape!(unescape_08, "&unknown;", "&unknown;");
test_unescape!(unescape_09, "&amp", "&amp");
test_unescape!(unescape_10, "& &amp; &", "& & &");
test_unescape!(unescape_11, "&#;&#x;&#xZZ;&#+1;", "&#;&#x;&#xZZ;&#+1;");
test_unescape!(unescape_12, "&#0;", "&#0;");
test_unescape!(unescape_13, "&#xD800;", "&#xD800;");
test_unescape!(unescape_14, "&#0000000065;", "&#0000000065;");
test_unescape!(unescape_15, "текст&amp;текст", "текст&текст");
test_unescape!(unescape_16, "&amp;amp;", "&amp;");

#[test]
fn unescape_fills_tail_with_nul() {
    let mut data = b"<e>&lt;x</e>".to_vec();
    {
        let mut s = Scanner::new(&mut data);
        let span = s.unescape(Span::new(3, 5));
        assert_eq!(span, Span::new(3, 2));
    }
    assert_eq!(&data, b"<e><x\0\0\0</e>");
}

#[test]
fn unescape_untouched() {
    let mut data = b"a &b; c".to_vec();
    {
        let mut s = Scanner::new(&mut data);
        let span = s.unescape(Span::new(0, 7));
        assert_eq!(span, Span::new(0, 7));
    }
    assert_eq!(&data, b"a &b; c");
}

#[test]
fn unescape_inside_span_only() {
    let mut data = b"&amp;|&amp;".to_vec();
    {
        let mut s = Scanner::new(&mut data);
        let span = s.unescape(Span::new(6, 5));
        assert_eq!(span, Span::new(6, 1));
    }
    assert_eq!(&data, b"&amp;|&\0\0\0\0");
}

#[test]
fn terminate_01() {
    let mut data = b"name value".to_vec();
    {
        let mut s = Scanner::new(&mut data);
        let name = s.consume_name();
        assert_eq!(name, Span::new(0, 4));
        s.terminate();
        assert_eq!(s.pos(), 5);
    }
    assert_eq!(&data, b"name\0value");
}

#[test]
fn terminate_keeps_line_feed() {
    let mut data = b"a\nb".to_vec();
    {
        let mut s = Scanner::new(&mut data);
        s.advance(1);
        s.terminate();
        assert_eq!(s.pos(), 2);
    }
    assert_eq!(&data, b"a\nb");
}

#[test]
fn consume_name_01() {
    let mut data = "svg:rect x".as_bytes().to_vec();
    let mut s = Scanner::new(&mut data);
    assert_eq!(s.consume_name(), Span::new(0, 8));
}

#[test]
fn consume_name_02() {
    let mut data = "имя=".as_bytes().to_vec();
    let mut s = Scanner::new(&mut data);
    let name = s.consume_name();
    assert_eq!(str::from_utf8(s.slice(name)).unwrap(), "имя");
}

#[test]
fn consume_name_03() {
    let mut data = b"/>".to_vec();
    let mut s = Scanner::new(&mut data);
    assert!(s.consume_name().is_empty());
    assert_eq!(s.pos(), 0);
}

#[test]
fn find_01() {
    let mut data = b"text<!-- a -->".to_vec();
    let mut s = Scanner::new(&mut data);
    assert_eq!(s.find_byte(b'<'), Some(4));
    assert_eq!(s.find_string(b"-->"), Some(11));
    s.jump_to(5);
    assert_eq!(s.find_byte(b'<'), None);
    assert_eq!(s.find_string(b"]]>"), None);
}

#[test]
fn skip_spaces_01() {
    let mut data = b" \t\r\n x".to_vec();
    let mut s = Scanner::new(&mut data);
    assert!(s.starts_with_space());
    s.skip_spaces();
    assert_eq!(s.pos(), 5);
    assert!(s.starts_with(b"x"));
}

#[test]
fn is_blank_01() {
    let mut data = b" \n\tx".to_vec();
    let s = Scanner::new(&mut data);
    assert!(s.is_blank(Span::new(0, 3)));
    assert!(!s.is_blank(Span::new(0, 4)));
}

#[test]
fn consume_byte_01() {
    let mut data = b"a".to_vec();
    let mut s = Scanner::new(&mut data);
    match s.consume_byte(b'>') {
        Err(Error::MalformedDocument(reason, pos)) => {
            assert_eq!(reason, Malformed::InvalidChar { expected: b'>', actual: b'a' });
            assert_eq!(pos, TextPos::new(1, 1));
        }
        _ => panic!("must fail"),
    }

    s.consume_byte(b'a').unwrap();
    match s.consume_byte(b'>') {
        Err(Error::MalformedDocument(Malformed::UnexpectedEndOfStream, pos)) => {
            assert_eq!(pos, TextPos::new(1, 2));
        }
        _ => panic!("must fail"),
    }
}
