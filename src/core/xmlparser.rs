// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streaming pull-parser for XML configuration documents (C11).
//!
//! Port of `ut_xmlparser.c`. The original refills a fixed-size buffer
//! from a `FILE*` through a sliding window (`cbufp`/`cbufn`/`cbufmark`)
//! so it can tokenize arbitrarily large documents without holding the
//! whole thing in memory, with `set_marker`/`rewind_to_marker` giving
//! the tokenizer one-shot backtracking (used to distinguish "element
//! has children" from "element has text" without consuming the first
//! child's `<`). This crate's configuration documents are always read
//! from a single file or string up front, so the window here slides
//! over an owned byte buffer rather than refilling from a handle --
//! the buffering behavior that matters for correctness, the marker and
//! lookahead discipline, is kept; the incremental-refill plumbing is
//! not, since there is no unbounded stream to protect against here.
//!
//! Parsed elements are returned as an owned tree. Attributes are kept
//! in the crate's own [`Tree`](crate::core::avl::Tree) rather than a
//! `Vec` or hash map, so attribute lookup during config validation gets
//! the same ordered, allocation-light lookup the rest of the crate
//! uses for its indices.

use crate::core::avl::Tree;
use crate::error::{Error, Result};

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\x0b' | b'\r' | b'\n')
}

fn is_ident_first(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

fn is_ident_cont(c: u8) -> bool {
    is_ident_first(c) || c.is_ascii_digit() || matches!(c, b'_' | b'-' | b':')
}

/// One parsed element: a name, its attributes, child elements, and any
/// text content. An element has either children or text, mirroring
/// the original parser, which treats a first `<` seen right after the
/// opening tag as "this is an element with children" and anything else
/// as "this is character data".
#[derive(Debug, Clone)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Tree<String, String>,
    pub children: Vec<XmlElement>,
    pub text: String,
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            attrs: Tree::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.lookup(&name.to_string()).map(String::as_str)
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Decode XML entity and numeric character references in `s`
/// (`&lt;`, `&gt;`, `&amp;`, `&apos;`, `&quot;`, `&#NN;`, `&#xHH;`).
///
/// # Errors
///
/// Returns `Err` if an `&` is not followed by a recognized entity name
/// or a well-formed numeric reference terminated by `;`.
pub fn unescape(s: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }
        let mut entity = String::new();
        loop {
            match chars.next() {
                Some(';') => break,
                Some(c) => {
                    entity.push(c);
                    if entity.len() > 16 {
                        return Err(Error::BadParameter(format!("unterminated entity reference: &{entity}")));
                    }
                }
                None => return Err(Error::BadParameter("unterminated entity reference".into())),
            }
        }
        match entity.as_str() {
            "lt" => out.push('<'),
            "gt" => out.push('>'),
            "amp" => out.push('&'),
            "apos" => out.push('\''),
            "quot" => out.push('"'),
            _ if entity.starts_with('#') => {
                let cp = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(hex, 16)
                        .map_err(|_| Error::BadParameter(format!("invalid numeric character reference: &{entity};")))?
                } else {
                    entity[1..]
                        .parse::<u32>()
                        .map_err(|_| Error::BadParameter(format!("invalid numeric character reference: &{entity};")))?
                };
                let decoded = char::from_u32(cp)
                    .ok_or_else(|| Error::BadParameter(format!("invalid code point: &{entity};")))?;
                out.push(decoded);
            }
            other => return Err(Error::BadParameter(format!("unknown entity reference: &{other};"))),
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Eof,
    OpenTag(String),
    CloseTag(String),
    Id(String),
    Str(String),
    ShorthandCloseTag,
    Char(u8),
}

/// Tokenizer over an owned byte buffer, with the marker/rewind
/// discipline `parse_element` uses to look one tag ahead without
/// losing its place.
struct Lexer {
    buf: Vec<u8>,
    pos: usize,
    mark: Option<usize>,
    line: u32,
    prev_line: u32,
    peeked: Option<Token>,
}

impl Lexer {
    fn new(buf: Vec<u8>) -> Self {
        Self {
            buf,
            pos: 0,
            mark: None,
            line: 1,
            prev_line: 1,
            peeked: None,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let c = self.peek_byte()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn peek_seq(&self, seq: &[u8]) -> bool {
        self.buf[self.pos..].starts_with(seq)
    }

    fn eat_seq(&mut self, seq: &[u8]) -> bool {
        if self.peek_seq(seq) {
            for _ in 0..seq.len() {
                self.next_byte();
            }
            true
        } else {
            false
        }
    }

    fn set_marker(&mut self) {
        self.mark = Some(self.pos);
    }

    fn discard_marker(&mut self) {
        self.mark = None;
    }

    fn rewind_to_marker(&mut self) {
        if let Some(m) = self.mark.take() {
            self.pos = m;
        }
    }

    fn skip_space_and_comments(&mut self) -> Result<()> {
        loop {
            while self.peek_byte().is_some_and(is_space) {
                self.next_byte();
            }
            if self.eat_seq(b"<!--") {
                loop {
                    if self.peek_byte().is_none() {
                        return Err(Error::BadParameter("unterminated comment".into()));
                    }
                    if self.eat_seq(b"-->") {
                        break;
                    }
                    self.next_byte();
                }
                continue;
            }
            break;
        }
        Ok(())
    }

    fn skip_processing_instruction(&mut self, end: &[u8]) {
        while self.peek_byte().is_some() && !self.eat_seq(end) {
            self.next_byte();
        }
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek_byte().is_some_and(is_ident_cont) {
            self.next_byte();
        }
        String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned()
    }

    fn read_quoted(&mut self) -> Result<String> {
        let quote = self.next_byte().expect("caller checked quote present");
        let start = self.pos;
        while self.peek_byte().is_some_and(|c| c != quote) {
            self.next_byte();
        }
        if self.next_byte() != Some(quote) {
            return Err(Error::BadParameter("unterminated string literal".into()));
        }
        let raw = String::from_utf8_lossy(&self.buf[start..self.pos - 1]).into_owned();
        unescape(&raw)
    }

    fn next_token(&mut self) -> Result<Token> {
        if let Some(t) = self.peeked.take() {
            return Ok(t);
        }
        self.prev_line = self.line;
        self.skip_space_and_comments()?;
        if self.peek_byte().is_none() {
            return Ok(Token::Eof);
        }
        if self.eat_seq(b"<?") {
            self.skip_processing_instruction(b"?>");
            return self.next_token();
        }
        if self.eat_seq(b"<!") {
            self.skip_processing_instruction(b">");
            return self.next_token();
        }
        match self.peek_byte().unwrap() {
            b'<' => {
                self.next_byte();
                let closing = self.peek_byte() == Some(b'/');
                if closing {
                    self.next_byte();
                }
                if !self.peek_byte().is_some_and(is_ident_first) {
                    return Err(Error::BadParameter(format!("expecting tag name at line {}", self.line)));
                }
                let name = self.read_ident();
                Ok(if closing { Token::CloseTag(name) } else { Token::OpenTag(name) })
            }
            b'"' | b'\'' => Ok(Token::Str(self.read_quoted()?)),
            c if is_ident_first(c) => Ok(Token::Id(self.read_ident())),
            b'/' if self.peek_seq(b"/>") => {
                self.eat_seq(b"/>");
                Ok(Token::ShorthandCloseTag)
            }
            _ => Ok(Token::Char(self.next_byte().unwrap())),
        }
    }

    fn peek_token(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            let t = self.next_token()?;
            self.peeked = Some(t);
        }
        Ok(self.peeked.as_ref().unwrap())
    }
}

/// Parse a complete XML document, returning its root element.
///
/// # Errors
///
/// Returns `Err` for any lexical or structural error: an unterminated
/// string or comment, a non-identifier element name, a mismatched
/// open/close tag pair, or trailing content after the root element.
pub fn parse_str(input: &str) -> Result<XmlElement> {
    let mut lexer = Lexer::new(input.as_bytes().to_vec());
    if matches!(lexer.peek_token()?, Token::Eof) {
        return Err(Error::BadParameter("empty document".into()));
    }
    let root = parse_element(&mut lexer)?;
    if !matches!(lexer.next_token()?, Token::Eof) {
        return Err(Error::BadParameter("unexpected content after root element".into()));
    }
    Ok(root)
}

/// Parse a complete XML document from a file path.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read, or for any parse error
/// `parse_str` would report.
pub fn parse_file(path: &str) -> Result<XmlElement> {
    let contents = std::fs::read_to_string(path)?;
    parse_str(&contents)
}

fn parse_element(lexer: &mut Lexer) -> Result<XmlElement> {
    let name = match lexer.next_token()? {
        Token::OpenTag(name) => name,
        _ => return Err(Error::BadParameter(format!("expecting '<' at line {}", lexer.prev_line))),
    };
    let mut elem = XmlElement::new(name);

    while let Token::Id(_) = lexer.peek_token()? {
        let aname = match lexer.next_token()? {
            Token::Id(n) => n,
            _ => unreachable!(),
        };
        match lexer.next_token()? {
            Token::Char(b'=') => {}
            _ => return Err(Error::BadParameter(format!("expecting '=' following attribute '{aname}'"))),
        }
        let value = match lexer.next_token()? {
            Token::Str(v) => v,
            _ => return Err(Error::BadParameter(format!("expecting string value for attribute '{aname}'"))),
        };
        elem.attrs.insert(aname, value);
    }

    match lexer.next_token()? {
        Token::ShorthandCloseTag => return Ok(elem),
        Token::Char(b'>') => {}
        _ => return Err(Error::BadParameter(format!("expecting '/>' or '>' in element '{}'", elem.name))),
    }

    lexer.set_marker();
    if matches!(lexer.peek_token()?, Token::OpenTag(_)) {
        lexer.discard_marker();
        while matches!(lexer.peek_token()?, Token::OpenTag(_)) {
            elem.children.push(parse_element(lexer)?);
        }
    } else {
        lexer.rewind_to_marker();
        lexer.peeked = None;
        elem.text = read_text_content(lexer)?;
    }

    match lexer.next_token()? {
        Token::CloseTag(ename) if ename == elem.name => {}
        Token::CloseTag(ename) => {
            return Err(Error::BadParameter(format!("open/close tag mismatch: '{}' vs '{ename}'", elem.name)))
        }
        _ => return Err(Error::BadParameter(format!("expecting closing tag for '{}'", elem.name))),
    }
    if lexer.next_byte() != Some(b'>') {
        return Err(Error::BadParameter(format!("expecting '>' after closing tag for '{}'", elem.name)));
    }
    Ok(elem)
}

/// Gather character data up to the element's closing tag, transparently
/// consuming CDATA sections and comments embedded in the text.
///
/// Ordinary text runs are entity-unescaped; CDATA sections are copied
/// through verbatim, matching the original's `islit` split in
/// `append_to_payload` -- an `&amp;` typed literally in a CDATA block
/// must not come out as `&`.
fn read_text_content(lexer: &mut Lexer) -> Result<String> {
    let mut out = String::new();
    loop {
        let start = lexer.pos;
        while lexer.peek_byte().is_some_and(|c| c != b'<') {
            lexer.next_byte();
        }
        let segment = String::from_utf8_lossy(&lexer.buf[start..lexer.pos]).into_owned();
        out.push_str(&unescape(&segment)?);

        if lexer.eat_seq(b"<![CDATA[") {
            let cdata_start = lexer.pos;
            while !lexer.eat_seq(b"]]>") {
                if lexer.peek_byte().is_none() {
                    return Err(Error::BadParameter("unterminated CDATA section".into()));
                }
                lexer.next_byte();
            }
            let cdata_end = lexer.pos - 3; // length of "]]>"
            out.push_str(&String::from_utf8_lossy(&lexer.buf[cdata_start..cdata_end]));
            continue;
        }
        if lexer.peek_seq(b"<!--") {
            lexer.skip_space_and_comments()?;
            continue;
        }
        break;
    }
    Ok(out.trim().to_string())
}
