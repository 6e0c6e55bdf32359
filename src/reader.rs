//! Streaming JSON reader and query-driven traversal.
//!
//! The reader consumes a document one rune at a time from a buffered byte
//! source, validating strictly as it goes: escape sequences, the number
//! grammar, and trailing content are all checked, and every diagnostic
//! carries a line and column. At each object key and array index it asks
//! the query tree whether to descend, to capture the sub-value as a span,
//! or to consume and drop it. Captured spans flow through the
//! [`Capture`](crate::writer) sink, which compacts them on the way.
//!
//! There is no DOM and no lookahead beyond a single rune of pushback; a
//! document is read exactly once per evaluation.

use std::fmt;
use std::io::{BufReader, Read, Write};

use crate::query::{Query, Step};
use crate::writer::Capture;
use crate::Error;

/// A line/column pair, 1-based on the line, counted in runes on the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A JSON syntax violation, with the position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedError {
    pub file: String,
    pub position: Position,
    pub message: String,
}

impl fmt::Display for MalformedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.file, self.position, self.message
        )
    }
}

impl std::error::Error for MalformedError {}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t' || c == '\r' || c == '\n'
}

pub(crate) struct Evaluator<R: Read, W: Write> {
    src: BufReader<R>,
    cap: Capture<W>,
    file: String,
    pending: Option<char>,
    prev: Position,
    curr: Position,
    keep_blank: bool,
}

/// Evaluate a query tree over a document, collecting spans into the tree.
pub(crate) fn execute<R: Read>(src: R, query: &mut Query) -> Result<(), Error> {
    Evaluator::new(src, Capture::to_spans()).run(query)
}

/// Stream the whole document, compacted, straight to `out`.
pub(crate) fn stream<R: Read, W: Write>(src: R, out: W) -> Result<(), Error> {
    let mut ev = Evaluator::new(src, Capture::to_stream(out));
    ev.capture_toggle()?;
    ev.traverse(None)?;
    ev.capture_toggle()?;
    ev.end_of_document()?;
    ev.close()
}

impl<R: Read, W: Write> Evaluator<R, W> {
    pub(crate) fn new(src: R, cap: Capture<W>) -> Self {
        Evaluator {
            src: BufReader::new(src),
            cap,
            file: String::from("<input>"),
            pending: None,
            prev: Position { line: 1, column: 0 },
            curr: Position { line: 1, column: 0 },
            keep_blank: false,
        }
    }

    pub(crate) fn run(&mut self, query: &mut Query) -> Result<(), Error> {
        if matches!(query, Query::Identity { .. }) {
            // Identity keeps the whole document: one span, no navigation.
            self.capture_toggle()?;
            self.traverse(None)?;
            self.capture_toggle()?;
            if let Some(span) = self.cap.take() {
                query.update(span).map_err(Error::Eval)?;
            }
        } else {
            self.traverse(Some(query))?;
        }
        self.end_of_document()?;
        self.close()
    }

    // ── rune supply ─────────────────────────────────────────────────

    fn next_byte(&mut self) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        loop {
            match self.src.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    fn next_char(&mut self) -> Result<Option<char>, Error> {
        let Some(b0) = self.next_byte()? else {
            return Ok(None);
        };
        if b0 < 0x80 {
            return Ok(Some(b0 as char));
        }
        let width = match b0 {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(self.malformed("invalid UTF-8 sequence")),
        };
        let mut bytes = [b0, 0, 0, 0];
        for slot in bytes.iter_mut().take(width).skip(1) {
            match self.next_byte()? {
                Some(b) if (0x80..=0xBF).contains(&b) => *slot = b,
                _ => return Err(self.malformed("invalid UTF-8 sequence")),
            }
        }
        match std::str::from_utf8(&bytes[..width]) {
            Ok(s) => Ok(s.chars().next()),
            Err(_) => Err(self.malformed("invalid UTF-8 sequence")),
        }
    }

    /// Next significant rune: blanks are skipped unless we are inside a
    /// string literal. Every returned rune is mirrored into the capture.
    fn read(&mut self) -> Result<Option<char>, Error> {
        loop {
            let c = match self.pending.take() {
                Some(c) => c,
                None => match self.next_char()? {
                    Some(c) => c,
                    None => return Ok(None),
                },
            };
            self.prev = self.curr;
            if c == '\n' {
                self.curr.line += 1;
                self.curr.column = 0;
            }
            self.curr.column += 1;
            if self.keep_blank || !is_blank(c) {
                self.cap.write(c).map_err(Error::Io)?;
                return Ok(Some(c));
            }
        }
    }

    fn read_must(&mut self, expected: &str) -> Result<char, Error> {
        match self.read()? {
            Some(c) => Ok(c),
            None => Err(self.malformed(format!("unexpected end of input, expected {expected}"))),
        }
    }

    /// Push the rune back; the capture retracts it too.
    fn unread(&mut self, c: char) {
        self.pending = Some(c);
        self.cap.unwrite();
        self.curr = self.prev;
    }

    fn malformed(&self, message: impl Into<String>) -> Error {
        Error::Malformed(MalformedError {
            file: self.file.clone(),
            position: self.curr,
            message: message.into(),
        })
    }

    fn capture_toggle(&mut self) -> Result<(), Error> {
        self.cap.toggle().map_err(Error::Io)
    }

    fn close(&mut self) -> Result<(), Error> {
        self.cap.close().map_err(Error::Io)
    }

    fn end_of_document(&mut self) -> Result<(), Error> {
        match self.read()? {
            Some(_) => Err(self.malformed("trailing content after JSON value")),
            None => Ok(()),
        }
    }

    // ── values ──────────────────────────────────────────────────────

    fn traverse(&mut self, query: Option<&mut Query>) -> Result<(), Error> {
        let c = self.read_must("JSON value")?;
        match c {
            '"' => self.string_lit().map(|_| ()),
            't' | 'f' | 'n' => self.keyword(c),
            '-' | '0'..='9' => self.number(c),
            '[' => self.array(query),
            '{' => self.object(query),
            _ => Err(self.malformed(format!("unexpected character '{c}'"))),
        }
    }

    /// String body after the opening quote. Blanks inside are significant;
    /// the raw content (escapes untouched) comes back for key matching.
    fn string_lit(&mut self) -> Result<String, Error> {
        self.keep_blank = true;
        let body = self.string_body();
        self.keep_blank = false;
        body
    }

    fn string_body(&mut self) -> Result<String, Error> {
        let mut buf = String::new();
        loop {
            let c = self.read_must("closing '\"'")?;
            if c == '"' {
                return Ok(buf);
            }
            if c == '\\' {
                self.escape(&mut buf)?;
                continue;
            }
            buf.push(c);
        }
    }

    fn escape(&mut self, buf: &mut String) -> Result<(), Error> {
        buf.push('\\');
        let c = self.read_must("escape character")?;
        match c {
            'n' | 'f' | 'b' | 'r' | 't' | '"' | '\\' | '/' => {
                buf.push(c);
                Ok(())
            }
            'u' => {
                buf.push(c);
                for _ in 0..4 {
                    let h = self.read_must("hex digit")?;
                    if !h.is_ascii_hexdigit() {
                        return Err(self.malformed(format!("'{h}' is not a hex character")));
                    }
                    buf.push(h);
                }
                Ok(())
            }
            _ => Err(self.malformed(format!("unknown escape \\{c}"))),
        }
    }

    fn keyword(&mut self, first: char) -> Result<(), Error> {
        let mut word = String::from(first);
        loop {
            match self.read()? {
                Some(c) if c.is_ascii_lowercase() => word.push(c),
                Some(c) => {
                    self.unread(c);
                    break;
                }
                None => break,
            }
        }
        match word.as_str() {
            "true" | "false" | "null" => Ok(()),
            _ => Err(self.malformed(format!("'{word}': identifier not recognized"))),
        }
    }

    fn number(&mut self, first: char) -> Result<(), Error> {
        let mut lead = first;
        if lead == '-' {
            lead = self.read_must("digit")?;
            if !lead.is_ascii_digit() {
                return Err(self.malformed("expected digit after '-'"));
            }
        }
        if lead == '0' {
            return match self.read()? {
                Some('.') => self.fraction(),
                Some('e' | 'E') => self.exponent(),
                Some(c) if c.is_ascii_digit() => {
                    Err(self.malformed("leading zeros are not allowed in numbers"))
                }
                Some(c) => {
                    self.unread(c);
                    Ok(())
                }
                None => Ok(()),
            };
        }
        loop {
            match self.read()? {
                Some(c) if c.is_ascii_digit() => continue,
                Some('.') => return self.fraction(),
                Some('e' | 'E') => return self.exponent(),
                Some(c) => {
                    self.unread(c);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn fraction(&mut self) -> Result<(), Error> {
        let c = self.read_must("digit")?;
        if !c.is_ascii_digit() {
            return Err(self.malformed("expected digit after '.'"));
        }
        loop {
            match self.read()? {
                Some(c) if c.is_ascii_digit() => continue,
                Some('e' | 'E') => return self.exponent(),
                Some(c) => {
                    self.unread(c);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn exponent(&mut self) -> Result<(), Error> {
        let mut c = self.read_must("digit")?;
        if c == '+' || c == '-' {
            c = self.read_must("digit")?;
        }
        if !c.is_ascii_digit() || c == '0' {
            return Err(self.malformed("expected nonzero leading digit in exponent"));
        }
        loop {
            match self.read()? {
                Some(c) if c.is_ascii_digit() => continue,
                Some(c) => {
                    self.unread(c);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    // ── containers ──────────────────────────────────────────────────

    fn object(&mut self, mut query: Option<&mut Query>) -> Result<(), Error> {
        let c = self.read_must("object key or '}'")?;
        if c == '}' {
            return Ok(());
        }
        self.unread(c);
        loop {
            let key = self.key()?;
            self.entry(query.as_deref_mut(), &key)?;
            if self.end_object()? {
                return Ok(());
            }
        }
    }

    fn key(&mut self) -> Result<String, Error> {
        let c = self.read_must("'\"'")?;
        if c != '"' {
            return Err(self.malformed(format!("key: expected '\"' instead of '{c}'")));
        }
        let key = self.string_lit()?;
        let c = self.read_must("':'")?;
        if c != ':' {
            return Err(self.malformed(format!("key: expected ':' instead of '{c}'")));
        }
        Ok(key)
    }

    /// True when the closing `}` was consumed.
    fn end_object(&mut self) -> Result<bool, Error> {
        match self.read_must("',' or '}'")? {
            '}' => Ok(true),
            ',' => {
                let c = self.read_must("object key")?;
                if c == '}' {
                    return Err(self.malformed("object: unexpected '}' after ','"));
                }
                self.unread(c);
                Ok(false)
            }
            c => Err(self.malformed(format!("object: expected ',' or '}}' instead of '{c}'"))),
        }
    }

    fn array(&mut self, mut query: Option<&mut Query>) -> Result<(), Error> {
        let c = self.read_must("array value or ']'")?;
        if c == ']' {
            return Ok(());
        }
        self.unread(c);
        let mut index = 0usize;
        loop {
            self.entry(query.as_deref_mut(), &index.to_string())?;
            if self.end_array()? {
                return Ok(());
            }
            index += 1;
        }
    }

    /// True when the closing `]` was consumed.
    fn end_array(&mut self) -> Result<bool, Error> {
        match self.read_must("',' or ']'")? {
            ']' => Ok(true),
            ',' => {
                let c = self.read_must("array value")?;
                if c == ']' {
                    return Err(self.malformed("array: unexpected ']' after ','"));
                }
                self.unread(c);
                Ok(false)
            }
            c => Err(self.malformed(format!("array: expected ',' or ']' instead of '{c}'"))),
        }
    }

    /// One object member or array element, routed by the query.
    fn entry(&mut self, query: Option<&mut Query>, key: &str) -> Result<(), Error> {
        let Some(query) = query else {
            return self.traverse(None);
        };
        match query.next(key) {
            Step::Skip => self.traverse(None),
            Step::Deeper(same) => self.traverse(Some(same)),
            Step::Into(Some(child)) => self.traverse(Some(child)),
            Step::Into(None) => {
                self.capture_toggle()?;
                self.traverse(None)?;
                self.capture_toggle()?;
                if let Some(span) = self.cap.take() {
                    query.update(span).map_err(Error::Eval)?;
                }
                Ok(())
            }
        }
    }
}
