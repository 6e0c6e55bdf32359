//! Discardable capture sink mirroring the JSON reader.
//!
//! The reader pushes every retained rune here; a `discard` flag decides
//! whether the rune is kept. Toggling the flag at value boundaries is how
//! the evaluator cuts spans out of the stream. The sink also canonicalizes
//! as it goes: outside string literals a single space follows each `,` and
//! `:`, so captured spans come out in compact canonical form no matter how
//! the source was formatted.

use std::io::Write;
use std::mem;

const CHUNK: usize = 4096;

pub(crate) struct Capture<W: Write> {
    out: W,
    /// Span mode: completed captures are handed back through `take`
    /// instead of being flushed to `out`.
    spans: bool,
    discard: bool,
    buf: String,
    span: Option<String>,
    /// Byte length of the most recent write, so `unwrite` can retract it
    /// together with any separator space it appended.
    last_len: usize,
    wipeable: bool,
    in_string: bool,
    escaped: bool,
}

impl Capture<std::io::Sink> {
    /// A capture that accumulates spans for the query tree.
    pub(crate) fn to_spans() -> Self {
        Capture::make(std::io::sink(), true)
    }
}

impl<W: Write> Capture<W> {
    /// A capture that streams kept runes straight to `out`.
    pub(crate) fn to_stream(out: W) -> Self {
        Capture::make(out, false)
    }

    fn make(out: W, spans: bool) -> Self {
        Capture {
            out,
            spans,
            discard: true,
            buf: String::new(),
            span: None,
            last_len: 0,
            wipeable: false,
            in_string: false,
            escaped: false,
        }
    }

    pub(crate) fn write(&mut self, c: char) -> std::io::Result<()> {
        if self.discard {
            return Ok(());
        }
        let start = self.buf.len();
        self.buf.push(c);
        if !self.in_string && (c == ',' || c == ':') {
            self.buf.push(' ');
        }
        self.last_len = self.buf.len() - start;
        self.wipeable = true;
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
        } else if c == '"' {
            self.in_string = true;
        }
        if !self.spans && self.buf.len() >= CHUNK {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Retract the latest write. Only the single most recent write can be
    /// retracted; the reader uses this when it pushes a rune back.
    pub(crate) fn unwrite(&mut self) {
        if self.discard || !self.wipeable {
            return;
        }
        let keep = self.buf.len().saturating_sub(self.last_len);
        self.buf.truncate(keep);
        self.wipeable = false;
    }

    /// Flip between discarding and keeping. Ending a capture seals the
    /// buffered bytes into a span (span mode) or flushes them (stream
    /// mode).
    pub(crate) fn toggle(&mut self) -> std::io::Result<()> {
        if self.discard {
            self.discard = false;
            self.in_string = false;
            self.escaped = false;
            self.wipeable = false;
        } else {
            if self.spans {
                self.span = Some(mem::take(&mut self.buf));
            } else {
                self.out.write_all(self.buf.as_bytes())?;
                self.buf.clear();
            }
            self.discard = true;
        }
        Ok(())
    }

    /// The most recently completed span, if any. Stream mode never holds
    /// spans back.
    pub(crate) fn take(&mut self) -> Option<String> {
        self.span.take()
    }

    pub(crate) fn close(&mut self) -> std::io::Result<()> {
        if !self.buf.is_empty() && !self.spans {
            self.out.write_all(self.buf.as_bytes())?;
            self.buf.clear();
        }
        self.out.flush()
    }

    /// Drain the buffer to the output, keeping the latest write so a
    /// pending `unwrite` stays possible.
    fn flush_chunk(&mut self) -> std::io::Result<()> {
        let keep = if self.wipeable { self.last_len } else { 0 };
        let cut = self.buf.len().saturating_sub(keep);
        self.out.write_all(&self.buf.as_bytes()[..cut])?;
        self.buf.drain(..cut);
        Ok(())
    }
}
