//! # jsift
//!
//! A streaming jq-style query engine. A query selects, restructures, or
//! pipelines fragments of a single JSON document; the document is read
//! once, rune by rune, and only the spans the query keeps are ever
//! buffered. Values are never reinterpreted: numbers and strings come out
//! byte-for-byte as they went in, with insignificant whitespace compacted
//! to a canonical `", "` / `": "` form.
//!
//! # Supported syntax
//!
//! | Expression | Meaning |
//! |------------|---------|
//! | `.` | Identity (the whole document) |
//! | `.user` | Field access |
//! | `."with space"` / `.'quoted'` | Quoted field access |
//! | `.items[0, 2]` | Selected array indices |
//! | `.items[]` | Every array element |
//! | `.a, .b` | Alternation, collect from both |
//! | `[.a, .b]` | Array construction |
//! | `{name: .user, age: 42}` | Object construction with literals |
//! | `{.user}` | Shorthand for `{user: .user}` |
//! | `.items[] \| {n: .name}` | Pipeline |
//! | `..name` | Recursive descent |
//! | `.foo \| $` | Re-apply the previous query to the stage input |
//!
//! # Example
//!
//! ```
//! let doc = br#"{"user": "midbel", "mail": "noreply@midbel.org"}"#;
//! let out = jsift::evaluate(&doc[..], ".user").unwrap();
//! assert_eq!(out, "\"midbel\"");
//!
//! let out = jsift::evaluate(&doc[..], "{name: .user}").unwrap();
//! assert_eq!(out, "{\"name\": \"midbel\"}");
//! ```

use std::fmt;
use std::io::{Read, Write};

mod debug;
mod parse;
mod query;
mod reader;
mod scan;
mod writer;

pub use parse::{parse, ParseError};
pub use query::{EvalError, Query, QueryTree};
pub use reader::{MalformedError, Position};

/// Any failure surfaced by parsing, reading, or evaluating.
#[derive(Debug)]
pub enum Error {
    /// The query text was rejected.
    Parse(ParseError),
    /// The JSON document violates the grammar; carries a position.
    Malformed(MalformedError),
    /// Captured values could not be combined.
    Eval(EvalError),
    /// The underlying reader or writer failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{e}"),
            Error::Malformed(e) => write!(f, "{e}"),
            Error::Eval(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Malformed(e) => Some(e),
            Error::Eval(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<MalformedError> for Error {
    fn from(e: MalformedError) -> Self {
        Error::Malformed(e)
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        Error::Eval(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Parse `query`, run it over the document in `input`, and render the
/// result.
pub fn evaluate<R: Read>(input: R, query: &str) -> Result<String, Error> {
    let mut tree = parse(query)?;
    evaluate_tree(input, &mut tree)
}

/// Run an already parsed tree over a document. The tree keeps its captured
/// values afterwards; [`QueryTree::clear`] readies it for another run.
pub fn evaluate_tree<R: Read>(input: R, tree: &mut QueryTree) -> Result<String, Error> {
    reader::execute(input, tree.root_mut())?;
    tree.render()
}

/// Like [`evaluate`], but returns the collected values one string at a
/// time instead of a single rendered value, one result per line.
pub fn evaluate_list<R: Read>(input: R, query: &str) -> Result<Vec<String>, Error> {
    let mut tree = parse(query)?;
    reader::execute(input, tree.root_mut())?;
    tree.collect()
}

/// Evaluate and write the result to `output`. An identity query streams
/// spans through without buffering the document; anything else evaluates
/// normally and writes the rendered text.
pub fn filter<R: Read, W: Write>(input: R, mut output: W, query: &str) -> Result<(), Error> {
    let mut tree = parse(query)?;
    if matches!(tree.root(), Query::Identity { .. }) {
        return reader::stream(input, output);
    }
    let text = evaluate_tree(input, &mut tree)?;
    output.write_all(text.as_bytes())?;
    output.flush()?;
    Ok(())
}
