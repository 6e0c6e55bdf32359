//! Recursive-descent parser for query expressions.
//!
//! The parser keeps one current and one peek token and builds the query
//! tree directly. Comma separation builds an alternation at the top level,
//! an element list inside constructors, and an index set inside `[…]`;
//! `|` chains pipeline stages; `$` re-enters a previously completed
//! top-level unit. Identity stages inside a pipeline are elided.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::query::{Query, QueryTree};
use crate::scan::{Scanner, Token};

/// Query text rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parse error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ParseError {}

/// Parse query text into a reusable [`QueryTree`].
pub fn parse(input: &str) -> Result<QueryTree, ParseError> {
    let mut parser = Parser::new(input);
    let root = parser.query(true)?;
    if parser.curr != Token::Eof {
        return Err(parser.fail(format!(
            "unexpected {} after query",
            describe(&parser.curr)
        )));
    }
    Ok(QueryTree::new(root))
}

fn describe(token: &Token) -> String {
    match token {
        Token::Eof => "end of input".to_string(),
        Token::Literal { text, .. } => format!("'{text}'"),
        Token::Number(text) => format!("'{text}'"),
        Token::Dot => "'.'".to_string(),
        Token::DotDot => "'..'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Pipe => "'|'".to_string(),
        Token::Dollar => "'$'".to_string(),
        Token::Lparen => "'('".to_string(),
        Token::Rparen => "')'".to_string(),
        Token::Lsquare => "'['".to_string(),
        Token::Rsquare => "']'".to_string(),
        Token::Lcurly => "'{'".to_string(),
        Token::Rcurly => "'}'".to_string(),
        Token::Invalid(text) => format!("invalid input '{text}'"),
    }
}

struct Parser<'a> {
    scan: Scanner<'a>,
    curr: Token,
    peek: Token,
    pos: usize,
    /// Completed top-level units, targets for `$` back-references.
    units: Vec<Rc<Query>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        let mut scan = Scanner::new(input);
        let curr = scan.next_token();
        let pos = scan.pos();
        let peek = scan.next_token();
        Parser {
            scan,
            curr,
            peek,
            pos,
            units: Vec::new(),
        }
    }

    fn advance(&mut self) {
        self.pos = self.scan.pos();
        self.curr = std::mem::replace(&mut self.peek, self.scan.next_token());
    }

    fn fail(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.pos)
    }

    /// `Query := Pipe ( "," Pipe )*`
    fn query(&mut self, top: bool) -> Result<Query, ParseError> {
        let mut list = vec![self.pipe(top)?];
        while self.curr == Token::Comma {
            self.advance();
            if self.curr == Token::Eof {
                return Err(self.fail("expected query after ','"));
            }
            list.push(self.pipe(top)?);
        }
        if list.len() == 1 {
            // An alternation of one is that query; this also collapses a
            // lone identity.
            let mut list = list.into_iter();
            if let Some(only) = list.next() {
                return Ok(only);
            }
            return Ok(Query::identity());
        }
        Ok(Query::any(list))
    }

    /// `Pipe := Unit ( "|" Unit )*`, identity stages elided.
    fn pipe(&mut self, top: bool) -> Result<Query, ParseError> {
        let mut units = Vec::new();
        loop {
            let unit = self.unit()?;
            if top {
                self.units.push(Rc::new(unit.clone()));
            }
            if !matches!(unit, Query::Identity { .. }) {
                units.push(unit);
            }
            if self.curr != Token::Pipe {
                break;
            }
            self.advance();
            if self.curr == Token::Eof {
                return Err(self.fail("unexpected end of input after '|'"));
            }
        }
        let mut units = units.into_iter();
        let Some(head) = units.next() else {
            return Ok(Query::identity());
        };
        let stages: Vec<Query> = units.collect();
        if stages.is_empty() {
            return Ok(head);
        }
        Ok(Query::pipeline(head, stages))
    }

    /// `Unit := Dot | DotDot Trail | Array | Object | "$" Number? | "(" Query ")"`
    fn unit(&mut self) -> Result<Query, ParseError> {
        match &self.curr {
            Token::Dot => {
                self.advance();
                self.dot()
            }
            Token::DotDot => {
                self.advance();
                let inner = self.recurse_target()?;
                Ok(Query::recurse(inner))
            }
            Token::Lsquare => self.array_constructor(),
            Token::Lcurly => self.object_constructor(),
            Token::Dollar => {
                self.advance();
                self.pointer()
            }
            Token::Lparen => {
                self.advance();
                let q = self.query(false)?;
                if self.curr != Token::Rparen {
                    return Err(self.fail(format!(
                        "group: expected ')' instead of {}",
                        describe(&self.curr)
                    )));
                }
                self.advance();
                Ok(q)
            }
            Token::Eof => Err(self.fail("unexpected end of input")),
            other => Err(self.fail(format!(
                "expected '.', '[' or '{{' instead of {}",
                describe(other)
            ))),
        }
    }

    /// After a leading `.`: an identifier chain, an index, or identity.
    fn dot(&mut self) -> Result<Query, ParseError> {
        match &self.curr {
            Token::Literal { .. } => self.trail_ident(),
            Token::Lsquare => self.trail_index(),
            Token::Number(text) => Err(self.fail(format!(
                "expected identifier after '.' instead of '{text}'"
            ))),
            Token::Invalid(text) => Err(self.fail(format!(
                "identifier: invalid input '{text}'"
            ))),
            _ => Ok(Query::identity()),
        }
    }

    /// What `..` applies to: an identifier chain or an index.
    fn recurse_target(&mut self) -> Result<Query, ParseError> {
        match &self.curr {
            Token::Literal { .. } => self.trail_ident(),
            Token::Lsquare => self.trail_index(),
            other => Err(self.fail(format!(
                "expected identifier after '..' instead of {}",
                describe(other)
            ))),
        }
    }

    /// `Ident ( "." Ident | ".." Trail | Index )?`
    fn trail_ident(&mut self) -> Result<Query, ParseError> {
        let Token::Literal { text, .. } = &self.curr else {
            return Err(self.fail("expected identifier"));
        };
        let name = text.clone();
        self.advance();
        let next = match &self.curr {
            Token::Dot => {
                self.advance();
                match &self.curr {
                    Token::Literal { .. } => Some(self.trail_ident()?),
                    Token::Lsquare => Some(self.trail_index()?),
                    other => {
                        return Err(self.fail(format!(
                            "expected identifier after '.' instead of {}",
                            describe(other)
                        )))
                    }
                }
            }
            Token::DotDot => {
                self.advance();
                Some(Query::recurse(self.recurse_target()?))
            }
            Token::Lsquare => Some(self.trail_index()?),
            _ => None,
        };
        Ok(match next {
            Some(next) => Query::ident_next(name, next),
            None => Query::ident(name),
        })
    }

    /// `"[" ( Number ( "," Number )* )? "]" ( "." Ident | ".." Trail )?`
    fn trail_index(&mut self) -> Result<Query, ParseError> {
        // Past the '['.
        self.advance();
        let mut list: Vec<String> = Vec::new();
        if self.curr != Token::Rsquare {
            loop {
                match &self.curr {
                    Token::Number(text) => {
                        list.push(text.clone());
                        self.advance();
                    }
                    Token::Eof => return Err(self.fail("index: unexpected end of input")),
                    other => {
                        return Err(self.fail(format!(
                            "index: number expected instead of {}",
                            describe(other)
                        )))
                    }
                }
                match &self.curr {
                    Token::Comma => self.advance(),
                    Token::Rsquare => break,
                    Token::Eof => return Err(self.fail("index: unexpected end of input")),
                    other => {
                        return Err(self.fail(format!(
                            "index: expected ',' or ']' instead of {}",
                            describe(other)
                        )))
                    }
                }
            }
        }
        // Past the ']'.
        self.advance();
        let next = match &self.curr {
            Token::Dot => {
                self.advance();
                match &self.curr {
                    Token::Literal { .. } => Some(self.trail_ident()?),
                    Token::Lsquare => Some(self.trail_index()?),
                    other => {
                        return Err(self.fail(format!(
                            "expected identifier after '.' instead of {}",
                            describe(other)
                        )))
                    }
                }
            }
            Token::DotDot => {
                self.advance();
                Some(Query::recurse(self.recurse_target()?))
            }
            _ => None,
        };
        let refs: Vec<&str> = list.iter().map(String::as_str).collect();
        Ok(match next {
            Some(next) => Query::index_next(&refs, next),
            None => Query::index(&refs),
        })
    }

    /// `"[" ( Item ( "," Item )* )? "]"` (array constructor).
    fn array_constructor(&mut self) -> Result<Query, ParseError> {
        // Past the '['.
        self.advance();
        let mut list = Vec::new();
        if self.curr == Token::Rsquare {
            self.advance();
            return Ok(Query::array(list));
        }
        loop {
            list.push(self.item()?);
            match &self.curr {
                Token::Comma => {
                    self.advance();
                }
                Token::Rsquare => {
                    self.advance();
                    return Ok(Query::array(list));
                }
                Token::Eof => return Err(self.fail("array: unexpected end of input")),
                other => {
                    return Err(self.fail(format!(
                        "array: expected ',' or ']' instead of {}",
                        describe(other)
                    )))
                }
            }
        }
    }

    /// `"{" ( Field ( "," Field )* )? "}"` (object constructor).
    fn object_constructor(&mut self) -> Result<Query, ParseError> {
        // Past the '{'.
        self.advance();
        let mut fields = IndexMap::new();
        if self.curr == Token::Rcurly {
            self.advance();
            return Ok(object_from(fields));
        }
        loop {
            let (name, value) = self.field()?;
            fields.insert(name, value);
            match &self.curr {
                Token::Comma => {
                    self.advance();
                }
                Token::Rcurly => {
                    self.advance();
                    return Ok(object_from(fields));
                }
                Token::Eof => return Err(self.fail("object: unexpected end of input")),
                other => {
                    return Err(self.fail(format!(
                        "object: expected ',' or '}}' instead of {}",
                        describe(other)
                    )))
                }
            }
        }
    }

    /// `Field := Literal ":" Item | "." Literal…` (shorthand keeps the
    /// leading name as the key).
    fn field(&mut self) -> Result<(String, Query), ParseError> {
        match &self.curr {
            Token::Literal { text, .. } => {
                let name = text.clone();
                self.advance();
                if self.curr != Token::Colon {
                    return Err(self.fail("object: expected ':' after literal"));
                }
                self.advance();
                let value = self.item()?;
                Ok((name, value))
            }
            Token::Dot => {
                self.advance();
                let Token::Literal { text, .. } = &self.curr else {
                    return Err(self.fail(format!(
                        "object: expected identifier after '.' instead of {}",
                        describe(&self.curr)
                    )));
                };
                let name = text.clone();
                let value = self.trail_ident()?;
                Ok((name, value))
            }
            other => Err(self.fail(format!(
                "object: expected field or '.' instead of {}",
                describe(other)
            ))),
        }
    }

    /// `Item := Literal | Number | Unit`; constants keep their rendered
    /// form: strings quoted, keywords and numbers bare.
    fn item(&mut self) -> Result<Query, ParseError> {
        match &self.curr {
            Token::Literal { text, quoted } => {
                let constant = if !quoted && matches!(text.as_str(), "true" | "false" | "null") {
                    text.clone()
                } else {
                    format!("\"{text}\"")
                };
                self.advance();
                Ok(Query::literal(constant))
            }
            Token::Number(text) => {
                let constant = text.clone();
                self.advance();
                Ok(Query::literal(constant))
            }
            _ => self.unit(),
        }
    }

    /// `$` with an optional index into the completed units of the group.
    fn pointer(&mut self) -> Result<Query, ParseError> {
        let target = match &self.curr {
            Token::Number(text) => {
                let n: usize = text
                    .parse()
                    .map_err(|_| self.fail(format!("'$': bad index '{text}'")))?;
                let found = self.units.get(n).cloned();
                self.advance();
                found.ok_or_else(|| self.fail(format!("'$': no query at index {n}")))?
            }
            _ => match self.units.last().cloned() {
                Some(rc) => rc,
                None => return Err(self.fail("'$': no previous query to point at")),
            },
        };
        Ok(Query::pointer_to(target))
    }
}

fn object_from(fields: IndexMap<String, Query>) -> Query {
    Query::object_map(fields)
}
