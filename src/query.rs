//! Query trees: the parsed form of a query and its evaluation state.
//!
//! A query is a single tagged sum type. Each node carries the spans the
//! evaluator captured for it (`values`) plus whatever bookkeeping its
//! variant needs to route those spans (`last` for alternation and array
//! constructors, `keys` for object constructors). The same tree can be
//! driven over several documents as long as [`Query::clear`] runs in
//! between; two concurrent evaluations need two clones.
//!
//! Rendering lives here too: every variant knows both its *inner* form
//! (`collect`, a flat list of value strings used when the node feeds a
//! constructor or a pipeline stage) and its *outer* form (`render`, the
//! final output text).

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::Error;

/// Error raised while collecting or combining captured values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        EvalError {
            message: message.into(),
        }
    }

    fn no_selection() -> Self {
        EvalError::new("no query selected")
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Outcome of offering an object key or array index to a node.
pub(crate) enum Step<'a> {
    /// The key is selected. Descend into the child, or capture the whole
    /// sub-value here when there is no child to descend into.
    Into(Option<&'a mut Query>),
    /// The key is selected by recursive descent; keep walking the sub-value
    /// with the same node.
    Deeper(&'a mut Query),
    /// The key is not selected; consume the sub-value and drop it.
    Skip,
}

/// One node of a parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `.`: the whole current value.
    Identity { values: Vec<String> },
    /// `.name`: descend into an object field.
    Ident {
        name: String,
        next: Option<Box<Query>>,
        values: Vec<String>,
    },
    /// `.[…]`: descend into array elements; an empty list selects all.
    Index {
        list: Vec<String>,
        next: Option<Box<Query>>,
        values: Vec<String>,
    },
    /// `a, b`: alternation; every branch accumulates independently.
    Any {
        list: Vec<Query>,
        last: Option<usize>,
    },
    /// `[…]` constructor.
    Array {
        list: Vec<Query>,
        last: Option<usize>,
    },
    /// `{…}` constructor. `keys` records the order in which fields first
    /// matched; serialization follows it.
    Object {
        fields: IndexMap<String, Query>,
        keys: Vec<String>,
        last: Option<usize>,
    },
    /// A constant inserted into a constructor, stored render-ready.
    Literal { text: String },
    /// `head | q1 | q2 …`: each stage consumes the previous stage's
    /// outputs as fresh input documents.
    Pipeline { head: Box<Query>, stages: Vec<Query> },
    /// `..`: apply the inner query at every depth.
    Recurse { inner: Box<Query> },
    /// `$`: a non-owning back-edge to an earlier top-level unit. The
    /// shared snapshot is never mutated; evaluation happens on a private
    /// copy materialized on first use and dropped by `clear`.
    Pointer {
        target: Rc<Query>,
        live: Option<Box<Query>>,
    },
}

impl Query {
    pub fn identity() -> Self {
        Query::Identity { values: Vec::new() }
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Query::Ident {
            name: name.into(),
            next: None,
            values: Vec::new(),
        }
    }

    pub fn ident_next(name: impl Into<String>, next: Query) -> Self {
        Query::Ident {
            name: name.into(),
            next: Some(Box::new(next)),
            values: Vec::new(),
        }
    }

    pub fn index(list: &[&str]) -> Self {
        Query::Index {
            list: list.iter().map(|s| s.to_string()).collect(),
            next: None,
            values: Vec::new(),
        }
    }

    pub fn index_next(list: &[&str], next: Query) -> Self {
        Query::Index {
            list: list.iter().map(|s| s.to_string()).collect(),
            next: Some(Box::new(next)),
            values: Vec::new(),
        }
    }

    pub fn any(list: Vec<Query>) -> Self {
        Query::Any { list, last: None }
    }

    pub fn array(list: Vec<Query>) -> Self {
        Query::Array { list, last: None }
    }

    pub fn object(entries: Vec<(&str, Query)>) -> Self {
        let mut fields = IndexMap::new();
        for (name, q) in entries {
            fields.insert(name.to_string(), q);
        }
        Query::object_map(fields)
    }

    pub(crate) fn object_map(fields: IndexMap<String, Query>) -> Self {
        Query::Object {
            fields,
            keys: Vec::new(),
            last: None,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Query::Literal { text: text.into() }
    }

    pub fn pipeline(head: Query, stages: Vec<Query>) -> Self {
        Query::Pipeline {
            head: Box::new(head),
            stages,
        }
    }

    pub fn recurse(inner: Query) -> Self {
        Query::Recurse {
            inner: Box::new(inner),
        }
    }

    pub fn pointer(target: Query) -> Self {
        Query::Pointer {
            target: Rc::new(target),
            live: None,
        }
    }

    pub(crate) fn pointer_to(target: Rc<Query>) -> Self {
        Query::Pointer { target, live: None }
    }

    /// Would this node select `key`? Pure lookahead; no state changes.
    pub(crate) fn matches(&self, key: &str) -> bool {
        match self {
            Query::Identity { .. } => true,
            Query::Ident { name, .. } => name == key,
            Query::Index { list, .. } => list.is_empty() || list.iter().any(|i| i == key),
            Query::Any { list, .. } | Query::Array { list, .. } => {
                list.iter().any(|q| q.matches(key))
            }
            Query::Object { fields, .. } => fields.values().any(|q| q.matches(key)),
            Query::Literal { .. } => false,
            Query::Pipeline { head, .. } => head.matches(key),
            Query::Recurse { .. } => true,
            Query::Pointer { target, .. } => target.matches(key),
        }
    }

    /// Offer an object key or array index to the node and learn what the
    /// evaluator should do with the corresponding sub-value.
    pub(crate) fn next(&mut self, key: &str) -> Step<'_> {
        if !self.matches(key) {
            return Step::Skip;
        }
        if matches!(self, Query::Recurse { .. }) {
            let inner_matches = match self {
                Query::Recurse { inner } => inner.matches(key),
                _ => unreachable!(),
            };
            if inner_matches {
                return match self {
                    Query::Recurse { inner } => inner.next(key),
                    _ => unreachable!(),
                };
            }
            return Step::Deeper(self);
        }
        match self {
            Query::Identity { .. } => Step::Into(None),
            Query::Ident { next, .. } | Query::Index { next, .. } => {
                Step::Into(next.as_deref_mut())
            }
            Query::Any { list, last } | Query::Array { list, last } => {
                let Some(i) = list.iter().position(|q| q.matches(key)) else {
                    return Step::Skip;
                };
                *last = Some(i);
                match list.get_mut(i) {
                    Some(q) => q.next(key),
                    None => Step::Skip,
                }
            }
            Query::Object { fields, keys, last } => {
                let Some(i) = fields.values().position(|q| q.matches(key)) else {
                    return Step::Skip;
                };
                *last = Some(i);
                let Some((name, child)) = fields.get_index_mut(i) else {
                    return Step::Skip;
                };
                if !keys.iter().any(|k| k == name) {
                    keys.push(name.clone());
                }
                child.next(key)
            }
            Query::Literal { .. } => Step::Skip,
            Query::Pipeline { head, .. } => head.next(key),
            Query::Pointer { target, live } => {
                let scratch = live.get_or_insert_with(|| {
                    let mut copy = (**target).clone();
                    copy.clear();
                    Box::new(copy)
                });
                scratch.next(key)
            }
            // Handled before the match.
            Query::Recurse { .. } => Step::Skip,
        }
    }

    /// Hand a captured span to the node. Composite nodes forward it to the
    /// child that matched during the latest `next`.
    pub(crate) fn update(&mut self, span: String) -> Result<(), EvalError> {
        match self {
            Query::Identity { values }
            | Query::Ident { values, .. }
            | Query::Index { values, .. } => {
                values.push(span);
                Ok(())
            }
            Query::Any { list, last } | Query::Array { list, last } => match last.take() {
                Some(i) => match list.get_mut(i) {
                    Some(q) => q.update(span),
                    None => Err(EvalError::no_selection()),
                },
                None => Err(EvalError::no_selection()),
            },
            Query::Object { fields, last, .. } => match *last {
                Some(i) => match fields.get_index_mut(i) {
                    Some((_, q)) => q.update(span),
                    None => Err(EvalError::no_selection()),
                },
                None => Err(EvalError::no_selection()),
            },
            Query::Literal { .. } => Err(EvalError::no_selection()),
            Query::Pipeline { head, .. } => head.update(span),
            Query::Recurse { inner } => inner.update(span),
            Query::Pointer { live, .. } => match live.as_deref_mut() {
                Some(q) => q.update(span),
                None => Err(EvalError::no_selection()),
            },
        }
    }

    /// Reset all captured state, leaving the structure intact.
    pub fn clear(&mut self) {
        match self {
            Query::Identity { values } => values.clear(),
            Query::Ident { next, values, .. } | Query::Index { next, values, .. } => {
                values.clear();
                if let Some(q) = next {
                    q.clear();
                }
            }
            Query::Any { list, last } | Query::Array { list, last } => {
                *last = None;
                for q in list {
                    q.clear();
                }
            }
            Query::Object { fields, keys, last } => {
                keys.clear();
                *last = None;
                for q in fields.values_mut() {
                    q.clear();
                }
            }
            Query::Literal { .. } => {}
            Query::Pipeline { head, stages } => {
                head.clear();
                for q in stages {
                    q.clear();
                }
            }
            Query::Recurse { inner } => inner.clear(),
            // A single indirection only: the shared target stays untouched.
            Query::Pointer { live, .. } => *live = None,
        }
    }

    /// Did evaluation leave any captured value anywhere under this node?
    pub(crate) fn has_values(&self) -> bool {
        match self {
            Query::Identity { values } => !values.is_empty(),
            Query::Ident { next, values, .. } | Query::Index { next, values, .. } => {
                match next {
                    Some(q) => q.has_values(),
                    None => !values.is_empty(),
                }
            }
            Query::Any { list, .. } | Query::Array { list, .. } => {
                list.iter().any(Query::has_values)
            }
            Query::Object { fields, keys, .. } => {
                !keys.is_empty() || fields.values().any(Query::has_values)
            }
            Query::Literal { .. } => false,
            Query::Pipeline { head, .. } => head.has_values(),
            Query::Recurse { inner } => inner.has_values(),
            Query::Pointer { live, .. } => live.as_deref().is_some_and(Query::has_values),
        }
    }

    /// True when the selection spine can fan one input out into several
    /// values: an all-elements index or a recursive descent. Pipelines use
    /// it to decide whether a single output still renders as an array.
    fn is_iterating(&self) -> bool {
        match self {
            Query::Identity { .. } | Query::Literal { .. } => false,
            Query::Ident { next, .. } => next.as_deref().is_some_and(Query::is_iterating),
            Query::Index { list, next, .. } => {
                list.is_empty() || next.as_deref().is_some_and(Query::is_iterating)
            }
            Query::Any { list, .. } | Query::Array { list, .. } => {
                list.iter().any(Query::is_iterating)
            }
            Query::Object { .. } => false,
            Query::Pipeline { head, .. } => head.is_iterating(),
            Query::Recurse { .. } => true,
            Query::Pointer { target, .. } => target.is_iterating(),
        }
    }

    /// The node's values as a flat list, one string per value. This is the
    /// form constructors and pipeline stages consume.
    pub(crate) fn collect(&mut self) -> Result<Vec<String>, Error> {
        match self {
            Query::Identity { values } => Ok(values.clone()),
            Query::Ident { next, values, .. } | Query::Index { next, values, .. } => {
                match next {
                    Some(q) => q.collect(),
                    None => Ok(values.clone()),
                }
            }
            // Each branch contributes its value list as one array.
            Query::Any { list, .. } | Query::Array { list, .. } => {
                let mut out = Vec::with_capacity(list.len());
                for q in list {
                    let values = q.collect()?;
                    out.push(write_array(&values));
                }
                Ok(out)
            }
            Query::Object { .. } => {
                let rows = self.object_rows()?;
                Ok(rows)
            }
            Query::Literal { text } => Ok(vec![text.clone()]),
            Query::Pipeline { head, stages } => run_stages(head, stages),
            Query::Recurse { inner } => inner.collect(),
            Query::Pointer { live, .. } => match live.as_deref_mut() {
                Some(q) => q.collect(),
                None => Ok(Vec::new()),
            },
        }
    }

    /// The final textual form of the node's result.
    pub(crate) fn render(&mut self) -> Result<String, Error> {
        match self {
            Query::Identity { values } => Ok(leaf(values)),
            Query::Ident { next, values, .. } | Query::Index { next, values, .. } => {
                match next {
                    Some(q) => q.render(),
                    None => Ok(leaf(values)),
                }
            }
            Query::Any { list, .. } => {
                let mut rendered = Vec::with_capacity(list.len());
                for q in list {
                    rendered.push(q.render()?);
                }
                Ok(write_array(&rendered))
            }
            Query::Array { list, .. } => {
                let mut flat = Vec::new();
                for q in list {
                    flat.extend(q.collect()?);
                }
                Ok(write_array(&flat))
            }
            Query::Object { .. } => {
                let rows = self.object_rows()?;
                match rows.as_slice() {
                    [single] => Ok(single.clone()),
                    _ => Ok(write_array(&rows)),
                }
            }
            Query::Literal { text } => Ok(text.clone()),
            Query::Pipeline { head, stages } => {
                let iterating = head.is_iterating();
                let outs = run_stages(head, stages)?;
                match outs.as_slice() {
                    [single] if !iterating => Ok(single.clone()),
                    _ => Ok(write_array(&outs)),
                }
            }
            Query::Recurse { inner } => inner.render(),
            Query::Pointer { live, .. } => match live.as_deref_mut() {
                Some(q) => q.render(),
                None => Ok(write_array(&[])),
            },
        }
    }

    /// Object constructor rows: field columns zipped to the longest column,
    /// broadcasting singletons and padding the rest with `null`.
    fn object_rows(&mut self) -> Result<Vec<String>, Error> {
        let Query::Object { fields, keys, .. } = self else {
            return Ok(Vec::new());
        };
        // Fields that matched, in first-seen order, then the rest as
        // declared (constant columns among them).
        let mut order = keys.clone();
        for name in fields.keys() {
            if !order.iter().any(|k| k == name) {
                order.push(name.clone());
            }
        }
        let mut columns = Vec::with_capacity(order.len());
        for name in &order {
            let values = match fields.get_mut(name) {
                Some(q) => q.collect()?,
                None => Vec::new(),
            };
            columns.push(values);
        }
        let height = columns.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut rows = Vec::with_capacity(height);
        for r in 0..height {
            let mut row = Vec::with_capacity(columns.len());
            for col in &columns {
                let value = match col.as_slice() {
                    [only] => only.clone(),
                    _ => match col.get(r) {
                        Some(v) => v.clone(),
                        None => "null".to_string(),
                    },
                };
                row.push(value);
            }
            rows.push(write_object(&order, &row));
        }
        Ok(rows)
    }
}

/// A leaf's render: one value verbatim, several as an array.
fn leaf(values: &[String]) -> String {
    match values {
        [single] => single.clone(),
        _ => write_array(values),
    }
}

pub(crate) fn write_array(values: &[String]) -> String {
    let mut out = String::from("[");
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(v);
    }
    out.push(']');
    out
}

fn write_object(keys: &[String], values: &[String]) -> String {
    let mut out = String::from("{");
    for (i, (k, v)) in keys.iter().zip(values).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('"');
        out.push_str(k);
        out.push_str("\": ");
        out.push_str(v);
    }
    out.push('}');
    out
}

/// Feed the head's values through each stage in turn. Every value becomes a
/// fresh input document for the stage; the stage is cleared in between and
/// its outputs accumulate into the next list.
fn run_stages(head: &mut Query, stages: &mut [Query]) -> Result<Vec<String>, Error> {
    let mut list = head.collect()?;
    for stage in stages.iter_mut() {
        let mut next = Vec::new();
        for input in &list {
            stage.clear();
            crate::reader::execute(input.as_bytes(), stage)?;
            next.append(&mut stage.collect()?);
        }
        list = next;
    }
    Ok(list)
}

/// A parsed query, ready to be evaluated against JSON documents.
///
/// The tree is mutated while a document streams through it; call
/// [`QueryTree::clear`] to drive the same tree over another document.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTree {
    root: Query,
}

impl QueryTree {
    pub(crate) fn new(root: Query) -> Self {
        QueryTree { root }
    }

    pub fn root(&self) -> &Query {
        &self.root
    }

    pub(crate) fn root_mut(&mut self) -> &mut Query {
        &mut self.root
    }

    /// Reset captured values and bookkeeping; the structure stays intact.
    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Render the evaluated tree into the final output string.
    ///
    /// An alternation that matched exactly one of its branches renders that
    /// branch alone; this unwrapping applies at the top level only.
    pub fn render(&mut self) -> Result<String, Error> {
        if let Query::Any { list, .. } = &mut self.root {
            let captured: Vec<usize> = list
                .iter()
                .enumerate()
                .filter(|(_, q)| q.has_values())
                .map(|(i, _)| i)
                .collect();
            if let [only] = captured.as_slice() {
                if let Some(q) = list.get_mut(*only) {
                    return q.render();
                }
            }
        }
        self.root.render()
    }

    pub(crate) fn collect(&mut self) -> Result<Vec<String>, Error> {
        self.root.collect()
    }

    /// Human-readable dump of the tree structure, one node per line.
    pub fn dump(&self) -> String {
        crate::debug::dump(&self.root)
    }
}
