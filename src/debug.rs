//! Indented dump of a parsed query tree, for the CLI debug mode.

use std::fmt::Write;

use crate::query::Query;

pub(crate) fn dump(query: &Query) -> String {
    let mut out = String::new();
    node(&mut out, query, 0);
    out
}

fn node(out: &mut String, query: &Query, level: usize) {
    let pad = "  ".repeat(level);
    match query {
        Query::Identity { .. } => {
            let _ = writeln!(out, "{pad}identity");
        }
        Query::Ident { name, next, .. } => match next {
            Some(next) => {
                let _ = writeln!(out, "{pad}ident({name}) [");
                node(out, next, level + 1);
                let _ = writeln!(out, "{pad}]");
            }
            None => {
                let _ = writeln!(out, "{pad}ident({name})");
            }
        },
        Query::Index { list, next, .. } => {
            let set = list.join(", ");
            match next {
                Some(next) => {
                    let _ = writeln!(out, "{pad}index({set}) [");
                    node(out, next, level + 1);
                    let _ = writeln!(out, "{pad}]");
                }
                None => {
                    let _ = writeln!(out, "{pad}index({set})");
                }
            }
        }
        Query::Any { list, .. } => children(out, "any", list, level),
        Query::Array { list, .. } => children(out, "array", list, level),
        Query::Object { fields, .. } => {
            let _ = writeln!(out, "{pad}object [");
            for (name, value) in fields {
                let _ = writeln!(out, "{pad}  key({name}):");
                node(out, value, level + 2);
            }
            let _ = writeln!(out, "{pad}]");
        }
        Query::Literal { text } => {
            let _ = writeln!(out, "{pad}literal({text})");
        }
        Query::Pipeline { head, stages } => {
            let _ = writeln!(out, "{pad}pipeline [");
            node(out, head, level + 1);
            for stage in stages {
                node(out, stage, level + 1);
            }
            let _ = writeln!(out, "{pad}]");
        }
        Query::Recurse { inner } => {
            let _ = writeln!(out, "{pad}recurse [");
            node(out, inner, level + 1);
            let _ = writeln!(out, "{pad}]");
        }
        Query::Pointer { target, .. } => {
            let _ = writeln!(out, "{pad}pointer [");
            node(out, target, level + 1);
            let _ = writeln!(out, "{pad}]");
        }
    }
}

fn children(out: &mut String, label: &str, list: &[Query], level: usize) {
    let pad = "  ".repeat(level);
    let _ = writeln!(out, "{pad}{label} [");
    for q in list {
        node(out, q, level + 1);
    }
    let _ = writeln!(out, "{pad}]");
}
