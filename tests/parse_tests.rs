//! Parser acceptance, rejection, and tree-shape tests.

use jsift::{parse, Query};

#[test]
fn test_accepted_queries() {
    let queries = [
        ".",
        ". | .ident",
        ".ident | .ident",
        ".ident",
        ".\"ident\"",
        ".'ident'",
        ".'ident'[]",
        ".'parent'.\"child\"",
        ".first.last",
        ".first,.last",
        ".[]",
        ".[0, 1, 2]",
        ".array[]",
        ".array[].ident",
        "{}",
        "{ident: .ident}",
        "{.ident}",
        "[]",
        "[.ident]",
        "[.ident] | {data: .ident} | .data",
        ".ident[] | {x: .ident, y: (.ident | .ident)}",
        "[.ident, (.ident | .ident), .ident]",
        "[.a, (.b | .c)]",
        "..name",
        "..foo.bar",
        ".foo..bar",
        ".foo | $",
        ".foo | $0",
        "{.user, age: 42}",
        "{.user, active: true}",
        "[.scores, 42, \"foobar\"]",
    ];
    for query in queries {
        if let Err(err) = parse(query) {
            panic!("{query}: parse error: {err}");
        }
    }
}

#[test]
fn test_rejected_queries() {
    let queries = [
        ". |",
        "|",
        "ident",
        ".ident.",
        "._ident",
        ".1ident",
        ".first,.last,",
        ".'first",
        ".array[1, 2",
        ".array[",
        ".array[1 2",
        ".[",
        ".]",
        ".array[\"foobar\"]",
        "$",
        "{a .b}",
        "(.a",
    ];
    for query in queries {
        if parse(query).is_ok() {
            panic!("{query}: invalid query parsed successfully");
        }
    }
}

#[test]
fn test_identity() {
    assert_eq!(parse(".").unwrap().root(), &Query::identity());
}

#[test]
fn test_leading_identity_stage_is_elided() {
    assert_eq!(parse(". | .foobar").unwrap().root(), &Query::ident("foobar"));
}

#[test]
fn test_inner_identity_stage_is_elided() {
    assert_eq!(
        parse(".foo | . | .bar").unwrap().root(),
        &Query::pipeline(Query::ident("foo"), vec![Query::ident("bar")]),
    );
}

#[test]
fn test_trailing_identity_stage_is_elided() {
    assert_eq!(
        parse(".foo | .bar | .").unwrap().root(),
        &Query::pipeline(Query::ident("foo"), vec![Query::ident("bar")]),
    );
}

#[test]
fn test_ident_chain() {
    assert_eq!(
        parse(".foo.bar").unwrap().root(),
        &Query::ident_next("foo", Query::ident("bar")),
    );
}

#[test]
fn test_quoted_ident() {
    assert_eq!(parse(".\"a b\"").unwrap().root(), &Query::ident("a b"));
}

#[test]
fn test_recurse_shapes() {
    assert_eq!(
        parse("..foobar").unwrap().root(),
        &Query::recurse(Query::ident("foobar")),
    );
    assert_eq!(
        parse("..foo.bar").unwrap().root(),
        &Query::recurse(Query::ident_next("foo", Query::ident("bar"))),
    );
    assert_eq!(
        parse(".foo..bar").unwrap().root(),
        &Query::ident_next("foo", Query::recurse(Query::ident("bar"))),
    );
}

#[test]
fn test_index_shapes() {
    assert_eq!(parse(".[]").unwrap().root(), &Query::index(&[]));
    assert_eq!(
        parse(".[1, 2, 3]").unwrap().root(),
        &Query::index(&["1", "2", "3"]),
    );
    assert_eq!(
        parse(".[].foobar").unwrap().root(),
        &Query::index_next(&[], Query::ident("foobar")),
    );
    assert_eq!(
        parse(".[1, 2].foobar").unwrap().root(),
        &Query::index_next(&["1", "2"], Query::ident("foobar")),
    );
    assert_eq!(
        parse(".list[]").unwrap().root(),
        &Query::ident_next("list", Query::index(&[])),
    );
    assert_eq!(
        parse(".list[].foobar").unwrap().root(),
        &Query::ident_next("list", Query::index_next(&[], Query::ident("foobar"))),
    );
}

#[test]
fn test_alternation_shapes() {
    assert_eq!(
        parse(".foo,.bar").unwrap().root(),
        &Query::any(vec![Query::ident("foo"), Query::ident("bar")]),
    );
    assert_eq!(
        parse(".foo[],.bar").unwrap().root(),
        &Query::any(vec![
            Query::ident_next("foo", Query::index(&[])),
            Query::ident("bar"),
        ]),
    );
}

#[test]
fn test_alternation_of_pipes() {
    assert_eq!(
        parse(".foo | .bar, .bar | .foo").unwrap().root(),
        &Query::any(vec![
            Query::pipeline(Query::ident("foo"), vec![Query::ident("bar")]),
            Query::pipeline(Query::ident("bar"), vec![Query::ident("foo")]),
        ]),
    );
}

#[test]
fn test_pipeline_shapes() {
    assert_eq!(
        parse(".[] | .foo | .bar").unwrap().root(),
        &Query::pipeline(
            Query::index(&[]),
            vec![Query::ident("foo"), Query::ident("bar")],
        ),
    );
}

#[test]
fn test_object_shapes() {
    assert_eq!(
        parse("{foo: .foo, bar: .bar}").unwrap().root(),
        &Query::object(vec![
            ("foo", Query::ident("foo")),
            ("bar", Query::ident("bar")),
        ]),
    );
    // Shorthand uses the field name as the key.
    assert_eq!(
        parse("{.foo,.bar}").unwrap().root(),
        &Query::object(vec![
            ("foo", Query::ident("foo")),
            ("bar", Query::ident("bar")),
        ]),
    );
}

#[test]
fn test_object_with_literals() {
    assert_eq!(
        parse("{.user, age: 42}").unwrap().root(),
        &Query::object(vec![
            ("user", Query::ident("user")),
            ("age", Query::literal("42")),
        ]),
    );
    assert_eq!(
        parse("{.user, active: true}").unwrap().root(),
        &Query::object(vec![
            ("user", Query::ident("user")),
            ("active", Query::literal("true")),
        ]),
    );
}

#[test]
fn test_array_shapes() {
    assert_eq!(
        parse("[.foo, .bar]").unwrap().root(),
        &Query::array(vec![Query::ident("foo"), Query::ident("bar")]),
    );
    assert_eq!(
        parse("[[.foo],.bar]").unwrap().root(),
        &Query::array(vec![
            Query::array(vec![Query::ident("foo")]),
            Query::ident("bar"),
        ]),
    );
}

#[test]
fn test_array_literals_keep_render_form() {
    // Quoted strings stay quoted, numbers stay bare.
    assert_eq!(
        parse("[.scores, 42, \"foobar\"]").unwrap().root(),
        &Query::array(vec![
            Query::ident("scores"),
            Query::literal("42"),
            Query::literal("\"foobar\""),
        ]),
    );
}

#[test]
fn test_pointer_snapshots_previous_unit() {
    assert_eq!(
        parse(".foobar | $").unwrap().root(),
        &Query::pipeline(
            Query::ident("foobar"),
            vec![Query::pointer(Query::ident("foobar"))],
        ),
    );
}

#[test]
fn test_pointer_by_index() {
    assert_eq!(
        parse(".a | .b | $0").unwrap().root(),
        &Query::pipeline(
            Query::ident("a"),
            vec![Query::ident("b"), Query::pointer(Query::ident("a"))],
        ),
    );
}

#[test]
fn test_error_messages_name_the_construct() {
    let err = parse(".a,.b,").unwrap_err();
    assert!(err.message.contains("expected query after ','"), "{err}");

    let err = parse(".array[\"foobar\"]").unwrap_err();
    assert!(err.message.contains("index"), "{err}");

    let err = parse("{a .b}").unwrap_err();
    assert!(err.message.contains("object"), "{err}");

    let err = parse("$").unwrap_err();
    assert!(err.message.contains("$"), "{err}");
}

#[test]
fn test_clone_equals_original() {
    let tree = parse(".items[] | {x: .name, sub: [.items[] | {x: .name}]}").unwrap();
    assert_eq!(tree.clone(), tree);
}
