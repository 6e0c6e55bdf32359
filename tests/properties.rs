//! Property-based tests over generated documents.

use proptest::prelude::*;

/// Canonical JSON text: compact, `", "` and `": "` separators, string
/// contents with no escapes. Built directly as text so the expected
/// output of an identity query is the input itself.
fn json_text() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        Just("null".to_string()),
        Just("true".to_string()),
        Just("false".to_string()),
        "(0|[1-9][0-9]{0,3})",
        "(0|[1-9][0-9]{0,2})\\.[0-9]{1,3}",
        "[1-9][0-9]{0,2}[eE][+-]?[1-9][0-9]?",
        "\"[a-z ]{0,8}\"",
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|elements| {
                format!("[{}]", elements.join(", "))
            }),
            prop::collection::vec(("[a-z]{1,5}", inner), 0..4).prop_map(|fields| {
                let body: Vec<String> = fields
                    .iter()
                    .map(|(k, v)| format!("\"{k}\": {v}"))
                    .collect();
                format!("{{{}}}", body.join(", "))
            }),
        ]
    })
}

/// Spread a canonical document over several lines. String contents above
/// contain no separators, so textual replacement is safe.
fn prettify(doc: &str) -> String {
    doc.replace(", ", ",\n\t ").replace(": ", " :\n ")
}

proptest! {
    /// Identity returns the canonical compact form.
    #[test]
    fn prop_identity_is_canonical(doc in json_text()) {
        let out = jsift::evaluate(doc.as_bytes(), ".").unwrap();
        prop_assert_eq!(out, doc);
    }

    /// Reformatting the document never changes the result.
    #[test]
    fn prop_identity_ignores_layout(doc in json_text()) {
        let pretty = prettify(&doc);
        let out = jsift::evaluate(pretty.as_bytes(), ".").unwrap();
        prop_assert_eq!(out, doc);
    }

    /// A cleared tree evaluates like a fresh parse.
    #[test]
    fn prop_tree_reuse_after_clear(doc in json_text()) {
        let mut tree = jsift::parse(".").unwrap();
        let first = jsift::evaluate_tree(doc.as_bytes(), &mut tree).unwrap();
        tree.clear();
        let second = jsift::evaluate_tree(doc.as_bytes(), &mut tree).unwrap();
        prop_assert_eq!(first, second);
    }

    /// The array constructor brackets exactly the collected values.
    #[test]
    fn prop_array_constructor_brackets_field(doc in json_text()) {
        let values = jsift::evaluate_list(doc.as_bytes(), ".a").unwrap();
        let wrapped = jsift::evaluate(doc.as_bytes(), "[.a]").unwrap();
        prop_assert_eq!(format!("[{}]", values.join(", ")), wrapped);
    }

    /// Evaluation state never leaks between clones.
    #[test]
    fn prop_clone_before_evaluation_stays_clean(doc in json_text()) {
        let tree = jsift::parse(".").unwrap();
        let mut used = tree.clone();
        let _ = jsift::evaluate_tree(doc.as_bytes(), &mut used).unwrap();
        prop_assert_eq!(&tree, &jsift::parse(".").unwrap());
    }
}
