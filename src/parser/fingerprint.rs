//! Structural fingerprints of expression subtrees.
//!
//! Two expressions get the same fingerprint when they have the same AST shape
//! and literal values, regardless of whitespace, comments, redundant
//! parentheses, quote style, string escapes or numeric underscores. Bytes,
//! text and f-strings never share a form. Operands of `==`, `!=`, `is` and
//! `is not` are ordered canonically, so `x == 1` and `1 == x` match.

use super::ast_helpers::{node_text, string_literal, string_prefix, unwrap_parens};
use sha2::{Digest, Sha256};
use tree_sitter::Node;

/// Hex-encoded SHA-256 of an expression's canonical form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(node: Node, source: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(canonical_form(node, source).as_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// S-expression rendering that ignores formatting
pub fn canonical_form(node: Node, source: &str) -> String {
    let mut out = String::new();
    write_canonical(node, source, &mut out);
    out
}

const SYMMETRIC_OPERATORS: &[&str] = &["==", "!=", "is", "is not"];

fn write_canonical(node: Node, source: &str, out: &mut String) {
    let node = unwrap_parens(node);
    match node.kind() {
        "string" | "concatenated_string" => {
            if let Some(literal) = string_literal(node, source) {
                let kind = if literal.bytes { "bytes" } else { "string" };
                out.push_str(&format!("({} {:?})", kind, literal.value));
                return;
            }
            if node.kind() == "string" {
                write_formatted_string(node, source, out);
                return;
            }
        }
        "integer" | "float" => {
            let text: String = node_text(node, source)
                .chars()
                .filter(|c| *c != '_')
                .collect();
            out.push_str(&format!("({} {})", node.kind(), text.to_ascii_lowercase()));
            return;
        }
        "comparison_operator" => {
            if let Some(sorted) = symmetric_comparison(node, source) {
                out.push_str(&sorted);
                return;
            }
        }
        _ => {}
    }

    if node.named_child_count() == 0 {
        out.push_str(&format!("({} {})", node.kind(), node_text(node, source)));
        return;
    }

    out.push('(');
    out.push_str(node.kind());
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_extra() || matches!(child.kind(), "(" | ")" | ",") {
            continue;
        }
        out.push(' ');
        if child.is_named() {
            write_canonical(child, source, out);
        } else {
            out.push_str(child.kind());
        }
    }
    out.push(')');
}

/// f-string: literal parts as text, interpolations structurally
fn write_formatted_string(node: Node, source: &str, out: &mut String) {
    out.push_str(&format!("(fstring {:?}", string_prefix(node, source)));
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "string_start" | "string_end" | "comment" => {}
            "interpolation" => {
                out.push(' ');
                write_canonical(child, source, out);
            }
            _ => out.push_str(&format!(" {:?}", node_text(child, source))),
        }
    }
    out.push(')');
}

/// Canonical form of a single symmetric comparison with operands sorted
fn symmetric_comparison(node: Node, source: &str) -> Option<String> {
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.is_extra() {
            continue;
        }
        if child.is_named() {
            operands.push(canonical_form(child, source));
        } else {
            operators.push(child.kind());
        }
    }
    if operands.len() != 2 || operators.len() != 1 || !SYMMETRIC_OPERATORS.contains(&operators[0]) {
        return None;
    }
    operands.sort();
    Some(format!(
        "(comparison_operator {} {} {})",
        operands[0], operators[0], operands[1]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PythonParser;
    use tree_sitter::Tree;

    fn parse(source: &str) -> Tree {
        PythonParser::new().unwrap().parse(source).unwrap()
    }

    fn assert_exprs(tree: &Tree) -> Vec<Node<'_>> {
        let mut exprs = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            if stmt.kind() == "assert_statement" {
                let mut c = stmt.walk();
                let first = stmt.named_children(&mut c).next();
                exprs.extend(first);
            }
        }
        exprs
    }

    #[test]
    fn test_formatting_does_not_matter() {
        let source = "assert x == 1\nassert (x  ==   1)  # same\n";
        let tree = parse(source);
        let exprs = assert_exprs(&tree);
        assert_eq!(exprs.len(), 2);
        assert_eq!(
            Fingerprint::of(exprs[0], source),
            Fingerprint::of(exprs[1], source)
        );
    }

    #[test]
    fn test_quote_style_does_not_matter() {
        let source = "assert name == 'bob'\nassert name == \"bob\"\n";
        let tree = parse(source);
        let exprs = assert_exprs(&tree);
        assert_eq!(
            Fingerprint::of(exprs[0], source),
            Fingerprint::of(exprs[1], source)
        );
    }

    #[test]
    fn test_equality_is_symmetric() {
        let source = "assert x == 1\nassert 1 == x\n";
        let tree = parse(source);
        let exprs = assert_exprs(&tree);
        assert_eq!(
            Fingerprint::of(exprs[0], source),
            Fingerprint::of(exprs[1], source)
        );
    }

    #[test]
    fn test_different_values_differ() {
        let source = "assert x == 1\nassert x == 2\nassert x < 1\nassert 1 < x\n";
        let tree = parse(source);
        let exprs = assert_exprs(&tree);
        let prints: Vec<_> = exprs.iter().map(|e| Fingerprint::of(*e, source)).collect();
        assert_ne!(prints[0], prints[1]);
        assert_ne!(prints[0], prints[2]);
        assert_ne!(prints[2], prints[3]);
    }

    fn operands_match(source: &str) -> Vec<bool> {
        let tree = parse(source);
        assert_exprs(&tree)
            .into_iter()
            .map(|expr| {
                let operands: Vec<Node> = {
                    let mut c = expr.walk();
                    expr.named_children(&mut c).collect()
                };
                Fingerprint::of(operands[0], source) == Fingerprint::of(operands[1], source)
            })
            .collect()
    }

    #[test]
    fn test_bytes_and_text_differ() {
        assert_eq!(
            operands_match("assert b'abc' == 'abc'\nassert b'abc' == B\"abc\"\n"),
            vec![false, true]
        );
    }

    #[test]
    fn test_raw_and_escaped_strings() {
        let source = "assert r'\\n' == '\\n'\nassert '\\x41' == 'A'\nassert r'abc' == 'abc'\nassert u'abc' == 'abc'\n";
        assert_eq!(operands_match(source), vec![false, true, true, true]);
    }

    #[test]
    fn test_fstring_differs_from_plain_text() {
        let source = "assert f'{x}' == '{x}'\nassert f'{x}' == F'{ x }'\nassert f'{x}' == f'{y}'\n";
        assert_eq!(operands_match(source), vec![false, true, false]);
    }

    #[test]
    fn test_numeric_underscores_normalized() {
        let source = "assert total == 1_000\nassert total == 1000\n";
        let tree = parse(source);
        let exprs = assert_exprs(&tree);
        assert_eq!(
            canonical_form(exprs[0], source),
            canonical_form(exprs[1], source)
        );
    }
}
