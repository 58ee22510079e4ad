//! Test complexity - statement count, nesting depth and cyclomatic complexity

use crate::config::ComplexityOptions;
use crate::parser::ast_helpers::{is_docstring, is_nested_scope, statements};
use crate::parser::TestUnit;
use crate::{Issue, Rule};
use tree_sitter::Node;

const STATEMENT_KINDS: &[&str] = &[
    "expression_statement",
    "return_statement",
    "pass_statement",
    "assert_statement",
    "raise_statement",
    "break_statement",
    "continue_statement",
    "delete_statement",
    "import_statement",
    "import_from_statement",
    "future_import_statement",
    "global_statement",
    "nonlocal_statement",
    "type_alias_statement",
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "match_statement",
    "function_definition",
    "class_definition",
    "decorated_definition",
];

/// Compound statements that open a nesting level
const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "match_statement",
];

const DECISION_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "except_group_clause",
    "boolean_operator",
    "conditional_expression",
    "for_in_clause",
    "if_clause",
];

/// Size and shape measurements of a test body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub statements: usize,
    pub max_depth: usize,
    pub cyclomatic: usize,
}

impl Metrics {
    pub fn measure(body: Node) -> Self {
        let mut metrics = Metrics {
            statements: 0,
            max_depth: 0,
            cyclomatic: 1,
        };
        let mut leading = true;
        for stmt in statements(body) {
            if leading && is_docstring(stmt) {
                leading = false;
                continue;
            }
            leading = false;
            metrics.visit(stmt, 0);
        }
        metrics
    }

    fn visit(&mut self, node: Node, depth: usize) {
        let kind = node.kind();
        if STATEMENT_KINDS.contains(&kind) {
            self.statements += 1;
        }
        // Nested definitions count once but are measured on their own
        if is_nested_scope(kind) || kind == "decorated_definition" {
            return;
        }
        if DECISION_KINDS.contains(&kind) {
            self.cyclomatic += 1;
        }
        let depth = if NESTING_KINDS.contains(&kind) {
            self.max_depth = self.max_depth.max(depth + 1);
            depth + 1
        } else {
            depth
        };
        for child in statements(node) {
            self.visit(child, depth);
        }
    }
}

pub fn analyze(unit: &TestUnit, options: &ComplexityOptions) -> Vec<Issue> {
    let metrics = Metrics::measure(unit.body);
    let mut issues = Vec::new();

    if metrics.statements > options.max_statements {
        issues.push(
            unit.issue(
                Rule::TooManyStatements,
                unit.line,
                format!(
                    "Test has {} statements (maximum {})",
                    metrics.statements, options.max_statements
                ),
            )
            .with_suggestion("Break down into smaller, focused tests or extract helper functions"),
        );
    }

    if metrics.max_depth > options.max_depth {
        issues.push(
            unit.issue(
                Rule::DeepNesting,
                unit.line,
                format!(
                    "Test has nesting depth of {} (maximum {})",
                    metrics.max_depth, options.max_depth
                ),
            )
            .with_suggestion("Reduce nesting by extracting conditions or using parametrize"),
        );
    }

    if metrics.cyclomatic > options.max_complexity {
        issues.push(
            unit.issue(
                Rule::HighCyclomatic,
                unit.line,
                format!(
                    "Test has cyclomatic complexity of {} (maximum {})",
                    metrics.cyclomatic, options.max_complexity
                ),
            )
            .with_suggestion("Simplify test logic or split into multiple tests"),
        );
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Parsed;
    use super::*;

    fn metrics(source: &str) -> Metrics {
        let parsed = Parsed::new(source);
        let unit = parsed.unit();
        Metrics::measure(unit.body)
    }

    #[test]
    fn positive_flat_statements_over_limit() {
        let mut source = String::from("def test_long_sequence_of_steps():\n    \"\"\"Docstring is not counted.\"\"\"\n");
        for i in 0..24 {
            source.push_str(&format!("    value_{} = {}\n", i, i));
        }
        source.push_str("    assert value_0 == 0\n");
        let parsed = Parsed::new(&source);
        let unit = parsed.unit();
        let issues = analyze(&unit, &ComplexityOptions::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, Rule::TooManyStatements);
        assert!(issues[0].message.contains("25 statements"));
    }

    #[test]
    fn positive_counts_nested_statements() {
        let m = metrics(
            "def test_loop_body():\n    for item in items:\n        if item:\n            total = item\n        else:\n            pass\n    assert total\n",
        );
        assert_eq!(m.statements, 5);
        assert_eq!(m.max_depth, 2);
        assert_eq!(m.cyclomatic, 3);
    }

    #[test]
    fn positive_deep_nesting() {
        let parsed = Parsed::new(
            "def test_nested_blocks():\n    with open_db() as db:\n        for row in db:\n            if row:\n                while row.next:\n                    assert row\n",
        );
        let unit = parsed.unit();
        let issues = analyze(&unit, &ComplexityOptions::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, Rule::DeepNesting);
    }

    #[test]
    fn positive_decision_points() {
        let m = metrics(
            "def test_branches():\n    if a and b or c:\n        x = 1 if d else 2\n    elif e:\n        pass\n    try:\n        go()\n    except ValueError:\n        pass\n    assert [v for v in xs if v]\n",
        );
        // if, 2 boolean operators, conditional, elif, except, for/if clauses
        assert_eq!(m.cyclomatic, 1 + 1 + 2 + 1 + 1 + 1 + 2);
        assert_eq!(m.max_depth, 1);
    }

    #[test]
    fn negative_nested_function_not_measured() {
        let m = metrics(
            "def test_with_helper():\n    def helper():\n        if a:\n            if b:\n                pass\n    assert helper() is None\n",
        );
        assert_eq!(m.statements, 2);
        assert_eq!(m.max_depth, 0);
        assert_eq!(m.cyclomatic, 1);
    }
}
