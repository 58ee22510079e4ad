//! Assertion quality - missing, insufficient, trivial and tautological assertions

use super::{collect_assertions, AssertionKind};
use crate::config::AssertionsOptions;
use crate::parser::ast_helpers::{literal_truthiness, statements, unwrap_parens};
use crate::parser::{node_line, Fingerprint, TestUnit};
use crate::{Issue, Rule};
use tree_sitter::Node;

pub fn analyze(unit: &TestUnit, options: &AssertionsOptions) -> Vec<Issue> {
    let mut issues = Vec::new();
    let assertions = collect_assertions(unit);

    if assertions.is_empty() {
        issues.push(
            unit.issue(Rule::MissingAssertions, unit.line, "Test has no assertions")
                .with_suggestion("Add at least one assertion to verify expected behavior"),
        );
    } else if assertions.len() < options.min_assertions {
        issues.push(unit.issue(
            Rule::InsufficientAssertions,
            unit.line,
            format!(
                "Test has only {} assertion(s), minimum is {}",
                assertions.len(),
                options.min_assertions
            ),
        ));
    }

    for assertion in assertions.iter().filter(|a| a.kind == AssertionKind::Statement) {
        let Some(expr) = assertion.expression() else {
            continue;
        };
        if literal_truthiness(expr, unit.source) == Some(true) {
            issues.push(
                unit.issue(
                    Rule::TrivialAssertion,
                    assertion.line,
                    format!("Trivial assertion: `assert {}` always passes", unit.text(expr)),
                )
                .with_suggestion("Replace with a meaningful assertion that tests actual behavior"),
            );
        } else if let Some(operand) = self_comparison(expr, unit.source) {
            issues.push(
                unit.issue(
                    Rule::TautologicalAssertion,
                    node_line(expr),
                    format!(
                        "Tautological assertion: `{}` is compared with itself",
                        unit.text(operand)
                    ),
                )
                .with_suggestion("Compare the result against an independently computed expected value"),
            );
        }
    }

    issues
}

/// Operand of a comparison whose neighbouring operands are structurally identical
fn self_comparison<'t>(expr: Node<'t>, source: &str) -> Option<Node<'t>> {
    let expr = unwrap_parens(expr);
    if expr.kind() != "comparison_operator" {
        return None;
    }
    let operands = statements(expr);
    operands.windows(2).find_map(|pair| {
        (Fingerprint::of(pair[0], source) == Fingerprint::of(pair[1], source)).then_some(pair[0])
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Parsed;
    use super::*;

    fn rules(source: &str, options: &AssertionsOptions) -> Vec<Rule> {
        let parsed = Parsed::new(source);
        let unit = parsed.unit();
        analyze(&unit, options).into_iter().map(|i| i.rule).collect()
    }

    #[test]
    fn positive_missing_assertion() {
        let parsed = Parsed::new("def test_nothing_checked():\n    return\n");
        let unit = parsed.unit();
        let issues = analyze(&unit, &AssertionsOptions::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, Rule::MissingAssertions);
        assert_eq!(issues[0].severity, crate::Severity::Error);
        assert_eq!(issues[0].line, 1);
        assert_eq!(issues[0].test.as_deref(), Some("test_nothing_checked"));
    }

    #[test]
    fn positive_trivial_literals() {
        let found = rules(
            "def test_trivial_values():\n    assert True\n    assert 1\n    assert 'text'\n    assert (True)\n",
            &AssertionsOptions::default(),
        );
        assert_eq!(found, vec![Rule::TrivialAssertion; 4]);
    }

    #[test]
    fn negative_falsy_and_computed_are_not_trivial() {
        let found = rules(
            "def test_falsy_values():\n    assert False\n    assert 0 or compute()\n    assert result\n",
            &AssertionsOptions::default(),
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn positive_tautology_ignores_formatting() {
        let parsed = Parsed::new(
            "def test_same_sides():\n    assert x.total( 1 ) == (x.total(1))\n    assert 'a' == \"a\"\n",
        );
        let unit = parsed.unit();
        let issues = analyze(&unit, &AssertionsOptions::default());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.rule == Rule::TautologicalAssertion));
        assert_eq!(issues[1].line, 3);
    }

    #[test]
    fn negative_fstring_is_computed_not_trivial() {
        let found = rules(
            "def test_renders_user_name():\n    assert f'{user.name}'\n    assert f'{user.name}' == 'ada'\n",
            &AssertionsOptions::default(),
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn negative_string_prefixes_change_the_value() {
        let found = rules(
            "def test_encodes_payload():\n    assert b'abc' == 'abc'\n    assert r'\\n' == '\\n'\n    assert f'{x}' == '{x}'\n",
            &AssertionsOptions::default(),
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn positive_tautology_after_escape_decoding() {
        let found = rules(
            "def test_decodes_escape():\n    assert '\\x41' == 'A'\n",
            &AssertionsOptions::default(),
        );
        assert_eq!(found, vec![Rule::TautologicalAssertion]);
    }

    #[test]
    fn negative_different_operands() {
        let found = rules(
            "def test_different_sides():\n    assert x.total(1) == x.total(2)\n",
            &AssertionsOptions::default(),
        );
        assert!(found.is_empty());
    }

    #[test]
    fn positive_insufficient_assertions() {
        let options = AssertionsOptions { min_assertions: 3 };
        let found = rules("def test_partial_check():\n    assert compute() == 2\n", &options);
        assert_eq!(found, vec![Rule::InsufficientAssertions]);
    }

    #[test]
    fn negative_raises_counts_as_assertion() {
        let found = rules(
            "import pytest\n\ndef test_rejects_bad_input():\n    with pytest.raises(ValueError):\n        int('x')\n",
            &AssertionsOptions::default(),
        );
        assert!(found.is_empty());
    }
}
