//! Analysis rules for Python test units
//!
//! Each analyzer is a plain function `analyze(unit, options) -> Vec<Issue>`.
//! The set is closed; [`super::registry`] dispatches to them by [`Category`].
//!
//! [`Category`]: crate::Category

pub mod assertions;
pub mod complexity;
pub mod isolation;
pub mod naming;
pub mod patterns;
pub mod smells;

use crate::parser::ast_helpers::{call_method, node_line, statements};
use crate::parser::{call_name, walk_scope, TestUnit};
use tree_sitter::Node;

/// What form an assertion takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    /// `assert expr[, msg]`
    Statement,
    /// `pytest.raises(...)`, `pytest.warns(...)`, `pytest.deprecated_call()`
    Expectation,
    /// `self.assertEqual(...)`, `self.fail(...)`
    UnittestMethod,
    /// `mock.assert_called_once_with(...)` and friends
    MockVerification,
}

/// One assertion found in a unit body
#[derive(Debug, Clone, Copy)]
pub struct Assertion<'t> {
    pub node: Node<'t>,
    pub kind: AssertionKind,
    pub line: usize,
}

impl<'t> Assertion<'t> {
    /// Asserted expression of an `assert` statement
    pub fn expression(&self) -> Option<Node<'t>> {
        match self.kind {
            AssertionKind::Statement => statements(self.node).into_iter().next(),
            _ => None,
        }
    }

    /// Failure message of an `assert` statement
    pub fn message(&self) -> Option<Node<'t>> {
        match self.kind {
            AssertionKind::Statement => statements(self.node).into_iter().nth(1),
            _ => None,
        }
    }
}

const EXPECTATION_HELPERS: &[&str] = &["pytest.raises", "pytest.warns", "pytest.deprecated_call"];

const MOCK_VERIFICATIONS: &[&str] = &[
    "assert_called",
    "assert_called_once",
    "assert_called_with",
    "assert_called_once_with",
    "assert_any_call",
    "assert_has_calls",
    "assert_not_called",
    "assert_awaited",
    "assert_awaited_once",
    "assert_awaited_with",
    "assert_awaited_once_with",
    "assert_any_await",
    "assert_has_awaits",
    "assert_not_awaited",
];

/// Every assertion in the unit body in source order, not counting nested
/// function, lambda or class bodies
pub fn collect_assertions<'t>(unit: &TestUnit<'t>) -> Vec<Assertion<'t>> {
    let mut found = Vec::new();
    walk_scope(unit.body, |node| {
        let kind = match node.kind() {
            "assert_statement" => Some(AssertionKind::Statement),
            "call" => classify_call(node, unit),
            _ => None,
        };
        if let Some(kind) = kind {
            found.push(Assertion {
                node,
                kind,
                line: node_line(node),
            });
        }
    });
    found
}

fn classify_call(call: Node, unit: &TestUnit) -> Option<AssertionKind> {
    if let Some(name) = call_name(call, unit.source) {
        if EXPECTATION_HELPERS.contains(&unit.scope.resolve(&name).as_str()) {
            return Some(AssertionKind::Expectation);
        }
        if let Some(method) = name.strip_prefix("self.") {
            if method.starts_with("assert") || method == "fail" {
                return Some(AssertionKind::UnittestMethod);
            }
        }
    }
    let is_method_call = call
        .child_by_field_name("function")
        .is_some_and(|f| f.kind() == "attribute");
    match call_method(call, unit.source) {
        Some(method) if is_method_call && MOCK_VERIFICATIONS.contains(&method) => {
            Some(AssertionKind::MockVerification)
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::parser::{ModuleScope, PythonParser, TestDiscovery, TestUnit};
    use tree_sitter::Tree;

    /// Parsed module kept alive for the units borrowed from it
    pub struct Parsed {
        pub source: String,
        pub tree: Tree,
        pub scope: ModuleScope,
    }

    impl Parsed {
        pub fn new(source: &str) -> Self {
            let mut parser = PythonParser::new().unwrap();
            let tree = parser.parse(source).unwrap();
            let scope = ModuleScope::build(tree.root_node(), source);
            Self {
                source: source.to_string(),
                tree,
                scope,
            }
        }

        pub fn units(&self) -> Vec<TestUnit<'_>> {
            TestDiscovery::new(&self.source, "tests/test_sample.py", &self.scope)
                .discover(self.tree.root_node())
        }

        /// The single unit in the module
        pub fn unit(&self) -> TestUnit<'_> {
            let mut units = self.units();
            assert_eq!(units.len(), 1, "expected exactly one test unit");
            units.remove(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Parsed;
    use super::*;

    #[test]
    fn positive_collects_every_assertion_form() {
        let parsed = Parsed::new(
            r#"
import pytest
from unittest import mock

def test_forms():
    m = mock.Mock()
    assert m is not None, "mock exists"
    with pytest.raises(ValueError):
        int("x")
    m.assert_not_called()
"#,
        );
        let unit = parsed.unit();
        let kinds: Vec<AssertionKind> = collect_assertions(&unit).iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AssertionKind::Statement,
                AssertionKind::Expectation,
                AssertionKind::MockVerification,
            ]
        );
    }

    #[test]
    fn positive_unittest_methods() {
        let parsed = Parsed::new(
            "import unittest\nclass T(unittest.TestCase):\n    def test_x(self):\n        self.assertEqual(1, 1)\n        self.fail('no')\n",
        );
        let unit = parsed.unit();
        let found = collect_assertions(&unit);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.kind == AssertionKind::UnittestMethod));
    }

    #[test]
    fn negative_nested_helpers_not_counted() {
        let parsed = Parsed::new(
            "def test_outer():\n    def check():\n        assert True\n    f = lambda: check()\n    f()\n",
        );
        let unit = parsed.unit();
        assert!(collect_assertions(&unit).is_empty());
    }

    #[test]
    fn positive_statement_message() {
        let parsed = Parsed::new("def test_msg():\n    assert 1 == 1, 'equal'\n    assert 2\n");
        let unit = parsed.unit();
        let found = collect_assertions(&unit);
        assert!(found[0].message().is_some());
        assert!(found[1].message().is_none());
        assert_eq!(found[0].expression().map(|e| e.kind()), Some("comparison_operator"));
    }
}
