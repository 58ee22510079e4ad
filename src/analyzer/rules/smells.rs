//! Test smells - assertion roulette, duplicate asserts, ignored tests,
//! magic numbers and eager tests

use super::{collect_assertions, Assertion, AssertionKind};
use crate::config::SmellsOptions;
use crate::parser::ast_helpers::numeric_value;
use crate::parser::{call_name, node_line, walk_scope, Fingerprint, TestUnit};
use crate::{Issue, Rule};
use std::collections::{BTreeSet, HashSet};
use tree_sitter::Node;

const ALLOWED_NUMBERS: &[f64] = &[0.0, 1.0, -1.0];

/// Builtins that never count as the code under test
const BUILTIN_CALLS: &[&str] = &[
    "abs", "all", "any", "bool", "bytes", "callable", "chr", "dict", "dir", "divmod", "enumerate",
    "filter", "float", "format", "frozenset", "getattr", "hasattr", "hash", "id", "int",
    "isinstance", "issubclass", "iter", "len", "list", "map", "max", "min", "next", "open", "ord",
    "pow", "print", "range", "repr", "reversed", "round", "set", "setattr", "sorted", "str", "sum",
    "super", "tuple", "type", "vars", "zip",
];

pub fn analyze(unit: &TestUnit, options: &SmellsOptions) -> Vec<Issue> {
    let mut issues = Vec::new();
    let statements: Vec<Assertion> = collect_assertions(unit)
        .into_iter()
        .filter(|a| a.kind == AssertionKind::Statement)
        .collect();

    if let Some(marker) = &unit.markers.skipped_by {
        issues.push(
            unit.issue(
                Rule::IgnoredTest,
                unit.line,
                format!("Test is skipped with @{}", marker),
            )
            .with_suggestion("Track skipped tests and re-enable them when ready"),
        );
    }

    let without_message = statements.iter().filter(|a| a.message().is_none()).count();
    if statements.len() > 1 && without_message > options.max_assertions_without_message {
        issues.push(
            unit.issue(
                Rule::AssertionRoulette,
                unit.line,
                format!(
                    "Test has {} assertions without messages (threshold: {})",
                    without_message, options.max_assertions_without_message
                ),
            )
            .with_suggestion("Add messages to assertions: assert x == y, 'expected x to equal y'"),
        );
    }

    if let Some((line, count)) = duplicate_assertions(&statements, unit.source) {
        issues.push(
            unit.issue(
                Rule::DuplicateAssert,
                line,
                format!("Test has {} duplicate assertion(s)", count),
            )
            .with_suggestion("Remove duplicates or verify they check different scenarios"),
        );
    }

    if options.check_magic_numbers {
        for assertion in &statements {
            let Some(expr) = assertion.expression() else {
                continue;
            };
            if let Some((node, value)) = first_magic_number(expr, unit.source) {
                issues.push(
                    unit.issue(
                        Rule::MagicNumber,
                        node_line(node),
                        format!("Magic number {} in assertion", unit.text(node)),
                    )
                    .with_suggestion(format!(
                        "Name the expected value {} with a constant or variable",
                        value
                    )),
                );
            }
        }
    }

    if options.check_eager_test {
        let targets = call_targets(unit);
        if targets.len() > options.max_call_targets {
            let shown: Vec<&str> = targets.iter().take(5).map(String::as_str).collect();
            let more = if targets.len() > 5 { ", ..." } else { "" };
            issues.push(
                unit.issue(
                    Rule::EagerTest,
                    unit.line,
                    format!(
                        "Test calls {} distinct functions: {}{}",
                        targets.len(),
                        shown.join(", "),
                        more
                    ),
                )
                .with_suggestion("Split into focused tests that each exercise one behavior"),
            );
        }
    }

    issues
}

/// Line of the first repeated assertion and how many repeats there are
fn duplicate_assertions(assertions: &[Assertion], source: &str) -> Option<(usize, usize)> {
    let mut seen = HashSet::new();
    let mut first = None;
    let mut count = 0;
    for assertion in assertions {
        let Some(expr) = assertion.expression() else {
            continue;
        };
        if !seen.insert(Fingerprint::of(expr, source)) {
            count += 1;
            first.get_or_insert(assertion.line);
        }
    }
    first.map(|line| (line, count))
}

fn first_magic_number<'t>(expr: Node<'t>, source: &str) -> Option<(Node<'t>, f64)> {
    let mut found = None;
    let mut check = |node: Node<'t>| {
        if found.is_some() || !matches!(node.kind(), "integer" | "float") {
            return;
        }
        // Report `-5` rather than `5`
        let literal = match node.parent() {
            Some(parent) if parent.kind() == "unary_operator" => parent,
            _ => node,
        };
        if let Some(value) = numeric_value(literal, source) {
            if !ALLOWED_NUMBERS.contains(&value) {
                found = Some((literal, value));
            }
        }
    };
    check(expr);
    walk_scope(expr, &mut check);
    found
}

/// Distinct production call targets, sorted
fn call_targets(unit: &TestUnit) -> BTreeSet<String> {
    let mut targets = BTreeSet::new();
    walk_scope(unit.body, |node| {
        if node.kind() != "call" {
            return;
        }
        let Some(name) = call_name(node, unit.source) else {
            return;
        };
        if !is_helper_call(&name, &unit.scope.resolve(&name)) {
            targets.insert(name);
        }
    });
    targets
}

fn is_helper_call(name: &str, resolved: &str) -> bool {
    let method = name.rsplit('.').next().unwrap_or(name);
    BUILTIN_CALLS.contains(&name)
        || name.starts_with("self.assert")
        || name == "self.fail"
        || method.starts_with("assert")
        || resolved.starts_with("pytest.")
        || resolved.starts_with("unittest.mock.")
        || resolved.starts_with("mock.")
}
