//! Anti-patterns in test bodies. Every occurrence is reported.

use crate::parser::ast_helpers::{
    dotted_name, is_docstring, keyword_argument, statements, string_value, unwrap_parens,
};
use crate::parser::{call_name, node_line, node_text, walk_scope, TestUnit};
use crate::{Issue, Rule};
use tree_sitter::Node;

const SLEEP_CALLS: &[&str] = &["time.sleep", "asyncio.sleep"];
const SHELL_CALLS: &[&str] = &["os.system", "os.popen"];
const SYSTEM_DIRS: &[&str] = &["/home/", "/users/", "/tmp/", "/var/", "/etc/"];
const BROAD_EXCEPTIONS: &[&str] = &["Exception", "BaseException"];

pub fn analyze(unit: &TestUnit) -> Vec<Issue> {
    let mut issues = Vec::new();
    walk_scope(unit.body, |node| match node.kind() {
        "except_clause" => check_except(unit, node, &mut issues),
        "call" => check_call(unit, node, &mut issues),
        "string" | "concatenated_string" => check_path_literal(unit, node, &mut issues),
        "import_statement" | "import_from_statement" => check_import(unit, node, &mut issues),
        "comparison_operator" => check_identity_comparison(unit, node, &mut issues),
        _ => {}
    });
    issues
}

fn check_except(unit: &TestUnit, clause: Node, issues: &mut Vec<Issue>) {
    let mut caught = None;
    let mut body = None;
    for child in statements(clause) {
        match child.kind() {
            "block" => body = Some(child),
            _ if caught.is_none() => caught = Some(child),
            _ => {}
        }
    }
    // `except E as e` may wrap the type in an as_pattern
    let caught = caught.map(|c| {
        if c.kind() == "as_pattern" {
            statements(c).into_iter().next().unwrap_or(c)
        } else {
            c
        }
    });

    let line = node_line(clause);
    if caught.is_none() {
        issues.push(
            unit.issue(
                Rule::BareExcept,
                line,
                "Bare 'except:' clause catches all exceptions including KeyboardInterrupt",
            )
            .with_suggestion("Specify the exception type, e.g. 'except ValueError:'"),
        );
    }

    // A bare clause is already reported as bare_except
    let broad = match caught {
        None => false,
        Some(expr) => dotted_name(expr, unit.source)
            .map(|name| unit.scope.resolve(&name))
            .is_some_and(|name| {
                let name = name.strip_prefix("builtins.").unwrap_or(&name);
                BROAD_EXCEPTIONS.contains(&name)
            }),
    };
    if broad && body.is_some_and(|b| is_noop_block(b, unit.source)) {
        issues.push(
            unit.issue(
                Rule::SwallowedException,
                line,
                "Exception is caught and silently ignored",
            )
            .with_suggestion("Use pytest.raises for expected errors, or let unexpected ones fail the test"),
        );
    }
}

/// A block containing only `pass` or `...`
fn is_noop_block(block: Node, source: &str) -> bool {
    let stmts = statements(block);
    !stmts.is_empty()
        && stmts.iter().all(|stmt| match stmt.kind() {
            "pass_statement" => true,
            "expression_statement" => statements(*stmt)
                .iter()
                .all(|e| e.kind() == "ellipsis" || node_text(*e, source) == "..."),
            _ => false,
        })
}

fn check_call(unit: &TestUnit, call: Node, issues: &mut Vec<Issue>) {
    let Some(name) = call_name(call, unit.source) else {
        return;
    };
    let resolved = unit.scope.resolve(&name);
    let line = node_line(call);

    if SLEEP_CALLS.contains(&resolved.as_str()) {
        issues.push(
            unit.issue(
                Rule::SleepInTest,
                line,
                format!("{}() in test makes it slow and potentially flaky", resolved),
            )
            .with_suggestion("Wait on an explicit condition or mock the clock instead of sleeping"),
        );
    } else if resolved == "print" && !unit.scope.is_bound("print") {
        issues.push(
            unit.issue(
                Rule::PrintStatement,
                line,
                "print() call in test - use assertions or logging instead",
            )
            .with_suggestion("Remove the print or capture output with the capsys fixture"),
        );
    } else if resolved == "open" && !unit.scope.is_bound("open") && !is_with_item(call) {
        issues.push(
            unit.issue(
                Rule::OpenWithoutContext,
                line,
                "open() should be used with a context manager",
            )
            .with_suggestion("Use 'with open(...) as f:' so the file is always closed"),
        );
    } else if SHELL_CALLS.contains(&resolved.as_str()) || is_shell_subprocess(call, &resolved, unit) {
        issues.push(
            unit.issue(
                Rule::OsSystem,
                line,
                format!("{}() runs a shell command from the test", resolved),
            )
            .with_suggestion("Use subprocess.run() with an argument list, or mock the command"),
        );
    }
}

fn is_with_item(call: Node) -> bool {
    let mut parent = call.parent();
    while let Some(node) = parent {
        match node.kind() {
            "with_item" => return true,
            "as_pattern" | "parenthesized_expression" => parent = node.parent(),
            _ => return false,
        }
    }
    false
}

fn is_shell_subprocess(call: Node, resolved: &str, unit: &TestUnit) -> bool {
    resolved.starts_with("subprocess.")
        && keyword_argument(call, "shell", unit.source).is_some_and(|v| v.kind() == "true")
}

fn check_path_literal(unit: &TestUnit, node: Node, issues: &mut Vec<Issue>) {
    let parent = node.parent();
    if parent.is_some_and(|p| p.kind() == "concatenated_string") {
        return;
    }
    if parent.is_some_and(is_docstring) {
        return;
    }
    let Some(value) = string_value(node, unit.source) else {
        return;
    };
    if !is_hardcoded_path(&value) {
        return;
    }
    let shown: String = value.chars().take(50).collect();
    issues.push(
        unit.issue(
            Rule::HardcodedPath,
            node_line(node),
            format!("Hardcoded absolute path: '{}'", shown),
        )
        .with_suggestion("Use the tmp_path fixture or build paths with pathlib"),
    );
}

fn is_hardcoded_path(value: &str) -> bool {
    let unix = value.starts_with('/')
        && value.len() > 5
        && value[1..].contains('/')
        && {
            let lower = value.to_lowercase();
            SYSTEM_DIRS.iter().any(|dir| lower.contains(dir))
        };
    let mut chars = value.chars();
    let windows = value.len() > 3
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.next() == Some(':')
        && chars.next() == Some('\\');
    unix || windows
}

fn check_import(unit: &TestUnit, node: Node, issues: &mut Vec<Issue>) {
    let legacy = if node.kind() == "import_statement" {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        names.into_iter().any(|name| {
            let module = if name.kind() == "aliased_import" {
                name.child_by_field_name("name")
            } else {
                Some(name)
            };
            module.is_some_and(|m| node_text(m, unit.source) == "mock")
        })
    } else {
        node.child_by_field_name("module_name")
            .is_some_and(|m| node_text(m, unit.source) == "mock")
    };
    if legacy {
        issues.push(
            unit.issue(
                Rule::LegacyMock,
                node_line(node),
                "Using the 'mock' backport - prefer unittest.mock",
            )
            .with_suggestion("Use 'from unittest.mock import Mock, patch' instead"),
        );
    }
}

fn check_identity_comparison(unit: &TestUnit, node: Node, issues: &mut Vec<Issue>) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).filter(|c| !c.is_extra()).collect();
    for (i, child) in children.iter().enumerate() {
        if child.is_named() || !matches!(child.kind(), "is" | "is not") {
            continue;
        }
        let left = children[..i].iter().rev().find(|c| c.is_named());
        let right = children[i + 1..].iter().find(|c| c.is_named());
        if left.into_iter().chain(right).any(|operand| is_value_literal(*operand)) {
            issues.push(
                unit.issue(
                    Rule::IsLiteral,
                    node_line(node),
                    format!("Using '{}' with a literal value - use '==' instead", child.kind()),
                )
                .with_suggestion("'is' compares identity, not equality; use '==' for values"),
            );
            return;
        }
    }
}

/// Number or string literal; True, False and None are singletons and fine with `is`
fn is_value_literal(node: Node) -> bool {
    let node = unwrap_parens(node);
    match node.kind() {
        "integer" | "float" | "string" | "concatenated_string" => true,
        "unary_operator" => node
            .child_by_field_name("argument")
            .is_some_and(|arg| matches!(arg.kind(), "integer" | "float")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Parsed;
    use super::*;

    fn rules(source: &str) -> Vec<(Rule, usize)> {
        let parsed = Parsed::new(source);
        let unit = parsed.unit();
        analyze(&unit).into_iter().map(|i| (i.rule, i.line)).collect()
    }

    #[test]
    fn positive_bare_except_reported_once_per_clause() {
        let found = rules(
            "def test_errors_hidden():\n    try:\n        go()\n    except:\n        pass\n    try:\n        go()\n    except Exception as e:\n        ...\n    assert done\n",
        );
        assert_eq!(
            found,
            vec![
                (Rule::BareExcept, 4),
                (Rule::SwallowedException, 8),
            ]
        );
    }

    #[test]
    fn negative_specific_handled_exception() {
        let found = rules(
            "def test_error_handled():\n    try:\n        go()\n    except ValueError as err:\n        assert 'bad' in str(err)\n",
        );
        assert!(found.is_empty());
    }

    #[test]
    fn positive_sleep_through_alias() {
        let found = rules(
            "from time import sleep\nimport time as t\n\ndef test_waits_for_worker():\n    sleep(1)\n    t.sleep(2)\n    assert ready()\n",
        );
        assert_eq!(found, vec![(Rule::SleepInTest, 5), (Rule::SleepInTest, 6)]);
    }

    #[test]
    fn positive_print_and_open() {
        let found = rules(
            "def test_reads_file():\n    print('debug')\n    f = open('data.txt')\n    with open('data.txt') as g:\n        assert g.read()\n",
        );
        assert_eq!(
            found,
            vec![(Rule::PrintStatement, 2), (Rule::OpenWithoutContext, 3)]
        );
    }

    #[test]
    fn positive_shell_calls() {
        let found = rules(
            "import os\nimport subprocess\n\ndef test_runs_commands():\n    os.system('ls')\n    subprocess.run('ls', shell=True)\n    subprocess.run(['ls'])\n    assert True\n",
        );
        assert_eq!(found, vec![(Rule::OsSystem, 5), (Rule::OsSystem, 6)]);
    }

    #[test]
    fn positive_hardcoded_paths() {
        let found = rules(
            "def test_loads_config():\n    \"\"\"Reads /etc/app/config.\"\"\"\n    a = load('/home/alice/config.yml')\n    b = load(r'C:\\Users\\alice')\n    c = load('/api/v1/users')\n    assert a == b == c\n",
        );
        assert_eq!(
            found,
            vec![(Rule::HardcodedPath, 3), (Rule::HardcodedPath, 4)]
        );
    }

    #[test]
    fn positive_legacy_mock_import() {
        let found = rules(
            "def test_patches_client():\n    import mock\n    from mock import patch\n    from unittest import mock as um\n    assert patch\n",
        );
        assert_eq!(found, vec![(Rule::LegacyMock, 2), (Rule::LegacyMock, 3)]);
    }

    #[test]
    fn positive_is_literal() {
        let found = rules(
            "def test_identity_checks():\n    assert value is 5\n    assert name is not 'x'\n    assert flag is True\n    assert other is None\n",
        );
        assert_eq!(found, vec![(Rule::IsLiteral, 2), (Rule::IsLiteral, 3)]);
    }

    #[test]
    fn helper_path_heuristics() {
        assert!(is_hardcoded_path("/tmp/output/file.txt"));
        assert!(is_hardcoded_path("D:\\data"));
        assert!(!is_hardcoded_path("/tmp"));
        assert!(!is_hardcoded_path("relative/home/path"));
    }
}
