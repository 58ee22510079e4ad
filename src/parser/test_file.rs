//! Test-unit discovery - finds pytest and unittest style tests in a module

use super::ast_helpers::{
    decorator_name, decorators, dotted_name, is_async_function, is_docstring, node_line,
    node_text, statements, string_value, unwrap_parens,
};
use super::scope::ModuleScope;
use crate::{Issue, Rule, TestUnitSummary};
use tree_sitter::Node;

/// Structural markers attached to a test unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers {
    /// `@pytest.mark.review_skip`: discovered but never analyzed
    pub skip_review: bool,
    /// Skip/xfail decorator that was applied, e.g. `pytest.mark.skip`
    pub skipped_by: Option<String>,
    pub parametrized: bool,
    pub is_async: bool,
    /// Collected because of `@istest` rather than its name
    pub explicit: bool,
}

/// One discovered test function or method
#[derive(Debug, Clone)]
pub struct TestUnit<'a> {
    /// Bare function name
    pub name: String,
    /// `Class::method` or `function`
    pub qualified_name: String,
    /// `file::Class::method`, used to match timing samples
    pub node_id: String,
    pub file: String,
    /// Line of the `def`
    pub line: usize,
    /// Enclosing classes, outermost first
    pub classes: Vec<String>,
    pub definition: Node<'a>,
    pub body: Node<'a>,
    pub markers: Markers,
    pub source: &'a str,
    pub scope: &'a ModuleScope,
}

impl<'a> TestUnit<'a> {
    /// Source text of a node in this unit's file
    pub fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    /// Innermost enclosing class name
    pub fn class_name(&self) -> Option<&str> {
        self.classes.last().map(String::as_str)
    }

    /// Create an issue owned by this unit
    pub fn issue(&self, rule: Rule, line: usize, message: impl Into<String>) -> Issue {
        Issue::new(rule, self.file.clone(), line, message).for_test(self.qualified_name.clone())
    }

    /// Docstring of the test, if any
    pub fn docstring(&self) -> Option<String> {
        let first = statements(self.body).into_iter().next()?;
        if !is_docstring(first) {
            return None;
        }
        let expr = statements(first).into_iter().next()?;
        string_value(expr, self.source)
    }

    pub fn summary(&self, issue_count: usize) -> TestUnitSummary {
        TestUnitSummary {
            name: self.qualified_name.clone(),
            node_id: self.node_id.clone(),
            file: self.file.clone(),
            line: self.line,
            skip_review: self.markers.skip_review,
            skipped: self.markers.skipped_by.is_some(),
            parametrized: self.markers.parametrized,
            is_async: self.markers.is_async,
            issue_count,
        }
    }
}

/// Decorator-level facts shared by functions and classes
#[derive(Debug, Clone, Default)]
struct DecoratorInfo {
    skip_review: bool,
    skipped_by: Option<String>,
    parametrized: bool,
    istest: bool,
    nottest: bool,
    fixture: bool,
}

impl DecoratorInfo {
    fn inherit(mut self, outer: &DecoratorInfo) -> Self {
        self.skip_review |= outer.skip_review;
        if self.skipped_by.is_none() {
            self.skipped_by = outer.skipped_by.clone();
        }
        self.parametrized |= outer.parametrized;
        self
    }
}

const SKIP_MARKERS: &[&str] = &[
    "skip",
    "skipif",
    "xfail",
    "skipIf",
    "skipUnless",
    "expectedFailure",
];

/// Finds test units in a parsed module
pub struct TestDiscovery<'a> {
    source: &'a str,
    file: &'a str,
    scope: &'a ModuleScope,
}

impl<'a> TestDiscovery<'a> {
    pub fn new(source: &'a str, file: &'a str, scope: &'a ModuleScope) -> Self {
        Self {
            source,
            file,
            scope,
        }
    }

    /// All test units in source order
    pub fn discover(&self, root: Node<'a>) -> Vec<TestUnit<'a>> {
        let module_info = self.module_markers(root);
        let mut units = Vec::new();
        for stmt in statements(root) {
            self.visit(stmt, &[], &module_info, false, &mut units);
        }
        units
    }

    fn visit(
        &self,
        stmt: Node<'a>,
        classes: &[String],
        outer: &DecoratorInfo,
        in_test_class: bool,
        units: &mut Vec<TestUnit<'a>>,
    ) {
        let definition = if stmt.kind() == "decorated_definition" {
            match stmt.child_by_field_name("definition") {
                Some(def) => def,
                None => return,
            }
        } else {
            stmt
        };

        match definition.kind() {
            "function_definition" => {
                // Methods of non-test classes are never collected
                if !classes.is_empty() && !in_test_class {
                    return;
                }
                if let Some(unit) = self.try_unit(definition, classes, outer) {
                    units.push(unit);
                }
            }
            "class_definition" => {
                let Some(name) = definition.child_by_field_name("name") else {
                    return;
                };
                let name = node_text(name, self.source).to_string();
                let info = self.decorator_info(definition);
                if info.nottest {
                    return;
                }
                let is_test_class = name.starts_with("Test") || self.is_testcase_subclass(definition);
                if !is_test_class {
                    return;
                }
                let info = info.inherit(outer);
                let mut chain = classes.to_vec();
                chain.push(name);
                if let Some(body) = definition.child_by_field_name("body") {
                    for child in statements(body) {
                        self.visit(child, &chain, &info, true, units);
                    }
                }
            }
            _ => {}
        }
    }

    fn try_unit(
        &self,
        definition: Node<'a>,
        classes: &[String],
        outer: &DecoratorInfo,
    ) -> Option<TestUnit<'a>> {
        let name = node_text(definition.child_by_field_name("name")?, self.source).to_string();
        let info = self.decorator_info(definition);
        if info.fixture || info.nottest {
            return None;
        }
        if !name.starts_with("test") && !info.istest {
            return None;
        }
        let info = info.inherit(outer);
        let body = definition.child_by_field_name("body")?;

        let mut qualified = classes.join("::");
        if !qualified.is_empty() {
            qualified.push_str("::");
        }
        qualified.push_str(&name);

        Some(TestUnit {
            node_id: format!("{}::{}", self.file, qualified),
            qualified_name: qualified,
            file: self.file.to_string(),
            line: node_line(definition),
            classes: classes.to_vec(),
            definition,
            body,
            markers: Markers {
                skip_review: info.skip_review,
                skipped_by: info.skipped_by,
                parametrized: info.parametrized,
                is_async: is_async_function(definition),
                explicit: !name.starts_with("test"),
            },
            name,
            source: self.source,
            scope: self.scope,
        })
    }

    fn decorator_info(&self, definition: Node) -> DecoratorInfo {
        let mut info = DecoratorInfo::default();
        for expr in decorators(definition) {
            if let Some(name) = decorator_name(expr, self.source) {
                self.apply_marker(&name, &mut info);
            }
        }
        info
    }

    /// Markers applied to the whole module through `pytestmark = ...`
    fn module_markers(&self, root: Node) -> DecoratorInfo {
        let mut info = DecoratorInfo::default();
        for stmt in statements(root) {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            for assignment in statements(stmt) {
                if assignment.kind() != "assignment" {
                    continue;
                }
                let is_pytestmark = assignment
                    .child_by_field_name("left")
                    .is_some_and(|left| node_text(left, self.source) == "pytestmark");
                let Some(right) = assignment.child_by_field_name("right") else {
                    continue;
                };
                if !is_pytestmark {
                    continue;
                }
                let right = unwrap_parens(right);
                let marks = if matches!(right.kind(), "list" | "tuple") {
                    statements(right)
                } else {
                    vec![right]
                };
                for mark in marks {
                    if let Some(name) = decorator_name(mark, self.source) {
                        self.apply_marker(&name, &mut info);
                    }
                }
            }
        }
        info
    }

    fn apply_marker(&self, name: &str, info: &mut DecoratorInfo) {
        let resolved = self.scope.resolve(name);
        let last = resolved.rsplit('.').next().unwrap_or(&resolved);
        // A bare `skip` only counts when imported from pytest or unittest
        let namespaced = resolved.starts_with("pytest.mark.") || resolved.starts_with("unittest.");

        match last {
            "review_skip" => info.skip_review = true,
            "parametrize" if namespaced => info.parametrized = true,
            "istest" => info.istest = true,
            "nottest" => info.nottest = true,
            "fixture" | "yield_fixture" => info.fixture = true,
            marker if namespaced && SKIP_MARKERS.contains(&marker) => {
                if info.skipped_by.is_none() {
                    info.skipped_by = Some(name.to_string());
                }
            }
            _ => {}
        }
    }

    fn is_testcase_subclass(&self, class: Node) -> bool {
        let Some(bases) = class.child_by_field_name("superclasses") else {
            return false;
        };
        statements(bases).into_iter().any(|base| {
            dotted_name(base, self.source)
                .map(|name| self.scope.resolve(&name))
                .is_some_and(|name| name.ends_with("TestCase"))
        })
    }
}
