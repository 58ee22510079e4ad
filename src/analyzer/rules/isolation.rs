//! Test isolation - writes to module-level or class-level state.
//!
//! Each rule is reported at most once per test, at the first offending line.

use crate::parser::ast_helpers::{call_arguments, call_method, root_object, statements, unwrap_parens};
use crate::parser::scope::collect_target_names;
use crate::parser::{call_name, node_line, node_text, walk_scope, TestUnit};
use crate::{Issue, Rule};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Methods that mutate the object they are called on
const MUTATING_METHODS: &[&str] = &[
    "append",
    "extend",
    "insert",
    "remove",
    "pop",
    "clear",
    "add",
    "discard",
    "update",
    "intersection_update",
    "difference_update",
    "symmetric_difference_update",
    "setdefault",
    "popitem",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Module,
    Class,
}

/// First offending write per owner, plus how many writes were seen
#[derive(Default)]
struct Writes {
    module: Option<(usize, String)>,
    module_count: usize,
    class: Option<(usize, String)>,
    class_count: usize,
}

impl Writes {
    fn record(&mut self, owner: Owner, line: usize, target: &str) {
        let (first, count) = match owner {
            Owner::Module => (&mut self.module, &mut self.module_count),
            Owner::Class => (&mut self.class, &mut self.class_count),
        };
        *count += 1;
        if first.is_none() {
            *first = Some((line, target.to_string()));
        }
    }
}

pub fn analyze(unit: &TestUnit) -> Vec<Issue> {
    let checker = Checker {
        unit,
        parameters: parameter_names(unit),
    };
    let mut writes = Writes::default();

    walk_scope(unit.body, |node| match node.kind() {
        "global_statement" => {
            for name in statements(node) {
                writes.record(Owner::Module, node_line(node), unit.text(name));
            }
        }
        "assignment" | "augmented_assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                for target in targets(left) {
                    checker.check_target(target, &mut writes);
                }
            }
        }
        "delete_statement" => {
            for target in statements(node).into_iter().flat_map(targets) {
                if target.kind() != "identifier" {
                    checker.check_target(target, &mut writes);
                }
            }
        }
        "call" => checker.check_mutating_call(node, &mut writes),
        _ => {}
    });

    let mut issues = Vec::new();
    if let Some((line, target)) = writes.module {
        issues.push(
            unit.issue(
                Rule::GlobalModification,
                line,
                format!(
                    "Test modifies module-level state '{}'{}",
                    target,
                    occurrences(writes.module_count)
                ),
            )
            .with_suggestion("Use monkeypatch or a fixture so the change is undone after the test"),
        );
    }
    if let Some((line, target)) = writes.class {
        issues.push(
            unit.issue(
                Rule::ClassAttrModification,
                line,
                format!(
                    "Test modifies class attribute '{}'{}",
                    target,
                    occurrences(writes.class_count)
                ),
            )
            .with_suggestion("Set state on the instance or patch the attribute with monkeypatch"),
        );
    }
    issues
}

fn occurrences(count: usize) -> String {
    if count > 1 {
        format!(" ({} writes)", count)
    } else {
        String::new()
    }
}

/// Individual targets of a possibly unpacking assignment target
fn targets(target: Node) -> Vec<Node> {
    match target.kind() {
        "pattern_list" | "tuple_pattern" | "list_pattern" | "expression_list" | "tuple"
        | "list" | "parenthesized_expression" | "list_splat_pattern" => {
            statements(target).into_iter().flat_map(targets).collect()
        }
        _ => vec![target],
    }
}

fn parameter_names(unit: &TestUnit) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let Some(parameters) = unit.definition.child_by_field_name("parameters") else {
        return names;
    };
    for param in statements(parameters) {
        let name = match param.kind() {
            "identifier" => Some(param),
            "default_parameter" | "typed_default_parameter" => param.child_by_field_name("name"),
            _ => statements(param).into_iter().find(|n| n.kind() == "identifier"),
        };
        if let Some(name) = name {
            names.insert(unit.text(name).to_string());
        }
    }
    names
}

struct Checker<'u, 'a> {
    unit: &'u TestUnit<'a>,
    parameters: BTreeSet<String>,
}

impl Checker<'_, '_> {
    fn check_target(&self, target: Node, writes: &mut Writes) {
        let target = unwrap_parens(target);
        let line = node_line(target);
        let text = self.unit.text(target);
        match target.kind() {
            "identifier" => {
                let mut names = Vec::new();
                collect_target_names(target, self.unit.source, &mut names);
                if names.iter().any(|name| self.is_module_name(name)) {
                    writes.record(Owner::Module, line, text);
                }
            }
            "attribute" | "subscript" => {
                if let Some(owner) = self.owner_of(target) {
                    writes.record(owner, line, text);
                }
            }
            _ => {}
        }
    }

    fn check_mutating_call(&self, call: Node, writes: &mut Writes) {
        let Some(method) = call_method(call, self.unit.source) else {
            return;
        };
        if !MUTATING_METHODS.contains(&method) {
            return;
        }
        let Some(receiver) = call
            .child_by_field_name("function")
            .filter(|f| f.kind() == "attribute")
            .and_then(|f| f.child_by_field_name("object"))
        else {
            return;
        };
        let receiver = unwrap_parens(receiver);
        let owner = match receiver.kind() {
            "identifier" => self
                .is_module_name(self.unit.text(receiver))
                .then_some(Owner::Module),
            "attribute" | "subscript" => self.owner_of(receiver),
            _ => None,
        };
        if let Some(owner) = owner {
            writes.record(owner, node_line(call), self.unit.text(receiver));
        }
    }

    /// Whose state an attribute or subscript chain belongs to
    fn owner_of(&self, target: Node) -> Option<Owner> {
        if self.is_class_reference(target) {
            return Some(Owner::Class);
        }
        let root = root_object(target);
        if root.kind() != "identifier" {
            return None;
        }
        let name = self.unit.text(root);
        if self.is_class_name(name) && has_attribute_step(target) {
            Some(Owner::Class)
        } else if self.is_module_name(name) {
            Some(Owner::Module)
        } else {
            None
        }
    }

    /// `cls.x`, `self.__class__.x`, `type(self).x` or `Klass.x` at any depth
    fn is_class_reference(&self, target: Node) -> bool {
        let mut current = unwrap_parens(target);
        loop {
            let inner = match current.kind() {
                "attribute" => current.child_by_field_name("object"),
                "subscript" => current.child_by_field_name("value"),
                _ => None,
            };
            let Some(inner) = inner.map(unwrap_parens) else {
                return false;
            };
            if current.kind() == "attribute" {
                match inner.kind() {
                    "identifier" if self.unit.text(inner) == "cls" => return true,
                    "attribute" if self.unit.text(inner).replace(' ', "") == "self.__class__" => {
                        return true
                    }
                    "call" if self.is_type_of_self(inner) => return true,
                    _ => {}
                }
            }
            current = inner;
        }
    }

    fn is_type_of_self(&self, call: Node) -> bool {
        call_name(call, self.unit.source).as_deref() == Some("type")
            && matches!(
                call_arguments(call).as_slice(),
                [arg] if node_text(*arg, self.unit.source) == "self"
            )
    }

    fn is_class_name(&self, name: &str) -> bool {
        if self.parameters.contains(name) {
            return false;
        }
        self.unit.classes.iter().any(|c| c == name)
            || self.unit.scope.is_class(name)
            || looks_like_class(name)
    }

    fn is_module_name(&self, name: &str) -> bool {
        name != "self"
            && name != "cls"
            && !self.parameters.contains(name)
            && self.unit.scope.is_bound(name)
    }
}

/// CamelCase names are treated as classes even when imported
fn looks_like_class(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase()) && chars.any(|c| c.is_ascii_lowercase())
}

fn has_attribute_step(target: Node) -> bool {
    let mut current = unwrap_parens(target);
    loop {
        match current.kind() {
            "attribute" => return true,
            "subscript" => match current.child_by_field_name("value") {
                Some(value) => current = unwrap_parens(value),
                None => return false,
            },
            _ => return false,
        }
    }
}
