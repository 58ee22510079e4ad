//! Module-level symbol table.
//!
//! Built once per file and shared read-only with every test unit in it. Records
//! names bound at module scope, what imported aliases refer to, and which
//! names are classes (with their class-level attributes).

use super::ast_helpers::{node_text, statements};
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

#[derive(Debug, Clone, Default)]
pub struct ModuleScope {
    bindings: BTreeSet<String>,
    imports: BTreeMap<String, String>,
    classes: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleScope {
    /// Build the symbol table from a parsed module
    pub fn build(root: Node, source: &str) -> Self {
        let mut scope = Self::default();
        scope.visit_block(root, source);
        scope
    }

    fn visit_block(&mut self, block: Node, source: &str) {
        for stmt in statements(block) {
            self.visit_statement(stmt, source);
        }
    }

    fn visit_statement(&mut self, stmt: Node, source: &str) {
        match stmt.kind() {
            "expression_statement" => {
                for inner in statements(stmt) {
                    if matches!(inner.kind(), "assignment" | "augmented_assignment") {
                        self.bind_assignment(inner, source);
                    }
                }
            }
            "function_definition" => {
                if let Some(name) = stmt.child_by_field_name("name") {
                    self.bind(node_text(name, source));
                }
            }
            "class_definition" => self.visit_class(stmt, source),
            "decorated_definition" => {
                if let Some(def) = stmt.child_by_field_name("definition") {
                    self.visit_statement(def, source);
                }
            }
            "import_statement" => self.visit_import(stmt, source),
            "import_from_statement" => self.visit_import_from(stmt, source),
            // Conditional and guarded definitions still bind at module scope
            "if_statement" | "try_statement" | "with_statement" | "for_statement"
            | "while_statement" | "elif_clause" | "else_clause" | "except_clause"
            | "finally_clause" => {
                if stmt.kind() == "for_statement" {
                    if let Some(left) = stmt.child_by_field_name("left") {
                        self.bind_target(left, source);
                    }
                }
                let mut cursor = stmt.walk();
                let children: Vec<Node> = stmt.named_children(&mut cursor).collect();
                for child in children {
                    if child.kind() == "block" {
                        self.visit_block(child, source);
                    } else if matches!(
                        child.kind(),
                        "elif_clause" | "else_clause" | "except_clause" | "finally_clause"
                    ) {
                        self.visit_statement(child, source);
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, class: Node, source: &str) {
        let Some(name) = class.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name, source).to_string();
        self.bind(&name);
        let mut attributes = BTreeSet::new();
        if let Some(body) = class.child_by_field_name("body") {
            for stmt in statements(body) {
                if stmt.kind() != "expression_statement" {
                    continue;
                }
                for inner in statements(stmt) {
                    if inner.kind() != "assignment" {
                        continue;
                    }
                    if let Some(left) = inner.child_by_field_name("left") {
                        let mut names = Vec::new();
                        collect_target_names(left, source, &mut names);
                        attributes.extend(names);
                    }
                }
            }
        }
        self.classes.insert(name, attributes);
    }

    fn bind_assignment(&mut self, assignment: Node, source: &str) {
        if let Some(left) = assignment.child_by_field_name("left") {
            self.bind_target(left, source);
        }
        // Chained `a = b = 1` nests the second assignment on the right
        if let Some(right) = assignment.child_by_field_name("right") {
            if right.kind() == "assignment" {
                self.bind_assignment(right, source);
            }
        }
    }

    fn bind_target(&mut self, target: Node, source: &str) {
        let mut names = Vec::new();
        collect_target_names(target, source, &mut names);
        for name in names {
            self.bind(&name);
        }
    }

    fn visit_import(&mut self, stmt: Node, source: &str) {
        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            match name.kind() {
                "dotted_name" => {
                    let module = node_text(name, source);
                    let head = module.split('.').next().unwrap_or(module);
                    self.bind(head);
                    self.imports.insert(head.to_string(), head.to_string());
                }
                "aliased_import" => {
                    let (Some(module), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    let alias = node_text(alias, source);
                    self.bind(alias);
                    self.imports
                        .insert(alias.to_string(), node_text(module, source).to_string());
                }
                _ => {}
            }
        }
    }

    fn visit_import_from(&mut self, stmt: Node, source: &str) {
        let module = stmt
            .child_by_field_name("module_name")
            .map(|m| node_text(m, source).to_string())
            .unwrap_or_default();
        let mut cursor = stmt.walk();
        let names: Vec<Node> = stmt.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (imported, alias) = match name.kind() {
                "dotted_name" => {
                    let imported = node_text(name, source);
                    (imported, imported)
                }
                "aliased_import" => {
                    let (Some(imported), Some(alias)) = (
                        name.child_by_field_name("name"),
                        name.child_by_field_name("alias"),
                    ) else {
                        continue;
                    };
                    (node_text(imported, source), node_text(alias, source))
                }
                _ => continue,
            };
            self.bind(alias);
            let origin = if module.is_empty() {
                imported.to_string()
            } else {
                format!("{}.{}", module, imported)
            };
            self.imports.insert(alias.to_string(), origin);
        }
    }

    fn bind(&mut self, name: &str) {
        if !name.is_empty() {
            self.bindings.insert(name.to_string());
        }
    }

    /// Whether `name` is bound at module scope
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains(name)
    }

    /// Whether `name` was bound by an import statement
    pub fn is_import(&self, name: &str) -> bool {
        self.imports.contains_key(name)
    }

    /// Whether `name` is a class defined in this module
    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Class-level attributes assigned in a class body
    pub fn class_attributes(&self, class: &str) -> Option<&BTreeSet<String>> {
        self.classes.get(class)
    }

    /// Expand the first segment of a dotted name through import aliases
    /// (`sleep` -> `time.sleep`, `sp.run` -> `subprocess.run`)
    pub fn resolve(&self, dotted: &str) -> String {
        let (head, rest) = match dotted.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (dotted, None),
        };
        match (self.imports.get(head), rest) {
            (Some(origin), Some(rest)) => format!("{}.{}", origin, rest),
            (Some(origin), None) => origin.clone(),
            (None, _) => dotted.to_string(),
        }
    }
}

/// Plain names bound by an assignment target (`a`, `a, b`, `[a, *b]`)
pub fn collect_target_names(target: Node, source: &str, names: &mut Vec<String>) {
    match target.kind() {
        "identifier" => names.push(node_text(target, source).to_string()),
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern"
        | "parenthesized_expression" | "tuple" | "list" => {
            for child in statements(target) {
                collect_target_names(child, source, names);
            }
        }
        _ => {}
    }
}
