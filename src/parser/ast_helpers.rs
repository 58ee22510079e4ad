//! Shared AST traversal helpers for analyzer rules.
//!
//! Provides scope-aware walking of a test body plus small accessors for
//! names, literals and strings so rules don't re-implement them.

use tree_sitter::Node;

/// Source text of a node
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

/// 1-indexed line a node starts on
pub fn node_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Node kinds that open a new lexical scope
pub fn is_nested_scope(kind: &str) -> bool {
    matches!(kind, "function_definition" | "lambda" | "class_definition")
}

/// Visit every named descendant of `node` in source order, without entering
/// nested function, lambda or class definitions.
pub fn walk_scope<'t>(node: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut stack: Vec<Node<'t>> = Vec::new();
    push_children(node, &mut stack);
    while let Some(current) = stack.pop() {
        if is_nested_scope(current.kind()) {
            continue;
        }
        visit(current);
        push_children(current, &mut stack);
    }
}

fn push_children<'t>(node: Node<'t>, stack: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev());
}

/// All scope-local descendants with one of the given kinds, in source order
pub fn collect_kinds<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk_scope(node, |n| {
        if kinds.contains(&n.kind()) {
            found.push(n);
        }
    });
    found
}

/// Named children, skipping comments
pub fn statements(block: Node) -> Vec<Node> {
    let mut cursor = block.walk();
    block
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// Strip any number of wrapping parentheses
pub fn unwrap_parens(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        let mut cursor = node.walk();
        let inner = node
            .named_children(&mut cursor)
            .find(|n| n.kind() != "comment");
        match inner {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// Dotted name of an identifier or attribute chain (`os.path.join`)
pub fn dotted_name(node: Node, source: &str) -> Option<String> {
    let node = unwrap_parens(node);
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object")?, source)?;
            let attr = node_text(node.child_by_field_name("attribute")?, source);
            Some(format!("{}.{}", object, attr))
        }
        _ => None,
    }
}

/// Dotted name of the callee of a `call` node
pub fn call_name(call: Node, source: &str) -> Option<String> {
    if call.kind() != "call" {
        return None;
    }
    dotted_name(call.child_by_field_name("function")?, source)
}

/// Last segment of the callee (`self.client.get(...)` -> `get`)
pub fn call_method<'a>(call: Node, source: &'a str) -> Option<&'a str> {
    let function = unwrap_parens(call.child_by_field_name("function")?);
    match function.kind() {
        "identifier" => Some(node_text(function, source)),
        "attribute" => Some(node_text(function.child_by_field_name("attribute")?, source)),
        _ => None,
    }
}

/// Innermost object of an attribute/subscript chain (`a.b[0].c` -> `a`)
pub fn root_object(node: Node) -> Node {
    let mut current = unwrap_parens(node);
    loop {
        let next = match current.kind() {
            "attribute" => current.child_by_field_name("object"),
            "subscript" => current.child_by_field_name("value"),
            _ => None,
        };
        match next {
            Some(n) => current = unwrap_parens(n),
            None => return current,
        }
    }
}

/// Arguments of a call: positional and keyword argument nodes, in order
pub fn call_arguments(call: Node) -> Vec<Node> {
    match call.child_by_field_name("arguments") {
        Some(args) if args.kind() == "argument_list" => statements(args),
        _ => Vec::new(),
    }
}

/// Value of a keyword argument `name=...` if present
pub fn keyword_argument<'t>(call: Node<'t>, name: &str, source: &str) -> Option<Node<'t>> {
    call_arguments(call).into_iter().find_map(|arg| {
        if arg.kind() != "keyword_argument" {
            return None;
        }
        let key = arg.child_by_field_name("name")?;
        if node_text(key, source) == name {
            arg.child_by_field_name("value")
        } else {
            None
        }
    })
}

/// Contents of a string literal without prefix or quotes
pub fn string_value(node: Node, source: &str) -> Option<String> {
    let node = unwrap_parens(node);
    match node.kind() {
        "string" => {
            let mut value = String::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "string_content" | "interpolation" | "escape_sequence") {
                    value.push_str(node_text(child, source));
                }
            }
            Some(value)
        }
        "concatenated_string" => {
            let mut value = String::new();
            let mut cursor = node.walk();
            for part in node.named_children(&mut cursor) {
                value.push_str(&string_value(part, source)?);
            }
            Some(value)
        }
        _ => None,
    }
}

/// Value of a constant string or bytes literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub bytes: bool,
    /// Escapes decoded unless the literal is raw
    pub value: String,
}

/// Lowercased, sorted prefix letters of a string node, without `u`
/// (`Rb'..'` gives `"br"`)
pub fn string_prefix(node: Node, source: &str) -> String {
    let mut prefix: Vec<char> = node_text(node, source)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .filter(|c| *c != 'u')
        .collect();
    prefix.sort_unstable();
    prefix.into_iter().collect()
}

/// The constant value of a string literal. None for f-strings, which are
/// computed at runtime, and for concatenations mixing bytes and text.
pub fn string_literal(node: Node, source: &str) -> Option<StringLiteral> {
    let node = unwrap_parens(node);
    match node.kind() {
        "string" => {
            let prefix = string_prefix(node, source);
            if prefix.contains('f') || statements(node).iter().any(|c| c.kind() == "interpolation") {
                return None;
            }
            let raw = prefix.contains('r');
            let mut value = String::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if matches!(child.kind(), "string_content" | "escape_sequence") {
                    let text = node_text(child, source);
                    if raw {
                        value.push_str(text);
                    } else {
                        value.push_str(&decode_escapes(text));
                    }
                }
            }
            Some(StringLiteral {
                bytes: prefix.contains('b'),
                value,
            })
        }
        "concatenated_string" => {
            let mut parts = statements(node).into_iter().map(|part| string_literal(part, source));
            let mut joined = parts.next()??;
            for part in parts {
                let part = part?;
                if part.bytes != joined.bytes {
                    return None;
                }
                joined.value.push_str(&part.value);
            }
            Some(joined)
        }
        _ => None,
    }
}

/// Decode Python backslash escapes. Unknown escapes keep their backslash.
fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut digits = next.to_string();
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width && digits.chars().all(|d| d.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

/// True for an expression statement holding only a string (a docstring)
pub fn is_docstring(stmt: Node) -> bool {
    if stmt.kind() != "expression_statement" {
        return false;
    }
    let inner = statements(stmt);
    inner.len() == 1 && matches!(inner[0].kind(), "string" | "concatenated_string")
}

/// Numeric value of an int/float literal, including a leading unary sign
pub fn numeric_value(node: Node, source: &str) -> Option<f64> {
    let node = unwrap_parens(node);
    match node.kind() {
        "integer" | "float" => parse_number(node_text(node, source)),
        "unary_operator" => {
            let operand = node.child_by_field_name("argument")?;
            let value = numeric_value(operand, source)?;
            let op = node.child_by_field_name("operator").map(|o| o.kind());
            match op {
                Some("-") => Some(-value),
                Some("+") => Some(value),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Parse a Python numeric literal (underscores, hex/octal/binary, imaginary suffix)
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '_')
        .collect::<String>()
        .to_ascii_lowercase();
    let cleaned = cleaned.trim_end_matches(['j', 'l']);
    let radix = |prefix: &str, radix: u32| {
        cleaned
            .strip_prefix(prefix)
            .and_then(|digits| u128::from_str_radix(digits, radix).ok())
            .map(|v| v as f64)
    };
    radix("0x", 16)
        .or_else(|| radix("0o", 8))
        .or_else(|| radix("0b", 2))
        .or_else(|| cleaned.parse::<f64>().ok())
}

/// Python truthiness of a constant expression; None when not a literal
pub fn literal_truthiness(node: Node, source: &str) -> Option<bool> {
    let node = unwrap_parens(node);
    match node.kind() {
        "true" => Some(true),
        "false" | "none" => Some(false),
        "integer" | "float" | "unary_operator" => numeric_value(node, source).map(|v| v != 0.0),
        "string" | "concatenated_string" => {
            string_literal(node, source).map(|literal| !literal.value.is_empty())
        }
        "tuple" | "list" | "set" | "dictionary" => Some(!statements(node).is_empty()),
        "not_operator" => {
            let operand = node.child_by_field_name("argument")?;
            literal_truthiness(operand, source).map(|truthy| !truthy)
        }
        _ => None,
    }
}

/// Decorator expressions of a definition wrapped in `decorated_definition`
pub fn decorators<'t>(definition: Node<'t>) -> Vec<Node<'t>> {
    let Some(parent) = definition.parent() else {
        return Vec::new();
    };
    if parent.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = parent.walk();
    parent
        .named_children(&mut cursor)
        .filter(|n| n.kind() == "decorator")
        .filter_map(|d| {
            let mut c = d.walk();
            let expr = d.named_children(&mut c).find(|n| n.kind() != "comment");
            expr
        })
        .collect()
}

/// Dotted name of a decorator, looking through a call (`pytest.mark.skip(...)`)
pub fn decorator_name(expr: Node, source: &str) -> Option<String> {
    if expr.kind() == "call" {
        return call_name(expr, source);
    }
    dotted_name(expr, source)
}

/// Whether a function definition carries the `async` keyword
pub fn is_async_function(definition: Node) -> bool {
    let mut cursor = definition.walk();
    let is_async = definition.children(&mut cursor).any(|c| c.kind() == "async");
    is_async
}
