//! Test naming quality - generic, short, badly cased or abbreviated names

use crate::config::NamingOptions;
use crate::parser::TestUnit;
use crate::{Issue, Rule};
use regex::Regex;
use std::sync::LazyLock;

static NON_DESCRIPTIVE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^test_?\d+$",   // test1, test_2
        r"^test_?[a-z]$", // test_a, testa
        r"(?i)^test_?(it|this|foo|bar|example|test|something)$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

static SNAKE_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_*[a-z][a-z0-9_]*$").expect("valid regex"));

/// Abbreviations that are ambiguous in a test name
const UNCLEAR_ABBREVIATIONS: &[&str] = &[
    "tmp", "val", "obj", "cfg", "mgr", "res", "resp", "req", "chk", "calc", "proc", "misc", "cnt",
    "buf", "ptr", "cb", "ctx", "fn",
];

/// Short tokens that read fine on their own
const CLEAR_SHORT_TOKENS: &[&str] = &[
    "test", "id", "ok", "db", "api", "url", "io", "ui", "ip", "os", "a", "i", "is", "in", "on",
    "to", "or", "an", "as", "at", "no", "if", "do", "my", "up",
];

pub fn analyze(unit: &TestUnit, options: &NamingOptions) -> Vec<Issue> {
    let mut issues = Vec::new();
    let name = unit.name.as_str();

    if NON_DESCRIPTIVE.iter().any(|re| re.is_match(name)) {
        issues.push(
            unit.issue(
                Rule::NonDescriptiveName,
                unit.line,
                format!("Non-descriptive test name: '{}'", name),
            )
            .with_suggestion("Use a descriptive name that explains what the test verifies"),
        );
    }

    let descriptive_part = name
        .strip_prefix("test_")
        .or_else(|| name.strip_prefix("test"))
        .unwrap_or(name);
    let length = descriptive_part.chars().count();
    if length < options.min_length {
        issues.push(
            unit.issue(
                Rule::NameTooShort,
                unit.line,
                format!(
                    "Test name too short ({} chars, minimum {})",
                    length, options.min_length
                ),
            )
            .with_suggestion("Use a more descriptive name that explains the test purpose"),
        );
    }

    if !SNAKE_CASE.is_match(name) {
        issues.push(
            unit.issue(
                Rule::NotSnakeCase,
                unit.line,
                format!("Test name '{}' is not in snake_case", name),
            )
            .with_suggestion("Use snake_case for test names, e.g. test_user_can_login"),
        );
    }

    let unclear = unclear_abbreviations(name);
    if !unclear.is_empty() {
        issues.push(
            unit.issue(
                Rule::UnclearAbbreviation,
                unit.line,
                format!("Unclear abbreviations: {}", unclear.join(", ")),
            )
            .with_suggestion("Use full words instead of abbreviations"),
        );
    }

    let documented = unit.docstring().is_some_and(|doc| !doc.trim().is_empty());
    if options.require_docstring && !documented {
        issues.push(
            unit.issue(Rule::MissingDocstring, unit.line, "Test is missing a docstring")
                .with_suggestion("Add a docstring explaining what the test verifies"),
        );
    }

    issues
}

/// Name tokens that are known or likely abbreviations, in order of appearance
fn unclear_abbreviations(name: &str) -> Vec<String> {
    let mut unclear: Vec<String> = Vec::new();
    for token in name.to_lowercase().split('_') {
        if token.is_empty()
            || CLEAR_SHORT_TOKENS.contains(&token)
            || token.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        let known = UNCLEAR_ABBREVIATIONS.contains(&token);
        let very_short = token.chars().count() <= 2;
        if (known || very_short) && !unclear.iter().any(|t| t == token) {
            unclear.push(token.to_string());
        }
    }
    unclear
}
