//! Analyzer registry - closed dispatch from [`Category`] to analyzer functions
//!
//! Every static analyzer runs once per test unit. A panic inside one analyzer
//! is contained to that (analyzer, unit) pair and reported as a
//! `run.analyzer_failure` diagnostic.

use super::rules::{assertions, complexity, isolation, naming, patterns, smells};
use crate::config::RunConfig;
use crate::parser::TestUnit;
use crate::{Category, Issue, Rule};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Analyzers that work on the syntax tree, in the order they run.
/// Performance is fed by timing samples instead, see [`super::runtime`].
pub const STATIC_ANALYZERS: [Category; 6] = [
    Category::Assertions,
    Category::Naming,
    Category::Complexity,
    Category::Patterns,
    Category::Isolation,
    Category::Smells,
];

/// Run one analyzer over one unit
pub fn run(category: Category, unit: &TestUnit, config: &RunConfig) -> Vec<Issue> {
    match category {
        Category::Assertions => assertions::analyze(unit, &config.assertions.options),
        Category::Naming => naming::analyze(unit, &config.naming.options),
        Category::Complexity => complexity::analyze(unit, &config.complexity.options),
        Category::Patterns => patterns::analyze(unit),
        Category::Isolation => isolation::analyze(unit),
        Category::Smells => smells::analyze(unit, &config.smells.options),
        Category::Performance => Vec::new(),
    }
}

/// Run every enabled static analyzer over a unit
pub fn run_all(unit: &TestUnit, config: &RunConfig) -> Vec<Issue> {
    run_all_with(unit, config, run)
}

fn run_all_with<F>(unit: &TestUnit, config: &RunConfig, analyzer: F) -> Vec<Issue>
where
    F: Fn(Category, &TestUnit, &RunConfig) -> Vec<Issue>,
{
    if unit.markers.skip_review {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for category in STATIC_ANALYZERS {
        if !config.is_enabled(category) {
            continue;
        }
        match catch_unwind(AssertUnwindSafe(|| analyzer(category, unit, config))) {
            Ok(found) => issues.extend(found),
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(
                    analyzer = %category,
                    test = %unit.qualified_name,
                    file = %unit.file,
                    "analyzer failed: {}",
                    reason
                );
                issues.push(
                    Issue::new(
                        Rule::AnalyzerFailure,
                        unit.file.clone(),
                        unit.line,
                        format!("The {} analyzer failed on this test: {}", category, reason),
                    )
                    .for_test(unit.qualified_name.clone()),
                );
            }
        }
    }
    issues
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
