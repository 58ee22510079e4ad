//! pyreview: Test Quality Analyzer for Python
//!
//! This library statically analyzes Python test files (pytest and unittest
//! style), folds in optional runtime timing samples, and produces a
//! weighted quality score with a list of actionable issues.

pub mod analyzer;
pub mod config;
pub mod parser;
pub mod reporter;

pub use analyzer::{ReviewEngine, RuntimeCollector, ScoreCalculator, TimingSample};
pub use config::RunConfig;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current report format version
pub const REPORT_VERSION: &str = "1";

/// Severity levels for issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Analyzer category an issue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assertions,
    Naming,
    Complexity,
    Patterns,
    Isolation,
    Performance,
    Smells,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Assertions,
        Category::Naming,
        Category::Complexity,
        Category::Patterns,
        Category::Isolation,
        Category::Performance,
        Category::Smells,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Assertions => "assertions",
            Category::Naming => "naming",
            Category::Complexity => "complexity",
            Category::Patterns => "patterns",
            Category::Isolation => "isolation",
            Category::Performance => "performance",
            Category::Smells => "smells",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Scoring group this category contributes to
    pub fn scoring_category(self) -> ScoringCategory {
        match self {
            Category::Assertions => ScoringCategory::Assertions,
            Category::Naming | Category::Smells => ScoringCategory::Clarity,
            Category::Isolation => ScoringCategory::Isolation,
            Category::Complexity | Category::Patterns => ScoringCategory::Simplicity,
            Category::Performance => ScoringCategory::Performance,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weighted grouping used only when scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringCategory {
    Assertions,
    Clarity,
    Isolation,
    Simplicity,
    Performance,
}

impl ScoringCategory {
    pub const ALL: [ScoringCategory; 5] = [
        ScoringCategory::Assertions,
        ScoringCategory::Clarity,
        ScoringCategory::Isolation,
        ScoringCategory::Simplicity,
        ScoringCategory::Performance,
    ];

    /// Weight as a percentage of the overall score
    pub fn weight_pct(self) -> u32 {
        match self {
            ScoringCategory::Assertions => 30,
            ScoringCategory::Clarity => 25,
            ScoringCategory::Isolation => 20,
            ScoringCategory::Simplicity => 15,
            ScoringCategory::Performance => 10,
        }
    }

    /// Analyzer categories feeding this group
    pub fn members(self) -> &'static [Category] {
        match self {
            ScoringCategory::Assertions => &[Category::Assertions],
            ScoringCategory::Clarity => &[Category::Naming, Category::Smells],
            ScoringCategory::Isolation => &[Category::Isolation],
            ScoringCategory::Simplicity => &[Category::Complexity, Category::Patterns],
            ScoringCategory::Performance => &[Category::Performance],
        }
    }
}

impl std::fmt::Display for ScoringCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringCategory::Assertions => write!(f, "Assertions"),
            ScoringCategory::Clarity => write!(f, "Clarity"),
            ScoringCategory::Isolation => write!(f, "Isolation"),
            ScoringCategory::Simplicity => write!(f, "Simplicity"),
            ScoringCategory::Performance => write!(f, "Performance"),
        }
    }
}

/// Analysis rules, serialized as `<category>.<check>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rule {
    #[serde(rename = "assertions.missing")]
    MissingAssertions,
    #[serde(rename = "assertions.insufficient")]
    InsufficientAssertions,
    #[serde(rename = "assertions.trivial")]
    TrivialAssertion,
    #[serde(rename = "assertions.tautology")]
    TautologicalAssertion,
    #[serde(rename = "naming.non_descriptive")]
    NonDescriptiveName,
    #[serde(rename = "naming.too_short")]
    NameTooShort,
    #[serde(rename = "naming.not_snake_case")]
    NotSnakeCase,
    #[serde(rename = "naming.unclear_abbreviation")]
    UnclearAbbreviation,
    #[serde(rename = "naming.missing_docstring")]
    MissingDocstring,
    #[serde(rename = "complexity.too_many_statements")]
    TooManyStatements,
    #[serde(rename = "complexity.deep_nesting")]
    DeepNesting,
    #[serde(rename = "complexity.high_cyclomatic")]
    HighCyclomatic,
    #[serde(rename = "patterns.bare_except")]
    BareExcept,
    #[serde(rename = "patterns.swallowed_exception")]
    SwallowedException,
    #[serde(rename = "patterns.sleep_in_test")]
    SleepInTest,
    #[serde(rename = "patterns.print_statement")]
    PrintStatement,
    #[serde(rename = "patterns.open_without_context")]
    OpenWithoutContext,
    #[serde(rename = "patterns.os_system")]
    OsSystem,
    #[serde(rename = "patterns.hardcoded_path")]
    HardcodedPath,
    #[serde(rename = "patterns.legacy_mock")]
    LegacyMock,
    #[serde(rename = "patterns.is_literal")]
    IsLiteral,
    #[serde(rename = "isolation.global_modification")]
    GlobalModification,
    #[serde(rename = "isolation.class_attr_modification")]
    ClassAttrModification,
    #[serde(rename = "performance.slow_test")]
    SlowTest,
    #[serde(rename = "performance.very_slow_test")]
    VerySlowTest,
    #[serde(rename = "smells.assertion_roulette")]
    AssertionRoulette,
    #[serde(rename = "smells.duplicate_assert")]
    DuplicateAssert,
    #[serde(rename = "smells.ignored_test")]
    IgnoredTest,
    #[serde(rename = "smells.magic_number")]
    MagicNumber,
    #[serde(rename = "smells.eager_test")]
    EagerTest,
    #[serde(rename = "parsing.syntax_error")]
    SyntaxError,
    #[serde(rename = "parsing.unreadable")]
    UnreadableFile,
    #[serde(rename = "config.invalid_option")]
    InvalidOption,
    #[serde(rename = "config.unknown_analyzer")]
    UnknownAnalyzer,
    #[serde(rename = "run.no_tests")]
    NoTests,
    #[serde(rename = "run.analyzer_failure")]
    AnalyzerFailure,
}

impl Rule {
    pub const ALL: [Rule; 36] = [
        Rule::MissingAssertions,
        Rule::InsufficientAssertions,
        Rule::TrivialAssertion,
        Rule::TautologicalAssertion,
        Rule::NonDescriptiveName,
        Rule::NameTooShort,
        Rule::NotSnakeCase,
        Rule::UnclearAbbreviation,
        Rule::MissingDocstring,
        Rule::TooManyStatements,
        Rule::DeepNesting,
        Rule::HighCyclomatic,
        Rule::BareExcept,
        Rule::SwallowedException,
        Rule::SleepInTest,
        Rule::PrintStatement,
        Rule::OpenWithoutContext,
        Rule::OsSystem,
        Rule::HardcodedPath,
        Rule::LegacyMock,
        Rule::IsLiteral,
        Rule::GlobalModification,
        Rule::ClassAttrModification,
        Rule::SlowTest,
        Rule::VerySlowTest,
        Rule::AssertionRoulette,
        Rule::DuplicateAssert,
        Rule::IgnoredTest,
        Rule::MagicNumber,
        Rule::EagerTest,
        Rule::SyntaxError,
        Rule::UnreadableFile,
        Rule::InvalidOption,
        Rule::UnknownAnalyzer,
        Rule::NoTests,
        Rule::AnalyzerFailure,
    ];

    /// Stable identifier, e.g. `assertions.missing`
    pub fn id(self) -> &'static str {
        match self {
            Rule::MissingAssertions => "assertions.missing",
            Rule::InsufficientAssertions => "assertions.insufficient",
            Rule::TrivialAssertion => "assertions.trivial",
            Rule::TautologicalAssertion => "assertions.tautology",
            Rule::NonDescriptiveName => "naming.non_descriptive",
            Rule::NameTooShort => "naming.too_short",
            Rule::NotSnakeCase => "naming.not_snake_case",
            Rule::UnclearAbbreviation => "naming.unclear_abbreviation",
            Rule::MissingDocstring => "naming.missing_docstring",
            Rule::TooManyStatements => "complexity.too_many_statements",
            Rule::DeepNesting => "complexity.deep_nesting",
            Rule::HighCyclomatic => "complexity.high_cyclomatic",
            Rule::BareExcept => "patterns.bare_except",
            Rule::SwallowedException => "patterns.swallowed_exception",
            Rule::SleepInTest => "patterns.sleep_in_test",
            Rule::PrintStatement => "patterns.print_statement",
            Rule::OpenWithoutContext => "patterns.open_without_context",
            Rule::OsSystem => "patterns.os_system",
            Rule::HardcodedPath => "patterns.hardcoded_path",
            Rule::LegacyMock => "patterns.legacy_mock",
            Rule::IsLiteral => "patterns.is_literal",
            Rule::GlobalModification => "isolation.global_modification",
            Rule::ClassAttrModification => "isolation.class_attr_modification",
            Rule::SlowTest => "performance.slow_test",
            Rule::VerySlowTest => "performance.very_slow_test",
            Rule::AssertionRoulette => "smells.assertion_roulette",
            Rule::DuplicateAssert => "smells.duplicate_assert",
            Rule::IgnoredTest => "smells.ignored_test",
            Rule::MagicNumber => "smells.magic_number",
            Rule::EagerTest => "smells.eager_test",
            Rule::SyntaxError => "parsing.syntax_error",
            Rule::UnreadableFile => "parsing.unreadable",
            Rule::InvalidOption => "config.invalid_option",
            Rule::UnknownAnalyzer => "config.unknown_analyzer",
            Rule::NoTests => "run.no_tests",
            Rule::AnalyzerFailure => "run.analyzer_failure",
        }
    }

    /// Analyzer category, or None for run-level diagnostics that are never scored
    pub fn category(self) -> Option<Category> {
        use Rule::*;
        match self {
            MissingAssertions | InsufficientAssertions | TrivialAssertion
            | TautologicalAssertion => Some(Category::Assertions),
            NonDescriptiveName | NameTooShort | NotSnakeCase | UnclearAbbreviation
            | MissingDocstring => Some(Category::Naming),
            TooManyStatements | DeepNesting | HighCyclomatic => Some(Category::Complexity),
            BareExcept | SwallowedException | SleepInTest | PrintStatement
            | OpenWithoutContext | OsSystem | HardcodedPath | LegacyMock | IsLiteral => {
                Some(Category::Patterns)
            }
            GlobalModification | ClassAttrModification => Some(Category::Isolation),
            SlowTest | VerySlowTest => Some(Category::Performance),
            AssertionRoulette | DuplicateAssert | IgnoredTest | MagicNumber | EagerTest => {
                Some(Category::Smells)
            }
            SyntaxError | UnreadableFile | InvalidOption | UnknownAnalyzer | NoTests
            | AnalyzerFailure => None,
        }
    }

    pub fn severity(self) -> Severity {
        use Rule::*;
        match self {
            MissingAssertions | TrivialAssertion | TautologicalAssertion | SyntaxError
            | UnreadableFile => Severity::Error,
            NameTooShort | UnclearAbbreviation | MissingDocstring | PrintStatement
            | OpenWithoutContext | LegacyMock | SlowTest | MagicNumber | EagerTest | NoTests => {
                Severity::Info
            }
            _ => Severity::Warning,
        }
    }

    /// Whether the rule id matches an ignore entry (full id or category prefix)
    pub fn matches(self, pattern: &str) -> bool {
        let id = self.id();
        id == pattern
            || id
                .strip_prefix(pattern)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// An issue found during analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Rule that found this issue
    pub rule: Rule,
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Suggested fix (if available)
    pub suggestion: Option<String>,
    /// File the issue was found in
    pub file: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Qualified name of the owning test unit; None for file and run diagnostics
    pub test: Option<String>,
}

impl Issue {
    /// Create an issue with the rule's default severity
    pub fn new(rule: Rule, file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: rule.severity(),
            message: message.into(),
            suggestion: None,
            file: file.into(),
            line,
            test: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn for_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }
}

/// Letter grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::A => write!(f, "A"),
            Grade::B => write!(f, "B"),
            Grade::C => write!(f, "C"),
            Grade::D => write!(f, "D"),
            Grade::F => write!(f, "F"),
        }
    }
}

/// Subtotal and issue counts for one scoring category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// 100 minus the penalties charged to this category, floored at 0
    pub subtotal: f64,
    /// Effective weight (0-1) after redistribution over enabled categories
    pub weight: f64,
    pub enabled: bool,
    pub issue_count: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

/// A run-level penalty charged once when its rule is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPenalty {
    pub rule: Rule,
    pub amount: f64,
}

/// Aggregate score for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Overall score (0-100)
    pub overall: f64,
    pub grade: Grade,
    pub categories: BTreeMap<ScoringCategory, CategoryScore>,
    #[serde(default)]
    pub critical_penalties: Vec<CriticalPenalty>,
}

/// Issue and test counts for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub tests_analyzed: usize,
    pub files_analyzed: usize,
    pub skipped_review: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub total_issues: usize,
}

/// Per-test entry in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUnitSummary {
    /// Qualified name (`Class::method` or `function`)
    pub name: String,
    /// Node id used to match timing samples (`path::Class::method`)
    pub node_id: String,
    pub file: String,
    pub line: usize,
    pub skip_review: bool,
    /// Carries a skip or xfail marker
    pub skipped: bool,
    pub parametrized: bool,
    pub is_async: bool,
    pub issue_count: usize,
}

/// Pass/fail decision under the strict and min_score policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub reasons: Vec<String>,
}

/// The canonical report consumed by every renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewReport {
    pub version: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    pub summary: Summary,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_rule: BTreeMap<String, usize>,
    pub issues: Vec<Issue>,
    pub score: ScoreReport,
    pub tests: Vec<TestUnitSummary>,
    pub verdict: Verdict,
}

impl ReviewReport {
    /// Issues belonging to one file, in report order
    pub fn issues_for_file<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Issue> + 'a {
        self.issues.iter().filter(move |i| i.file == file)
    }

    /// Distinct files referenced by tests or issues, in first-seen order
    pub fn files(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let names = self
            .tests
            .iter()
            .map(|t| t.file.as_str())
            .chain(self.issues.iter().map(|i| i.file.as_str()));
        for name in names {
            if !name.is_empty() && !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}
