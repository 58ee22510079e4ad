//! Typed, validated run configuration
//!
//! [`RunConfig::resolve`] turns the raw [`Config`] into per-analyzer option
//! structs. Invalid values never abort the run: the default is kept and the
//! substitution is reported as a `config.*` issue.

use super::schema::{AnalyzerSection, Config, OptionValue};
use crate::{Category, Issue, Rule};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A configuration value that could not be used as written
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionError {
    #[error("{key}: expected {expected}, found {found}; using default {default}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: String,
        default: String,
    },
    #[error("{key}: {value} is out of range ({range}); using default {default}")]
    OutOfRange {
        key: String,
        value: String,
        range: String,
        default: String,
    },
    #[error("{key}: unknown option (ignored)")]
    UnknownOption { key: String },
    #[error("unknown analyzer '{name}' (ignored)")]
    UnknownAnalyzer { name: String },
}

impl OptionError {
    /// Run-level warning recording the substitution
    pub fn to_issue(&self, origin: &str) -> Issue {
        let rule = match self {
            OptionError::UnknownAnalyzer { .. } => Rule::UnknownAnalyzer,
            _ => Rule::InvalidOption,
        };
        Issue::new(rule, origin, 0, self.to_string())
            .with_suggestion("Fix the value in the configuration file")
    }
}

/// Enabled flag plus analyzer-specific options
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig<T> {
    pub enabled: bool,
    pub options: T,
}

impl<T: Default> Default for AnalyzerConfig<T> {
    fn default() -> Self {
        Self {
            enabled: true,
            options: T::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertionsOptions {
    pub min_assertions: usize,
}

impl Default for AssertionsOptions {
    fn default() -> Self {
        Self { min_assertions: 1 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamingOptions {
    /// Minimum length of the name after the `test_` prefix
    pub min_length: usize,
    pub require_docstring: bool,
}

impl Default for NamingOptions {
    fn default() -> Self {
        Self {
            min_length: 10,
            require_docstring: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityOptions {
    pub max_statements: usize,
    pub max_depth: usize,
    pub max_complexity: usize,
}

impl Default for ComplexityOptions {
    fn default() -> Self {
        Self {
            max_statements: 20,
            max_depth: 3,
            max_complexity: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmellsOptions {
    pub max_assertions_without_message: usize,
    pub check_magic_numbers: bool,
    pub check_eager_test: bool,
    /// Eager test fires above this many distinct production call targets
    pub max_call_targets: usize,
}

impl Default for SmellsOptions {
    fn default() -> Self {
        Self {
            max_assertions_without_message: 1,
            check_magic_numbers: true,
            check_eager_test: true,
            max_call_targets: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceOptions {
    pub slow_threshold_ms: f64,
    pub very_slow_threshold_ms: f64,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            slow_threshold_ms: 500.0,
            very_slow_threshold_ms: 2000.0,
        }
    }
}

/// Fully resolved configuration for one run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub enabled: bool,
    pub strict: bool,
    pub min_score: f64,
    pub assertions: AnalyzerConfig<AssertionsOptions>,
    pub naming: AnalyzerConfig<NamingOptions>,
    pub complexity: AnalyzerConfig<ComplexityOptions>,
    pub patterns: AnalyzerConfig<()>,
    pub isolation: AnalyzerConfig<()>,
    pub smells: AnalyzerConfig<SmellsOptions>,
    pub performance: AnalyzerConfig<PerformanceOptions>,
    pub ignore_paths: Vec<String>,
    pub ignore_rules: Vec<String>,
    /// Restrict the run to these analyzers (`--only`)
    pub only: Option<BTreeSet<Category>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: false,
            min_score: 0.0,
            assertions: AnalyzerConfig::default(),
            naming: AnalyzerConfig::default(),
            complexity: AnalyzerConfig::default(),
            patterns: AnalyzerConfig::default(),
            isolation: AnalyzerConfig::default(),
            smells: AnalyzerConfig::default(),
            performance: AnalyzerConfig::default(),
            ignore_paths: Vec::new(),
            ignore_rules: Vec::new(),
            only: None,
        }
    }
}

impl RunConfig {
    /// Validate a raw config. Returns the resolved config and every
    /// substitution that was made, in a stable order.
    pub fn resolve(config: &Config) -> (RunConfig, Vec<OptionError>) {
        let mut errors = Vec::new();
        let mut run = RunConfig {
            enabled: config.enabled.unwrap_or(true),
            strict: config.strict.unwrap_or(false),
            ignore_paths: config.ignore.paths.clone(),
            ignore_rules: config.ignore.rules.clone(),
            ..RunConfig::default()
        };

        if let Some(value) = &config.min_score {
            run.min_score = read_min_score(value, &mut errors);
        }

        for name in config.analyzers.keys() {
            if Category::from_name(name).is_none() {
                errors.push(OptionError::UnknownAnalyzer { name: name.clone() });
            }
        }

        let section = |name: &str| config.analyzers.get(name);

        {
            let mut reader = OptionReader::new("assertions", section("assertions"), &mut errors);
            let defaults = AssertionsOptions::default();
            run.assertions = AnalyzerConfig {
                enabled: reader.enabled(),
                options: AssertionsOptions {
                    min_assertions: reader.count("min_assertions", defaults.min_assertions, 0),
                },
            };
            reader.finish();
        }
        {
            let mut reader = OptionReader::new("naming", section("naming"), &mut errors);
            let defaults = NamingOptions::default();
            run.naming = AnalyzerConfig {
                enabled: reader.enabled(),
                options: NamingOptions {
                    min_length: reader.count("min_length", defaults.min_length, 0),
                    require_docstring: reader
                        .flag("require_docstring", defaults.require_docstring),
                },
            };
            reader.finish();
        }
        {
            let mut reader = OptionReader::new("complexity", section("complexity"), &mut errors);
            let defaults = ComplexityOptions::default();
            run.complexity = AnalyzerConfig {
                enabled: reader.enabled(),
                options: ComplexityOptions {
                    max_statements: reader.count("max_statements", defaults.max_statements, 1),
                    max_depth: reader.count("max_depth", defaults.max_depth, 1),
                    max_complexity: reader.count("max_complexity", defaults.max_complexity, 1),
                },
            };
            reader.finish();
        }
        {
            let mut reader = OptionReader::new("patterns", section("patterns"), &mut errors);
            run.patterns = AnalyzerConfig {
                enabled: reader.enabled(),
                options: (),
            };
            reader.finish();
        }
        {
            let mut reader = OptionReader::new("isolation", section("isolation"), &mut errors);
            run.isolation = AnalyzerConfig {
                enabled: reader.enabled(),
                options: (),
            };
            reader.finish();
        }
        {
            let mut reader = OptionReader::new("smells", section("smells"), &mut errors);
            let defaults = SmellsOptions::default();
            run.smells = AnalyzerConfig {
                enabled: reader.enabled(),
                options: SmellsOptions {
                    max_assertions_without_message: reader.count(
                        "max_assertions_without_message",
                        defaults.max_assertions_without_message,
                        0,
                    ),
                    check_magic_numbers: reader
                        .flag("check_magic_numbers", defaults.check_magic_numbers),
                    check_eager_test: reader.flag("check_eager_test", defaults.check_eager_test),
                    max_call_targets: reader.count(
                        "max_call_targets",
                        defaults.max_call_targets,
                        1,
                    ),
                },
            };
            reader.finish();
        }
        {
            let mut reader =
                OptionReader::new("performance", section("performance"), &mut errors);
            let defaults = PerformanceOptions::default();
            let enabled = reader.enabled();
            let slow = reader.millis("slow_threshold_ms", defaults.slow_threshold_ms);
            let very_slow = reader.millis("very_slow_threshold_ms", defaults.very_slow_threshold_ms);
            reader.finish();

            let options = if very_slow < slow {
                errors.push(OptionError::OutOfRange {
                    key: "analyzers.performance.very_slow_threshold_ms".to_string(),
                    value: format!("{}", very_slow),
                    range: format!("must be >= slow_threshold_ms {}", slow),
                    default: format!(
                        "{} / {}",
                        defaults.slow_threshold_ms, defaults.very_slow_threshold_ms
                    ),
                });
                defaults
            } else {
                PerformanceOptions {
                    slow_threshold_ms: slow,
                    very_slow_threshold_ms: very_slow,
                }
            };
            run.performance = AnalyzerConfig { enabled, options };
        }

        (run, errors)
    }

    /// Restrict the run to the given analyzers
    pub fn with_only(mut self, only: impl IntoIterator<Item = Category>) -> Self {
        let set: BTreeSet<Category> = only.into_iter().collect();
        self.only = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Whether an analyzer runs (config switch and `--only` filter)
    pub fn is_enabled(&self, category: Category) -> bool {
        let configured = match category {
            Category::Assertions => self.assertions.enabled,
            Category::Naming => self.naming.enabled,
            Category::Complexity => self.complexity.enabled,
            Category::Patterns => self.patterns.enabled,
            Category::Isolation => self.isolation.enabled,
            Category::Smells => self.smells.enabled,
            Category::Performance => self.performance.enabled,
        };
        configured
            && self
                .only
                .as_ref()
                .map_or(true, |only| only.contains(&category))
    }

    /// Whether issues of this rule are dropped by `ignore.rules`
    pub fn is_rule_ignored(&self, rule: Rule) -> bool {
        self.ignore_rules.iter().any(|pattern| rule.matches(pattern))
    }
}

fn read_min_score(value: &OptionValue, errors: &mut Vec<OptionError>) -> f64 {
    let number = match value {
        OptionValue::Integer(i) => Some(*i as f64),
        OptionValue::Float(f) => Some(*f),
        _ => None,
    };
    match number {
        Some(n) if (0.0..=100.0).contains(&n) => n,
        Some(n) => {
            errors.push(OptionError::OutOfRange {
                key: "min_score".to_string(),
                value: format!("{}", n),
                range: "0-100".to_string(),
                default: "0".to_string(),
            });
            0.0
        }
        None => {
            errors.push(OptionError::WrongType {
                key: "min_score".to_string(),
                expected: "a number",
                found: value.describe(),
                default: "0".to_string(),
            });
            0.0
        }
    }
}

/// Reads typed options out of one analyzer section, recording problems
struct OptionReader<'a> {
    analyzer: &'static str,
    table: Option<&'a BTreeMap<String, OptionValue>>,
    enabled: bool,
    seen: BTreeSet<&'static str>,
    errors: &'a mut Vec<OptionError>,
}

impl<'a> OptionReader<'a> {
    fn new(
        analyzer: &'static str,
        section: Option<&'a AnalyzerSection>,
        errors: &'a mut Vec<OptionError>,
    ) -> Self {
        let (enabled, table) = match section {
            None => (true, None),
            Some(AnalyzerSection::Toggle(on)) => (*on, None),
            Some(AnalyzerSection::Options(table)) => (true, Some(table)),
        };
        Self {
            analyzer,
            table,
            enabled,
            seen: BTreeSet::new(),
            errors,
        }
    }

    fn key(&self, name: &str) -> String {
        format!("analyzers.{}.{}", self.analyzer, name)
    }

    fn get(&mut self, name: &'static str) -> Option<&'a OptionValue> {
        self.seen.insert(name);
        self.table.and_then(|t| t.get(name))
    }

    fn enabled(&mut self) -> bool {
        let enabled = self.enabled;
        self.flag("enabled", enabled)
    }

    fn flag(&mut self, name: &'static str, default: bool) -> bool {
        match self.get(name) {
            None => default,
            Some(OptionValue::Bool(b)) => *b,
            Some(other) => {
                let err = OptionError::WrongType {
                    key: self.key(name),
                    expected: "a boolean",
                    found: other.describe(),
                    default: default.to_string(),
                };
                self.errors.push(err);
                default
            }
        }
    }

    fn count(&mut self, name: &'static str, default: usize, min: usize) -> usize {
        match self.get(name) {
            None => default,
            Some(OptionValue::Integer(i)) if *i >= min as i64 => *i as usize,
            Some(OptionValue::Integer(i)) => {
                let err = OptionError::OutOfRange {
                    key: self.key(name),
                    value: i.to_string(),
                    range: format!("must be >= {}", min),
                    default: default.to_string(),
                };
                self.errors.push(err);
                default
            }
            Some(other) => {
                let err = OptionError::WrongType {
                    key: self.key(name),
                    expected: "an integer",
                    found: other.describe(),
                    default: default.to_string(),
                };
                self.errors.push(err);
                default
            }
        }
    }

    fn millis(&mut self, name: &'static str, default: f64) -> f64 {
        let value = match self.get(name) {
            None => return default,
            Some(OptionValue::Integer(i)) => Some(*i as f64),
            Some(OptionValue::Float(f)) => Some(*f),
            Some(other) => {
                let err = OptionError::WrongType {
                    key: self.key(name),
                    expected: "a number of milliseconds",
                    found: other.describe(),
                    default: default.to_string(),
                };
                self.errors.push(err);
                None
            }
        };
        match value {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            Some(v) => {
                let err = OptionError::OutOfRange {
                    key: self.key(name),
                    value: v.to_string(),
                    range: "must be >= 0".to_string(),
                    default: default.to_string(),
                };
                self.errors.push(err);
                default
            }
            None => default,
        }
    }

    /// Report keys this analyzer does not understand
    fn finish(mut self) {
        let Some(table) = self.table else {
            return;
        };
        for key in table.keys() {
            if !self.seen.contains(key.as_str()) {
                self.errors.push(OptionError::UnknownOption {
                    key: format!("analyzers.{}.{}", self.analyzer, key),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(json: &str) -> (RunConfig, Vec<OptionError>) {
        let config: Config = serde_json::from_str(json).unwrap();
        RunConfig::resolve(&config)
    }

    #[test]
    fn test_defaults() {
        let (run, errors) = resolve("{}");
        assert!(errors.is_empty());
        assert_eq!(run, RunConfig::default());
        assert_eq!(run.complexity.options.max_statements, 20);
        assert_eq!(run.naming.options.min_length, 10);
        assert_eq!(run.performance.options.slow_threshold_ms, 500.0);
    }

    #[test]
    fn test_valid_options_applied() {
        let (run, errors) = resolve(
            r#"{ "strict": true, "min_score": 70,
                 "analyzers": {
                    "naming": false,
                    "complexity": { "max_statements": 30 },
                    "smells": { "check_magic_numbers": false },
                    "performance": { "slow_threshold_ms": 100, "very_slow_threshold_ms": 900.5 }
                 } }"#,
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert!(run.strict);
        assert_eq!(run.min_score, 70.0);
        assert!(!run.is_enabled(Category::Naming));
        assert_eq!(run.complexity.options.max_statements, 30);
        assert!(!run.smells.options.check_magic_numbers);
        assert_eq!(run.performance.options.very_slow_threshold_ms, 900.5);
    }

    #[test]
    fn test_invalid_values_keep_defaults_and_report() {
        let (run, errors) = resolve(
            r#"{ "min_score": 150,
                 "analyzers": {
                    "complexity": { "max_depth": "deep", "max_statements": 0 },
                    "smells": { "bogus": 1 },
                    "widgets": true
                 } }"#,
        );
        assert_eq!(run.min_score, 0.0);
        assert_eq!(run.complexity.options.max_depth, 3);
        assert_eq!(run.complexity.options.max_statements, 20);
        assert_eq!(errors.len(), 5, "{:?}", errors);
        assert!(errors
            .iter()
            .any(|e| matches!(e, OptionError::UnknownAnalyzer { name } if name == "widgets")));
        let issue = errors[0].to_issue(".pyreviewrc.json");
        assert_eq!(issue.severity, crate::Severity::Warning);
        assert!(issue.test.is_none());
    }

    #[test]
    fn test_inverted_performance_thresholds_fall_back() {
        let (run, errors) = resolve(
            r#"{ "analyzers": { "performance": { "slow_threshold_ms": 3000, "very_slow_threshold_ms": 1000 } } }"#,
        );
        assert_eq!(run.performance.options, PerformanceOptions::default());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("very_slow_threshold_ms"));
    }

    #[test]
    fn test_only_filter() {
        let run = RunConfig::default().with_only([Category::Assertions, Category::Naming]);
        assert!(run.is_enabled(Category::Assertions));
        assert!(!run.is_enabled(Category::Smells));
        let run = RunConfig::default().with_only([]);
        assert!(run.is_enabled(Category::Smells));
    }

    #[test]
    fn test_rule_ignore_by_prefix() {
        let run = RunConfig {
            ignore_rules: vec!["naming".to_string(), "patterns.print_statement".to_string()],
            ..RunConfig::default()
        };
        assert!(run.is_rule_ignored(Rule::NameTooShort));
        assert!(run.is_rule_ignored(Rule::PrintStatement));
        assert!(!run.is_rule_ignored(Rule::BareExcept));
    }
}
