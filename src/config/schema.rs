//! Config schema and deserialization
//!
//! The raw, untyped shape shared by `.pyreviewrc.json` and the
//! `[tool.pytest-review]` table of `pyproject.toml`. Values are validated
//! later when resolving a [`RunConfig`](super::RunConfig).

use serde::Deserialize;
use std::collections::BTreeMap;

/// A scalar option value as written in the config file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            OptionValue::Bool(b) => format!("boolean {}", b),
            OptionValue::Integer(i) => format!("integer {}", i),
            OptionValue::Float(f) => format!("number {}", f),
            OptionValue::Text(s) => format!("string {:?}", s),
        }
    }
}

/// Per-analyzer section: either `name = false` or a table of options
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AnalyzerSection {
    Toggle(bool),
    Options(BTreeMap<String, OptionValue>),
}

impl AnalyzerSection {
    /// Child settings win; option tables are merged key by key
    fn merge_from(&mut self, base: AnalyzerSection) {
        if let (AnalyzerSection::Options(mine), AnalyzerSection::Options(theirs)) = (&mut *self, base)
        {
            for (key, value) in theirs {
                mine.entry(key).or_insert(value);
            }
        }
    }
}

/// Paths and rules excluded from the run
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IgnoreSection {
    /// Glob patterns of files to skip
    pub paths: Vec<String>,
    /// Rule ids (`patterns.print_statement`) or category prefixes (`naming`)
    pub rules: Vec<String>,
}

/// Main config structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extend another config file (relative path)
    pub extends: Option<String>,

    /// Master switch: when false no analysis runs
    pub enabled: Option<bool>,

    /// Treat any error-severity issue as failing the run
    pub strict: Option<bool>,

    /// Minimum overall score (0-100) for the run to pass
    pub min_score: Option<OptionValue>,

    /// Analyzer sections keyed by analyzer name
    pub analyzers: BTreeMap<String, AnalyzerSection>,

    pub ignore: IgnoreSection,
}

impl Config {
    /// Merge a base config into this one (self takes precedence)
    pub fn merge_from(&mut self, base: Config) {
        if self.enabled.is_none() {
            self.enabled = base.enabled;
        }
        if self.strict.is_none() {
            self.strict = base.strict;
        }
        if self.min_score.is_none() {
            self.min_score = base.min_score;
        }

        for (name, section) in base.analyzers {
            match self.analyzers.get_mut(&name) {
                Some(existing) => existing.merge_from(section),
                None => {
                    self.analyzers.insert(name, section);
                }
            }
        }

        let mut paths = base.ignore.paths;
        for pattern in std::mem::take(&mut self.ignore.paths) {
            if !paths.contains(&pattern) {
                paths.push(pattern);
            }
        }
        self.ignore.paths = paths;

        let mut rules = base.ignore.rules;
        for rule in std::mem::take(&mut self.ignore.rules) {
            if !rules.contains(&rule) {
                rules.push(rule);
            }
        }
        self.ignore.rules = rules;
    }

    /// Apply command-line overrides
    pub fn merge_with_cli(mut self, min_score: Option<f64>, strict: bool) -> Self {
        if let Some(score) = min_score {
            self.min_score = Some(OptionValue::Float(score));
        }
        if strict {
            self.strict = Some(true);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "strict": true,
                "min_score": 75,
                "analyzers": {
                    "naming": false,
                    "complexity": { "max_statements": 30, "enabled": true }
                },
                "ignore": { "rules": ["patterns.print_statement"] }
            }"#,
        )
        .unwrap();
        assert_eq!(config.strict, Some(true));
        assert_eq!(config.min_score, Some(OptionValue::Integer(75)));
        assert_eq!(
            config.analyzers.get("naming"),
            Some(&AnalyzerSection::Toggle(false))
        );
        match config.analyzers.get("complexity") {
            Some(AnalyzerSection::Options(opts)) => {
                assert_eq!(opts.get("max_statements"), Some(&OptionValue::Integer(30)));
                assert_eq!(opts.get("enabled"), Some(&OptionValue::Bool(true)));
            }
            other => panic!("unexpected section: {:?}", other),
        }
        assert_eq!(config.ignore.rules, vec!["patterns.print_statement"]);
    }

    #[test]
    fn test_parse_toml_table() {
        let config: Config = toml::from_str(
            r#"
min_score = 60

[analyzers.performance]
slow_threshold_ms = 250.5

[ignore]
paths = ["tests/legacy/**"]
"#,
        )
        .unwrap();
        assert_eq!(config.min_score, Some(OptionValue::Integer(60)));
        match config.analyzers.get("performance") {
            Some(AnalyzerSection::Options(opts)) => {
                assert_eq!(opts.get("slow_threshold_ms"), Some(&OptionValue::Float(250.5)));
            }
            other => panic!("unexpected section: {:?}", other),
        }
        assert_eq!(config.ignore.paths, vec!["tests/legacy/**"]);
    }

    #[test]
    fn test_merge_child_wins() {
        let mut child: Config = serde_json::from_str(
            r#"{ "min_score": 80, "analyzers": { "complexity": { "max_depth": 4 } } }"#,
        )
        .unwrap();
        let base: Config = serde_json::from_str(
            r#"{ "min_score": 50, "strict": true,
                 "analyzers": { "complexity": { "max_depth": 2, "max_statements": 40 } },
                 "ignore": { "rules": ["naming"] } }"#,
        )
        .unwrap();
        child.merge_from(base);
        assert_eq!(child.min_score, Some(OptionValue::Integer(80)));
        assert_eq!(child.strict, Some(true));
        match child.analyzers.get("complexity") {
            Some(AnalyzerSection::Options(opts)) => {
                assert_eq!(opts.get("max_depth"), Some(&OptionValue::Integer(4)));
                assert_eq!(opts.get("max_statements"), Some(&OptionValue::Integer(40)));
            }
            other => panic!("unexpected section: {:?}", other),
        }
        assert_eq!(child.ignore.rules, vec!["naming"]);
    }
}
