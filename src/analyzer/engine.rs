//! Review engine - parses files, runs the analyzers and builds the report

use super::registry;
use super::runtime::RuntimeCollector;
use super::ScoreCalculator;
use crate::config::RunConfig;
use crate::parser::{first_syntax_error, node_line, ModuleScope, PythonParser, TestDiscovery};
use crate::{
    Category, Issue, ReviewReport, Rule, Severity, Summary, TestUnitSummary, Verdict,
    REPORT_VERSION,
};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Issues and discovered units of one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAnalysis {
    pub file: String,
    pub issues: Vec<Issue>,
    pub units: Vec<TestUnitSummary>,
}

/// Main engine; one instance per run
#[derive(Debug, Clone, Default)]
pub struct ReviewEngine {
    config: RunConfig,
    /// Configuration substitutions reported as run-level issues
    config_issues: Vec<Issue>,
    timings: RuntimeCollector,
}

impl ReviewEngine {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            config_issues: Vec::new(),
            timings: RuntimeCollector::new(),
        }
    }

    /// Attach `config.*` issues produced while resolving the configuration
    pub fn with_config_issues(mut self, issues: Vec<Issue>) -> Self {
        for issue in &issues {
            tracing::warn!(rule = %issue.rule, origin = %issue.file, "{}", issue.message);
        }
        self.config_issues = issues;
        self
    }

    /// Attach timing samples for performance classification
    pub fn with_timings(mut self, timings: RuntimeCollector) -> Self {
        self.timings = timings;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Analyze one file's source text
    pub fn analyze_source(&self, file: &str, source: &str) -> FileAnalysis {
        tracing::debug!(file, "analyzing");
        let mut analysis = FileAnalysis {
            file: file.to_string(),
            ..FileAnalysis::default()
        };

        let tree = match PythonParser::new().and_then(|mut parser| parser.parse(source)) {
            Ok(tree) => tree,
            Err(e) => {
                self.push(
                    &mut analysis.issues,
                    Issue::new(Rule::UnreadableFile, file, 0, format!("Could not parse file: {:#}", e)),
                );
                return analysis;
            }
        };

        if let Some(node) = first_syntax_error(&tree) {
            let line = node_line(node);
            tracing::warn!(file, line, "syntax error, file skipped");
            self.push(
                &mut analysis.issues,
                Issue::new(
                    Rule::SyntaxError,
                    file,
                    line,
                    format!("Syntax error near line {}; no tests in this file were analyzed", line),
                )
                .with_suggestion("Fix the syntax error so the file can be collected"),
            );
            return analysis;
        }

        let root = tree.root_node();
        let scope = ModuleScope::build(root, source);
        let units = TestDiscovery::new(source, file, &scope).discover(root);
        for unit in &units {
            let found: Vec<Issue> = registry::run_all(unit, &self.config)
                .into_iter()
                .filter(|issue| !self.config.is_rule_ignored(issue.rule))
                .collect();
            analysis.units.push(unit.summary(found.len()));
            analysis.issues.extend(found);
        }
        analysis
    }

    /// Read and analyze one file; read failures become a `parsing.unreadable` issue
    pub fn analyze_file(&self, path: &Path) -> FileAnalysis {
        let file = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(source) => self.analyze_source(&file, &source),
            Err(e) => {
                tracing::warn!(file = %file, error = %e, "could not read file");
                let mut analysis = FileAnalysis {
                    file: file.clone(),
                    ..FileAnalysis::default()
                };
                self.push(
                    &mut analysis.issues,
                    Issue::new(Rule::UnreadableFile, file, 0, format!("Could not read file: {}", e)),
                );
                analysis
            }
        }
    }

    /// Analyze files in parallel; results keep the input order
    pub fn analyze_files(&self, paths: &[PathBuf]) -> Vec<FileAnalysis> {
        paths.par_iter().map(|path| self.analyze_file(path)).collect()
    }

    /// Full run over files on disk
    pub fn review(&self, paths: &[PathBuf]) -> ReviewReport {
        if !self.config.enabled {
            tracing::info!("review disabled by configuration");
            return self.build_report(Vec::new());
        }
        self.build_report(self.analyze_files(paths))
    }

    /// Full run over in-memory `(file, source)` pairs
    pub fn review_sources(&self, sources: &[(&str, &str)]) -> ReviewReport {
        if !self.config.enabled {
            tracing::info!("review disabled by configuration");
            return self.build_report(Vec::new());
        }
        let files = sources
            .par_iter()
            .map(|(file, source)| self.analyze_source(file, source))
            .collect();
        self.build_report(files)
    }

    /// Merge per-file results and aggregate them exactly once
    pub fn build_report(&self, files: Vec<FileAnalysis>) -> ReviewReport {
        let files_analyzed = files.len();
        let mut issues: Vec<Issue> = self
            .config_issues
            .iter()
            .filter(|i| !self.config.is_rule_ignored(i.rule))
            .cloned()
            .collect();
        let mut tests = Vec::new();
        for analysis in files {
            issues.extend(analysis.issues);
            tests.extend(analysis.units);
        }

        if self.config.is_enabled(Category::Performance) && !self.timings.is_empty() {
            let slow = self
                .timings
                .classify(&tests, &self.config.performance.options);
            for issue in slow {
                if self.config.is_rule_ignored(issue.rule) {
                    continue;
                }
                if let Some(unit) = tests
                    .iter_mut()
                    .find(|t| t.file == issue.file && Some(&t.name) == issue.test.as_ref())
                {
                    unit.issue_count += 1;
                }
                issues.push(issue);
            }
        }

        if tests.is_empty() && self.config.enabled {
            self.push(
                &mut issues,
                Issue::new(Rule::NoTests, "", 0, "No tests were found to analyze")
                    .with_suggestion("Check the path and that test files are named test_*.py or *_test.py"),
            );
        }

        let enabled = ScoreCalculator::enabled_categories(&self.config);
        let score = ScoreCalculator::aggregate(&issues, &enabled);

        let summary = summarize(&issues, &tests, files_analyzed);
        let mut by_severity = BTreeMap::new();
        by_severity.insert(Severity::Error, summary.errors);
        by_severity.insert(Severity::Warning, summary.warnings);
        by_severity.insert(Severity::Info, summary.info);
        let mut by_rule: BTreeMap<String, usize> = BTreeMap::new();
        for issue in &issues {
            *by_rule.entry(issue.rule.id().to_string()).or_default() += 1;
        }

        let verdict = self.verdict(&summary, score.overall);

        ReviewReport {
            version: REPORT_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            summary,
            by_severity,
            by_rule,
            issues,
            score,
            tests,
            verdict,
        }
    }

    fn verdict(&self, summary: &Summary, overall: f64) -> Verdict {
        let mut reasons = Vec::new();
        if self.config.strict && summary.errors > 0 {
            reasons.push(format!(
                "strict mode: {} error-severity issue(s) found",
                summary.errors
            ));
        }
        if overall < self.config.min_score {
            reasons.push(format!(
                "score {:.2} is below min_score {}",
                overall, self.config.min_score
            ));
        }
        Verdict {
            passed: reasons.is_empty(),
            reasons,
        }
    }

    fn push(&self, issues: &mut Vec<Issue>, issue: Issue) {
        if !self.config.is_rule_ignored(issue.rule) {
            issues.push(issue);
        }
    }
}

fn summarize(issues: &[Issue], tests: &[TestUnitSummary], files_analyzed: usize) -> Summary {
    let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();
    let skipped_review = tests.iter().filter(|t| t.skip_review).count();
    Summary {
        tests_analyzed: tests.len() - skipped_review,
        files_analyzed,
        skipped_review,
        errors: count(Severity::Error),
        warnings: count(Severity::Warning),
        info: count(Severity::Info),
        total_issues: issues.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Grade, ScoringCategory};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CLEAN: &str = "def test_addition_returns_sum():\n    assert add(1, 0) == 1, 'sum'\n";
    const NO_ASSERT: &str = "def test_saves_user_record():\n    return\n";

    fn make_test_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("test_")
            .suffix(".py")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn rules(report: &ReviewReport) -> Vec<Rule> {
        report.issues.iter().map(|i| i.rule).collect()
    }

    #[test]
    fn test_clean_file_has_no_issues() {
        let report = ReviewEngine::default().review_sources(&[("tests/test_math.py", CLEAN)]);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.summary.tests_analyzed, 1);
        assert_eq!(report.summary.files_analyzed, 1);
        assert_eq!(report.score.overall, 100.0);
        assert!(report.verdict.passed);
        assert_eq!(report.tests[0].node_id, "tests/test_math.py::test_addition_returns_sum");
    }

    #[test]
    fn test_missing_assertion_scores_assertions_65() {
        let report = ReviewEngine::default().review_sources(&[("tests/test_user.py", NO_ASSERT)]);
        assert_eq!(rules(&report), vec![Rule::MissingAssertions]);
        assert_eq!(
            report.score.categories[&ScoringCategory::Assertions].subtotal,
            65.0
        );
        assert_eq!(report.score.overall, 89.5);
        assert_eq!(report.tests[0].issue_count, 1);
        assert_eq!(report.by_rule["assertions.missing"], 1);
        assert_eq!(report.by_severity[&Severity::Error], 1);
    }

    #[test]
    fn test_syntax_error_isolated_to_file() {
        let report = ReviewEngine::default().review_sources(&[
            ("tests/test_broken.py", "def test_broken(:\n    pass\n"),
            ("tests/test_math.py", CLEAN),
        ]);
        assert_eq!(rules(&report), vec![Rule::SyntaxError]);
        assert_eq!(report.issues[0].file, "tests/test_broken.py");
        assert!(report.issues[0].test.is_none());
        assert_eq!(report.tests.len(), 1);
        assert_eq!(report.score.overall, 100.0);
    }

    #[test]
    fn test_unreadable_file() {
        let analysis = ReviewEngine::default().analyze_file(Path::new("/nonexistent/test_x.py"));
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].rule, Rule::UnreadableFile);
        assert!(analysis.units.is_empty());
    }

    #[test]
    fn test_review_files_on_disk_in_input_order() {
        let first = make_test_file(NO_ASSERT);
        let second = make_test_file(CLEAN);
        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let engine = ReviewEngine::default();
        let parallel = engine.analyze_files(&paths);
        let sequential: Vec<_> = paths.iter().map(|p| engine.analyze_file(p)).collect();
        assert_eq!(parallel, sequential);
        let report = engine.review(&paths);
        assert_eq!(report.summary.files_analyzed, 2);
        assert_eq!(report.tests[0].file, first.path().display().to_string());
    }

    #[test]
    fn test_no_tests_convention() {
        let report = ReviewEngine::default().review_sources(&[("tests/test_empty.py", "x = 1\n")]);
        assert_eq!(rules(&report), vec![Rule::NoTests]);
        assert_eq!(report.score.overall, 100.0);
        assert_eq!(report.score.grade, Grade::A);
        assert!(report.verdict.passed);
    }

    #[test]
    fn test_strict_fails_on_errors() {
        let config = RunConfig {
            strict: true,
            ..RunConfig::default()
        };
        let report = ReviewEngine::new(config).review_sources(&[("tests/test_user.py", NO_ASSERT)]);
        assert!(!report.verdict.passed);
        assert!(report.verdict.reasons[0].contains("strict"));
    }

    #[test]
    fn test_min_score_policy() {
        let config = RunConfig {
            min_score: 90.0,
            ..RunConfig::default()
        };
        let report = ReviewEngine::new(config).review_sources(&[("tests/test_user.py", NO_ASSERT)]);
        assert!(!report.verdict.passed);
        assert_eq!(report.verdict.reasons, vec!["score 89.50 is below min_score 90"]);
    }

    #[test]
    fn test_ignored_rules_are_dropped_before_scoring() {
        let config = RunConfig {
            ignore_rules: vec!["assertions".to_string()],
            ..RunConfig::default()
        };
        let report = ReviewEngine::new(config).review_sources(&[("tests/test_user.py", NO_ASSERT)]);
        assert!(report.issues.is_empty());
        assert_eq!(report.score.overall, 100.0);
        assert_eq!(report.tests[0].issue_count, 0);
    }

    #[test]
    fn test_skip_review_units_counted_but_not_analyzed() {
        let source = "import pytest\n\n@pytest.mark.review_skip\ndef test_1():\n    pass\n";
        let mut timings = RuntimeCollector::new();
        timings.record("tests/test_skip.py::test_1", 9000.0);
        let report = ReviewEngine::default()
            .with_timings(timings)
            .review_sources(&[("tests/test_skip.py", source)]);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.summary.skipped_review, 1);
        assert_eq!(report.summary.tests_analyzed, 0);
    }

    #[test]
    fn test_timings_add_performance_issues() {
        let mut timings = RuntimeCollector::new();
        timings.record("tests/test_math.py::test_addition_returns_sum", 2500.0);
        timings.record("tests/test_math.py::test_unknown", 2500.0);
        let report = ReviewEngine::default()
            .with_timings(timings)
            .review_sources(&[("tests/test_math.py", CLEAN)]);
        assert_eq!(rules(&report), vec![Rule::VerySlowTest]);
        assert_eq!(report.tests[0].issue_count, 1);
        assert_eq!(
            report.score.categories[&ScoringCategory::Performance].subtotal,
            95.0
        );
    }

    #[test]
    fn test_config_issues_reported_but_unscored() {
        let issue = Issue::new(Rule::InvalidOption, ".pyreviewrc.json", 0, "bad");
        let report = ReviewEngine::default()
            .with_config_issues(vec![issue])
            .review_sources(&[("tests/test_math.py", CLEAN)]);
        assert_eq!(rules(&report), vec![Rule::InvalidOption]);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.score.overall, 100.0);
    }

    #[test]
    fn test_disabled_run_is_empty_and_passes() {
        let config = RunConfig {
            enabled: false,
            ..RunConfig::default()
        };
        let report = ReviewEngine::new(config).review_sources(&[("tests/test_user.py", NO_ASSERT)]);
        assert!(report.issues.is_empty());
        assert!(report.tests.is_empty());
        assert!(report.verdict.passed);
    }

    #[test]
    fn test_deterministic_apart_from_timestamp() {
        let sources = [("tests/test_user.py", NO_ASSERT), ("tests/test_math.py", CLEAN)];
        let engine = ReviewEngine::default();
        let a = engine.review_sources(&sources);
        let b = engine.review_sources(&sources);
        assert_eq!(a.issues, b.issues);
        assert_eq!(a.score, b.score);
        assert_eq!(a.tests, b.tests);
        assert_eq!(a.summary, b.summary);
    }
}
