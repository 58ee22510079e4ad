//! Runtime collector - timing samples classified against performance thresholds
//!
//! Samples arrive from outside the static pass (a `--timings` file, or a host
//! that records durations while tests execute). They are only accumulated
//! until [`RuntimeCollector::classify`] runs during aggregation.

use crate::config::PerformanceOptions;
use crate::{Issue, Rule, TestUnitSummary};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One measured test execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// Node id such as `tests/test_api.py::TestApi::test_get[1]`
    pub test: String,
    pub duration_ms: f64,
}

impl TimingSample {
    pub fn new(test: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            test: test.into(),
            duration_ms,
        }
    }
}

/// Append-only accumulation of timing samples for one run
#[derive(Debug, Clone, Default)]
pub struct RuntimeCollector {
    samples: Vec<TimingSample>,
}

impl RuntimeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load samples from a JSON list of `{"test": .., "duration_ms": ..}`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read timings file: {}", path.display()))?;
        let samples: Vec<TimingSample> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse timings file: {}", path.display()))?;
        Ok(Self { samples })
    }

    pub fn record(&mut self, test: impl Into<String>, duration_ms: f64) {
        self.samples.push(TimingSample::new(test, duration_ms));
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = TimingSample>) {
        self.samples.extend(samples);
    }

    /// Fold in the samples of another worker
    pub fn merge(&mut self, other: RuntimeCollector) {
        self.samples.extend(other.samples);
    }

    pub fn samples(&self) -> &[TimingSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Performance issues for the given units.
    ///
    /// Each sample is attributed to the first unit it matches. Output is
    /// ordered by unit, then by sample id and duration, so arrival order
    /// never changes the result.
    pub fn classify(&self, units: &[TestUnitSummary], options: &PerformanceOptions) -> Vec<Issue> {
        let mut matched: Vec<Vec<&TimingSample>> = vec![Vec::new(); units.len()];

        for sample in &self.samples {
            if !sample.duration_ms.is_finite() || sample.duration_ms < 0.0 {
                tracing::debug!(test = %sample.test, "ignoring invalid duration");
                continue;
            }
            match units.iter().position(|unit| sample_matches(&sample.test, unit)) {
                Some(index) => matched[index].push(sample),
                None => tracing::debug!(test = %sample.test, "timing sample matches no test"),
            }
        }

        let mut issues = Vec::new();
        for (unit, samples) in units.iter().zip(matched.iter_mut()) {
            if unit.skip_review {
                continue;
            }
            samples.sort_by(|a, b| {
                a.test
                    .cmp(&b.test)
                    .then(a.duration_ms.total_cmp(&b.duration_ms))
            });
            for sample in samples.iter() {
                if let Some(issue) = classify_sample(unit, sample, options) {
                    issues.push(issue);
                }
            }
        }
        issues
    }
}

fn classify_sample(
    unit: &TestUnitSummary,
    sample: &TimingSample,
    options: &PerformanceOptions,
) -> Option<Issue> {
    let duration = sample.duration_ms;
    let (rule, threshold) = if duration >= options.very_slow_threshold_ms {
        (Rule::VerySlowTest, options.very_slow_threshold_ms)
    } else if duration >= options.slow_threshold_ms {
        (Rule::SlowTest, options.slow_threshold_ms)
    } else {
        return None;
    };

    let suggestion = match rule {
        Rule::VerySlowTest => "Mock slow dependencies or move the test to a separate slow suite",
        _ => "Look for avoidable I/O, sleeps or expensive setup",
    };
    Some(
        Issue::new(
            rule,
            unit.file.clone(),
            unit.line,
            format!(
                "{} took {:.0}ms (threshold: {:.0}ms)",
                sample.test, duration, threshold
            ),
        )
        .with_suggestion(suggestion)
        .for_test(unit.name.clone()),
    )
}

/// Whether a sample id refers to this unit
fn sample_matches(id: &str, unit: &TestUnitSummary) -> bool {
    let id = strip_parameters(id);
    let Some((path, qualified)) = id.split_once("::") else {
        return id == unit.name;
    };
    if qualified != unit.name {
        return false;
    }
    match unit.node_id.split_once("::") {
        Some((unit_path, _)) if !path.is_empty() => paths_match(path, unit_path),
        _ => false,
    }
}

/// `test_x[1-a]` -> `test_x`
fn strip_parameters(id: &str) -> &str {
    match id.find('[') {
        Some(open) if id.ends_with(']') => &id[..open],
        _ => id,
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}

/// Equal, or one is a suffix of the other at a `/` boundary
fn paths_match(a: &str, b: &str) -> bool {
    let a = normalize_path(a);
    let b = normalize_path(b);
    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    long == short
        || (long.ends_with(short.as_str())
            && long[..long.len() - short.len()].ends_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(node_id: &str) -> TestUnitSummary {
        let (file, name) = node_id.split_once("::").unwrap();
        TestUnitSummary {
            name: name.to_string(),
            node_id: node_id.to_string(),
            file: file.to_string(),
            line: 3,
            skip_review: false,
            skipped: false,
            parametrized: false,
            is_async: false,
            issue_count: 0,
        }
    }

    #[test]
    fn test_thresholds_are_inclusive_and_exclusive_of_each_other() {
        let units = vec![unit("tests/test_api.py::test_fetch_users")];
        let mut collector = RuntimeCollector::new();
        collector.record("tests/test_api.py::test_fetch_users", 499.0);
        collector.record("tests/test_api.py::test_fetch_users", 500.0);
        collector.record("tests/test_api.py::test_fetch_users", 2000.0);
        let issues = collector.classify(&units, &PerformanceOptions::default());
        let rules: Vec<Rule> = issues.iter().map(|i| i.rule).collect();
        assert_eq!(rules, vec![Rule::SlowTest, Rule::VerySlowTest]);
        assert_eq!(issues[0].test.as_deref(), Some("test_fetch_users"));
        assert_eq!(issues[0].line, 3);
    }

    #[test]
    fn test_matching_rules() {
        let u = unit("tests/unit/test_api.py::TestApi::test_get");
        assert!(sample_matches("tests/unit/test_api.py::TestApi::test_get", &u));
        assert!(sample_matches("unit/test_api.py::TestApi::test_get[1-2]", &u));
        assert!(sample_matches("/repo/tests/unit/test_api.py::TestApi::test_get", &u));
        assert!(sample_matches(".\\tests\\unit\\test_api.py::TestApi::test_get", &u));
        assert!(!sample_matches("TestApi::test_get", &u));
        assert!(!sample_matches("pi.py::TestApi::test_get", &u));
        assert!(!sample_matches("tests/unit/test_api.py::test_get", &u));

        let bare = unit("tests/test_b.py::test_only");
        assert!(sample_matches("test_only", &bare));
        assert!(sample_matches("test_only[x]", &bare));
    }

    #[test]
    fn test_unmatched_and_skipped_units_yield_nothing() {
        let mut skipped = unit("tests/test_a.py::test_review_skipped");
        skipped.skip_review = true;
        let units = vec![skipped];
        let mut collector = RuntimeCollector::new();
        collector.record("tests/test_a.py::test_review_skipped", 5000.0);
        collector.record("tests/test_a.py::test_missing", 5000.0);
        collector.record("tests/test_a.py::test_review_skipped", f64::NAN);
        assert!(collector
            .classify(&units, &PerformanceOptions::default())
            .is_empty());
    }

    #[test]
    fn test_order_independent_and_mergeable() {
        let units = vec![
            unit("tests/test_a.py::test_first_case"),
            unit("tests/test_a.py::test_second_case"),
        ];
        let mut forward = RuntimeCollector::new();
        forward.record("tests/test_a.py::test_first_case[b]", 900.0);
        forward.record("tests/test_a.py::test_first_case[a]", 3000.0);
        let mut worker = RuntimeCollector::new();
        worker.record("tests/test_a.py::test_second_case", 600.0);
        forward.merge(worker);

        let mut backward = RuntimeCollector::new();
        backward.extend(forward.samples().iter().rev().cloned());

        let options = PerformanceOptions::default();
        assert_eq!(forward.classify(&units, &options), backward.classify(&units, &options));
        let issues = forward.classify(&units, &options);
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].rule, Rule::VerySlowTest);
        assert_eq!(issues[2].test.as_deref(), Some("test_second_case"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timings.json");
        std::fs::write(
            &path,
            r#"[{"test": "tests/test_a.py::test_x", "duration_ms": 12.5}]"#,
        )
        .unwrap();
        let collector = RuntimeCollector::load(&path).unwrap();
        assert_eq!(
            collector.samples(),
            &[TimingSample::new("tests/test_a.py::test_x", 12.5)]
        );
        assert!(RuntimeCollector::load(&dir.path().join("missing.json")).is_err());
    }
}
