//! Configuration loading for pyreview

mod options;
mod schema;

pub use options::{
    AnalyzerConfig, AssertionsOptions, ComplexityOptions, NamingOptions, OptionError,
    PerformanceOptions, RunConfig, SmellsOptions,
};
pub use schema::{AnalyzerSection, Config, IgnoreSection, OptionValue};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = ".pyreviewrc.json";
pub const PYPROJECT_FILENAME: &str = "pyproject.toml";

/// A loaded config plus the file it came from
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: Config,
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Display name used as the `file` of configuration issues
    pub fn origin(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<defaults>".to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: PyProjectTool,
}

#[derive(Debug, Default, Deserialize)]
struct PyProjectTool {
    #[serde(rename = "pytest-review")]
    pytest_review: Option<Config>,
}

/// Find and load config. Searches the directory then its parents for
/// `.pyreviewrc.json`, or a `pyproject.toml` with a `[tool.pytest-review]` table.
pub fn load_config(work_dir: &Path, custom_path: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(p) = custom_path {
        let path = if p.is_absolute() {
            p.to_path_buf()
        } else {
            work_dir.join(p)
        };
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config = load_file(&path, &mut HashSet::new())?.unwrap_or_default();
        return Ok(LoadedConfig {
            config,
            path: Some(path),
        });
    }

    let mut dir = Some(work_dir);
    while let Some(current) = dir {
        let rc = current.join(CONFIG_FILENAME);
        if rc.exists() {
            let config = load_file(&rc, &mut HashSet::new())?.unwrap_or_default();
            tracing::debug!(path = %rc.display(), "loaded config");
            return Ok(LoadedConfig {
                config,
                path: Some(rc),
            });
        }
        let pyproject = current.join(PYPROJECT_FILENAME);
        if pyproject.exists() {
            if let Some(config) = load_file(&pyproject, &mut HashSet::new())? {
                tracing::debug!(path = %pyproject.display(), "loaded config");
                return Ok(LoadedConfig {
                    config,
                    path: Some(pyproject),
                });
            }
        }
        dir = current.parent();
    }

    Ok(LoadedConfig::default())
}

/// Load one config file, resolving `extends`. A pyproject.toml without a
/// `[tool.pytest-review]` table yields None.
fn load_file(config_path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Option<Config>> {
    // Prevent circular extends
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());
    if !visited.insert(canonical) {
        anyhow::bail!(
            "Circular extends detected in config: {}",
            config_path.display()
        );
    }

    let content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

    let is_toml = config_path.extension().and_then(|e| e.to_str()) == Some("toml");
    let config = if is_toml {
        let project: PyProject = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config: {}", config_path.display()))?;
        project.tool.pytest_review
    } else {
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in config: {}", config_path.display()))?;
        Some(config)
    };

    let Some(mut config) = config else {
        return Ok(None);
    };

    if let Some(extends) = config.extends.take() {
        let base = resolve_extends(config_path, &extends, visited)?;
        config.merge_from(base);
    }

    Ok(Some(config))
}

/// Resolve an extends reference relative to the referencing file
fn resolve_extends(
    config_path: &Path,
    extends: &str,
    visited: &mut HashSet<PathBuf>,
) -> Result<Config> {
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    let extends_path = if Path::new(extends).is_absolute() {
        PathBuf::from(extends)
    } else {
        config_dir.join(extends)
    };

    // Ensure it has an extension
    let extends_path = if extends_path.extension().is_none() {
        extends_path.with_extension("json")
    } else {
        extends_path
    };

    if !extends_path.exists() {
        anyhow::bail!(
            "Extended config not found: {} (referenced from {})",
            extends_path.display(),
            config_path.display()
        );
    }

    load_file(&extends_path, visited)?.with_context(|| {
        format!(
            "Extended config has no [tool.pytest-review] table: {}",
            extends_path.display()
        )
    })
}

/// Build a GlobSet from ignore patterns for path matching
pub fn build_ignore_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid ignore pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| anyhow::anyhow!("{}", e))
}

/// Check if a path should be ignored based on config glob patterns
pub fn is_ignored(path: &Path, ignore_set: &GlobSet) -> bool {
    ignore_set.is_match(path)
}

/// Starter `.pyreviewrc.json` written by `pyreview init`
pub fn starter_config(min_score: Option<u8>) -> String {
    let value = serde_json::json!({
        "strict": false,
        "min_score": min_score.unwrap_or(70),
        "analyzers": {
            "assertions": { "min_assertions": 1 },
            "naming": { "min_length": 10, "require_docstring": false },
            "complexity": { "max_statements": 20, "max_depth": 3, "max_complexity": 5 },
            "smells": { "max_assertions_without_message": 1, "check_magic_numbers": true },
            "performance": { "slow_threshold_ms": 500, "very_slow_threshold_ms": 2000 }
        },
        "ignore": { "paths": [], "rules": [] }
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}
