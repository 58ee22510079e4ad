//! Analysis engine and its components

pub mod engine;
pub mod registry;
pub mod rules;
pub mod runtime;
pub mod scoring;

pub use engine::{FileAnalysis, ReviewEngine};
pub use registry::STATIC_ANALYZERS;
pub use runtime::{RuntimeCollector, TimingSample};
pub use scoring::ScoreCalculator;
