//! Parser module for Python test files

pub mod ast_helpers;
pub mod fingerprint;
pub mod python;
pub mod scope;
pub mod test_file;

pub use ast_helpers::{
    call_name, collect_kinds, dotted_name, node_line, node_text, walk_scope,
};
pub use fingerprint::Fingerprint;
pub use python::{first_syntax_error, PythonParser};
pub use scope::ModuleScope;
pub use test_file::{Markers, TestDiscovery, TestUnit};
