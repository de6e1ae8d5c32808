//! Per-iteration generation stages: prompting, JSON recovery and normalization.

mod normalizer;
mod parser;
mod prompt;

pub use normalizer::*;
pub use parser::*;
pub use prompt::*;
