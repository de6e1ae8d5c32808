//! Generative-model client module.

mod anthropic;

pub use anthropic::*;
